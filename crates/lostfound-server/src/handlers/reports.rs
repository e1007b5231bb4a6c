use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lostfound_cache::{CascadeContext, Entity, Mutation};
use serde::Deserialize;

use super::{Deleted, JsonBody, PageParams, QueryParams, parse_id, validated, view_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewReport, Report, ReportPatch, ReportStatus};
use crate::server::AppState;
use crate::storage::Paginated;

#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageParams>,
    QueryParams(filter): QueryParams<ReportFilter>,
) -> ApiResult<Json<Paginated<Report>>> {
    let page = paging.resolve()?;
    let key = view_key(
        "reports:list",
        &[("status", filter.status.map(|s| s.as_str()))],
        page,
    );
    let reports = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            Ok::<_, ApiError>(state.store.reports.list(
                |report| filter.status.is_none_or(|s| report.status == s),
                page,
            ))
        })
        .await?;
    Ok(Json(reports))
}

pub async fn create_report(
    State(state): State<AppState>,
    JsonBody(new_report): JsonBody<NewReport>,
) -> ApiResult<(StatusCode, Json<Report>)> {
    validated(new_report.validate())?;
    let report = state.store.reports.insert(new_report.into_report());
    tracing::info!(report_id = %report.id, "report created");

    state
        .cache
        .cascade(
            Entity::Report,
            Mutation::Create,
            &CascadeContext::for_id(report.id),
        )
        .await;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Report>> {
    let id = parse_id(&id)?;
    let report = state
        .cache
        .get_or_compute(&format!("report:{id}"), state.cache.default_ttl(), || async {
            state
                .store
                .reports
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("report {id}")))
        })
        .await?;
    Ok(Json(report))
}

pub async fn update_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ReportPatch>,
) -> ApiResult<Json<Report>> {
    let id = parse_id(&id)?;
    validated(patch.validate())?;
    let report = state
        .store
        .reports
        .update(&id, |report| patch.apply(report))
        .ok_or_else(|| ApiError::not_found(format!("report {id}")))?;

    state
        .cache
        .cascade(Entity::Report, Mutation::Update, &CascadeContext::for_id(id))
        .await;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    let id = parse_id(&id)?;
    state
        .store
        .reports
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("report {id}")))?;

    state
        .cache
        .cascade(Entity::Report, Mutation::Delete, &CascadeContext::for_id(id))
        .await;
    Ok(Json(Deleted::new(id)))
}
