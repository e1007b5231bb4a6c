use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lostfound_cache::{Entity, Mutation};
use serde::Deserialize;
use uuid::Uuid;

use super::items::claim_context;
use super::{Deleted, JsonBody, PageParams, QueryParams, parse_id, validated, view_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{Claim, ClaimStatus, ClaimStatusUpdate, NewClaim};
use crate::server::AppState;
use crate::storage::Paginated;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimFilter {
    pub status: Option<ClaimStatus>,
    pub item_id: Option<Uuid>,
}

impl ClaimFilter {
    fn matches(&self, claim: &Claim) -> bool {
        self.status.is_none_or(|s| claim.status == s)
            && self.item_id.is_none_or(|item| claim.item_id == item)
    }
}

pub async fn list_claims(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageParams>,
    QueryParams(filter): QueryParams<ClaimFilter>,
) -> ApiResult<Json<Paginated<Claim>>> {
    let page = paging.resolve()?;
    let item = filter.item_id.map(|id| id.to_string());
    let key = view_key(
        "claims:list",
        &[
            ("status", filter.status.map(|s| s.as_str())),
            ("item", item.as_deref()),
        ],
        page,
    );
    let claims = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            Ok::<_, ApiError>(state.store.claims.list(|claim| filter.matches(claim), page))
        })
        .await?;
    Ok(Json(claims))
}

pub async fn create_claim(
    State(state): State<AppState>,
    JsonBody(new_claim): JsonBody<NewClaim>,
) -> ApiResult<(StatusCode, Json<Claim>)> {
    validated(new_claim.validate())?;
    if !state.store.items.contains(&new_claim.item_id) {
        return Err(ApiError::bad_request(format!(
            "item {} does not exist",
            new_claim.item_id
        )));
    }
    let claim = state.store.claims.insert(new_claim.into_claim());
    tracing::info!(claim_id = %claim.id, item_id = %claim.item_id, "claim created");

    state
        .cache
        .cascade(Entity::Claim, Mutation::Create, &claim_context(&claim))
        .await;
    Ok((StatusCode::CREATED, Json(claim)))
}

pub async fn get_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Claim>> {
    let id = parse_id(&id)?;
    let claim = state
        .cache
        .get_or_compute(&format!("claim:{id}"), state.cache.default_ttl(), || async {
            state
                .store
                .claims
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("claim {id}")))
        })
        .await?;
    Ok(Json(claim))
}

/// Move a claim to a new status. No approval rules are applied here.
pub async fn update_claim_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(update): JsonBody<ClaimStatusUpdate>,
) -> ApiResult<Json<Claim>> {
    let id = parse_id(&id)?;
    let claim = state
        .store
        .claims
        .update(&id, |claim| {
            claim.status = update.status;
            claim.updated_at = time::OffsetDateTime::now_utc();
        })
        .ok_or_else(|| ApiError::not_found(format!("claim {id}")))?;
    tracing::info!(claim_id = %id, status = claim.status.as_str(), "claim status changed");

    state
        .cache
        .cascade(Entity::Claim, Mutation::StatusChange, &claim_context(&claim))
        .await;
    Ok(Json(claim))
}

pub async fn delete_claim(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    let id = parse_id(&id)?;
    let claim = state
        .store
        .claims
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("claim {id}")))?;

    state
        .cache
        .cascade(Entity::Claim, Mutation::Delete, &claim_context(&claim))
        .await;
    Ok(Json(Deleted::new(id)))
}
