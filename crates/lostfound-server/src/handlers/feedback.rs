use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lostfound_cache::{CascadeContext, Entity, Mutation};

use super::{Deleted, JsonBody, PageParams, QueryParams, parse_id, validated, view_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{Feedback, NewFeedback};
use crate::server::AppState;
use crate::storage::Paginated;

pub async fn list_feedback(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageParams>,
) -> ApiResult<Json<Paginated<Feedback>>> {
    let page = paging.resolve()?;
    let key = view_key("feedback:list", &[], page);
    let feedback = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            Ok::<_, ApiError>(state.store.feedback.list(|_| true, page))
        })
        .await?;
    Ok(Json(feedback))
}

pub async fn create_feedback(
    State(state): State<AppState>,
    JsonBody(new_feedback): JsonBody<NewFeedback>,
) -> ApiResult<(StatusCode, Json<Feedback>)> {
    validated(new_feedback.validate())?;
    let feedback = state.store.feedback.insert(new_feedback.into_feedback());

    state
        .cache
        .cascade(
            Entity::Feedback,
            Mutation::Create,
            &CascadeContext::for_id(feedback.id),
        )
        .await;
    Ok((StatusCode::CREATED, Json(feedback)))
}

pub async fn get_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Feedback>> {
    let id = parse_id(&id)?;
    let feedback = state
        .cache
        .get_or_compute(&format!("feedback:{id}"), state.cache.default_ttl(), || async {
            state
                .store
                .feedback
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("feedback {id}")))
        })
        .await?;
    Ok(Json(feedback))
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    let id = parse_id(&id)?;
    state
        .store
        .feedback
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("feedback {id}")))?;

    state
        .cache
        .cascade(Entity::Feedback, Mutation::Delete, &CascadeContext::for_id(id))
        .await;
    Ok(Json(Deleted::new(id)))
}
