use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lostfound_cache::{CascadeContext, Entity, Mutation};
use serde::Deserialize;

use super::{Deleted, JsonBody, PageParams, QueryParams, parse_id, validated, view_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{Claim, Item, ItemPatch, ItemStatus, NewItem};
use crate::server::AppState;
use crate::storage::Paginated;

#[derive(Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub category: Option<String>,
}

impl ItemFilter {
    fn matches(&self, item: &Item) -> bool {
        self.status.is_none_or(|s| item.status == s)
            && self
                .category
                .as_deref()
                .is_none_or(|c| item.category.eq_ignore_ascii_case(c))
    }
}

pub(crate) fn item_context(item: &Item) -> CascadeContext {
    let ctx = CascadeContext::for_id(item.id);
    match item.reported_by {
        Some(user) => ctx.with_user(user),
        None => ctx,
    }
}

pub(crate) fn claim_context(claim: &Claim) -> CascadeContext {
    CascadeContext::for_id(claim.id)
        .with_item(claim.item_id)
        .with_user(claim.claimant_id)
}

pub async fn list_items(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageParams>,
    QueryParams(filter): QueryParams<ItemFilter>,
) -> ApiResult<Json<Paginated<Item>>> {
    let page = paging.resolve()?;
    let key = view_key(
        "items:list",
        &[
            ("status", filter.status.map(|s| s.as_str())),
            ("category", filter.category.as_deref()),
        ],
        page,
    );
    let items = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            Ok::<_, ApiError>(state.store.items.list(|item| filter.matches(item), page))
        })
        .await?;
    Ok(Json(items))
}

pub async fn create_item(
    State(state): State<AppState>,
    JsonBody(new_item): JsonBody<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    validated(new_item.validate())?;
    let item = state.store.items.insert(new_item.into_item());
    tracing::info!(item_id = %item.id, status = item.status.as_str(), "item created");

    state
        .cache
        .cascade(Entity::Item, Mutation::Create, &item_context(&item))
        .await;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Item>> {
    let id = parse_id(&id)?;
    let item = state
        .cache
        .get_or_compute(&format!("item:{id}"), state.cache.default_ttl(), || async {
            state
                .store
                .items
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("item {id}")))
        })
        .await?;
    Ok(Json(item))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<ItemPatch>,
) -> ApiResult<Json<Item>> {
    let id = parse_id(&id)?;
    validated(patch.validate())?;
    let mutation = if patch.is_status_only() {
        Mutation::StatusChange
    } else {
        Mutation::Update
    };

    let item = state
        .store
        .items
        .update(&id, |item| patch.apply(item))
        .ok_or_else(|| ApiError::not_found(format!("item {id}")))?;
    tracing::info!(item_id = %id, ?mutation, "item updated");

    state
        .cache
        .cascade(Entity::Item, mutation, &item_context(&item))
        .await;
    Ok(Json(item))
}

/// Delete an item together with the claims made on it.
pub async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    let id = parse_id(&id)?;
    let item = state
        .store
        .items
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("item {id}")))?;
    let claims = state.store.claims.remove_where(|claim| claim.item_id == id);
    tracing::info!(item_id = %id, removed_claims = claims.len(), "item deleted");

    state
        .cache
        .cascade(Entity::Item, Mutation::Delete, &item_context(&item))
        .await;
    for claim in &claims {
        state
            .cache
            .cascade(Entity::Claim, Mutation::Delete, &claim_context(claim))
            .await;
    }
    Ok(Json(Deleted::new(id)))
}

pub async fn list_item_claims(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryParams(paging): QueryParams<PageParams>,
) -> ApiResult<Json<Paginated<Claim>>> {
    let id = parse_id(&id)?;
    let page = paging.resolve()?;
    let key = view_key(&format!("item:{id}:claims"), &[], page);
    let claims = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            if !state.store.items.contains(&id) {
                return Err(ApiError::not_found(format!("item {id}")));
            }
            Ok(state.store.claims.list(|claim| claim.item_id == id, page))
        })
        .await?;
    Ok(Json(claims))
}
