use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use lostfound_cache::{CascadeContext, Entity, Mutation};
use serde::Deserialize;
use uuid::Uuid;

use super::{Deleted, JsonBody, PageParams, QueryParams, parse_id, validated, view_key};
use crate::error::{ApiError, ApiResult};
use crate::models::{Claim, Item, NewUser, User, UserPatch, UserRole};
use crate::server::AppState;
use crate::storage::Paginated;

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

fn email_taken(state: &AppState, email: &str, except: Option<Uuid>) -> bool {
    state
        .store
        .users
        .any(|user| Some(user.id) != except && user.email.eq_ignore_ascii_case(email))
}

pub async fn list_users(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageParams>,
    QueryParams(filter): QueryParams<UserFilter>,
) -> ApiResult<Json<Paginated<User>>> {
    let page = paging.resolve()?;
    let key = view_key(
        "users:list",
        &[("role", filter.role.map(|r| r.as_str()))],
        page,
    );
    let users = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            Ok::<_, ApiError>(
                state
                    .store
                    .users
                    .list(|user| filter.role.is_none_or(|r| user.role == r), page),
            )
        })
        .await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(new_user): JsonBody<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    validated(new_user.validate())?;
    if email_taken(&state, &new_user.email, None) {
        return Err(ApiError::conflict(format!(
            "a user with email {} already exists",
            new_user.email
        )));
    }
    let user = state.store.users.insert(new_user.into_user());
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");

    state
        .cache
        .cascade(Entity::User, Mutation::Create, &CascadeContext::for_id(user.id))
        .await;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id)?;
    let user = state
        .cache
        .get_or_compute(&format!("user:{id}"), state.cache.default_ttl(), || async {
            state
                .store
                .users
                .get(&id)
                .ok_or_else(|| ApiError::not_found(format!("user {id}")))
        })
        .await?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<UserPatch>,
) -> ApiResult<Json<User>> {
    let id = parse_id(&id)?;
    validated(patch.validate())?;
    if let Some(email) = patch.email.as_deref()
        && email_taken(&state, email, Some(id))
    {
        return Err(ApiError::conflict(format!(
            "a user with email {email} already exists"
        )));
    }
    let user = state
        .store
        .users
        .update(&id, |user| patch.apply(user))
        .ok_or_else(|| ApiError::not_found(format!("user {id}")))?;

    state
        .cache
        .cascade(Entity::User, Mutation::Update, &CascadeContext::for_id(id))
        .await;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Deleted>> {
    let id = parse_id(&id)?;
    state
        .store
        .users
        .remove(&id)
        .ok_or_else(|| ApiError::not_found(format!("user {id}")))?;
    tracing::info!(user_id = %id, "user deleted");

    state
        .cache
        .cascade(Entity::User, Mutation::Delete, &CascadeContext::for_id(id))
        .await;
    Ok(Json(Deleted::new(id)))
}

pub async fn list_user_claims(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryParams(paging): QueryParams<PageParams>,
) -> ApiResult<Json<Paginated<Claim>>> {
    let id = parse_id(&id)?;
    let page = paging.resolve()?;
    let key = view_key(&format!("user:{id}:claims"), &[], page);
    let claims = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            if !state.store.users.contains(&id) {
                return Err(ApiError::not_found(format!("user {id}")));
            }
            Ok(state.store.claims.list(|claim| claim.claimant_id == id, page))
        })
        .await?;
    Ok(Json(claims))
}

pub async fn list_user_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryParams(paging): QueryParams<PageParams>,
) -> ApiResult<Json<Paginated<Item>>> {
    let id = parse_id(&id)?;
    let page = paging.resolve()?;
    let key = view_key(&format!("user:{id}:items"), &[], page);
    let items = state
        .cache
        .get_or_compute(&key, state.cache.default_ttl(), || async {
            if !state.store.users.contains(&id) {
                return Err(ApiError::not_found(format!("user {id}")));
            }
            Ok(state
                .store
                .items
                .list(|item| item.reported_by == Some(id), page))
        })
        .await?;
    Ok(Json(items))
}
