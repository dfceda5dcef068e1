use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;

use crate::{
    config::Config,
    error::CoreError,
    pagination::{Page, PageQuery},
    session,
    users::{self, User},
    AppResult, AppState,
};

use super::FollowEdge;

#[derive(Debug, Serialize)]
pub(crate) struct FollowState {
    username: String,
    following: bool,
}

async fn follow_target(db_pool: &SqlitePool, username: &str) -> AppResult<User> {
    users::find_by_username(db_pool, username)
        .await?
        .ok_or_else(|| CoreError::InvalidTarget("no such user").into())
}

#[debug_handler]
pub(crate) async fn follow(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<FollowState>> {
    let actor = session::require_user(&session, &db_pool).await?;
    let target = follow_target(&db_pool, &username).await?;

    super::follow(&db_pool, &actor, target.id, OffsetDateTime::now_utc()).await?;
    Ok(Json(FollowState { username, following: true }))
}

#[debug_handler]
pub(crate) async fn unfollow(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<FollowState>> {
    let actor = session::require_user(&session, &db_pool).await?;
    let target = follow_target(&db_pool, &username).await?;

    super::unfollow(&db_pool, &actor, target.id).await?;
    Ok(Json(FollowState { username, following: false }))
}

/// Whether the signed-in reader follows `username`; always false when signed out.
#[debug_handler]
pub(crate) async fn following(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Json<FollowState>> {
    let following = match (
        session::current_user(&session, &db_pool).await?,
        users::find_by_username(&db_pool, &username).await?,
    ) {
        (Some(reader), Some(target)) => super::is_following(&db_pool, reader.id, target.id).await?,
        _ => false,
    };
    Ok(Json(FollowState { username, following }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn followers(
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
) -> AppResult<Json<Page<FollowEdge>>> {
    let user = users::user_or_404(&db_pool, &username).await?;
    let request = query.with_size(config.followers_per_page);
    Ok(Json(super::list_followers(&db_pool, &user, request).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn followed(
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
) -> AppResult<Json<Page<FollowEdge>>> {
    let user = users::user_or_404(&db_pool, &username).await?;
    let request = query.with_size(config.followers_per_page);
    Ok(Json(super::list_followed(&db_pool, &user, request).await?))
}
