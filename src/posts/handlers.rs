use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    config::Config,
    pagination::{Page, PageQuery},
    session,
    users,
    AppResult, AppState,
};

use super::{PostSummary, render_markdown};

#[derive(Debug, Deserialize)]
pub(crate) struct PostForm {
    body: String,
}

fn summary(post: super::Post, author: &users::User) -> PostSummary {
    PostSummary {
        id: post.id,
        author: author.summary(),
        body_html: render_markdown(&post.body),
        body: post.body,
        created_at: post.created_at,
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn index(
    Query(query): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
) -> AppResult<Json<Page<PostSummary>>> {
    let request = query.with_size(config.posts_per_page);
    Ok(Json(super::list_posts_global(&db_pool, request).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn followed(
    Query(query): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Json<Page<PostSummary>>> {
    let reader = session::require_user(&session, &db_pool).await?;
    let request = query.with_size(config.posts_per_page);
    Ok(Json(super::list_posts_followed(&db_pool, &reader, request).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn by_user(
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
) -> AppResult<Json<Page<PostSummary>>> {
    let author = users::user_or_404(&db_pool, &username).await?;
    let request = query.with_size(config.posts_per_page);
    Ok(Json(super::list_posts_by_user(&db_pool, &author, request).await?))
}

#[debug_handler]
pub(crate) async fn new_post(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(PostForm { body }): Json<PostForm>,
) -> AppResult<(StatusCode, Json<PostSummary>)> {
    let author = session::require_user(&session, &db_pool).await?;
    let post = super::create_post(&db_pool, &author, &body, OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(summary(post, &author))))
}

#[debug_handler]
pub(crate) async fn edit(
    Path(post_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(PostForm { body }): Json<PostForm>,
) -> AppResult<Json<PostSummary>> {
    let editor = session::require_user(&session, &db_pool).await?;
    let post = super::edit_post(&db_pool, &editor, post_id, &body).await?;
    Ok(Json(summary(post, &editor)))
}
