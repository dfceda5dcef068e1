use std::sync::LazyLock;

use axum::{debug_handler, extract::{Path, State}, Json};
use regex::Regex;
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;
use validator::Validate;

use crate::{error::CoreError, permissions::Role, session, AppResult};

use super::{AdminChanges, ProfileChanges, User, UserProfile};

pub(crate) static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").expect("username pattern compiles"));

/// Resolve a path username or answer 404.
pub(crate) async fn user_or_404(db_pool: &SqlitePool, username: &str) -> AppResult<User> {
    super::find_by_username(db_pool, username)
        .await?
        .ok_or_else(|| CoreError::NotFound("user").into())
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EditProfileForm {
    #[serde(default)]
    #[validate(length(max = 64))]
    name: String,
    #[serde(default)]
    #[validate(length(max = 64))]
    location: String,
    #[serde(default)]
    about_me: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AdminEditForm {
    #[validate(email, length(min = 1, max = 64))]
    email: Option<String>,
    #[validate(length(min = 1, max = 64), regex(path = *USERNAME_PATTERN))]
    username: Option<String>,
    confirmed: Option<bool>,
    role: Option<Role>,
    #[validate(length(max = 64))]
    name: Option<String>,
    #[validate(length(max = 64))]
    location: Option<String>,
    about_me: Option<String>,
}

#[debug_handler]
pub(crate) async fn user_page(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<UserProfile>> {
    let user = user_or_404(&db_pool, &username).await?;
    Ok(Json(super::profile(&db_pool, &user).await?))
}

#[debug_handler]
pub(crate) async fn edit_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(form): Json<EditProfileForm>,
) -> AppResult<Json<UserProfile>> {
    let user = session::require_user(&session, &db_pool).await?;
    form.validate()?;

    let EditProfileForm { name, location, about_me } = form;
    let user = super::edit_profile(&db_pool, &user, ProfileChanges { name, location, about_me }).await?;
    Ok(Json(super::profile(&db_pool, &user).await?))
}

#[debug_handler]
pub(crate) async fn edit_profile_admin(
    Path(user_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Json(form): Json<AdminEditForm>,
) -> AppResult<Json<UserProfile>> {
    let admin = session::require_user(&session, &db_pool).await?;
    form.validate()?;

    let AdminEditForm { email, username, confirmed, role, name, location, about_me } = form;
    let changes = AdminChanges { email, username, confirmed, role, name, location, about_me };
    let user = super::edit_profile_admin(&db_pool, &admin, user_id, changes).await?;
    Ok(Json(super::profile(&db_pool, &user).await?))
}
