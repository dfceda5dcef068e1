use sqlx::SqlitePool;
use time::OffsetDateTime;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{users::{self, User}, AppResult};

pub const USER_ID: &str = "user_id";
pub const CSRF_STATE: &str = "csrf_state";
pub const PKCE_VERIFIER: &str = "pkce_verifier";
pub const RETURN_URL: &str = "return_url";

#[derive(Debug, thiserror::Error)]
#[error("sign in required")]
pub struct SignInRequired;

/// The signed-in user, if any. Marks them as seen.
pub async fn current_user(session: &Session, db_pool: &SqlitePool) -> AppResult<Option<User>> {
    let Some(user_id) = session.get::<Uuid>(USER_ID).await? else {
        return Ok(None);
    };

    let Some(mut user) = users::find_by_id(db_pool, user_id).await? else {
        tracing::warn!(%user_id, "session refers to a missing user");
        session.flush().await?;
        return Ok(None);
    };
    users::ping(db_pool, &mut user, OffsetDateTime::now_utc()).await?;

    Ok(Some(user))
}

pub async fn require_user(session: &Session, db_pool: &SqlitePool) -> AppResult<User> {
    current_user(session, db_pool)
        .await?
        .ok_or_else(|| SignInRequired.into())
}
