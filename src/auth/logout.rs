use axum::{debug_handler, extract::Query, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{session::USER_ID, AppResult};

#[derive(Deserialize)]
pub struct LogoutQuery {
    pub return_url: Option<String>,
}

#[debug_handler]
pub async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session,
) -> AppResult<Redirect> {
    if let Some(user_id) = session.get::<uuid::Uuid>(USER_ID).await? {
        tracing::info!(%user_id, "signed out");
    }
    session.flush().await?;
    Ok(Redirect::to(&super::local_path(return_url)))
}
