//! Contact form. Messages are stored and handed to the mail relay's log;
//! delivery itself happens outside this service.

use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{config::Config, db::to_micros, error::CoreResult, AppResult, AppState};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub subject: String,
    #[validate(length(min = 1))]
    pub message: String,
}

pub async fn submit_contact(
    db_pool: &SqlitePool,
    config: &Config,
    form: ContactForm,
    now: OffsetDateTime,
) -> CoreResult<Uuid> {
    form.validate()?;

    let id = Uuid::now_v7();
    sqlx::query("INSERT INTO contact_messages (id,name,email,subject,message,received_at) VALUES (?,?,?,?,?,?)")
        .bind(id.to_string())
        .bind(&form.name)
        .bind(&form.email)
        .bind(&form.subject)
        .bind(&form.message)
        .bind(to_micros(now))
        .execute(db_pool)
        .await?;

    let subject = format!("{} {}", config.mail.subject_prefix, form.subject);
    match &config.admin_email {
        Some(admin) => tracing::info!(
            %id,
            to = %admin,
            from = %config.mail.sender,
            reply_to = %form.email,
            relay = %config.mail.server,
            %subject,
            "contact message queued"
        ),
        None => tracing::warn!(%id, %subject, "contact message stored; no admin address configured"),
    }
    Ok(id)
}

#[debug_handler(state = AppState)]
async fn contact(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    Json(form): Json<ContactForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = submit_contact(&db_pool, &config, form, OffsetDateTime::now_utc()).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/contact", post(contact))
}
