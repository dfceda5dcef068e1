//! Project requirement intake form.

use axum::{debug_handler, extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{db::to_micros, error::CoreResult, users::USERNAME_PATTERN, AppResult, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    DesktopApplication,
    Website,
    WebApplication,
    AndroidApplication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectDatabase {
    Oracle,
    #[serde(alias = "postgre")]
    Postgres,
    Mysql,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectLanguage {
    Java,
    #[serde(alias = "py")]
    Python,
    Php,
}

/// Serialized name, as stored.
fn label(value: impl Serialize) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(name)) => name,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequirementForm {
    #[validate(email, length(min = 1, max = 64))]
    pub email: String,
    #[validate(length(min = 1, max = 64), regex(path = *USERNAME_PATTERN))]
    pub name: String,
    #[validate(length(min = 1, max = 32))]
    pub contact_no: String,
    pub project_type: ProjectType,
    pub project_database: ProjectDatabase,
    pub project_language: Option<ProjectLanguage>,
    #[validate(length(min = 1))]
    pub description: String,
}

pub async fn submit_requirement(
    db_pool: &SqlitePool,
    form: RequirementForm,
    now: OffsetDateTime,
) -> CoreResult<Uuid> {
    form.validate()?;

    let id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO requirements \
         (id,email,full_name,contact_no,project_type,project_database,project_language,description,received_at) \
         VALUES (?,?,?,?,?,?,?,?,?)",
    )
    .bind(id.to_string())
    .bind(&form.email)
    .bind(&form.name)
    .bind(&form.contact_no)
    .bind(label(form.project_type))
    .bind(label(form.project_database))
    .bind(form.project_language.map(label))
    .bind(&form.description)
    .bind(to_micros(now))
    .execute(db_pool)
    .await?;

    tracing::info!(%id, from = %form.email, kind = ?form.project_type, "requirement received");
    Ok(id)
}

#[debug_handler]
async fn requirement(
    State(db_pool): State<SqlitePool>,
    Json(form): Json<RequirementForm>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let id = submit_requirement(&db_pool, form, OffsetDateTime::now_utc()).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": "We got your requirements. Will get back to you soon." })),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/requirements", post(requirement))
}
