pub mod auth;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod follows;
pub mod intake;
pub mod pagination;
pub mod permissions;
pub mod posts;
pub mod session;
pub mod users;

mod appresult;

use std::sync::Arc;

use anyhow::anyhow;
use axum::{extract::FromRef, Router};
use serde_json::Value;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub use appresult::{AppError, AppResult};
pub use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub clients: auth::Clients,
    pub config: Arc<Config>,
}

/// Every route, without the session layer.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(follows::router())
        .merge(posts::router())
        .merge(intake::router())
        .merge(contact::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
    fn get_opt_str_field(&self, field: &str) -> Option<String>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get_obj_field(field)?
            .as_str()
            .ok_or_else(|| anyhow!("expected {field} in {self} to be string"))?
            .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
        .ok_or_else(|| anyhow!("expected {field} in {self}").into())
    }

    fn get_opt_str_field(&self, field: &str) -> Option<String> {
        self.get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
    }
}
