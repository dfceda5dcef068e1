use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // every connection to `:memory:` is its own database
    let in_memory = database_url.contains(":memory:");
    let db_pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 16 })
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&db_pool).await?;
    tracing::info!(database_url, "database ready");

    Ok(db_pool)
}

/// Timestamps are stored as microseconds since the epoch.
pub(crate) fn to_micros(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000).unwrap_or(i64::MAX)
}

pub(crate) fn from_micros(micros: i64) -> CoreResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|err| CoreError::Corrupt(format!("timestamp {micros}: {err}")))
}

pub(crate) fn parse_uuid(value: &str) -> CoreResult<Uuid> {
    Uuid::parse_str(value).map_err(|err| CoreError::Corrupt(format!("id `{value}`: {err}")))
}

/// Count rows of a `SELECT COUNT(*)` query.
pub(crate) fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
