//! Pool construction and migration - the SQLite analogue of
//! `cortex_server::db::Database::new`, adapted to `sqlx` (see Cargo.toml and
//! DESIGN.md for why this core uses SQLite).

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Renders a timestamp as fixed-width-nanosecond RFC 3339, so that the
/// lexicographic ordering SQLite applies to the `TEXT` column matches
/// chronological order (`to_rfc3339`'s default trims trailing zero digits,
/// which breaks `ORDER BY timestamp` once rows mix subsecond precisions).
pub fn timestamp_column(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Open (creating if necessary) the attestation store's SQLite database and
/// run pending migrations. `database_url` accepts anything
/// `SqliteConnectOptions::from_str` does, plus the bare string `:memory:`
/// for ephemeral/test stores.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = if database_url == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::from_str(database_url)?.create_if_missing(true)
    };

    tracing::info!(database_url, "opening attestation store database");

    let pool = SqlitePoolOptions::new()
        .max_connections(if database_url == ":memory:" { 1 } else { 8 })
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
