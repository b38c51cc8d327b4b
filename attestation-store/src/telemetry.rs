//! Telemetry Logger - persists enforcement/warning events for offline
//! inspection and emits a structured log line alongside each one.
//!
//! Grounded on `cortex_server::db::queries`'s per-query shape (one `async
//! fn`, positional binds, a `tracing` line bracketing the call) and on
//! `cortex_server::error::AppError::into_response`'s pattern of pairing a
//! persisted/returned value with a kind-specific structured log.

use chrono::Utc;
use sqlx::SqlitePool;

use attestation_core::{EventKind, EvictionDetails};

pub struct TelemetryLogger {
    pool: SqlitePool,
}

impl TelemetryLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records an enforcement event (Axis 1/2/3). `actor`/`context`/`entity`
    /// that don't apply to this kind should be passed as `None`; empty
    /// strings are also normalized to `NULL`.
    ///
    /// Fire-and-forget from the caller's perspective: a failure here is
    /// logged as a warning, never returned, matching the enforcer's
    /// own best-effort contract.
    pub async fn log_event(
        &self,
        kind: EventKind,
        actor: Option<&str>,
        context: Option<&str>,
        entity: Option<&str>,
        deletions: i64,
        limit: i64,
        details: Option<&EvictionDetails>,
    ) {
        let actor = normalize(actor);
        let context = normalize(context);
        let entity = normalize(entity);
        let now = Utc::now();
        let details_json = match details {
            Some(details) => match serde_json::to_string(details) {
                Ok(json) => Some(json),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize eviction details");
                    None
                }
            },
            None => None,
        };

        let result = sqlx::query(
            "INSERT INTO storage_events
                (event_type, actor, context, entity, deletions_count, limit_value, timestamp, eviction_details)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(&actor)
        .bind(&context)
        .bind(&entity)
        .bind(deletions)
        .bind(limit)
        .bind(crate::db::timestamp_column(now))
        .bind(&details_json)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, event_type = kind.as_str(), "failed to persist storage event");
        }

        tracing::debug!(
            event_type = kind.as_str(),
            actor = actor.as_deref().unwrap_or(""),
            context = context.as_deref().unwrap_or(""),
            entity = entity.as_deref().unwrap_or(""),
            deletions,
            limit,
            "storage event {}",
            kind.log_suffix(),
        );
    }

    /// Records that a cardinality is approaching, but has not yet crossed, a
    /// limit. Overloads the `deletions_count` column to carry `current`.
    pub async fn log_warning(&self, actor: Option<&str>, context: Option<&str>, current: i64, limit: i64) {
        self.log_event(
            EventKind::StorageWarning,
            actor,
            context,
            None,
            current,
            limit,
            None,
        )
        .await;
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !v.is_empty() => Some(v.to_string()),
        _ => None,
    }
}
