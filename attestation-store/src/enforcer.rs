//! Bounded-Store Enforcer - the three eviction axes run after every
//! successful insert. By line count this is most of the core; by design it
//! is three independent "count, pick a tail, sample, delete, report" passes
//! that happen to share a connection pool.
//!
//! Grounded on `cortex_server::db::queries`'s query-function shape, adapted
//! to the `json_each` table-valued function for set-membership tests against
//! the four multivalued columns.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use attestation_core::{Attestation, EventKind, EvictionDetails};

use crate::config::EnforcerLimits;
use crate::telemetry::TelemetryLogger;

pub struct BoundedStoreEnforcer {
    pool: SqlitePool,
    limits: EnforcerLimits,
    telemetry: TelemetryLogger,
}

struct CandidateRow {
    id: String,
    timestamp: DateTime<Utc>,
    subjects: Vec<String>,
    predicates: Vec<String>,
}

impl BoundedStoreEnforcer {
    pub fn new(pool: SqlitePool, limits: EnforcerLimits) -> Self {
        let telemetry = TelemetryLogger::new(pool.clone());
        Self {
            pool,
            limits,
            telemetry,
        }
    }

    /// Runs Axis 1, then Axis 2, then Axis 3 against the attestation that was
    /// just inserted. Each axis is best-effort: a persistent-store error is
    /// logged and the axis returns early, but later axes still run.
    pub async fn enforce(&self, attestation: &Attestation) {
        if attestation.actors.is_empty() || attestation.contexts.is_empty() {
            tracing::warn!(attestation_id = %attestation.id, "enforcer invoked with nil actor/context input, skipping");
            return;
        }

        self.enforce_actor_context(attestation).await;
        self.enforce_actor_contexts(attestation).await;
        self.enforce_entity_actors(attestation).await;
    }

    /// Axis 1 - for every ⟨actor, context⟩ pair this attestation carries,
    /// cap the number of attestations mentioning both at `actor_context_limit`.
    async fn enforce_actor_context(&self, attestation: &Attestation) {
        for actor in &attestation.actors {
            for context in &attestation.contexts {
                if let Err(e) = self.enforce_actor_context_pair(actor, context).await {
                    tracing::warn!(
                        actor, context, error = %e,
                        "axis 1 (actor-context limit) failed, skipping this pair"
                    );
                }
            }
        }
    }

    async fn enforce_actor_context_pair(
        &self,
        actor: &str,
        context: &str,
    ) -> Result<(), sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, timestamp, predicates, subjects FROM attestations
             WHERE EXISTS (SELECT 1 FROM json_each(actors) WHERE value = ?)
               AND EXISTS (SELECT 1 FROM json_each(contexts) WHERE LOWER(value) = LOWER(?))
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(actor)
        .bind(context)
        .fetch_all(&self.pool)
        .await?;

        let limit = self.limits.actor_context_limit;
        let excess = rows.len() as i64 - limit;
        if excess <= 0 {
            return Ok(());
        }
        let excess = excess as usize;

        let candidates = decode_rows(rows);
        let to_delete = &candidates[..excess];
        let details = sample(to_delete);

        let ids: Vec<&str> = to_delete.iter().map(|row| row.id.as_str()).collect();
        delete_by_ids(&self.pool, &ids).await?;

        self.telemetry
            .log_event(
                EventKind::ActorContextLimit,
                Some(actor),
                Some(context),
                None,
                ids.len() as i64,
                limit,
                Some(&details),
            )
            .await;

        Ok(())
    }

    /// Axis 2 - for every actor this attestation carries, cap the number of
    /// distinct whole-`contexts`-array values that actor participates in at
    /// `actor_contexts_limit`.
    async fn enforce_actor_contexts(&self, attestation: &Attestation) {
        for actor in &attestation.actors {
            if let Err(e) = self.enforce_actor_contexts_one(actor).await {
                tracing::warn!(
                    actor, error = %e,
                    "axis 2 (actor distinct-context-sets limit) failed, skipping this actor"
                );
            }
        }
    }

    async fn enforce_actor_contexts_one(&self, actor: &str) -> Result<(), sqlx::Error> {
        let groups: Vec<(String, i64)> = sqlx::query_as(
            "SELECT contexts, COUNT(*) as cnt FROM attestations
             WHERE EXISTS (SELECT 1 FROM json_each(actors) WHERE value = ?)
             GROUP BY contexts
             ORDER BY cnt ASC, contexts ASC",
        )
        .bind(actor)
        .fetch_all(&self.pool)
        .await?;

        let limit = self.limits.actor_contexts_limit;
        let evict_count = groups.len() as i64 - limit;
        if evict_count <= 0 {
            return Ok(());
        }
        let evict_count = evict_count as usize;

        let mut total_deleted = 0i64;
        let mut evicted_context_sets = Vec::new();
        let mut sample_predicates = Vec::new();
        let mut sample_subjects = Vec::new();
        let mut last_seen: Option<DateTime<Utc>> = None;

        for (contexts_json, _count) in &groups[..evict_count] {
            let rows: Vec<(String, String, String, String)> = sqlx::query_as(
                "SELECT id, timestamp, predicates, subjects FROM attestations
                 WHERE EXISTS (SELECT 1 FROM json_each(actors) WHERE value = ?)
                   AND contexts = ?
                 ORDER BY timestamp ASC, id ASC",
            )
            .bind(actor)
            .bind(contexts_json)
            .fetch_all(&self.pool)
            .await?;

            let candidates = decode_rows(rows);
            for row in candidates.iter().take(3usize.saturating_sub(sample_predicates.len())) {
                sample_predicates.push(row.predicates.clone());
                sample_subjects.push(row.subjects.clone());
                last_seen = Some(last_seen.map_or(row.timestamp, |t| t.max(row.timestamp)));
            }

            let ids: Vec<&str> = candidates.iter().map(|row| row.id.as_str()).collect();
            delete_by_ids(&self.pool, &ids).await?;
            total_deleted += ids.len() as i64;

            let parsed: Vec<String> = serde_json::from_str(contexts_json).unwrap_or_default();
            evicted_context_sets.push(parsed);
        }

        if total_deleted > 0 {
            let details = EvictionDetails {
                sample_predicates,
                sample_subjects,
                evicted_actors: Vec::new(),
                evicted_context_sets,
                last_seen,
            };
            self.telemetry
                .log_event(
                    EventKind::ActorContextsLimit,
                    Some(actor),
                    None,
                    None,
                    total_deleted,
                    limit,
                    Some(&details),
                )
                .await;
        }

        Ok(())
    }

    /// Axis 3 - for every subject this attestation carries, cap the number
    /// of distinct actors that have attested about it at `entity_actors_limit`.
    async fn enforce_entity_actors(&self, attestation: &Attestation) {
        for subject in &attestation.subjects {
            if let Err(e) = self.enforce_entity_actors_one(subject).await {
                tracing::warn!(
                    subject, error = %e,
                    "axis 3 (entity distinct-actors limit) failed, skipping this subject"
                );
            }
        }
    }

    async fn enforce_entity_actors_one(&self, subject: &str) -> Result<(), sqlx::Error> {
        let actors: Vec<(String, String)> = sqlx::query_as(
            "SELECT je.value, MAX(attestations.timestamp) as last_seen
             FROM attestations, json_each(attestations.actors) je
             WHERE EXISTS (SELECT 1 FROM json_each(attestations.subjects) WHERE value = ?)
             GROUP BY je.value
             ORDER BY last_seen ASC, je.value ASC",
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await?;

        let limit = self.limits.entity_actors_limit;
        let evict_count = actors.len() as i64 - limit;
        if evict_count <= 0 {
            return Ok(());
        }
        let evict_count = evict_count as usize;

        let mut total_deleted = 0i64;
        let mut evicted_actors = Vec::new();
        let mut sample_predicates = Vec::new();
        let mut sample_subjects = Vec::new();
        let mut last_seen: Option<DateTime<Utc>> = None;

        for (evicted_actor, _last_seen) in &actors[..evict_count] {
            let rows: Vec<(String, String, String, String)> = sqlx::query_as(
                "SELECT id, timestamp, predicates, subjects FROM attestations
                 WHERE EXISTS (SELECT 1 FROM json_each(actors) WHERE value = ?)
                   AND EXISTS (SELECT 1 FROM json_each(subjects) WHERE value = ?)
                 ORDER BY timestamp ASC, id ASC",
            )
            .bind(evicted_actor)
            .bind(subject)
            .fetch_all(&self.pool)
            .await?;

            let candidates = decode_rows(rows);
            for row in candidates.iter().take(3usize.saturating_sub(sample_predicates.len())) {
                sample_predicates.push(row.predicates.clone());
                sample_subjects.push(row.subjects.clone());
                last_seen = Some(last_seen.map_or(row.timestamp, |t| t.max(row.timestamp)));
            }

            let ids: Vec<&str> = candidates.iter().map(|row| row.id.as_str()).collect();
            delete_by_ids(&self.pool, &ids).await?;
            total_deleted += ids.len() as i64;
            evicted_actors.push(evicted_actor.clone());
        }

        if total_deleted > 0 {
            let details = EvictionDetails {
                sample_predicates,
                sample_subjects,
                evicted_actors,
                evicted_context_sets: Vec::new(),
                last_seen,
            };
            self.telemetry
                .log_event(
                    EventKind::EntityActorsLimit,
                    None,
                    None,
                    Some(subject),
                    total_deleted,
                    limit,
                    Some(&details),
                )
                .await;
        }

        Ok(())
    }
}

fn decode_rows(rows: Vec<(String, String, String, String)>) -> Vec<CandidateRow> {
    rows.into_iter()
        .filter_map(|(id, timestamp, predicates, subjects)| {
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .ok()?
                .with_timezone(&Utc);
            let predicates = serde_json::from_str(&predicates).ok()?;
            let subjects = serde_json::from_str(&subjects).ok()?;
            Some(CandidateRow {
                id,
                timestamp,
                subjects,
                predicates,
            })
        })
        .collect()
}

fn sample(rows: &[CandidateRow]) -> EvictionDetails {
    let sampled = &rows[..rows.len().min(3)];
    EvictionDetails {
        sample_predicates: sampled.iter().map(|row| row.predicates.clone()).collect(),
        sample_subjects: sampled.iter().map(|row| row.subjects.clone()).collect(),
        evicted_actors: Vec::new(),
        evicted_context_sets: Vec::new(),
        last_seen: sampled.iter().map(|row| row.timestamp).max(),
    }
}

async fn delete_by_ids(pool: &SqlitePool, ids: &[&str]) -> Result<(), sqlx::Error> {
    if ids.is_empty() {
        return Ok(());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let query = format!("DELETE FROM attestations WHERE id IN ({placeholders})");
    let mut q = sqlx::query(&query);
    for id in ids {
        q = q.bind(*id);
    }
    q.execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::writer::AttestationStore;
    use crate::observer::ObserverRegistry;
    use crate::signer::SignerRegistry;
    use chrono::{Duration, Utc};
    use serde_json::Map;
    use std::sync::Arc;

    use attestation_core::Attestation;

    fn row(id: &str, actors: Vec<&str>, contexts: Vec<&str>, subjects: Vec<&str>, seconds_offset: i64) -> Attestation {
        Attestation {
            id: id.into(),
            subjects: subjects.into_iter().map(String::from).collect(),
            predicates: vec!["knows".into()],
            contexts: contexts.into_iter().map(String::from).collect(),
            actors: actors.into_iter().map(String::from).collect(),
            timestamp: Utc::now() + Duration::seconds(seconds_offset),
            source: "test".into(),
            attributes: Map::new(),
            created_at: Utc::now(),
            signature: None,
            signer_did: None,
        }
    }

    async fn store_with_limits(limits: EnforcerLimits) -> AttestationStore {
        let pool = db::connect(":memory:").await.unwrap();
        AttestationStore::new(
            pool.clone(),
            Arc::new(SignerRegistry::new()),
            Arc::new(ObserverRegistry::new()),
            Arc::new(BoundedStoreEnforcer::new(pool, limits)),
        )
    }

    #[tokio::test]
    async fn bound_triggers_at_17th_insert() {
        let limits = EnforcerLimits {
            actor_context_limit: 16,
            ..EnforcerLimits::default()
        };
        let store = store_with_limits(limits).await;

        for n in 0..17 {
            let attestation = row(&format!("AS-{n}"), vec!["A"], vec!["C"], vec!["S"], n);
            store.create_attestation(attestation).await.unwrap();
        }

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attestations")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 16);
        assert!(!store.attestation_exists("AS-0").await);

        let event: (String, i64, i64) = sqlx::query_as(
            "SELECT event_type, deletions_count, limit_value FROM storage_events
             WHERE event_type = 'actor_context_limit'",
        )
        .fetch_one(&store.pool())
        .await
        .unwrap();
        assert_eq!(event, ("actor_context_limit".to_string(), 1, 16));
    }

    #[tokio::test]
    async fn case_insensitive_context_counts_as_the_same_pair() {
        let limits = EnforcerLimits {
            actor_context_limit: 16,
            ..EnforcerLimits::default()
        };
        let store = store_with_limits(limits).await;

        for n in 0..16 {
            let attestation = row(&format!("AS-{n}"), vec!["A"], vec!["alpha"], vec!["S"], n);
            store.create_attestation(attestation).await.unwrap();
        }
        store
            .create_attestation(row("AS-16", vec!["A"], vec!["ALPHA"], vec!["S"], 16))
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attestations")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 16);
        assert!(!store.attestation_exists("AS-0").await);
    }

    #[tokio::test]
    async fn self_certifying_attestations_are_never_evicted_by_axis_three() {
        let limits = EnforcerLimits {
            entity_actors_limit: 64,
            ..EnforcerLimits::default()
        };
        let store = store_with_limits(limits).await;

        for n in 0..65 {
            let id = format!("AS-{n}");
            let attestation = row(&id, vec![&id], vec!["_"], vec!["E"], n);
            store.create_attestation(attestation).await.unwrap();
        }

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attestations")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 64);
        assert!(!store.attestation_exists("AS-0").await);
        assert!(store.attestation_exists("AS-64").await);
    }

    #[tokio::test]
    async fn context_set_cap_evicts_the_least_used_distinct_array() {
        let limits = EnforcerLimits {
            actor_contexts_limit: 64,
            ..EnforcerLimits::default()
        };
        let store = store_with_limits(limits).await;

        for n in 0..65 {
            let context = format!("ctx-{n}");
            let attestation = row(&format!("AS-{n}"), vec!["A"], vec![&context], vec!["S"], n);
            store.create_attestation(attestation).await.unwrap();
        }

        let groups: (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT contexts) FROM attestations")
            .fetch_one(&store.pool())
            .await
            .unwrap();
        assert_eq!(groups.0, 64);
        // The first-inserted, least-used context array ("ctx-0") is the one evicted.
        assert!(!store.attestation_exists("AS-0").await);

        let event: (i64, i64) = sqlx::query_as(
            "SELECT deletions_count, limit_value FROM storage_events
             WHERE event_type = 'actor_contexts_limit'",
        )
        .fetch_one(&store.pool())
        .await
        .unwrap();
        assert_eq!(event, (1, 64));
    }
}
