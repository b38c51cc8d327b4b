//! Core data model: attestations and the telemetry they generate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A signed, content-addressed record asserting that some set of `actors`
/// made a claim (`predicates`) about some set of `subjects` within some set
/// of `contexts`, at `timestamp`, with optional typed `attributes`.
///
/// Attestations are immutable after creation: they are produced by the store
/// writer and destroyed only by the bounded-store enforcer. `subjects`,
/// `predicates`, `contexts`, and `actors` are never empty, and `context`
/// values compare case-insensitively against one another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Content-/vanity-derived identifier; unique across the store.
    pub id: String,

    /// Entities being attested about. Never empty.
    pub subjects: Vec<String>,

    /// The claims being made. Never empty.
    pub predicates: Vec<String>,

    /// Scopes within which the claim holds. Never empty. Compared
    /// case-insensitively.
    pub contexts: Vec<String>,

    /// Who asserts the claim. Never empty. For self-certifying
    /// attestations, `actors == [id]`.
    pub actors: Vec<String>,

    /// Wall-clock moment the claim is asserted.
    pub timestamp: DateTime<Utc>,

    /// Opaque origin tag, e.g. `"adapter:calendar"`.
    pub source: String,

    /// Arbitrary typed attributes. A `Map` (not a `HashMap`) so that
    /// re-marshalling is byte-identical: insertion order is preserved.
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Wall-clock moment the row was materialized.
    pub created_at: DateTime<Utc>,

    /// Present iff signed. An empty signature is normalized to `None`
    /// before persistence.
    #[serde(default)]
    pub signature: Option<Vec<u8>>,

    /// Decentralized identifier of the signer. Present iff `signature` is.
    #[serde(default)]
    pub signer_did: Option<String>,
}

impl Attestation {
    /// True when this attestation's sole actor is its own id - the
    /// self-certifying form used to bypass per-actor eviction axes for
    /// anonymous ingestion (see [`crate::traits::IdGenerator`]).
    pub fn is_self_certifying(&self) -> bool {
        self.actors.len() == 1 && self.actors[0] == self.id
    }
}

/// The kind of bounded-storage event recorded by the telemetry logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Axis 1: a single ⟨actor, context⟩ pair exceeded `ActorContextLimit`.
    ActorContextLimit,
    /// Axis 2: an actor's distinct context-sets exceeded `ActorContextsLimit`.
    ActorContextsLimit,
    /// Axis 3: a subject's distinct actors exceeded `EntityActorsLimit`.
    EntityActorsLimit,
    /// Cardinality approaching (but not yet over) a limit.
    StorageWarning,
}

impl EventKind {
    /// The kind-specific suffix the telemetry logger appends to its
    /// human-readable summary, e.g. `"(attestations per actor-context)"`.
    pub fn log_suffix(self) -> &'static str {
        match self {
            EventKind::ActorContextLimit => "(attestations per actor-context)",
            EventKind::ActorContextsLimit => "(distinct context-sets per actor)",
            EventKind::EntityActorsLimit => "(distinct actors per entity)",
            EventKind::StorageWarning => "(approaching limit)",
        }
    }

    /// The `event_type` column value.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ActorContextLimit => "actor_context_limit",
            EventKind::ActorContextsLimit => "actor_contexts_limit",
            EventKind::EntityActorsLimit => "entity_actors_limit",
            EventKind::StorageWarning => "storage_warning",
        }
    }
}

/// Sample detail captured before an eviction, for offline inspection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvictionDetails {
    /// Up to three sampled predicate lists, oldest/least-used first.
    #[serde(default)]
    pub sample_predicates: Vec<Vec<String>>,
    /// Up to three sampled subject lists, same order as `sample_predicates`.
    #[serde(default)]
    pub sample_subjects: Vec<Vec<String>>,
    /// Actors evicted by this event (Axis 2/3 only).
    #[serde(default)]
    pub evicted_actors: Vec<String>,
    /// Context-arrays evicted by this event (Axis 2 only).
    #[serde(default)]
    pub evicted_context_sets: Vec<Vec<String>>,
    /// Maximum timestamp observed across the sample.
    pub last_seen: Option<DateTime<Utc>>,
}

/// Append-only telemetry row produced by the bounded-store enforcer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    pub event_kind: EventKind,
    pub actor: Option<String>,
    pub context: Option<String>,
    pub entity: Option<String>,
    /// Deletions for enforcement events; current cardinality for warnings.
    pub count: i64,
    pub limit: i64,
    pub timestamp: DateTime<Utc>,
    pub eviction_details: Option<EvictionDetails>,
}

/// Input to self-certifying creation: no `id`, no `actors`, no `signature` -
/// those are filled in by
/// [`crate::traits::IdGenerator`] and the store writer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAttestationCommand {
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub predicates: Vec<String>,
    #[serde(default)]
    pub contexts: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl CreateAttestationCommand {
    /// Builds the self-certifying attestation for `id`: `actors = [id]`, no
    /// signature yet.
    pub fn into_attestation(self, id: String) -> Attestation {
        Attestation {
            actors: vec![id.clone()],
            id,
            subjects: self.subjects,
            predicates: self.predicates,
            contexts: self.contexts,
            timestamp: self.timestamp,
            source: self.source,
            attributes: self.attributes,
            created_at: self.created_at,
            signature: None,
            signer_did: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attestation {
        Attestation {
            id: "AS-1".into(),
            subjects: vec!["ALICE".into()],
            predicates: vec!["knows".into()],
            contexts: vec!["GitHub".into()],
            actors: vec!["human:bob".into()],
            timestamp: Utc::now(),
            source: "cli".into(),
            attributes: Map::new(),
            created_at: Utc::now(),
            signature: None,
            signer_did: None,
        }
    }

    #[test]
    fn self_certifying_detects_sole_self_actor() {
        let mut a = sample();
        a.actors = vec![a.id.clone()];
        assert!(a.is_self_certifying());
    }

    #[test]
    fn self_certifying_false_for_third_party_actor() {
        assert!(!sample().is_self_certifying());
    }

    #[test]
    fn self_certifying_false_when_id_is_one_of_several_actors() {
        let mut a = sample();
        a.actors = vec![a.id.clone(), "human:bob".into()];
        assert!(!a.is_self_certifying());
    }

    #[test]
    fn command_into_attestation_is_self_certifying() {
        let cmd = CreateAttestationCommand {
            subjects: vec!["E".into()],
            predicates: vec!["_".into()],
            contexts: vec!["_".into()],
            timestamp: Utc::now(),
            source: "adapter:anon".into(),
            attributes: Map::new(),
            created_at: Utc::now(),
        };
        let a = cmd.into_attestation("AS-generated".into());
        assert!(a.is_self_certifying());
        assert_eq!(a.actors, vec!["AS-generated".to_string()]);
    }
}
