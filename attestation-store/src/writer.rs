//! Store Writer - the single entry point that durably inserts an
//! attestation, then signals the rest of the core about it.
//!
//! Grounded on `cortex_server::db::queries`'s query-function shape (one
//! `async fn`, positional binds, a `tracing` line bracketing the call) and on
//! `yusefmosiah-choiros-rs/hypervisor/src/session_store.rs` for threading a
//! `SqlitePool` through a handful of cooperating structs.

use std::sync::Arc;

use sqlx::SqlitePool;

use attestation_core::{
    Attestation, AttestationError, AttestationResult, CreateAttestationCommand, ExistsPredicate,
    IdGenerator,
};

use crate::enforcer::BoundedStoreEnforcer;
use crate::marshal;
use crate::observer::ObserverRegistry;
use crate::signer::SignerRegistry;

pub struct AttestationStore {
    pool: SqlitePool,
    signers: Arc<SignerRegistry>,
    observers: Arc<ObserverRegistry>,
    enforcer: Arc<BoundedStoreEnforcer>,
}

impl AttestationStore {
    pub fn new(
        pool: SqlitePool,
        signers: Arc<SignerRegistry>,
        observers: Arc<ObserverRegistry>,
        enforcer: Arc<BoundedStoreEnforcer>,
    ) -> Self {
        Self {
            pool,
            signers,
            observers,
            enforcer,
        }
    }

    /// Inserts `attestation` durably. Signs it in place first if a default
    /// signer is installed and it isn't already signed; any failure before
    /// the INSERT leaves the store untouched. Notification and enforcement
    /// run after a successful INSERT and can never fail the call.
    pub async fn create_attestation(&self, mut attestation: Attestation) -> AttestationResult<()> {
        if attestation.signature.is_none() {
            if let Some(signer) = self.signers.get_default() {
                signer
                    .sign(&mut attestation)
                    .await
                    .map_err(|message| AttestationError::SignError {
                        attestation_id: attestation.id.clone(),
                        message,
                    })?;
            }
        }

        let fields = marshal::marshal(&attestation)?;

        let signature = attestation
            .signature
            .as_deref()
            .filter(|sig| !sig.is_empty());
        let signer_did = attestation
            .signer_did
            .as_deref()
            .filter(|did| !did.is_empty());

        tracing::debug!(attestation_id = %attestation.id, "inserting attestation");

        sqlx::query(
            "INSERT INTO attestations
                (id, subjects, predicates, contexts, actors, timestamp, source, attributes, created_at, signature, signer_did)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&attestation.id)
        .bind(&fields.subjects)
        .bind(&fields.predicates)
        .bind(&fields.contexts)
        .bind(&fields.actors)
        .bind(crate::db::timestamp_column(attestation.timestamp))
        .bind(&attestation.source)
        .bind(&fields.attributes)
        .bind(crate::db::timestamp_column(attestation.created_at))
        .bind(signature)
        .bind(signer_did)
        .execute(&self.pool)
        .await
        .map_err(|e| AttestationError::PersistError {
            attestation_id: attestation.id.clone(),
            subjects: attestation.subjects.clone(),
            predicates: attestation.predicates.clone(),
            contexts: attestation.contexts.clone(),
            actors: attestation.actors.clone(),
            source: attestation.source.clone(),
            message: e.to_string(),
        })?;

        self.observers.notify(&attestation);
        self.enforcer.enforce(&attestation).await;

        Ok(())
    }

    /// The underlying pool, for collaborators and tests that need to read
    /// tables this store doesn't expose a method for (e.g. `storage_events`).
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Whether an attestation with `id` is already present. Any query error
    /// is treated as "does not exist".
    pub async fn attestation_exists(&self, id: &str) -> bool {
        let result: Result<Option<(i64,)>, sqlx::Error> =
            sqlx::query_as("SELECT 1 FROM attestations WHERE id = ? LIMIT 1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match result {
            Ok(row) => row.is_some(),
            Err(e) => {
                tracing::warn!(id, error = %e, "attestation_exists query failed, treating as absent");
                false
            }
        }
    }

    /// Generates a fresh self-certifying id for `cmd` and inserts the
    /// resulting attestation.
    pub async fn generate_and_create_attestation(
        &self,
        cmd: CreateAttestationCommand,
        id_generator: &dyn IdGenerator,
    ) -> AttestationResult<()> {
        let subject = cmd.subjects.first().map(String::as_str).unwrap_or("_");
        let predicate = cmd.predicates.first().map(String::as_str).unwrap_or("_");
        let context = cmd.contexts.first().map(String::as_str).unwrap_or("_");

        let exists: Box<ExistsPredicate<'_>> = Box::new(move |id: &str| {
            let id = id.to_string();
            Box::pin(async move { self.attestation_exists(&id).await })
        });

        let id = id_generator
            .generate(subject, predicate, context, "", exists.as_ref())
            .await
            .map_err(|message| AttestationError::IdGenError { message })?;

        let attestation = cmd.into_attestation(id);
        self.create_attestation(attestation).await
    }
}
