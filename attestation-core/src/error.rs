//! Error kinds for the attestation store write path.

use thiserror::Error;

/// Errors surfaced by `CreateAttestation` and its collaborators.
///
/// `MarshalError`, `SignError`, `PersistError`, and `IdGenError` abort the
/// insert they occur in (nothing is persisted, no observer is notified). A
/// `NilInput` raised by the bounded-store enforcer is never surfaced to a
/// caller - it is logged and the enforcer no-ops instead.
#[derive(Error, Debug)]
pub enum AttestationError {
    #[error("nil input: {context}")]
    NilInput { context: String },

    #[error("failed to marshal field {field} of attestation {attestation_id}: {message}")]
    MarshalError {
        attestation_id: String,
        field: String,
        message: String,
    },

    #[error("failed to sign attestation {attestation_id}: {message}")]
    SignError {
        attestation_id: String,
        message: String,
    },

    #[error("failed to persist attestation {attestation_id} (source={source}): {message}")]
    PersistError {
        attestation_id: String,
        subjects: Vec<String>,
        predicates: Vec<String>,
        contexts: Vec<String>,
        actors: Vec<String>,
        source: String,
        message: String,
    },

    #[error("id generation failed: {message}")]
    IdGenError { message: String },
}

pub type AttestationResult<T> = Result<T, AttestationError>;
