//! Field Marshaller - canonical textual rendering of an attestation's five
//! multivalued fields for persistence.

use attestation_core::{Attestation, AttestationError};

/// The five canonical JSON renderings stored in the `attestations` table, in
/// column order.
pub struct MarshalledFields {
    pub subjects: String,
    pub predicates: String,
    pub contexts: String,
    pub actors: String,
    pub attributes: String,
}

/// Encode `attestation`'s multivalued fields to stable-order JSON.
///
/// `serde_json::to_string` on a `Vec<String>` is already canonical (array
/// order is the field's own order, never reordered), and `attributes` is a
/// `serde_json::Map` with the `preserve_order` feature enabled, so
/// re-marshalling any successfully-marshalled attestation yields
/// byte-identical output.
pub fn marshal(attestation: &Attestation) -> Result<MarshalledFields, AttestationError> {
    fn encode<T: serde::Serialize>(
        attestation_id: &str,
        field: &str,
        value: &T,
    ) -> Result<String, AttestationError> {
        serde_json::to_string(value).map_err(|e| AttestationError::MarshalError {
            attestation_id: attestation_id.to_string(),
            field: field.to_string(),
            message: e.to_string(),
        })
    }

    Ok(MarshalledFields {
        subjects: encode(&attestation.id, "subjects", &attestation.subjects)?,
        predicates: encode(&attestation.id, "predicates", &attestation.predicates)?,
        contexts: encode(&attestation.id, "contexts", &attestation.contexts)?,
        actors: encode(&attestation.id, "actors", &attestation.actors)?,
        attributes: encode(&attestation.id, "attributes", &attestation.attributes)?,
    })
}
