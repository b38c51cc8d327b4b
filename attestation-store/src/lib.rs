//! Attestation Store core - the write path of a distributed
//! attestation-tracking service: ingestion, signing, observer notification,
//! and bounded-storage enforcement over a denormalized SQLite schema.

pub mod config;
pub mod db;
pub mod enforcer;
pub mod marshal;
pub mod observer;
pub mod signer;
pub mod telemetry;
pub mod writer;

pub use config::EnforcerLimits;
pub use enforcer::BoundedStoreEnforcer;
pub use marshal::{marshal, MarshalledFields};
pub use observer::ObserverRegistry;
pub use signer::SignerRegistry;
pub use telemetry::TelemetryLogger;
pub use writer::AttestationStore;

pub use attestation_core::*;
