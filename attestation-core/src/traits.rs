//! Consumer interfaces the write path depends on but does not implement:
//! signing, observation, and vanity-id generation are all supplied by the
//! host process.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::model::Attestation;

/// Capability that signs an attestation in place, populating `signature` and
/// `signer_did` on success. Installed process-wide (or per-store) through
/// the signer registry; never implemented by this crate.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, attestation: &mut Attestation) -> Result<(), String>;
}

/// Observer notified, best-effort and asynchronously, after an attestation
/// is durably inserted. Observers must not mutate the attestation they are
/// given and must not assume ordering relative to other observers or other
/// attestations.
pub trait Observer: Send + Sync {
    fn on_attestation_created(&self, attestation: &Attestation);
}

/// A predicate asking "does an attestation with this id already exist?",
/// bound to `AttestationStore::attestation_exists` by the caller so that
/// [`IdGenerator`] implementations can avoid colliding with live ids without
/// depending on the store directly.
pub type ExistsPredicate<'a> = dyn Fn(&str) -> BoxFuture<'a, bool> + Send + Sync + 'a;

/// Vanity/content-addressed id generation, consumed by the self-certifying
/// creator. Never implemented by this crate - ASID generation is
/// explicitly out of scope.
#[async_trait]
pub trait IdGenerator: Send + Sync {
    async fn generate(
        &self,
        subject: &str,
        predicate: &str,
        context: &str,
        actor_seed: &str,
        exists: &ExistsPredicate<'_>,
    ) -> Result<String, String>;
}
