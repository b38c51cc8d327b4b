//! Signer Registry - a process-wide, lazily-populated slot for at most one
//! [`Signer`], plus an instance-scoped variant for callers that want to opt
//! out of process-wide state entirely (a dependency-injection seam).

use std::sync::{Arc, OnceLock, RwLock};

use attestation_core::Signer;

/// Holds at most one signer. Readers may observe the slot concurrently;
/// `set_default` serializes against both readers and other writers via the
/// inner `RwLock`. A rotation installed after a writer has read the slot has
/// no effect on that writer's in-flight call - the writer is holding its own
/// `Arc` clone, not a reference into the registry.
pub struct SignerRegistry {
    slot: RwLock<Option<Arc<dyn Signer>>>,
}

impl Default for SignerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(None),
        }
    }

    /// The process-wide default registry, used by stores that don't carry
    /// their own.
    pub fn global() -> &'static SignerRegistry {
        static GLOBAL: OnceLock<SignerRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SignerRegistry::new)
    }

    /// Install `signer` as the default, discarding whatever was installed
    /// before.
    pub fn set_default(&self, signer: Arc<dyn Signer>) {
        let mut slot = self.slot.write().expect("signer registry lock poisoned");
        *slot = Some(signer);
    }

    /// The currently installed default signer, if any.
    pub fn get_default(&self) -> Option<Arc<dyn Signer>> {
        let slot = self.slot.read().expect("signer registry lock poisoned");
        slot.clone()
    }

    /// Clears the installed signer. Test-only affordance.
    pub fn reset(&self) {
        let mut slot = self.slot.write().expect("signer registry lock poisoned");
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubSigner(&'static str);

    #[async_trait]
    impl Signer for StubSigner {
        async fn sign(
            &self,
            attestation: &mut attestation_core::Attestation,
        ) -> Result<(), String> {
            attestation.signature = Some(vec![1, 2, 3]);
            attestation.signer_did = Some(self.0.to_string());
            Ok(())
        }
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = SignerRegistry::new();
        assert!(registry.get_default().is_none());
    }

    #[test]
    fn set_default_is_visible_to_get_default() {
        let registry = SignerRegistry::new();
        registry.set_default(Arc::new(StubSigner("did:example:1")));
        assert!(registry.get_default().is_some());
    }

    #[tokio::test]
    async fn rotation_replaces_previous_signer() {
        let registry = SignerRegistry::new();
        registry.set_default(Arc::new(StubSigner("did:example:1")));
        registry.set_default(Arc::new(StubSigner("did:example:2")));

        let signer = registry.get_default().unwrap();
        let mut attestation = attestation_core::Attestation {
            id: "AS-1".into(),
            subjects: vec!["S".into()],
            predicates: vec!["_".into()],
            contexts: vec!["_".into()],
            actors: vec!["A".into()],
            timestamp: chrono::Utc::now(),
            source: "test".into(),
            attributes: serde_json::Map::new(),
            created_at: chrono::Utc::now(),
            signature: None,
            signer_did: None,
        };
        signer.sign(&mut attestation).await.unwrap();
        assert_eq!(attestation.signer_did.as_deref(), Some("did:example:2"));
    }

    #[test]
    fn reset_clears_default() {
        let registry = SignerRegistry::new();
        registry.set_default(Arc::new(StubSigner("did:example:1")));
        registry.reset();
        assert!(registry.get_default().is_none());
    }
}
