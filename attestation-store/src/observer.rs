//! Observer Registry - a process-wide ordered list of observer handles,
//! fanned out to asynchronously and without back-pressure.
//!
//! Grounded on `CompositeMutationObserver`'s register/unregister-by-identity,
//! fan-out-to-all shape, generalized from a synchronous in-process fan-out to
//! an async, one-task-per-observer dispatch: `notify` must never hold the
//! registry lock while observer code runs, and unregistration must not stop
//! in-flight notifications for the removed observer.

use std::sync::{Arc, RwLock};

use attestation_core::{Attestation, Observer};

#[derive(Default)]
pub struct ObserverRegistry {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `observer` to the registry.
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.observers
            .write()
            .expect("observer registry lock poisoned")
            .push(observer);
    }

    /// Removes the first occurrence of `observer` by pointer identity.
    /// No-op if absent.
    pub fn unregister(&self, observer: &Arc<dyn Observer>) {
        let mut observers = self.observers.write().expect("observer registry lock poisoned");
        if let Some(index) = observers
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, observer))
        {
            observers.remove(index);
        }
    }

    /// Removes every registered observer. Test affordance.
    pub fn clear_all(&self) {
        self.observers
            .write()
            .expect("observer registry lock poisoned")
            .clear();
    }

    pub fn len(&self) -> usize {
        self.observers.read().expect("observer registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots the registered observers under a read lock, releases the
    /// lock, then spawns one independent task per observer. Does not wait
    /// for any task to finish and does not propagate observer panics - a
    /// panicking observer is caught at the task boundary and logged, so one
    /// bad observer can never take down the notifier or its siblings.
    pub fn notify(&self, attestation: &Attestation) {
        let snapshot: Vec<Arc<dyn Observer>> = self
            .observers
            .read()
            .expect("observer registry lock poisoned")
            .clone();

        for observer in snapshot {
            let attestation = attestation.clone();
            let attestation_id = attestation.id.clone();
            let task = tokio::task::spawn_blocking(move || {
                observer.on_attestation_created(&attestation);
            });
            tokio::spawn(async move {
                if let Err(join_error) = task.await {
                    tracing::warn!(
                        attestation_id = %attestation_id,
                        error = %join_error,
                        "observer panicked while handling attestation creation"
                    );
                }
            });
        }
    }
}
