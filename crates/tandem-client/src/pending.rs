//! Pending-call registry.
//!
//! Tracks every in-flight call started through one [`RpcClient`](crate::RpcClient)
//! while cancellation is enabled, so a single call or all of them can be
//! aborted. Entries are removed when the call settles, when it is aborted,
//! or when its future is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::abort::AbortController;

/// Handle of one tracked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u64);

impl CallId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    calls: HashMap<CallId, AbortController>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserves a fresh call handle.
    pub fn next_id(&self) -> CallId {
        let mut inner = self.lock();
        inner.next_id += 1;
        CallId(inner.next_id)
    }

    pub fn insert(&self, id: CallId, controller: AbortController) {
        self.lock().calls.insert(id, controller);
    }

    /// Forgets a settled call. Returns whether it was tracked.
    pub fn remove(&self, id: CallId) -> bool {
        self.lock().calls.remove(&id).is_some()
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.lock().calls.contains_key(&id)
    }

    /// Aborts and forgets one call. Returns whether it was tracked.
    pub fn abort(&self, id: CallId) -> bool {
        let controller = self.lock().calls.remove(&id);
        match controller {
            Some(controller) => {
                controller.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts and forgets every tracked call. Returns how many were aborted.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = self.lock().calls.drain().collect();
        for (_, controller) in &drained {
            controller.abort();
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its entry from the registry when dropped.
pub(crate) struct RegistryGuard {
    registry: PendingRegistry,
    id: CallId,
}

impl RegistryGuard {
    pub(crate) fn new(registry: PendingRegistry, id: CallId) -> Self {
        Self { registry, id }
    }
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
