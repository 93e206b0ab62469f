//! Host-side heap coordination.
//!
//! Host object proxies handed to a script are kept alive here on the
//! script's behalf. Reclaiming one takes two ordered passes: the script
//! pass, where the engine drops its own references and reports which
//! proxies it no longer reaches, and the host pass, which releases the
//! strong handles for exactly those proxies. Running either pass alone
//! must not free anything.

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use marten_value::ScriptObject;

#[derive(Debug, Default)]
pub struct HeapCoordinator {
    exposed: DashMap<u64, ScriptObject>,
    pending: Mutex<FxHashSet<u64>>,
}

/// Outcome of a host sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepReport {
    pub released: usize,
    pub retained: usize,
}

impl HeapCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins a proxy on behalf of script code.
    pub fn expose(&self, object: ScriptObject) {
        let id = object.object_id();
        self.pending.lock().remove(&id);
        self.exposed.insert(id, object);
    }

    /// Number of proxies currently pinned.
    pub fn exposed_count(&self) -> usize {
        self.exposed.len()
    }

    /// Records the outcome of the script pass: these proxies are no longer
    /// reachable from script state and may be released by the next host
    /// pass.
    pub fn note_script_released(&self, ids: impl IntoIterator<Item = u64>) {
        let mut pending = self.pending.lock();
        for id in ids {
            if self.exposed.contains_key(&id) {
                pending.insert(id);
            }
        }
    }

    /// Records the outcome of the script pass expressed as a live set:
    /// every pinned proxy not named here becomes releasable.
    pub fn note_script_live(&self, live: impl IntoIterator<Item = u64>) {
        let live: FxHashSet<u64> = live.into_iter().collect();
        let mut pending = self.pending.lock();
        for entry in self.exposed.iter() {
            if !live.contains(entry.key()) {
                pending.insert(*entry.key());
            }
        }
    }

    /// Host pass. Releases only proxies the script pass already reported;
    /// without a preceding script pass this is a no-op.
    pub fn sweep_host(&self) -> SweepReport {
        let ids: Vec<u64> = {
            let mut pending = self.pending.lock();
            pending.drain().collect()
        };
        let mut released = 0;
        for id in ids {
            if self.exposed.remove(&id).is_some() {
                released += 1;
            }
        }
        SweepReport {
            released,
            retained: self.exposed.len(),
        }
    }

    /// Drops every pinned proxy. Used on engine disposal.
    pub fn release_all(&self) -> usize {
        self.pending.lock().clear();
        let count = self.exposed.len();
        self.exposed.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Weak};

    use marten_value::host_box;

    use super::*;

    struct Payload;

    fn pinned_payload(coordinator: &HeapCoordinator) -> (u64, Weak<Payload>) {
        let payload = Arc::new(Payload);
        let weak = Arc::downgrade(&payload);
        let object = host_box(payload);
        let id = object.object_id();
        coordinator.expose(object);
        (id, weak)
    }

    #[test]
    fn test_host_sweep_alone_releases_nothing() {
        let coordinator = HeapCoordinator::new();
        let (_, weak) = pinned_payload(&coordinator);
        let report = coordinator.sweep_host();
        assert_eq!(report.released, 0);
        assert!(weak.upgrade().is_some());
    }

    #[test]
    fn test_script_pass_alone_keeps_proxy_alive() {
        let coordinator = HeapCoordinator::new();
        let (id, weak) = pinned_payload(&coordinator);
        coordinator.note_script_released([id]);
        assert!(weak.upgrade().is_some());
        assert_eq!(coordinator.exposed_count(), 1);
    }

    #[test]
    fn test_both_passes_in_order_reclaim() {
        let coordinator = HeapCoordinator::new();
        let (id, weak) = pinned_payload(&coordinator);
        coordinator.note_script_released([id]);
        let report = coordinator.sweep_host();
        assert_eq!(report.released, 1);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_reexposure_cancels_pending_release() {
        let coordinator = HeapCoordinator::new();
        let payload = Arc::new(Payload);
        let weak = Arc::downgrade(&payload);
        let object = host_box(payload);
        let id = object.object_id();
        coordinator.expose(object.clone());
        coordinator.note_script_released([id]);
        // Script re-acquired the proxy before the host pass ran.
        coordinator.expose(object);
        let report = coordinator.sweep_host();
        assert_eq!(report.released, 0);
        assert!(weak.upgrade().is_some());
    }
}
