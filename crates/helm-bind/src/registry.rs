//! Process-wide control state, one entry per loaded vessel, keyed by the
//! vessel's root part.
//!
//! Managers take a hold on an entry when they bind channels to it and give it
//! back when they move on or are torn down. An entry is only removed by the
//! holder that gives back the last hold, or by `sweep` once its vessel is no
//! longer loaded.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use helm_proto::{OwnerId, RootPartId, VesselId, VesselRef};
use tracing::{debug, info};

pub type SharedRegistry = Rc<RefCell<ControlRegistry>>;

/// Non-owning reference to a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlHandle {
    root: RootPartId,
}

impl ControlHandle {
    pub fn root(&self) -> RootPartId {
        self.root
    }
}

#[derive(Debug, Clone)]
pub struct ControlEntry {
    vessel: VesselId,
    holders: BTreeSet<OwnerId>,
    bound: bool,
}

impl ControlEntry {
    pub fn vessel(&self) -> VesselId {
        self.vessel
    }

    pub fn holders(&self) -> usize {
        self.holders.len()
    }

    pub fn is_held_by(&self, owner: OwnerId) -> bool {
        self.holders.contains(&owner)
    }

    /// False after `unbind` until the next `acquire`.
    pub fn is_bound(&self) -> bool {
        self.bound
    }
}

#[derive(Debug, Default)]
pub struct ControlRegistry {
    entries: HashMap<RootPartId, ControlEntry>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Look up or create the entry for `vessel` and record `owner` as a holder.
    /// None when the vessel has no root part yet.
    pub fn acquire(&mut self, vessel: VesselRef, owner: OwnerId) -> Option<ControlHandle> {
        let root = vessel.root?;
        let handle = ControlHandle { root };
        let entry = self.entries.entry(root).or_insert_with(|| {
            info!("control registry: new entry {} for {}", root, vessel.id);
            ControlEntry { vessel: vessel.id, holders: BTreeSet::new(), bound: true }
        });
        entry.holders.insert(owner);
        entry.bound = true;
        let stale = entry.vessel != vessel.id;
        if stale {
            self.retarget(handle, vessel.id);
        }
        Some(handle)
    }

    /// Point an entry at a new vessel identity (the root part now belongs to it).
    pub fn retarget(&mut self, handle: ControlHandle, vessel: VesselId) -> bool {
        match self.entries.get_mut(&handle.root) {
            Some(entry) => {
                debug!(
                    "control registry: {} retargeted {} -> {}",
                    handle.root, entry.vessel, vessel
                );
                entry.vessel = vessel;
                true
            }
            None => false,
        }
    }

    /// Let go of the actuators. The entry itself stays.
    pub fn unbind(&mut self, handle: ControlHandle) {
        if let Some(entry) = self.entries.get_mut(&handle.root) {
            if entry.bound {
                debug!("control registry: unbind {}", handle.root);
            }
            entry.bound = false;
        }
    }

    /// Drop `owner`'s hold. Returns how many holders remain.
    pub fn release(&mut self, handle: ControlHandle, owner: OwnerId) -> usize {
        match self.entries.get_mut(&handle.root) {
            Some(entry) => {
                entry.holders.remove(&owner);
                entry.holders.len()
            }
            None => 0,
        }
    }

    pub fn dispose(&mut self, handle: ControlHandle) -> bool {
        let removed = self.entries.remove(&handle.root).is_some();
        if removed {
            info!("control registry: disposed {}", handle.root);
        }
        removed
    }

    /// Evict every entry whose vessel is no longer loaded.
    pub fn sweep<F>(&mut self, mut is_loaded: F) -> Vec<RootPartId>
    where
        F: FnMut(VesselId) -> bool,
    {
        let evicted: Vec<RootPartId> = self
            .entries
            .iter()
            .filter(|(_, e)| !is_loaded(e.vessel))
            .map(|(root, _)| *root)
            .collect();
        for root in &evicted {
            if let Some(entry) = self.entries.remove(root) {
                info!("control registry: unloading {} ({})", entry.vessel, root);
            }
        }
        evicted
    }

    pub fn vessel_of(&self, handle: ControlHandle) -> Option<VesselId> {
        self.entries.get(&handle.root).map(|e| e.vessel)
    }

    pub fn contains(&self, handle: ControlHandle) -> bool {
        self.entries.contains_key(&handle.root)
    }

    pub fn get(&self, root: RootPartId) -> Option<&ControlEntry> {
        self.entries.get(&root)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vessel(id: u64, root: u32) -> VesselRef {
        VesselRef { id: VesselId(id), root: Some(RootPartId(root)) }
    }

    #[test]
    fn test_acquire_creates_once_per_root() {
        let mut reg = ControlRegistry::new();
        let a = reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        let b = reg.acquire(vessel(1, 10), OwnerId(200)).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get(RootPartId(10)).unwrap().holders(), 2);
    }

    #[test]
    fn test_acquire_without_root_is_none() {
        let mut reg = ControlRegistry::new();
        let v = VesselRef { id: VesselId(1), root: None };
        assert!(reg.acquire(v, OwnerId(1)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_acquire_retargets_changed_vessel_identity() {
        let mut reg = ControlRegistry::new();
        let h = reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        reg.acquire(vessel(2, 10), OwnerId(100)).unwrap();
        assert_eq!(reg.vessel_of(h), Some(VesselId(2)));
    }

    #[test]
    fn test_release_counts_remaining_holders() {
        let mut reg = ControlRegistry::new();
        let h = reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        reg.acquire(vessel(1, 10), OwnerId(200)).unwrap();
        assert_eq!(reg.release(h, OwnerId(100)), 1);
        assert_eq!(reg.release(h, OwnerId(100)), 1);
        assert_eq!(reg.release(h, OwnerId(200)), 0);
        assert!(reg.contains(h));
        assert!(reg.dispose(h));
        assert!(!reg.dispose(h));
    }

    #[test]
    fn test_unbind_keeps_entry() {
        let mut reg = ControlRegistry::new();
        let h = reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        reg.unbind(h);
        assert!(!reg.get(RootPartId(10)).unwrap().is_bound());
        reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        assert!(reg.get(RootPartId(10)).unwrap().is_bound());
    }

    #[test]
    fn test_sweep_evicts_unloaded_only() {
        let mut reg = ControlRegistry::new();
        reg.acquire(vessel(1, 10), OwnerId(100)).unwrap();
        let kept = reg.acquire(vessel(2, 20), OwnerId(100)).unwrap();
        let evicted = reg.sweep(|v| v == VesselId(2));
        assert_eq!(evicted, vec![RootPartId(10)]);
        assert_eq!(reg.len(), 1);
        assert!(reg.contains(kept));
    }
}
