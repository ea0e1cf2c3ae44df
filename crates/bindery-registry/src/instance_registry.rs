//! Native address to host handle identity.
//!
//! When the same native object is surfaced to the host more than once, the
//! instance registry decides whether the host sees the same handle again.
//! What gets canonicalized depends on the [`TrackingMode`] in effect.

use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use bindery_core::{NativeAddress, ObjectHandle, TrackingMode};

/// A canonical handle for one native address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceRecord {
    pub handle: ObjectHandle,
    /// Mode in effect when the record was created.
    pub mode: TrackingMode,
}

/// Registry of canonical host handles.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    mode: TrackingMode,
    records: FxHashMap<NativeAddress, InstanceRecord>,
}

impl InstanceRegistry {
    pub fn new(mode: TrackingMode) -> Self {
        Self {
            mode,
            records: FxHashMap::default(),
        }
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// Change the tracking mode. Existing records are kept.
    pub fn set_mode(&mut self, mode: TrackingMode) {
        self.mode = mode;
    }

    /// Whether a wrap with the given ownership should be canonicalized.
    pub fn tracks(&self, host_owned: bool) -> bool {
        self.mode.tracks(host_owned)
    }

    /// The canonical handle for `address`.
    ///
    /// Always `None` while tracking is off.
    pub fn lookup(&self, address: NativeAddress) -> Option<ObjectHandle> {
        if self.mode == TrackingMode::Off {
            return None;
        }
        self.records.get(&address).map(|r| r.handle)
    }

    /// Record `handle` as canonical for `address`, replacing any earlier one.
    ///
    /// Ignored while tracking is off.
    pub fn add(&mut self, address: NativeAddress, handle: ObjectHandle) {
        if self.mode == TrackingMode::Off {
            return;
        }
        let record = InstanceRecord {
            handle,
            mode: self.mode,
        };
        if let Some(previous) = self.records.insert(address, record)
            && previous.handle != handle
        {
            warn!(%address, old = %previous.handle, new = %handle, "replaced instance record");
        } else {
            trace!(%address, %handle, "tracked instance");
        }
    }

    pub fn get(&self, address: NativeAddress) -> Option<&InstanceRecord> {
        self.records.get(&address)
    }

    pub fn remove(&mut self, address: NativeAddress) -> Option<ObjectHandle> {
        self.records.remove(&address).map(|r| r.handle)
    }

    /// Remove the record for `address` only if it still points at `handle`.
    ///
    /// Finalizing a transient handle must not drop the canonical one.
    pub fn remove_if(&mut self, address: NativeAddress, handle: ObjectHandle) -> bool {
        match self.records.get(&address) {
            Some(record) if record.handle == handle => {
                self.records.remove(&address);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
