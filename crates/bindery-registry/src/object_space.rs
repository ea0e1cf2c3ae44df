//! Host object table and collector.
//!
//! Host objects are addressed by [`ObjectHandle`]. Each carries its host class
//! and, once initialized, the [`Wrapper`] binding it to a native object. The
//! collector is a plain mark-sweep: marking starts from the caller's roots
//! plus pinned objects and follows every wrapper's keep-alive list.

use std::fmt;

use rustc_hash::FxHashSet;
use tracing::debug;

use bindery_core::{Arena, ObjectHandle};

use crate::class::ClassId;
use crate::wrapper::Wrapper;

/// One host object.
#[derive(Debug, Clone, PartialEq)]
pub struct HostObject {
    pub class: ClassId,
    /// `None` until a native initializer binds a native object.
    pub wrapper: Option<Wrapper>,
}

/// Table of live host objects.
#[derive(Default)]
pub struct ObjectSpace {
    objects: Arena<HostObject>,
    pinned: FxHashSet<ObjectHandle>,
}

impl ObjectSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, class: ClassId, wrapper: Option<Wrapper>) -> ObjectHandle {
        ObjectHandle(self.objects.insert(HostObject { class, wrapper }))
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&HostObject> {
        self.objects.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut HostObject> {
        self.objects.get_mut(handle.0)
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains(handle.0)
    }

    pub fn class_of(&self, handle: ObjectHandle) -> Option<ClassId> {
        self.get(handle).map(|o| o.class)
    }

    pub fn wrapper(&self, handle: ObjectHandle) -> Option<&Wrapper> {
        self.get(handle)?.wrapper.as_ref()
    }

    pub fn wrapper_mut(&mut self, handle: ObjectHandle) -> Option<&mut Wrapper> {
        self.get_mut(handle)?.wrapper.as_mut()
    }

    /// Attach a wrapper, returning the one it replaced.
    pub fn bind(&mut self, handle: ObjectHandle, wrapper: Wrapper) -> Option<Wrapper> {
        self.get_mut(handle)?.wrapper.replace(wrapper)
    }

    /// Remove an object immediately, bypassing the collector.
    pub fn destroy(&mut self, handle: ObjectHandle) -> Option<HostObject> {
        self.pinned.remove(&handle);
        self.objects.remove(handle.0)
    }

    /// Keep an object alive across every collection until unpinned.
    pub fn pin(&mut self, handle: ObjectHandle) {
        self.pinned.insert(handle);
    }

    pub fn unpin(&mut self, handle: ObjectHandle) {
        self.pinned.remove(&handle);
    }

    /// Mark from `roots` and the pinned set, then sweep.
    ///
    /// Swept objects are returned so the caller can finalize their wrappers.
    pub fn collect<I>(&mut self, roots: I) -> Vec<(ObjectHandle, HostObject)>
    where
        I: IntoIterator<Item = ObjectHandle>,
    {
        let mut marked: FxHashSet<ObjectHandle> = FxHashSet::default();
        let mut worklist: Vec<ObjectHandle> = roots.into_iter().collect();
        worklist.extend(self.pinned.iter().copied());

        while let Some(handle) = worklist.pop() {
            if !self.contains(handle) || !marked.insert(handle) {
                continue;
            }
            if let Some(wrapper) = self.wrapper(handle) {
                worklist.extend(
                    wrapper
                        .keep_alive()
                        .iter()
                        .filter(|h| !marked.contains(h))
                        .copied(),
                );
            }
        }

        let dead: Vec<ObjectHandle> = self
            .objects
            .iter()
            .map(|(index, _)| ObjectHandle(index))
            .filter(|h| !marked.contains(h))
            .collect();

        let swept: Vec<(ObjectHandle, HostObject)> = dead
            .into_iter()
            .filter_map(|h| self.objects.remove(h.0).map(|o| (h, o)))
            .collect();

        debug!(
            marked = marked.len(),
            swept = swept.len(),
            "collected host objects"
        );
        swept
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object without finalizing.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.pinned.clear();
    }

    /// Every live handle, in slot order.
    pub fn handles(&self) -> Vec<ObjectHandle> {
        self.objects.iter().map(|(i, _)| ObjectHandle(i)).collect()
    }
}

impl fmt::Debug for ObjectSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectSpace")
            .field("len", &self.objects.len())
            .field("pinned", &self.pinned.len())
            .finish()
    }
}
