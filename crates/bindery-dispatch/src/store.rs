//! Object and type state shared by every call.
//!
//! [`Store`] groups the registries the dispatch engine consults while scoring
//! and converting: bound types, host classes, canonical instances, host
//! objects and the native heap. It is owned by a [`Runtime`](crate::Runtime)
//! and lent to parameters and natives during a call.

use std::any::Any;

use tracing::trace;

use bindery_core::{ConversionError, Dynamic, NativeAddress, ObjectHandle, TrackingMode, TypeHash};
use bindery_registry::{
    ClassId, ClassTable, HostObject, InstanceRegistry, NativeHeap, ObjectSpace, Ownership,
    TypeRegistry, Wrapper,
};

/// Registries and heaps of one runtime.
#[derive(Debug, Default)]
pub struct Store {
    pub types: TypeRegistry,
    pub classes: ClassTable,
    pub instances: InstanceRegistry,
    pub objects: ObjectSpace,
    pub heap: NativeHeap,
}

impl Store {
    pub fn new(tracking: TrackingMode) -> Self {
        Self {
            instances: InstanceRegistry::new(tracking),
            ..Self::default()
        }
    }

    /// The wrapper of a host object, checked for staleness.
    pub fn wrapper(&self, handle: ObjectHandle) -> Result<&Wrapper, ConversionError> {
        let object = self
            .objects
            .get(handle)
            .ok_or_else(|| ConversionError::StaleHandle(handle.to_string()))?;
        let wrapper = object
            .wrapper
            .as_ref()
            .ok_or_else(|| ConversionError::Uninitialized {
                class: self.classes.name(object.class).to_string(),
            })?;
        if !self.heap.contains(wrapper.address()) {
            return Err(ConversionError::StaleHandle(wrapper.address().to_string()));
        }
        Ok(wrapper)
    }

    /// Borrow the native object behind `handle` as a `T`.
    pub fn object<T: Any>(&self, handle: ObjectHandle) -> Result<&T, ConversionError> {
        let requested = TypeHash::of::<T>();
        let wrapper = self.wrapper(handle)?;
        wrapper
            .get(requested, &self.types, &self.heap)?
            .downcast_ref::<T>()
            .ok_or_else(|| self.mismatch(requested, wrapper.descriptor()))
    }

    /// Mutably borrow the native object behind `handle` as a `T`.
    pub fn object_mut<T: Any>(&mut self, handle: ObjectHandle) -> Result<&mut T, ConversionError> {
        let requested = TypeHash::of::<T>();
        let wrapper = self.wrapper(handle)?.clone();
        let mismatch = self.mismatch(requested, wrapper.descriptor());
        wrapper
            .get_mut(requested, &self.types, &mut self.heap)?
            .downcast_mut::<T>()
            .ok_or(mismatch)
    }

    fn mismatch(&self, requested: TypeHash, actual: TypeHash) -> ConversionError {
        ConversionError::TypeMismatch {
            expected: self.type_name(requested),
            actual: self.type_name(actual),
        }
    }

    /// Short name of a bound native type.
    pub fn type_name(&self, hash: TypeHash) -> String {
        self.types
            .get(hash)
            .map(|r| r.name.to_string())
            .unwrap_or_else(|| hash.to_string())
    }

    /// Host class of an object.
    pub fn class_of(&self, handle: ObjectHandle) -> Option<ClassId> {
        self.objects.class_of(handle)
    }

    /// How a value is named in diagnostics: objects by class, the rest by
    /// host type.
    pub fn describe(&self, value: &Dynamic) -> String {
        match value {
            Dynamic::Object(h) => match self.objects.class_of(*h) {
                Some(class) => self.classes.name(class).to_string(),
                None => "stale object".to_string(),
            },
            other => other.type_name().to_string(),
        }
    }

    /// Surface a native object to the host.
    ///
    /// The object is surfaced under its most-derived bound type. If the
    /// address already has a canonical handle, that handle is returned and no
    /// new host object is created.
    pub fn surface(
        &mut self,
        address: NativeAddress,
        declared: TypeHash,
        ownership: Ownership,
        is_const: bool,
    ) -> Result<ObjectHandle, ConversionError> {
        if let Some(existing) = self.instances.lookup(address) {
            let live = self
                .objects
                .wrapper(existing)
                .is_some_and(|w| w.address() == address);
            if live {
                trace!(%address, handle = %existing, "reused canonical handle");
                return Ok(existing);
            }
            self.instances.remove(address);
        }

        let pointee = self
            .heap
            .get_any(address)
            .ok_or_else(|| ConversionError::StaleHandle(address.to_string()))?;
        let record = self
            .types
            .figure_type(declared, pointee)
            .ok_or_else(|| ConversionError::TypeMismatch {
                expected: "a bound native type".to_string(),
                actual: self.type_name(declared),
            })?;
        let (class, descriptor) = (record.class, record.type_hash);

        let wrapper = Wrapper::new(address, descriptor, ownership, is_const);
        let handle = self.objects.allocate(class, Some(wrapper));
        if self.instances.tracks(ownership == Ownership::Host) {
            self.instances.add(address, handle);
        }
        trace!(%address, %handle, class = self.classes.name(class), "surfaced native object");
        Ok(handle)
    }

    /// Release a host object removed by the collector.
    ///
    /// Returns true if its pointee was destroyed.
    pub fn finalize(&mut self, handle: ObjectHandle, object: HostObject) -> bool {
        match object.wrapper {
            Some(wrapper) => {
                self.instances.remove_if(wrapper.address(), handle);
                wrapper.finalize(&mut self.heap)
            }
            None => false,
        }
    }

    /// Drop everything. Pointees are dropped with the heap.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.instances.clear();
        self.heap.clear();
        self.types.clear();
        self.classes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_registry::{TypeRecord, Upcast};

    #[derive(Debug, Clone, PartialEq)]
    struct Shape {
        sides: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Square {
        shape: Shape,
        len: f64,
    }

    fn store(mode: TrackingMode) -> Store {
        let mut store = Store::new(mode);
        let shape = store.classes.define("Shape", None).unwrap();
        let square = store.classes.define("Square", Some(shape)).unwrap();
        store.types.add(TypeRecord::of::<Shape>(shape, "Shape")).unwrap();
        store
            .types
            .add(
                TypeRecord::of::<Square>(square, "Square").with_upcast(Upcast::new(
                    |s: &Square| &s.shape,
                    |s: &mut Square| &mut s.shape,
                )),
            )
            .unwrap();
        store
    }

    fn square() -> Square {
        Square {
            shape: Shape { sides: 4 },
            len: 2.0,
        }
    }

    #[test]
    fn surface_uses_runtime_type() {
        let mut store = store(TrackingMode::Owned);
        let addr = store.heap.allocate(square());
        let h = store
            .surface(addr, TypeHash::of::<Shape>(), Ownership::Native, false)
            .unwrap();
        assert_eq!(store.describe(&Dynamic::Object(h)), "Square");
        assert_eq!(store.object::<Shape>(h).unwrap().sides, 4);
        assert_eq!(store.object::<Square>(h).unwrap().len, 2.0);
    }

    #[test]
    fn track_all_canonicalizes() {
        let mut store = store(TrackingMode::All);
        let addr = store.heap.allocate(square());
        let a = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Native, false)
            .unwrap();
        let b = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Native, false)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn track_off_creates_fresh_handles() {
        let mut store = store(TrackingMode::Off);
        let addr = store.heap.allocate(square());
        let a = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Host, false)
            .unwrap();
        let b = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Native, false)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn track_owned_ignores_borrowed() {
        let mut store = store(TrackingMode::Owned);
        let addr = store.heap.allocate(square());
        let a = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Native, false)
            .unwrap();
        let b = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Native, false)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn const_objects_reject_mutation() {
        let mut store = store(TrackingMode::Owned);
        let addr = store.heap.allocate(square());
        let h = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Host, true)
            .unwrap();
        assert!(matches!(
            store.object_mut::<Square>(h),
            Err(ConversionError::ConstViolation { .. })
        ));
    }

    #[test]
    fn uninitialized_object() {
        let mut store = store(TrackingMode::Owned);
        let class = store.classes.by_name("Shape").unwrap();
        let h = store.objects.allocate(class, None);
        assert_eq!(
            store.object::<Shape>(h).unwrap_err(),
            ConversionError::Uninitialized {
                class: "Shape".into()
            }
        );
    }

    #[test]
    fn finalize_removes_instance_record() {
        let mut store = store(TrackingMode::Owned);
        let addr = store.heap.allocate(square());
        let h = store
            .surface(addr, TypeHash::of::<Square>(), Ownership::Host, false)
            .unwrap();
        assert_eq!(store.instances.lookup(addr), Some(h));
        let object = store.objects.destroy(h).unwrap();
        assert!(store.finalize(h, object));
        assert_eq!(store.instances.lookup(addr), None);
        assert!(!store.heap.contains(addr));
    }
}
