//! Ownership-tracking container for native objects surfaced to the host.
//!
//! Every host object bound to a native object holds exactly one [`Wrapper`].
//! The wrapper records which native type the pointee was surfaced as, whether
//! the host owns it, whether the host may mutate it, and which other host
//! objects must stay alive for as long as this one does.

use std::any::Any;

use bindery_core::{ConversionError, NativeAddress, ObjectHandle, TypeHash};

use crate::native_heap::NativeHeap;
use crate::type_registry::TypeRegistry;

/// Who is responsible for destroying the pointee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Destroyed when the wrapper is finalized.
    Host,
    /// Left alone; native code manages its lifetime.
    Native,
}

/// The native binding of one host object.
#[derive(Debug, Clone, PartialEq)]
pub struct Wrapper {
    address: NativeAddress,
    descriptor: TypeHash,
    ownership: Ownership,
    is_const: bool,
    keep_alive: Vec<ObjectHandle>,
}

impl Wrapper {
    pub fn new(
        address: NativeAddress,
        descriptor: TypeHash,
        ownership: Ownership,
        is_const: bool,
    ) -> Self {
        Self {
            address,
            descriptor,
            ownership,
            is_const,
            keep_alive: Vec::new(),
        }
    }

    /// A host-owned, mutable binding.
    pub fn owned(address: NativeAddress, descriptor: TypeHash) -> Self {
        Self::new(address, descriptor, Ownership::Host, false)
    }

    /// A native-owned binding.
    pub fn borrowed(address: NativeAddress, descriptor: TypeHash, is_const: bool) -> Self {
        Self::new(address, descriptor, Ownership::Native, is_const)
    }

    pub fn address(&self) -> NativeAddress {
        self.address
    }

    /// Native type the pointee was surfaced as.
    pub fn descriptor(&self) -> TypeHash {
        self.descriptor
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owner(&self) -> bool {
        self.ownership == Ownership::Host
    }

    pub fn is_const(&self) -> bool {
        self.is_const
    }

    pub fn keep_alive(&self) -> &[ObjectHandle] {
        &self.keep_alive
    }

    /// Keep `handle` alive for as long as this wrapper is reachable.
    pub fn add_keep_alive(&mut self, handle: ObjectHandle) {
        if !self.keep_alive.contains(&handle) {
            self.keep_alive.push(handle);
        }
    }

    /// Hand the pointee to the host. Returns false if it already owned it.
    pub fn transfer_to_host(&mut self) -> bool {
        let changed = self.ownership != Ownership::Host;
        self.ownership = Ownership::Host;
        changed
    }

    /// Hand the pointee back to native code. Returns false if native code
    /// already owned it.
    pub fn transfer_to_native(&mut self) -> bool {
        let changed = self.ownership != Ownership::Native;
        self.ownership = Ownership::Native;
        changed
    }

    /// Check that the pointee may be read as `requested`.
    ///
    /// Returns the number of upcast steps needed. This is the only place a
    /// handle is allowed to be reinterpreted as another native type.
    pub fn check(&self, requested: TypeHash, types: &TypeRegistry) -> Result<u32, ConversionError> {
        types
            .upcast_depth(self.descriptor, requested)
            .ok_or_else(|| ConversionError::TypeMismatch {
                expected: type_label(types, requested),
                actual: type_label(types, self.descriptor),
            })
    }

    /// The pointee, viewed as `requested`.
    pub fn get<'h>(
        &self,
        requested: TypeHash,
        types: &TypeRegistry,
        heap: &'h NativeHeap,
    ) -> Result<&'h dyn Any, ConversionError> {
        self.check(requested, types)?;
        let pointee = heap
            .get_any(self.address)
            .ok_or_else(|| ConversionError::StaleHandle(self.address.to_string()))?;
        types
            .upcast_ref(self.descriptor, requested, pointee)
            .ok_or_else(|| ConversionError::TypeMismatch {
                expected: type_label(types, requested),
                actual: type_label(types, self.descriptor),
            })
    }

    /// The pointee, viewed mutably as `requested`.
    ///
    /// Fails for const bindings.
    pub fn get_mut<'h>(
        &self,
        requested: TypeHash,
        types: &TypeRegistry,
        heap: &'h mut NativeHeap,
    ) -> Result<&'h mut dyn Any, ConversionError> {
        self.check(requested, types)?;
        if self.is_const {
            return Err(ConversionError::ConstViolation {
                target_type: type_label(types, requested),
            });
        }
        let pointee = heap
            .get_any_mut(self.address)
            .ok_or_else(|| ConversionError::StaleHandle(self.address.to_string()))?;
        types
            .upcast_mut(self.descriptor, requested, pointee)
            .ok_or_else(|| ConversionError::TypeMismatch {
                expected: type_label(types, requested),
                actual: type_label(types, self.descriptor),
            })
    }

    /// Release the binding, destroying the pointee if the host owns it.
    ///
    /// Returns true if the pointee was destroyed.
    pub fn finalize(self, heap: &mut NativeHeap) -> bool {
        match self.ownership {
            Ownership::Host => heap.free(self.address),
            Ownership::Native => false,
        }
    }
}

fn type_label(types: &TypeRegistry, hash: TypeHash) -> String {
    types
        .get(hash)
        .map(|r| r.name.to_string())
        .unwrap_or_else(|| hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassId;
    use crate::type_registry::{TypeRecord, Upcast};
    use bindery_core::ArenaIndex;

    struct Animal {
        legs: u32,
    }

    struct Dog {
        animal: Animal,
    }

    struct Rock;

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types
            .add(TypeRecord::of::<Animal>(ClassId(0), "Animal"))
            .unwrap();
        types
            .add(
                TypeRecord::of::<Dog>(ClassId(1), "Dog").with_upcast(Upcast::new(
                    |d: &Dog| &d.animal,
                    |d: &mut Dog| &mut d.animal,
                )),
            )
            .unwrap();
        types.add(TypeRecord::of::<Rock>(ClassId(2), "Rock")).unwrap();
        types
    }

    #[test]
    fn get_as_ancestor() {
        let types = types();
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Dog {
            animal: Animal { legs: 4 },
        });
        let wrapper = Wrapper::owned(addr, TypeHash::of::<Dog>());

        let animal = wrapper
            .get(TypeHash::of::<Animal>(), &types, &heap)
            .unwrap()
            .downcast_ref::<Animal>()
            .unwrap();
        assert_eq!(animal.legs, 4);
        assert_eq!(wrapper.check(TypeHash::of::<Animal>(), &types), Ok(1));
    }

    #[test]
    fn get_as_unrelated_type_fails() {
        let types = types();
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Rock);
        let wrapper = Wrapper::owned(addr, TypeHash::of::<Rock>());
        let err = wrapper
            .get(TypeHash::of::<Dog>(), &types, &heap)
            .unwrap_err();
        assert_eq!(
            err,
            ConversionError::TypeMismatch {
                expected: "Dog".into(),
                actual: "Rock".into()
            }
        );
    }

    #[test]
    fn base_cannot_be_read_as_derived() {
        let types = types();
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Animal { legs: 2 });
        let wrapper = Wrapper::owned(addr, TypeHash::of::<Animal>());
        assert!(wrapper.check(TypeHash::of::<Dog>(), &types).is_err());
    }

    #[test]
    fn const_wrapper_rejects_mutation() {
        let types = types();
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Animal { legs: 2 });
        let wrapper = Wrapper::borrowed(addr, TypeHash::of::<Animal>(), true);
        let err = wrapper
            .get_mut(TypeHash::of::<Animal>(), &types, &mut heap)
            .unwrap_err();
        assert!(matches!(err, ConversionError::ConstViolation { .. }));
        assert!(wrapper.get(TypeHash::of::<Animal>(), &types, &heap).is_ok());
    }

    #[test]
    fn stale_pointee() {
        let types = types();
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Rock);
        heap.free(addr);
        let wrapper = Wrapper::borrowed(addr, TypeHash::of::<Rock>(), false);
        let err = wrapper
            .get(TypeHash::of::<Rock>(), &types, &heap)
            .unwrap_err();
        assert!(matches!(err, ConversionError::StaleHandle(_)));
    }

    #[test]
    fn non_owner_finalize_keeps_pointee() {
        let mut heap = NativeHeap::new();
        let addr = heap.allocate(Rock);
        let wrapper = Wrapper::borrowed(addr, TypeHash::of::<Rock>(), false);
        assert!(!wrapper.finalize(&mut heap));
        assert!(heap.contains(addr));

        let wrapper = Wrapper::owned(addr, TypeHash::of::<Rock>());
        assert!(wrapper.finalize(&mut heap));
        assert!(!heap.contains(addr));
    }

    #[test]
    fn ownership_transfer_is_explicit() {
        let addr = NativeAddress(ArenaIndex::new(0, 0));
        let mut wrapper = Wrapper::borrowed(addr, TypeHash::of::<Rock>(), false);
        assert!(!wrapper.is_owner());
        assert!(wrapper.transfer_to_host());
        assert!(!wrapper.transfer_to_host());
        assert!(wrapper.is_owner());
        assert!(wrapper.transfer_to_native());
        assert_eq!(wrapper.ownership(), Ownership::Native);
    }

    #[test]
    fn keep_alive_is_ordered_and_unique() {
        let addr = NativeAddress(ArenaIndex::new(0, 0));
        let mut wrapper = Wrapper::owned(addr, TypeHash::of::<Rock>());
        let a = ObjectHandle(ArenaIndex::new(1, 0));
        let b = ObjectHandle(ArenaIndex::new(2, 0));
        wrapper.add_keep_alive(b);
        wrapper.add_keep_alive(a);
        wrapper.add_keep_alive(b);
        assert_eq!(wrapper.keep_alive(), &[b, a]);
    }
}
