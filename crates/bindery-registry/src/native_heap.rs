//! Native-side object storage.
//!
//! Native objects surfaced to the host live here, addressed by generational
//! [`NativeAddress`]es. An address that outlived its object is reported as
//! stale rather than aliasing whatever reused the slot.

use std::any::{Any, TypeId};
use std::fmt;

use bindery_core::{Arena, NativeAddress};

type NativeBox = Box<dyn Any + Send + Sync>;

/// Heap of type-erased native objects.
#[derive(Default)]
pub struct NativeHeap {
    objects: Arena<NativeBox>,
}

impl NativeHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a value onto the heap.
    pub fn allocate<T: Any + Send + Sync>(&mut self, value: T) -> NativeAddress {
        self.allocate_boxed(Box::new(value))
    }

    /// Move an already boxed value onto the heap.
    pub fn allocate_boxed(&mut self, value: NativeBox) -> NativeAddress {
        NativeAddress(self.objects.insert(value))
    }

    pub fn contains(&self, address: NativeAddress) -> bool {
        self.objects.contains(address.0)
    }

    /// The object at `address`, type-erased.
    pub fn get_any(&self, address: NativeAddress) -> Option<&dyn Any> {
        self.objects.get(address.0).map(|b| &**b as &dyn Any)
    }

    pub fn get_any_mut(&mut self, address: NativeAddress) -> Option<&mut dyn Any> {
        self.objects
            .get_mut(address.0)
            .map(|b| &mut **b as &mut dyn Any)
    }

    pub fn get<T: Any>(&self, address: NativeAddress) -> Option<&T> {
        self.get_any(address)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, address: NativeAddress) -> Option<&mut T> {
        self.get_any_mut(address)?.downcast_mut()
    }

    /// Concrete Rust type of the object at `address`.
    pub fn type_id(&self, address: NativeAddress) -> Option<TypeId> {
        self.get_any(address).map(|a| a.type_id())
    }

    /// Destroy the object at `address`. Returns false if it was already gone.
    pub fn free(&mut self, address: NativeAddress) -> bool {
        self.objects.remove(address.0).is_some()
    }

    /// Move the object out of the heap.
    ///
    /// Leaves the object in place when it is not a `T`.
    pub fn take<T: Any>(&mut self, address: NativeAddress) -> Option<T> {
        if !self.get_any(address)?.is::<T>() {
            return None;
        }
        let boxed = self.objects.remove(address.0)?;
        let any: Box<dyn Any> = boxed;
        any.downcast::<T>().ok().map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

impl fmt::Debug for NativeHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHeap")
            .field("len", &self.objects.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_read() {
        let mut heap = NativeHeap::new();
        let a = heap.allocate(42i32);
        assert_eq!(heap.get::<i32>(a), Some(&42));
        assert_eq!(heap.get::<u32>(a), None);
        assert_eq!(heap.type_id(a), Some(TypeId::of::<i32>()));
    }

    #[test]
    fn freed_address_is_stale() {
        let mut heap = NativeHeap::new();
        let a = heap.allocate(String::from("x"));
        assert!(heap.free(a));
        assert!(!heap.free(a));
        let b = heap.allocate(String::from("y"));
        // slot reused, old address still stale
        assert_eq!(a.0.index, b.0.index);
        assert!(heap.get::<String>(a).is_none());
        assert_eq!(heap.get::<String>(b).map(String::as_str), Some("y"));
    }

    #[test]
    fn mutate_in_place() {
        let mut heap = NativeHeap::new();
        let a = heap.allocate(vec![1u8]);
        heap.get_mut::<Vec<u8>>(a).unwrap().push(2);
        assert_eq!(heap.get::<Vec<u8>>(a).unwrap(), &vec![1, 2]);
    }

    #[test]
    fn take_checks_type() {
        let mut heap = NativeHeap::new();
        let a = heap.allocate(5u64);
        assert_eq!(heap.take::<i64>(a), None);
        assert!(heap.contains(a));
        assert_eq!(heap.take::<u64>(a), Some(5));
        assert!(heap.is_empty());
    }
}
