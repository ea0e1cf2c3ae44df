//! Generational arena.
//!
//! Values are stored in a `Vec` with generation tracking. When a value is
//! removed its slot is reused, but the generation is incremented, so an index
//! that outlived its value is detected instead of aliasing the new occupant.
//! Both the native heap and the host object space are built on this.

use std::fmt;

/// Index into an [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaIndex {
    /// Slot index.
    pub index: u32,
    /// Generation for use-after-free detection.
    pub generation: u32,
}

impl ArenaIndex {
    /// Create an arena index.
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ArenaIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

struct Slot<V> {
    generation: u32,
    value: Option<V>,
}

/// Slot storage with generational indices.
pub struct Arena<V> {
    slots: Vec<Slot<V>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<V> Arena<V> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, reusing a freed slot when one is available.
    pub fn insert(&mut self, value: V) -> ArenaIndex {
        self.len += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            ArenaIndex::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            ArenaIndex::new(index, 0)
        }
    }

    /// Get a value. Returns `None` for stale or unknown indices.
    pub fn get(&self, index: ArenaIndex) -> Option<&V> {
        let slot = self.slots.get(index.index as usize)?;
        if slot.generation != index.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a value mutably. Returns `None` for stale or unknown indices.
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut V> {
        let slot = self.slots.get_mut(index.index as usize)?;
        if slot.generation != index.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Check whether `index` still refers to a live value.
    pub fn contains(&self, index: ArenaIndex) -> bool {
        self.get(index).is_some()
    }

    /// Remove a value, invalidating every copy of `index`.
    pub fn remove(&mut self, index: ArenaIndex) -> Option<V> {
        let slot = self.slots.get_mut(index.index as usize)?;
        if slot.generation != index.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index.index);
        self.len -= 1;
        Some(value)
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no values are live.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over live values with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (ArenaIndex, &V)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (ArenaIndex::new(i as u32, slot.generation), v))
        })
    }

    /// Iterate mutably over live values with their indices.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ArenaIndex, &mut V)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (ArenaIndex::new(i as u32, generation), v))
        })
    }

    /// Remove every value.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_list.clear();
        self.len = 0;
    }
}

impl<V> Default for Arena<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Arena<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut arena = Arena::new();
        let idx = arena.insert(42i32);
        assert_eq!(arena.get(idx), Some(&42));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn get_mut_updates_value() {
        let mut arena = Arena::new();
        let idx = arena.insert(1i32);
        if let Some(v) = arena.get_mut(idx) {
            *v = 7;
        }
        assert_eq!(arena.get(idx), Some(&7));
    }

    #[test]
    fn removed_index_goes_stale() {
        let mut arena = Arena::new();
        let old = arena.insert(42i32);
        assert_eq!(arena.remove(old), Some(42));
        assert!(arena.get(old).is_none());

        // Slot is reused under a new generation.
        let new = arena.insert(100i32);
        assert_eq!(new.index, old.index);
        assert_ne!(new.generation, old.generation);
        assert_eq!(arena.get(new), Some(&100));
        assert!(arena.get(old).is_none());
    }

    #[test]
    fn double_remove_is_none() {
        let mut arena = Arena::new();
        let idx = arena.insert("x");
        assert!(arena.remove(idx).is_some());
        assert!(arena.remove(idx).is_none());
        assert!(arena.is_empty());
    }

    #[test]
    fn unknown_index() {
        let arena: Arena<i32> = Arena::new();
        assert!(arena.get(ArenaIndex::new(999, 0)).is_none());
        assert!(!arena.contains(ArenaIndex::new(999, 0)));
    }

    #[test]
    fn iter_skips_free_slots() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let _b = arena.insert(2);
        arena.remove(a);
        let values: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2]);
    }

    #[test]
    fn debug_output() {
        let arena: Arena<u8> = Arena::default();
        assert_eq!(
            format!("{:?}", arena),
            "Arena { slot_count: 0, free_count: 0, len: 0 }"
        );
    }
}
