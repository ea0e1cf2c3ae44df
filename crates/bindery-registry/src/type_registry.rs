//! Native type to host class bindings.
//!
//! The [`TypeRegistry`] is the authoritative record of which native types the
//! host runtime can see, which host class each is surfaced as, and how a
//! derived native type reaches its single base. It also remembers types that
//! were named in signatures before being bound, so missing bindings are
//! reported in one batch instead of failing at the first call.

use std::alloc::Layout;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use bindery_core::{RegistrationError, TypeHash, short_type_name};

use crate::class::ClassId;

/// Shared-reference upcast from a derived pointee to its base.
pub type UpcastRef = Arc<dyn for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any> + Send + Sync>;

/// Mutable-reference upcast from a derived pointee to its base.
pub type UpcastMut =
    Arc<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

fn cast_ref_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a dyn Any) -> Option<&'a dyn Any>,
{
    f
}

fn cast_mut_fn<F>(f: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any>,
{
    f
}

/// Link from a derived native type to its single base.
#[derive(Clone)]
pub struct Upcast {
    /// The base type.
    pub base: TypeHash,
    pub cast_ref: UpcastRef,
    pub cast_mut: UpcastMut,
}

impl Upcast {
    /// Build an upcast from a pair of field projections.
    pub fn new<D, B>(as_base: fn(&D) -> &B, as_base_mut: fn(&mut D) -> &mut B) -> Self
    where
        D: Any,
        B: Any,
    {
        let cast_ref = cast_ref_fn(move |any: &dyn Any| {
            any.downcast_ref::<D>().map(|d| as_base(d) as &dyn Any)
        });
        let cast_mut = cast_mut_fn(move |any: &mut dyn Any| {
            any.downcast_mut::<D>().map(|d| as_base_mut(d) as &mut dyn Any)
        });
        Self {
            base: TypeHash::of::<B>(),
            cast_ref: Arc::new(cast_ref),
            cast_mut: Arc::new(cast_mut),
        }
    }
}

impl fmt::Debug for Upcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upcast").field("base", &self.base).finish()
    }
}

/// One native type bound to a host class.
#[derive(Debug, Clone)]
pub struct TypeRecord {
    pub type_hash: TypeHash,
    pub type_id: TypeId,
    /// Short Rust name of the native type.
    pub name: &'static str,
    pub class: ClassId,
    /// Host class name, kept for diagnostics.
    pub class_name: String,
    pub layout: Layout,
    /// Single base type, if this type derives from another bound type.
    pub upcast: Option<Upcast>,
}

impl TypeRecord {
    /// Describe native type `T` bound to `class`.
    pub fn of<T: Any>(class: ClassId, class_name: impl Into<String>) -> Self {
        Self {
            type_hash: TypeHash::of::<T>(),
            type_id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
            class,
            class_name: class_name.into(),
            layout: Layout::new::<T>(),
            upcast: None,
        }
    }

    /// Attach the base-type link.
    pub fn with_upcast(mut self, upcast: Upcast) -> Self {
        self.upcast = Some(upcast);
        self
    }

    pub fn base(&self) -> Option<TypeHash> {
        self.upcast.as_ref().map(|u| u.base)
    }
}

/// Registry of bound native types.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    records: FxHashMap<TypeHash, TypeRecord>,
    by_type_id: FxHashMap<TypeId, TypeHash>,
    unverified: FxHashMap<TypeHash, String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a native type to a host class.
    ///
    /// Re-adding the same type under the same class is a no-op. Adding it
    /// under a different class is a [`RegistrationError::ConflictingBinding`].
    pub fn add(&mut self, record: TypeRecord) -> Result<(), RegistrationError> {
        if let Some(existing) = self.records.get(&record.type_hash) {
            if existing.class == record.class {
                return Ok(());
            }
            return Err(RegistrationError::ConflictingBinding {
                type_name: record.name.to_string(),
                existing: existing.class_name.clone(),
                requested: record.class_name,
            });
        }
        if let Some(base) = record.base()
            && !self.records.contains_key(&base)
        {
            return Err(RegistrationError::UnknownType(format!(
                "base of {} ({})",
                record.name, base
            )));
        }

        debug!(
            native = record.name,
            class = %record.class_name,
            base = ?record.base(),
            "bound native type"
        );
        self.unverified.remove(&record.type_hash);
        self.by_type_id.insert(record.type_id, record.type_hash);
        self.records.insert(record.type_hash, record);
        Ok(())
    }

    pub fn get(&self, hash: TypeHash) -> Option<&TypeRecord> {
        self.records.get(&hash)
    }

    /// The record for a Rust type id, if that type is bound.
    pub fn by_type_id(&self, id: TypeId) -> Option<&TypeRecord> {
        self.by_type_id.get(&id).and_then(|h| self.records.get(h))
    }

    pub fn is_defined(&self, hash: TypeHash) -> bool {
        self.records.contains_key(&hash)
    }

    /// Remember a type used in a signature before it was bound.
    ///
    /// Already-bound types are ignored.
    pub fn mark_unverified(&mut self, hash: TypeHash, name: &str) {
        if !self.is_defined(hash) {
            self.unverified.entry(hash).or_insert_with(|| name.to_string());
        }
    }

    /// Names of every type still awaiting a binding, sorted.
    pub fn unverified(&self) -> Vec<String> {
        let mut names: Vec<String> = self.unverified.values().cloned().collect();
        names.sort();
        names
    }

    /// Fail, naming every unverified type, if any type is still unbound.
    pub fn validate_unverified_types(&self) -> Result<(), RegistrationError> {
        if self.unverified.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError::UnverifiedTypes {
                names: self.unverified(),
            })
        }
    }

    /// Drop a binding. Only meant for resets.
    pub fn remove(&mut self, hash: TypeHash) -> Option<TypeRecord> {
        let record = self.records.remove(&hash)?;
        self.by_type_id.remove(&record.type_id);
        Some(record)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.by_type_id.clear();
        self.unverified.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn base_of(&self, hash: TypeHash) -> Option<TypeHash> {
        self.records.get(&hash).and_then(TypeRecord::base)
    }

    /// `hash` followed by its bound ancestors, most-derived first.
    pub fn ancestors(&self, hash: TypeHash) -> Vec<TypeHash> {
        let mut chain = vec![hash];
        let mut current = hash;
        while let Some(base) = self.base_of(current) {
            if chain.contains(&base) {
                break;
            }
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Number of single-base steps from `from` up to `to`.
    ///
    /// `Some(0)` when the types are equal, `None` when `to` is not an
    /// ancestor of `from`.
    pub fn upcast_depth(&self, from: TypeHash, to: TypeHash) -> Option<u32> {
        self.ancestors(from)
            .iter()
            .position(|&h| h == to)
            .map(|d| d as u32)
    }

    /// Reinterpret a pointee of type `from` as its ancestor `to`.
    pub fn upcast_ref<'a>(
        &self,
        from: TypeHash,
        to: TypeHash,
        mut value: &'a dyn Any,
    ) -> Option<&'a dyn Any> {
        let mut current = from;
        while current != to {
            let upcast = self.records.get(&current)?.upcast.as_ref()?;
            value = (upcast.cast_ref)(value)?;
            current = upcast.base;
        }
        Some(value)
    }

    /// Mutable variant of [`upcast_ref`](Self::upcast_ref).
    pub fn upcast_mut<'a>(
        &self,
        from: TypeHash,
        to: TypeHash,
        mut value: &'a mut dyn Any,
    ) -> Option<&'a mut dyn Any> {
        let mut current = from;
        while current != to {
            let upcast = self.records.get(&current)?.upcast.as_ref()?;
            value = (upcast.cast_mut)(value)?;
            current = upcast.base;
        }
        Some(value)
    }

    /// The record a runtime object should be surfaced under.
    ///
    /// `declared` is the static type the native code handed out; `value` is
    /// the object itself. When the object's concrete type is bound and derives
    /// from `declared`, its record wins, so the host sees the real class.
    pub fn figure_type(&self, declared: TypeHash, value: &dyn Any) -> Option<&TypeRecord> {
        if let Some(concrete) = self.by_type_id(value.type_id())
            && (concrete.type_hash == declared
                || self.upcast_depth(concrete.type_hash, declared).is_some()
                || !self.is_defined(declared))
        {
            return Some(concrete);
        }
        self.get(declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Base {
        id: u32,
    }

    #[derive(Debug)]
    struct Derived {
        base: Base,
        extra: u32,
    }

    #[derive(Debug)]
    struct MoreDerived {
        derived: Derived,
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.add(TypeRecord::of::<Base>(ClassId(0), "Base")).unwrap();
        reg.add(
            TypeRecord::of::<Derived>(ClassId(1), "Derived").with_upcast(Upcast::new(
                |d: &Derived| &d.base,
                |d: &mut Derived| &mut d.base,
            )),
        )
        .unwrap();
        reg.add(
            TypeRecord::of::<MoreDerived>(ClassId(2), "MoreDerived").with_upcast(Upcast::new(
                |d: &MoreDerived| &d.derived,
                |d: &mut MoreDerived| &mut d.derived,
            )),
        )
        .unwrap();
        reg
    }

    #[test]
    fn add_is_idempotent_for_same_class() {
        let mut reg = registry();
        assert!(reg.add(TypeRecord::of::<Base>(ClassId(0), "Base")).is_ok());
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn add_conflicting_class_fails() {
        let mut reg = registry();
        let err = reg
            .add(TypeRecord::of::<Base>(ClassId(9), "Other"))
            .unwrap_err();
        match err {
            RegistrationError::ConflictingBinding {
                existing,
                requested,
                ..
            } => {
                assert_eq!(existing, "Base");
                assert_eq!(requested, "Other");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn derived_requires_bound_base() {
        let mut reg = TypeRegistry::new();
        let err = reg
            .add(TypeRecord::of::<Derived>(ClassId(1), "Derived").with_upcast(Upcast::new(
                |d: &Derived| &d.base,
                |d: &mut Derived| &mut d.base,
            )))
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownType(_)));
    }

    #[test]
    fn unverified_types_are_enumerated() {
        let mut reg = TypeRegistry::new();
        reg.mark_unverified(TypeHash::from_name("Zed"), "Zed");
        reg.mark_unverified(TypeHash::from_name("Alpha"), "Alpha");
        let err = reg.validate_unverified_types().unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnverifiedTypes {
                names: vec!["Alpha".into(), "Zed".into()]
            }
        );
    }

    #[test]
    fn binding_verifies_type() {
        let mut reg = TypeRegistry::new();
        reg.mark_unverified(TypeHash::of::<Base>(), "Base");
        assert!(reg.validate_unverified_types().is_err());
        reg.add(TypeRecord::of::<Base>(ClassId(0), "Base")).unwrap();
        assert!(reg.validate_unverified_types().is_ok());

        // bound types are never marked
        reg.mark_unverified(TypeHash::of::<Base>(), "Base");
        assert!(reg.unverified().is_empty());
    }

    #[test]
    fn upcast_depths() {
        let reg = registry();
        let base = TypeHash::of::<Base>();
        let derived = TypeHash::of::<Derived>();
        let more = TypeHash::of::<MoreDerived>();
        assert_eq!(reg.upcast_depth(more, more), Some(0));
        assert_eq!(reg.upcast_depth(more, derived), Some(1));
        assert_eq!(reg.upcast_depth(more, base), Some(2));
        assert_eq!(reg.upcast_depth(base, more), None);
        assert_eq!(reg.ancestors(more), vec![more, derived, base]);
    }

    #[test]
    fn upcast_walks_chain() {
        let reg = registry();
        let mut value = MoreDerived {
            derived: Derived {
                base: Base { id: 7 },
                extra: 1,
            },
        };
        let base = reg
            .upcast_ref(
                TypeHash::of::<MoreDerived>(),
                TypeHash::of::<Base>(),
                &value,
            )
            .and_then(|a| a.downcast_ref::<Base>())
            .unwrap();
        assert_eq!(base.id, 7);

        let base = reg
            .upcast_mut(
                TypeHash::of::<MoreDerived>(),
                TypeHash::of::<Base>(),
                &mut value,
            )
            .and_then(|a| a.downcast_mut::<Base>())
            .unwrap();
        base.id = 8;
        assert_eq!(value.derived.base.id, 8);
        assert_eq!(value.derived.extra, 1);
    }

    #[test]
    fn figure_type_returns_most_derived() {
        let reg = registry();
        let boxed: Box<dyn Any> = Box::new(Derived {
            base: Base { id: 1 },
            extra: 2,
        });
        let record = reg.figure_type(TypeHash::of::<Base>(), &*boxed).unwrap();
        assert_eq!(record.type_hash, TypeHash::of::<Derived>());
        assert_eq!(record.class_name, "Derived");
    }

    #[test]
    fn figure_type_falls_back_to_declared() {
        struct Unbound;
        let reg = registry();
        let record = reg.figure_type(TypeHash::of::<Base>(), &Unbound).unwrap();
        assert_eq!(record.type_hash, TypeHash::of::<Base>());
    }

    #[test]
    fn remove_and_clear() {
        let mut reg = registry();
        assert!(reg.remove(TypeHash::of::<Base>()).is_some());
        assert!(reg.by_type_id(TypeId::of::<Base>()).is_none());
        reg.clear();
        assert!(reg.is_empty());
    }
}
