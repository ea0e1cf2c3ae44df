//! Deterministic hash-based native type identity.
//!
//! [`TypeHash`] is a 64-bit hash that identifies native types and overload
//! signatures. Hashes are computed from names, so a type can be referenced in a
//! signature before it is bound to a host class (forward use), and the same
//! native type always produces the same hash no matter when it is registered.
//!
//! # Examples
//!
//! ```
//! use bindery_core::TypeHash;
//!
//! let a = TypeHash::from_name("Point");
//! assert_eq!(a, TypeHash::from_name("Point"));
//!
//! let f1 = TypeHash::from_method(Some(a), "scale", &[TypeHash::of::<i64>()]);
//! let f2 = TypeHash::from_method(Some(a), "scale", &[TypeHash::of::<f64>()]);
//! assert_ne!(f1, f2);
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants.
///
/// Types and signatures that share a name still hash differently.
pub mod hash_constants {
    /// Separator constant for chaining components.
    pub const SEP: u64 = 0x4bc94d6bd06053ad;

    /// Domain marker for type hashes.
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;

    /// Domain marker for free function signatures.
    pub const FUNCTION: u64 = 0x5ea77ffbcdf5f302;

    /// Domain marker for method signatures.
    pub const METHOD: u64 = 0x7d3c8b4a92e15f6d;

    /// Parameter position mixing constants, so parameter order matters.
    pub const PARAM_MARKERS: [u64; 16] = [
        0x9e3779b97f4a7c15,
        0xbf58476d1ce4e5b9,
        0x94d049bb133111eb,
        0xd6e8feb86659fd93,
        0xe7037ed1a0b428db,
        0xc6a4a7935bd1e995,
        0x8648dbbc94d49b8d,
        0xa2b48b2c69e0d657,
        0x7c3e9f2a5b8d1403,
        0x5d8c7b4a3e9f2106,
        0x3f1e9d8c7b5a4203,
        0x1a2b3c4d5e6f7089,
        0x9f8e7d6c5b4a3210,
        0x2468ace013579bdf,
        0xfdb97531eca86420,
        0x123456789abcdef0,
    ];
}

/// A deterministic 64-bit hash identifying a native type or an overload signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Hash a type by name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Hash the Rust type `T` by its full type name.
    #[inline]
    pub fn of<T: ?Sized>() -> Self {
        Self::from_name(std::any::type_name::<T>())
    }

    /// Hash an overload signature.
    ///
    /// `owner` is the declaring native type, `None` for free functions.
    /// Parameter order matters: `(i64, f64)` and `(f64, i64)` differ.
    #[inline]
    pub fn from_method(owner: Option<TypeHash>, name: &str, param_hashes: &[TypeHash]) -> Self {
        let mut hash = match owner {
            Some(owner) => hash_constants::METHOD ^ owner.0,
            None => hash_constants::FUNCTION,
        } ^ xxh64(name.as_bytes(), 0);
        for (i, param) in param_hashes.iter().enumerate() {
            let marker = hash_constants::PARAM_MARKERS
                .get(i)
                .copied()
                .unwrap_or_else(|| hash_constants::PARAM_MARKERS[0].wrapping_add(i as u64));
            hash = hash.wrapping_mul(hash_constants::SEP).wrapping_add(marker ^ param.0);
        }
        TypeHash(hash)
    }

    /// Returns true if this is the empty hash.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl Default for TypeHash {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_is_deterministic() {
        assert_eq!(TypeHash::from_name("Point"), TypeHash::from_name("Point"));
        assert_ne!(TypeHash::from_name("Point"), TypeHash::from_name("Vector"));
    }

    #[test]
    fn of_matches_type_name() {
        assert_eq!(
            TypeHash::of::<i64>(),
            TypeHash::from_name(std::any::type_name::<i64>())
        );
        assert_ne!(TypeHash::of::<i64>(), TypeHash::of::<i32>());
    }

    #[test]
    fn parameter_order_matters() {
        let i = TypeHash::of::<i64>();
        let f = TypeHash::of::<f64>();
        assert_ne!(
            TypeHash::from_method(None, "f", &[i, f]),
            TypeHash::from_method(None, "f", &[f, i])
        );
    }

    #[test]
    fn owner_distinguishes_methods_from_functions() {
        let owner = TypeHash::from_name("Point");
        assert_ne!(
            TypeHash::from_method(Some(owner), "len", &[]),
            TypeHash::from_method(None, "len", &[])
        );
    }

    #[test]
    fn many_parameters_still_hash() {
        let params = vec![TypeHash::of::<i64>(); 20];
        let a = TypeHash::from_method(None, "wide", &params);
        let b = TypeHash::from_method(None, "wide", &params[..19]);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_hash() {
        assert!(TypeHash::EMPTY.is_empty());
        assert!(TypeHash::default().is_empty());
        assert!(!TypeHash::from_name("x").is_empty());
    }
}
