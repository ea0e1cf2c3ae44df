//! Declared native types of parameters and return values.

use std::fmt;

use crate::TypeHash;

/// Native integer widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntKind {
    /// Whether the native integer is signed.
    pub fn is_signed(self) -> bool {
        matches!(self, IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64)
    }

    /// Smallest value representable, widened to i128.
    pub fn min(self) -> i128 {
        match self {
            IntKind::I8 => i8::MIN as i128,
            IntKind::I16 => i16::MIN as i128,
            IntKind::I32 => i32::MIN as i128,
            IntKind::I64 => i64::MIN as i128,
            IntKind::U8 | IntKind::U16 | IntKind::U32 | IntKind::U64 => 0,
        }
    }

    /// Largest value representable, widened to i128.
    pub fn max(self) -> i128 {
        match self {
            IntKind::I8 => i8::MAX as i128,
            IntKind::I16 => i16::MAX as i128,
            IntKind::I32 => i32::MAX as i128,
            IntKind::I64 => i64::MAX as i128,
            IntKind::U8 => u8::MAX as i128,
            IntKind::U16 => u16::MAX as i128,
            IntKind::U32 => u32::MAX as i128,
            IntKind::U64 => u64::MAX as i128,
        }
    }

    /// Rust spelling of the type.
    pub fn name(self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
        }
    }
}

/// Native floating point widths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

impl FloatKind {
    /// Rust spelling of the type.
    pub fn name(self) -> &'static str {
        match self {
            FloatKind::F32 => "f32",
            FloatKind::F64 => "f64",
        }
    }
}

/// Shape of a declared native type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value (return type only).
    Void,
    Bool,
    Int(IntKind),
    Float(FloatKind),
    String,
    /// A bound native class, identified by its type hash.
    Object(TypeHash),
    /// Accepts any host value unconverted.
    Any,
}

/// A declared native type as seen by a parameter or return handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataType {
    /// Type shape.
    pub kind: TypeKind,
    /// Display name (the Rust type name for objects).
    pub name: &'static str,
    /// Declared `const` (shared borrow of an object).
    pub is_const: bool,
    /// Accepts `nil`.
    pub nullable: bool,
}

impl DataType {
    /// Create a data type with default qualifiers.
    pub const fn new(kind: TypeKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            is_const: false,
            nullable: false,
        }
    }

    pub const fn void() -> Self {
        Self::new(TypeKind::Void, "()")
    }

    pub const fn bool() -> Self {
        Self::new(TypeKind::Bool, "bool")
    }

    pub const fn string() -> Self {
        Self::new(TypeKind::String, "String")
    }

    pub const fn any() -> Self {
        Self::new(TypeKind::Any, "Dynamic")
    }

    pub fn int(kind: IntKind) -> Self {
        Self::new(TypeKind::Int(kind), kind.name())
    }

    pub fn float(kind: FloatKind) -> Self {
        Self::new(TypeKind::Float(kind), kind.name())
    }

    /// An object of native type `T`.
    pub fn object<T: ?Sized>() -> Self {
        Self::new(
            TypeKind::Object(TypeHash::of::<T>()),
            short_type_name(std::any::type_name::<T>()),
        )
    }

    /// Mark as const.
    pub const fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Mark as accepting nil.
    pub const fn with_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Hash identifying this type inside an overload signature.
    pub fn signature_hash(&self) -> TypeHash {
        let base = match self.kind {
            TypeKind::Object(hash) => hash,
            _ => TypeHash::from_name(self.name),
        };
        let quals = (self.is_const as u64) | ((self.nullable as u64) << 1);
        TypeHash(base.0.rotate_left(7) ^ quals)
    }

    /// The object type hash, if this is an object type.
    pub fn object_hash(&self) -> Option<TypeHash> {
        match self.kind {
            TypeKind::Object(hash) => Some(hash),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_const {
            write!(f, "const ")?;
        }
        write!(f, "{}", self.name)?;
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}

/// Strip module paths from a Rust type name, keeping generic arguments.
///
/// `my_crate::shapes::Circle` becomes `Circle`.
pub fn short_type_name(full: &'static str) -> &'static str {
    let head_end = full.find('<').unwrap_or(full.len());
    match full[..head_end].rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn int_bounds() {
        assert_eq!(IntKind::I8.min(), -128);
        assert_eq!(IntKind::U8.max(), 255);
        assert_eq!(IntKind::U64.max(), u64::MAX as i128);
        assert!(IntKind::I32.is_signed());
        assert!(!IntKind::U32.is_signed());
    }

    #[test]
    fn object_names_are_short() {
        let dt = DataType::object::<Widget>();
        assert_eq!(dt.name, "Widget");
        assert_eq!(dt.object_hash(), Some(TypeHash::of::<Widget>()));
    }

    #[test]
    fn display_qualifiers() {
        let dt = DataType::object::<Widget>().with_const().with_nullable();
        assert_eq!(dt.to_string(), "const Widget?");
        assert_eq!(DataType::int(IntKind::I64).to_string(), "i64");
    }

    #[test]
    fn signature_hash_tracks_qualifiers() {
        let plain = DataType::object::<Widget>();
        assert_ne!(plain.signature_hash(), plain.with_const().signature_hash());
        assert_ne!(
            DataType::int(IntKind::I32).signature_hash(),
            DataType::float(FloatKind::F64).signature_hash()
        );
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("a::b::C"), "C");
        assert_eq!(short_type_name("i64"), "i64");
        assert_eq!(short_type_name("alloc::vec::Vec<a::B>"), "Vec<a::B>");
    }
}
