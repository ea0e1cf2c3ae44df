//! Conversion traits for typed native arguments and return values.
//!
//! - [`FromArg`]: extract a Rust value from a converted host argument and
//!   describe the parameter it came from
//! - [`IntoReturn`]: turn a Rust value into a host value
//!
//! ## Supported Types
//!
//! | Rust | host | notes |
//! |---|---|---|
//! | `i8`..`i64`, `u8`..`u32` | int | range checked |
//! | `u64` (argument only) | int | non-negative; no host form above `i64::MAX` |
//! | `f32`, `f64` | float | ints accepted with a penalty |
//! | `bool`, `String` | bool, string | |
//! | `Option<T>` | `T` or nil | |
//! | `Vec<T>` | array | elements must be scalar |
//! | [`Buffer`] | string or byte array | |
//! | [`Val<T>`] | object | cloned out of the native heap |
//! | [`ObjRef<T>`] | object | by identity |
//! | [`Owned<T>`] (return) | object | host takes ownership |
//! | [`Borrowed<T>`] (return) | object | native code keeps ownership |
//! | [`Dynamic`] | anything | unconverted |

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use bindery_core::{
    ConversionError, DataType, Dynamic, FloatKind, IntKind, NativeAddress, NativeError,
    ObjectHandle, TypeHash, TypeKind,
};
use bindery_registry::Ownership;

use crate::call_context::CallContext;
use crate::parameter::{ParamFlags, Parameter, check_float, check_int, float_to_int};
use crate::store::Store;

/// Extract a typed argument from a converted host value.
pub trait FromArg: Sized {
    /// Declared type of the parameter.
    fn data_type() -> DataType;

    /// Parameter flags implied by the Rust type.
    fn flags() -> ParamFlags {
        ParamFlags::empty()
    }

    /// Extract the value.
    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError>;

    /// The generated parameter at position `index`.
    fn parameter(index: usize) -> Parameter {
        Parameter::new(format!("arg{}", index), Self::data_type()).with_flags(Self::flags())
    }
}

/// Marker for types allowed as `Vec<T>` elements.
pub trait Element: FromArg {}

/// Convert a native return value into a host value.
pub trait IntoReturn {
    /// Declared return type.
    fn data_type() -> DataType;

    /// Convert, surfacing objects through the call context.
    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError>;
}

fn mismatch(expected: impl fmt::Display, actual: &Dynamic, store: &Store) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_string(),
        actual: store.describe(actual),
    }
}

// ============================================================================
// Integers
// ============================================================================

macro_rules! impl_int_arg {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FromArg for $ty {
                fn data_type() -> DataType {
                    DataType::int(IntKind::$kind)
                }

                fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
                    let v = match value {
                        Dynamic::Int(v) => check_int(*v as i128, IntKind::$kind)?,
                        Dynamic::Float(f) => float_to_int(*f, IntKind::$kind)?,
                        other => return Err(mismatch(stringify!($ty), other, store)),
                    };
                    Ok(v as $ty)
                }
            }

            impl Element for $ty {}
        )*
    };
}

macro_rules! impl_int_return {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl IntoReturn for $ty {
                fn data_type() -> DataType {
                    DataType::int(IntKind::$kind)
                }

                fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
                    Ok(Dynamic::Int(i64::from(self)))
                }
            }
        )*
    };
}

impl_int_arg!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

impl_int_return!(
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
);

// ============================================================================
// Floats
// ============================================================================

macro_rules! impl_float {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl FromArg for $ty {
                fn data_type() -> DataType {
                    DataType::float(FloatKind::$kind)
                }

                fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
                    match value {
                        Dynamic::Float(f) => Ok(check_float(*f, FloatKind::$kind)? as $ty),
                        Dynamic::Int(v) => Ok(*v as $ty),
                        other => Err(mismatch(stringify!($ty), other, store)),
                    }
                }
            }

            impl Element for $ty {}

            impl IntoReturn for $ty {
                fn data_type() -> DataType {
                    DataType::float(FloatKind::$kind)
                }

                fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
                    Ok(Dynamic::Float(self as f64))
                }
            }
        )*
    };
}

impl_float!(f32 => F32, f64 => F64);

// ============================================================================
// Bool, String, unit, Dynamic
// ============================================================================

impl FromArg for bool {
    fn data_type() -> DataType {
        DataType::bool()
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other, store)),
        }
    }
}

impl Element for bool {}

impl IntoReturn for bool {
    fn data_type() -> DataType {
        DataType::bool()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Bool(self))
    }
}

impl FromArg for String {
    fn data_type() -> DataType {
        DataType::string()
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(mismatch("String", other, store)),
        }
    }
}

impl Element for String {}

impl IntoReturn for String {
    fn data_type() -> DataType {
        DataType::string()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::String(self))
    }
}

impl IntoReturn for &'static str {
    fn data_type() -> DataType {
        DataType::string()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::String(self.to_string()))
    }
}

impl IntoReturn for () {
    fn data_type() -> DataType {
        DataType::void()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Nil)
    }
}

impl FromArg for Dynamic {
    fn data_type() -> DataType {
        DataType::any()
    }

    fn from_arg(value: &Dynamic, _store: &Store) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl Element for Dynamic {}

impl IntoReturn for Dynamic {
    fn data_type() -> DataType {
        DataType::any()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(self)
    }
}

// ============================================================================
// Option, Vec, Result
// ============================================================================

impl<T: FromArg> FromArg for Option<T> {
    fn data_type() -> DataType {
        if T::flags().intersects(ParamFlags::AS_ARRAY | ParamFlags::AS_BUFFER) {
            T::data_type()
        } else {
            T::data_type().with_nullable()
        }
    }

    fn flags() -> ParamFlags {
        T::flags() | ParamFlags::NULLABLE
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Nil => Ok(None),
            other => T::from_arg(other, store).map(Some),
        }
    }
}

impl<T: Element> Element for Option<T> {}

impl<R: IntoReturn> IntoReturn for Option<R> {
    fn data_type() -> DataType {
        R::data_type().with_nullable()
    }

    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        match self {
            Some(value) => value.into_return(ctx),
            None => Ok(Dynamic::Nil),
        }
    }
}

impl<T: Element> FromArg for Vec<T> {
    fn data_type() -> DataType {
        T::data_type()
    }

    fn flags() -> ParamFlags {
        ParamFlags::AS_ARRAY
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Array(items) => items.iter().map(|item| T::from_arg(item, store)).collect(),
            other => Err(mismatch(format!("Vec<{}>", T::data_type()), other, store)),
        }
    }
}

impl<R: IntoReturn> IntoReturn for Vec<R> {
    fn data_type() -> DataType {
        DataType::new(TypeKind::Any, "Array")
    }

    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        self.into_iter()
            .map(|item| item.into_return(ctx))
            .collect::<Result<Vec<_>, _>>()
            .map(Dynamic::Array)
    }
}

impl<R, E> IntoReturn for Result<R, E>
where
    R: IntoReturn,
    E: Into<NativeError>,
{
    fn data_type() -> DataType {
        R::data_type()
    }

    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        match self {
            Ok(value) => value.into_return(ctx),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Raw buffers
// ============================================================================

/// Raw bytes, passed from the host as a string or an array of bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buffer(pub Vec<u8>);

impl Buffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromArg for Buffer {
    fn data_type() -> DataType {
        DataType::int(IntKind::U8)
    }

    fn flags() -> ParamFlags {
        ParamFlags::AS_BUFFER
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::String(s) => Ok(Buffer(s.as_bytes().to_vec())),
            Dynamic::Array(items) => items
                .iter()
                .map(|item| u8::from_arg(item, store))
                .collect::<Result<Vec<_>, _>>()
                .map(Buffer),
            other => Err(mismatch("Buffer", other, store)),
        }
    }
}

impl IntoReturn for Buffer {
    fn data_type() -> DataType {
        DataType::new(TypeKind::Any, "Buffer")
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Array(
            self.0.into_iter().map(|b| Dynamic::Int(b as i64)).collect(),
        ))
    }
}

// ============================================================================
// Objects
// ============================================================================

/// An object argument, cloned out of the native heap.
#[derive(Debug, Clone, PartialEq)]
pub struct Val<T>(pub T);

impl<T> Val<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Val<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Any + Clone> FromArg for Val<T> {
    fn data_type() -> DataType {
        DataType::object::<T>().with_const()
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(handle) => store.object::<T>(*handle).map(|v| Val(v.clone())),
            Dynamic::Nil => Err(ConversionError::NullHandle {
                target_type: Self::data_type().name.to_string(),
            }),
            other => Err(mismatch(Self::data_type(), other, store)),
        }
    }
}

impl<T: Any + Clone> Element for Val<T> {}

/// A host object holding a native `T`, passed by identity.
pub struct ObjRef<T> {
    handle: ObjectHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjRef<T> {
    pub fn new(handle: ObjectHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.handle
    }
}

impl<T> Clone for ObjRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjRef<T> {}

impl<T> PartialEq for ObjRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T> fmt::Debug for ObjRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({})", self.handle)
    }
}

impl<T: Any> FromArg for ObjRef<T> {
    fn data_type() -> DataType {
        DataType::object::<T>()
    }

    fn from_arg(value: &Dynamic, store: &Store) -> Result<Self, ConversionError> {
        match value {
            Dynamic::Object(handle) => {
                store
                    .wrapper(*handle)?
                    .check(TypeHash::of::<T>(), &store.types)?;
                Ok(ObjRef::new(*handle))
            }
            Dynamic::Nil => Err(ConversionError::NullHandle {
                target_type: <Self as FromArg>::data_type().name.to_string(),
            }),
            other => Err(mismatch(<Self as FromArg>::data_type(), other, store)),
        }
    }
}

impl<T: Any> Element for ObjRef<T> {}

impl<T: Any> IntoReturn for ObjRef<T> {
    fn data_type() -> DataType {
        DataType::object::<T>()
    }

    fn into_return(self, _ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        Ok(Dynamic::Object(self.handle))
    }
}

/// A freshly created native object the host takes ownership of.
#[derive(Debug, Clone, PartialEq)]
pub struct Owned<T>(pub T);

impl<T: Any + Send + Sync> IntoReturn for Owned<T> {
    fn data_type() -> DataType {
        DataType::object::<T>()
    }

    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        ctx.surface_owned(self.0).map(Dynamic::Object)
    }
}

/// A native object that native code keeps owning.
///
/// The address must point into the runtime's native heap. The host sees the
/// object under its most-derived bound type.
pub struct Borrowed<T> {
    address: NativeAddress,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Borrowed<T> {
    pub fn new(address: NativeAddress) -> Self {
        Self {
            address,
            _marker: PhantomData,
        }
    }

    pub fn address(&self) -> NativeAddress {
        self.address
    }
}

impl<T> fmt::Debug for Borrowed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Borrowed({})", self.address)
    }
}

impl<T: Any> IntoReturn for Borrowed<T> {
    fn data_type() -> DataType {
        DataType::object::<T>()
    }

    fn into_return(self, ctx: &mut CallContext<'_>) -> Result<Dynamic, NativeError> {
        ctx.surface_address::<T>(self.address, Ownership::Native)
            .map(Dynamic::Object)
    }
}
