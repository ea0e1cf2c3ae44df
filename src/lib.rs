//! Bindery: overload resolution and dispatch of native Rust functions for a
//! dynamically-typed host runtime.
//!
//! The host holds values of type [`Dynamic`] with no static type information.
//! Natives are registered with typed signatures; each call scores every
//! candidate against the supplied values, picks the best one, converts the
//! arguments authoritatively and surfaces the result back as a [`Dynamic`].
//!
//! ```
//! use bindery::prelude::*;
//!
//! #[derive(Clone)]
//! struct Point {
//!     x: f64,
//!     y: f64,
//! }
//!
//! let mut runtime = Runtime::new();
//! let point = runtime.bind_type::<Point>("Point").unwrap();
//! runtime
//!     .register_native(Native::constructor(|x: f64, y: f64| Point { x, y }))
//!     .unwrap();
//! runtime
//!     .register_native(Native::method("norm", |p: &Point| p.x.hypot(p.y)))
//!     .unwrap();
//!
//! let p = runtime
//!     .instantiate(point, &[Dynamic::Int(3), Dynamic::Int(4)])
//!     .unwrap();
//! assert_eq!(runtime.call_method(p, "norm", &[]).unwrap(), Dynamic::Float(5.0));
//! ```

pub use bindery_core::{
    Arena, ArenaIndex, BinderyError, ConfigError, ConversionError, Convertible, DataType, DispatchError,
    Dynamic, ErrorKind, FloatKind, IntKind, NativeAddress, NativeError, ObjectHandle,
    OverloadDiagnostic, RegistrationError, RuntimeConfig, TrackingMode, TypeHash, TypeKind,
};
pub use bindery_dispatch::{
    Arg, Block, Borrowed, Buffer, CallContext, CallDirection, CallFrame, CallStack, Callee,
    Element, FromArg, HostMethod, IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut,
    IntoReturn, Native, NativeCallable, NativeFn, NativeKind, ObjRef, Owned, ParamFlags,
    Parameter, Resolved, Resolver, Return, ReturnSpec, Runtime, Scope, Store, Val,
};
pub use bindery_registry::{
    ClassId, ClassTable, HostClass, HostObject, InstanceRecord, InstanceRegistry, NativeHeap,
    ObjectSpace, Ownership, TypeRecord, TypeRegistry, Upcast, Wrapper,
};

/// Result alias for fallible runtime operations.
pub type Result<T, E = BinderyError> = std::result::Result<T, E>;

/// The types needed to bind and call natives.
pub mod prelude {
    pub use crate::{
        Arg, BinderyError, CallContext, ClassId, DispatchError, Dynamic, ErrorKind, Native,
        NativeError, ObjRef, ObjectHandle, Owned, Ownership, RegistrationError, Return,
        Runtime, RuntimeConfig, TrackingMode, Val,
    };
}
