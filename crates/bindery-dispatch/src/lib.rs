//! Overload resolution and invocation of native Rust functions.
//!
//! This crate provides:
//! - [`Parameter`]: scoring and authoritative conversion of host values
//! - [`Native`]: one registered overload, built raw or from typed closures
//! - [`Resolver`]: overload sets, ancestor lookup and best-candidate selection
//! - [`CallContext`]: what a native sees while it runs
//! - [`Runtime`]: the injectable context tying registries, heaps and calls together

pub mod adapters;
pub mod call_context;
pub mod convert;
pub mod director;
pub mod native;
pub mod parameter;
pub mod resolver;
pub mod runtime;
pub mod store;

pub use adapters::{IntoConstructor, IntoFunction, IntoMethod, IntoMethodMut};
pub use call_context::{Block, CallContext};
pub use convert::{Borrowed, Buffer, Element, FromArg, IntoReturn, ObjRef, Owned, Val};
pub use director::{CallDirection, CallFrame, CallStack};
pub use native::{Native, NativeCallable, NativeFn, NativeKind, Resolved, Return, ReturnSpec, Scope};
pub use parameter::{Arg, ParamFlags, Parameter};
pub use resolver::{Callee, GLOBAL_SCOPE, HostMethod, Resolver};
pub use runtime::Runtime;
pub use store::Store;
