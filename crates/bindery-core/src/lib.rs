//! Core types shared by every bindery crate.
//!
//! - [`TypeHash`]: deterministic native type and signature identity
//! - [`Dynamic`]: the host runtime's dynamically-typed value
//! - [`DataType`]: declared native types of parameters and returns
//! - [`Convertible`]: per-parameter convertibility scores
//! - [`Arena`]: generational storage backing both heaps
//! - error enums and [`RuntimeConfig`]

pub mod arena;
pub mod config;
pub mod convertible;
pub mod data_type;
pub mod dynamic;
pub mod error;
pub mod type_hash;

pub use arena::{Arena, ArenaIndex};
pub use config::{RuntimeConfig, TrackingMode};
pub use convertible::Convertible;
pub use data_type::{DataType, FloatKind, IntKind, TypeKind, short_type_name};
pub use dynamic::{Dynamic, NativeAddress, ObjectHandle};
pub use error::{
    BinderyError, ConfigError, ConversionError, DispatchError, ErrorKind, NativeError, OverloadDiagnostic,
    RegistrationError,
};
pub use type_hash::TypeHash;
