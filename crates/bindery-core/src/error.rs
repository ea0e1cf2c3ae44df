//! Unified error types.
//!
//! ## Error Hierarchy
//!
//! ```text
//! BinderyError (top-level wrapper)
//! ├── ConfigError       - invalid configuration values
//! ├── RegistrationError - binding and overload registration errors
//! └── DispatchError     - resolution and invocation errors
//!     ├── ConversionError - one value failed to convert
//!     └── NativeError     - raised by a native callable
//! ```
//!
//! Scoring never produces an error: a value that cannot convert simply scores
//! `Convertible::NONE`. Errors are raised only by registration, by the
//! authoritative conversion pass after an overload was selected, and by the
//! native callable itself.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors raised while parsing configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Not one of `off`, `owned` or `all`.
    #[error("unknown tracking mode '{0}', expected off, owned or all")]
    UnknownTrackingMode(String),
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while binding types and registering natives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A native type is already bound to a different host class.
    #[error("native type '{type_name}' is already bound to class '{existing}', cannot rebind to '{requested}'")]
    ConflictingBinding {
        /// The native type.
        type_name: String,
        /// Host class it is bound to.
        existing: String,
        /// Host class the new binding asked for.
        requested: String,
    },

    /// An overload with an identical signature already exists in this scope.
    #[error("duplicate overload: {scope}#{name}({signature}) is already registered")]
    DuplicateOverload {
        /// Declaring scope (class name or `<global>`).
        scope: String,
        /// Method name.
        name: String,
        /// Rendered parameter list.
        signature: String,
    },

    /// Types referenced by registered signatures were never bound.
    #[error("types used in signatures were never bound: {}", names.join(", "))]
    UnverifiedTypes {
        /// Every still-unverified type.
        names: Vec<String>,
    },

    /// Parameter defaults do not form a trailing suffix.
    #[error("'{name}': parameter '{param}' has no default but follows a defaulted parameter")]
    InvalidDefaults {
        /// Native name.
        name: String,
        /// The offending parameter.
        param: String,
    },

    /// A default value does not convert to its parameter type.
    #[error("'{name}': default for parameter '{param}' is not a valid {expected}")]
    InvalidDefault {
        /// Native name.
        name: String,
        /// The offending parameter.
        param: String,
        /// Declared type.
        expected: String,
    },

    /// A keep-alive parameter has nothing to attach to.
    #[error("'{name}': keep-alive parameter '{param}' needs a receiver or an object return")]
    KeepAliveWithoutOwner {
        /// Native name.
        name: String,
        /// The offending parameter.
        param: String,
    },

    /// The declared return type has no host representation.
    #[error("'{name}': {return_type} cannot be returned to the host, values above i64::MAX have no host representation")]
    UnsupportedReturn {
        /// Native name.
        name: String,
        /// Declared return type.
        return_type: String,
    },

    /// A referenced native type is not bound.
    #[error("native type not bound: {0}")]
    UnknownType(String),

    /// A referenced host class does not exist.
    #[error("unknown class: {0}")]
    UnknownClass(String),
}

// ============================================================================
// Conversion Errors
// ============================================================================

/// A single host value failed to convert to a native type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has the wrong host type.
    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        /// Declared native type.
        expected: String,
        /// Host type of the value.
        actual: String,
    },

    /// An integer does not fit the native integer type.
    #[error("integer overflow: {value} doesn't fit in {target_type}")]
    IntegerOverflow {
        /// The value.
        value: i128,
        /// Native integer type.
        target_type: &'static str,
    },

    /// A float cannot be represented in the native type.
    #[error("float {value} cannot be converted to {target_type}")]
    FloatConversion {
        /// The value.
        value: f64,
        /// Native type.
        target_type: &'static str,
    },

    /// `nil` passed where an object is required.
    #[error("nil cannot be converted to {target_type}")]
    NullHandle {
        /// Declared native type.
        target_type: String,
    },

    /// The handle or address outlived its object.
    #[error("stale handle: {0} has been freed")]
    StaleHandle(String),

    /// A const object was used where mutable access is required.
    #[error("cannot convert const {target_type} to a mutable reference")]
    ConstViolation {
        /// Native type.
        target_type: String,
    },

    /// The host object has no native object bound to it.
    #[error("object of class {class} has no native binding")]
    Uninitialized {
        /// Host class name.
        class: String,
    },
}

// ============================================================================
// Native Errors
// ============================================================================

/// Errors raised from inside a native callable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Argument conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Argument index out of range.
    #[error("argument index {index} out of bounds (argument count: {count})")]
    ArgumentIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of arguments.
        count: usize,
    },

    /// The receiver is missing or of the wrong type.
    #[error("invalid receiver: {message}")]
    InvalidThis {
        /// What went wrong.
        message: String,
    },

    /// A re-entrant call into the host failed.
    #[error(transparent)]
    Dispatch(Box<DispatchError>),

    /// Any other failure reported by native code.
    #[error("{0}")]
    Other(String),
}

impl NativeError {
    /// Shorthand for [`NativeError::InvalidThis`].
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Shorthand for [`NativeError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other(message.into())
    }
}

impl From<DispatchError> for NativeError {
    fn from(err: DispatchError) -> Self {
        NativeError::Dispatch(Box::new(err))
    }
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Diagnostic listing every candidate of an unresolved call.
///
/// Renders as a header line naming the receiver type and method followed by
/// one line per candidate, in registration order:
///
/// ```text
/// no overload of Point#scale accepts (string)
///   Point Point#scale(f64 factor)
///   Point Point#scale(i64 x, i64 y)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadDiagnostic {
    /// Receiver class name (`<global>` for free functions).
    pub receiver: String,
    /// Called method name.
    pub method: String,
    /// Host types of the supplied arguments.
    pub arguments: Vec<String>,
    /// One rendered signature per candidate.
    pub candidates: Vec<String>,
}

impl fmt::Display for OverloadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no overload of {}#{} accepts ({})",
            self.receiver,
            self.method,
            self.arguments.join(", ")
        )?;
        for candidate in &self.candidates {
            write!(f, "\n  {}", candidate)?;
        }
        Ok(())
    }
}

/// Errors raised by resolution and invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    /// Candidates exist, but none accepts the argument types.
    #[error("{0}")]
    NoMatchingOverload(OverloadDiagnostic),

    /// No candidate accepts the argument count.
    #[error("wrong number of arguments (given {given}): {diagnostic}")]
    ArityMismatch {
        /// Supplied argument count.
        given: usize,
        /// Every candidate.
        diagnostic: OverloadDiagnostic,
    },

    /// Nothing named `method` is defined for the receiver.
    #[error("undefined method '{method}' for {receiver}")]
    UndefinedMethod {
        /// Receiver class name.
        receiver: String,
        /// Method name.
        method: String,
    },

    /// The receiver has no usable native binding.
    #[error("invalid receiver for {class}#{method}: {reason}")]
    InvalidReceiver {
        /// Receiver class name.
        class: String,
        /// Method name.
        method: String,
        /// Why the receiver is unusable.
        reason: String,
    },

    /// An argument of the selected overload failed its conversion.
    #[error("{method}: argument {position} ('{param}') expected {expected}, got {actual}: {source}")]
    Conversion {
        /// Method name.
        method: String,
        /// Zero-based argument position.
        position: usize,
        /// Parameter name.
        param: String,
        /// Declared parameter type.
        expected: String,
        /// Host type of the argument.
        actual: String,
        /// Underlying conversion failure.
        source: ConversionError,
    },

    /// The native callable returned an error.
    #[error("{method}: {source}")]
    Native {
        /// Method name.
        method: String,
        /// The native error.
        source: NativeError,
    },

    /// The native callable panicked.
    #[error("{method}: native function panicked: {message}")]
    NativePanic {
        /// Method name.
        method: String,
        /// Panic payload.
        message: String,
    },

    /// A host-defined method or block raised.
    #[error("{0}")]
    Host(String),

    /// Lazy type validation failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Error categories surfaced to the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong argument type (or no method accepting it).
    TypeMismatch,
    /// Wrong argument count.
    ArityMismatch,
    /// Nil or uninitialized native binding.
    InvalidReceiver,
    /// Conflicting registration or unbound types.
    InternalInvariant,
    /// Raised by native code.
    Native,
    /// Raised by host code.
    Host,
}

/// The unified error type for all operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BinderyError {
    /// A configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A registration error.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A dispatch error.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl BinderyError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BinderyError::Config(_) | BinderyError::Registration(_) => {
                ErrorKind::InternalInvariant
            }
            BinderyError::Dispatch(err) => err.kind(),
        }
    }
}

impl DispatchError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::NoMatchingOverload(_)
            | DispatchError::UndefinedMethod { .. }
            | DispatchError::Conversion { .. } => ErrorKind::TypeMismatch,
            DispatchError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            DispatchError::InvalidReceiver { .. } => ErrorKind::InvalidReceiver,
            DispatchError::Native { .. } | DispatchError::NativePanic { .. } => ErrorKind::Native,
            DispatchError::Host(_) => ErrorKind::Host,
            DispatchError::Registration(_) => ErrorKind::InternalInvariant,
        }
    }

    /// The candidate diagnostic, for resolution failures.
    pub fn diagnostic(&self) -> Option<&OverloadDiagnostic> {
        match self {
            DispatchError::NoMatchingOverload(d) => Some(d),
            DispatchError::ArityMismatch { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
