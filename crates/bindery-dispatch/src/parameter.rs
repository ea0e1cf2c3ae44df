//! Formal parameters of native overloads.
//!
//! A [`Parameter`] knows its declared [`DataType`] and a handful of flags. It
//! answers two questions about a host value:
//!
//! - [`matches`](Parameter::matches): how well does it fit? A pure probe used
//!   while scoring overloads. It never fails, it only scores
//!   [`Convertible::NONE`].
//! - [`convert`](Parameter::convert): the authoritative conversion, run once
//!   an overload was selected. It normalizes the value to the exact host
//!   representation of the declared type and may fail where `matches` was
//!   optimistic (integer range, stale objects).
//!
//! ## Scoring
//!
//! | host value | declared type | score |
//! |---|---|---|
//! | same kind | same kind | `EXACT` |
//! | int | float | `INT_TO_FLOAT` |
//! | float | int | `FLOAT_TO_INT` |
//! | int | unsigned int | `SIGNED_TO_UNSIGNED` |
//! | mutable object | const object | `CONST_MISMATCH` |
//! | derived object | ancestor object | `upcast(depth)` |
//! | nil | nullable | `EXACT` |
//! | anything | `Any` | `EXACT` |
//! | array | `AS_ARRAY` of a type | worst element score |

use std::fmt;

use bitflags::bitflags;

use bindery_core::{
    ConversionError, Convertible, DataType, Dynamic, FloatKind, IntKind, TypeHash, TypeKind,
};

use crate::store::Store;

bitflags! {
    /// Parameter handling flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParamFlags: u8 {
        /// The native side takes ownership of the passed object.
        const TRANSFER_OWNERSHIP = 1 << 0;
        /// The receiver keeps the passed object alive.
        const KEEP_ALIVE = 1 << 1;
        /// The host passes an array; `data_type` describes its elements.
        const AS_ARRAY = 1 << 2;
        /// The host passes raw bytes (a string or an array of bytes).
        const AS_BUFFER = 1 << 3;
        /// `nil` is accepted in place of the whole value.
        const NULLABLE = 1 << 4;
    }
}

/// One formal parameter of a native overload.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub data_type: DataType,
    pub flags: ParamFlags,
    /// Value used when the argument is omitted.
    pub default: Option<Dynamic>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            flags: ParamFlags::empty(),
            default: None,
        }
    }

    pub fn with_flags(mut self, flags: ParamFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_default(mut self, value: impl Into<Dynamic>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Hash of the parameter's declared shape inside a signature.
    pub fn signature_hash(&self) -> TypeHash {
        let shape = self.flags & (ParamFlags::AS_ARRAY | ParamFlags::AS_BUFFER | ParamFlags::NULLABLE);
        let base = self.data_type.signature_hash();
        TypeHash(base.0 ^ ((shape.bits() as u64) << 56))
    }

    /// Declared type as shown in diagnostics.
    pub fn type_label(&self) -> String {
        let inner = if self.flags.contains(ParamFlags::AS_BUFFER) {
            "Buffer".to_string()
        } else if self.flags.contains(ParamFlags::AS_ARRAY) {
            format!("Vec<{}>", self.data_type)
        } else {
            self.data_type.to_string()
        };
        if self.flags.contains(ParamFlags::NULLABLE) && !inner.ends_with('?') {
            format!("{}?", inner)
        } else {
            inner
        }
    }

    /// Score how well `value` fits this parameter.
    pub fn matches(&self, value: &Dynamic, store: &Store) -> Convertible {
        if value.is_nil() && self.flags.contains(ParamFlags::NULLABLE) {
            return Convertible::EXACT;
        }
        if self.flags.contains(ParamFlags::AS_BUFFER) {
            return match value {
                Dynamic::String(_) => Convertible::EXACT,
                Dynamic::Array(items) if items.iter().all(is_byte) => Convertible::EXACT,
                _ => Convertible::NONE,
            };
        }
        if self.flags.contains(ParamFlags::AS_ARRAY) {
            return match value {
                Dynamic::Array(items) => Convertible::worst(
                    items.iter().map(|item| score_value(&self.data_type, item, store)),
                ),
                _ => Convertible::NONE,
            };
        }
        score_value(&self.data_type, value, store)
    }

    /// Convert `value` to the host representation of the declared type.
    pub fn convert(&self, value: &Dynamic, store: &Store) -> Result<Dynamic, ConversionError> {
        if value.is_nil() && self.flags.contains(ParamFlags::NULLABLE) {
            return Ok(Dynamic::Nil);
        }
        if self.flags.contains(ParamFlags::AS_BUFFER) {
            return match value {
                Dynamic::String(s) => Ok(Dynamic::String(s.clone())),
                Dynamic::Array(items) => items
                    .iter()
                    .map(|item| convert_value(&DataType::int(IntKind::U8), item, store))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Dynamic::Array),
                other => Err(self.mismatch(other, store)),
            };
        }
        if self.flags.contains(ParamFlags::AS_ARRAY) {
            return match value {
                Dynamic::Array(items) => items
                    .iter()
                    .map(|item| convert_value(&self.data_type, item, store))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Dynamic::Array),
                other => Err(self.mismatch(other, store)),
            };
        }
        convert_value(&self.data_type, value, store)
    }

    fn mismatch(&self, value: &Dynamic, store: &Store) -> ConversionError {
        ConversionError::TypeMismatch {
            expected: self.type_label(),
            actual: store.describe(value),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_label(), self.name)?;
        if let Some(default) = &self.default {
            write!(f, " = {:?}", default)?;
        }
        Ok(())
    }
}

fn is_byte(value: &Dynamic) -> bool {
    matches!(value, Dynamic::Int(v) if (0..=255).contains(v))
}

/// Score a single (non-array) value against a declared type.
pub fn score_value(data_type: &DataType, value: &Dynamic, store: &Store) -> Convertible {
    match (data_type.kind, value) {
        (TypeKind::Any, _) => Convertible::EXACT,
        (_, Dynamic::Nil) if data_type.nullable => Convertible::EXACT,
        (TypeKind::Bool, Dynamic::Bool(_)) => Convertible::EXACT,
        (TypeKind::Int(kind), Dynamic::Int(_)) if kind.is_signed() => Convertible::EXACT,
        (TypeKind::Int(_), Dynamic::Int(_)) => Convertible::SIGNED_TO_UNSIGNED,
        (TypeKind::Int(_), Dynamic::Float(_)) => Convertible::FLOAT_TO_INT,
        (TypeKind::Float(_), Dynamic::Float(_)) => Convertible::EXACT,
        (TypeKind::Float(_), Dynamic::Int(_)) => Convertible::INT_TO_FLOAT,
        (TypeKind::String, Dynamic::String(_)) => Convertible::EXACT,
        (TypeKind::Object(hash), Dynamic::Object(handle)) => {
            let Ok(wrapper) = store.wrapper(*handle) else {
                return Convertible::NONE;
            };
            let Some(depth) = store.types.upcast_depth(wrapper.descriptor(), hash) else {
                return Convertible::NONE;
            };
            let score = Convertible::upcast(depth);
            match (wrapper.is_const(), data_type.is_const) {
                (true, false) => Convertible::NONE,
                (false, true) => score * Convertible::CONST_MISMATCH,
                _ => score,
            }
        }
        _ => Convertible::NONE,
    }
}

/// Convert a single (non-array) value to a declared type.
pub fn convert_value(
    data_type: &DataType,
    value: &Dynamic,
    store: &Store,
) -> Result<Dynamic, ConversionError> {
    match (data_type.kind, value) {
        (TypeKind::Any, v) => Ok(v.clone()),
        (_, Dynamic::Nil) if data_type.nullable => Ok(Dynamic::Nil),
        (TypeKind::Object(_), Dynamic::Nil) => Err(ConversionError::NullHandle {
            target_type: data_type.to_string(),
        }),
        (TypeKind::Bool, Dynamic::Bool(b)) => Ok(Dynamic::Bool(*b)),
        (TypeKind::Int(kind), Dynamic::Int(v)) => check_int(*v as i128, kind).map(Dynamic::Int),
        (TypeKind::Int(kind), Dynamic::Float(f)) => float_to_int(*f, kind).map(Dynamic::Int),
        (TypeKind::Float(kind), Dynamic::Float(f)) => check_float(*f, kind).map(Dynamic::Float),
        (TypeKind::Float(_), Dynamic::Int(v)) => Ok(Dynamic::Float(*v as f64)),
        (TypeKind::String, Dynamic::String(s)) => Ok(Dynamic::String(s.clone())),
        (TypeKind::Object(hash), Dynamic::Object(handle)) => {
            let wrapper = store.wrapper(*handle)?;
            wrapper.check(hash, &store.types)?;
            if wrapper.is_const() && !data_type.is_const {
                return Err(ConversionError::ConstViolation {
                    target_type: data_type.name.to_string(),
                });
            }
            Ok(Dynamic::Object(*handle))
        }
        (_, other) => Err(ConversionError::TypeMismatch {
            expected: data_type.to_string(),
            actual: store.describe(other),
        }),
    }
}

/// Range-check an integer against a native integer type.
pub fn check_int(value: i128, kind: IntKind) -> Result<i64, ConversionError> {
    if value < kind.min() || value > kind.max() {
        return Err(ConversionError::IntegerOverflow {
            value,
            target_type: kind.name(),
        });
    }
    i64::try_from(value).map_err(|_| ConversionError::IntegerOverflow {
        value,
        target_type: "i64",
    })
}

/// Truncate a float toward zero into a native integer type.
pub fn float_to_int(value: f64, kind: IntKind) -> Result<i64, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::FloatConversion {
            value,
            target_type: kind.name(),
        });
    }
    let truncated = value.trunc();
    if truncated < kind.min() as f64 || truncated > kind.max() as f64 {
        return Err(ConversionError::FloatConversion {
            value,
            target_type: kind.name(),
        });
    }
    check_int(truncated as i128, kind)
}

/// Reject finite values that overflow a narrower float type.
pub fn check_float(value: f64, kind: FloatKind) -> Result<f64, ConversionError> {
    match kind {
        FloatKind::F32 if value.is_finite() && value.abs() > f32::MAX as f64 => {
            Err(ConversionError::FloatConversion {
                value,
                target_type: kind.name(),
            })
        }
        _ => Ok(value),
    }
}

// ============================================================================
// Argument spec builder
// ============================================================================

/// Per-parameter overrides applied at registration.
///
/// ```
/// use bindery_dispatch::Arg;
///
/// let arg = Arg::new("scale").default(1.0).keep_alive();
/// assert_eq!(arg.name(), Some("scale"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arg {
    name: Option<String>,
    default: Option<Dynamic>,
    flags: ParamFlags,
}

impl Arg {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// An override that keeps the generated name.
    pub fn unnamed() -> Self {
        Default::default()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn default(mut self, value: impl Into<Dynamic>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn keep_alive(mut self) -> Self {
        self.flags |= ParamFlags::KEEP_ALIVE;
        self
    }

    pub fn transfer_ownership(mut self) -> Self {
        self.flags |= ParamFlags::TRANSFER_OWNERSHIP;
        self
    }

    /// Apply to a generated parameter.
    pub fn apply(self, param: &mut Parameter) {
        if let Some(name) = self.name {
            param.name = name;
        }
        if let Some(default) = self.default {
            param.default = Some(default);
        }
        param.flags |= self.flags;
    }
}
