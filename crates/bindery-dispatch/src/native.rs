//! Registered native overloads.
//!
//! A [`Native`] is one candidate for a call name: its parameters, its return
//! handling and the type-erased callable that does the work. Natives score
//! themselves against host arguments ([`Native::matches`]) and the resolver
//! ranks the resulting [`Resolved`] entries.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;

use bindery_core::{Convertible, DataType, Dynamic, NativeError, TypeHash};
use bindery_registry::ClassId;

use crate::call_context::CallContext;
use crate::parameter::{Arg, Parameter};
use crate::store::Store;

/// What a native is, as seen from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    /// Free function.
    Function,
    /// Instance method.
    Method,
    /// Native initializer bound to `initialize`.
    Constructor,
    /// Attribute getter.
    AttributeReader,
    /// Attribute setter, registered as `name=`.
    AttributeWriter,
    /// Yields each element to the block.
    Iterator,
}

impl NativeKind {
    /// Whether the native needs an initialized receiver.
    pub fn needs_receiver(self) -> bool {
        matches!(
            self,
            NativeKind::Method
                | NativeKind::AttributeReader
                | NativeKind::AttributeWriter
                | NativeKind::Iterator
        )
    }
}

/// Trait for callable native functions.
///
/// The `call` method receives a [`CallContext`] that provides access to the
/// converted arguments and the receiver, and accepts the return value.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        (self)(ctx)
    }
}

/// Type-erased native callable.
#[derive(Clone)]
pub struct NativeFn {
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Wrap any [`NativeCallable`] implementation.
    pub fn from_callable<C>(callable: C) -> Self
    where
        C: NativeCallable + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(callable),
        }
    }

    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").finish_non_exhaustive()
    }
}

/// Return value handling of a native.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSpec {
    pub data_type: DataType,
    /// The returned object keeps the receiver alive.
    pub keep_alive: bool,
    /// Returned objects are surfaced read-only.
    pub is_const: bool,
}

impl ReturnSpec {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            keep_alive: false,
            is_const: false,
        }
    }
}

/// Return overrides applied at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Return {
    keep_alive: bool,
    is_const: bool,
}

impl Return {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }

    pub fn const_return(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn apply(self, spec: &mut ReturnSpec) {
        spec.keep_alive |= self.keep_alive;
        spec.is_const |= self.is_const;
        if self.is_const {
            spec.data_type = spec.data_type.with_const();
        }
    }
}

/// Where a native is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Global function.
    Global,
    /// On the host class bound to a native type.
    Type(TypeHash),
    /// On a host class directly.
    Class(ClassId),
}

/// One registered overload.
#[derive(Debug, Clone)]
pub struct Native {
    pub kind: NativeKind,
    pub name: String,
    pub scope: Scope,
    /// Declaring type name used in diagnostics.
    pub owner_name: String,
    pub params: Vec<Parameter>,
    pub ret: ReturnSpec,
    callable: NativeFn,
}

impl Native {
    /// Build a native from its parts.
    pub fn raw(
        kind: NativeKind,
        name: impl Into<String>,
        scope: Scope,
        params: Vec<Parameter>,
        ret: ReturnSpec,
        callable: NativeFn,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            scope,
            owner_name: String::new(),
            params,
            ret,
            callable,
        }
    }

    /// Override parameter names, defaults and flags, positionally.
    ///
    /// Extra entries are ignored.
    pub fn with_args<I: IntoIterator<Item = Arg>>(mut self, args: I) -> Self {
        for (param, arg) in self.params.iter_mut().zip(args) {
            arg.apply(param);
        }
        self
    }

    pub fn with_return(mut self, ret: Return) -> Self {
        ret.apply(&mut self.ret);
        self
    }

    pub fn callable(&self) -> &NativeFn {
        &self.callable
    }

    /// Number of parameters without a default.
    pub fn required_count(&self) -> usize {
        self.params.iter().take_while(|p| !p.has_default()).count()
    }

    pub fn total_count(&self) -> usize {
        self.params.len()
    }

    /// Whether `argc` arguments can be accepted at all.
    pub fn accepts_arity(&self, argc: usize) -> bool {
        argc >= self.required_count() && argc <= self.total_count()
    }

    /// Signature identity within its scope.
    pub fn signature_hash(&self) -> TypeHash {
        let owner = match self.scope {
            Scope::Global => None,
            Scope::Type(hash) => Some(hash),
            Scope::Class(id) => Some(TypeHash(u64::from(id.0))),
        };
        let params: Vec<TypeHash> = self.params.iter().map(Parameter::signature_hash).collect();
        TypeHash::from_method(owner, &self.name, &params)
    }

    /// Parameter list as written in diagnostics.
    pub fn render_params(&self) -> String {
        self.params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Score this overload against host arguments.
    ///
    /// `None` when the arity is out of range or any argument is
    /// unconvertible. Omitted defaulted parameters score exact.
    pub fn matches(&self, args: &[Dynamic], store: &Store, order: usize) -> Option<Resolved> {
        if !self.accepts_arity(args.len()) {
            return None;
        }
        let score = Convertible::aggregate(
            self.params
                .iter()
                .zip(args)
                .map(|(param, arg)| param.matches(arg, store)),
        );
        if score.is_none() {
            return None;
        }
        let parameter_match = if self.params.is_empty() {
            1.0
        } else {
            args.len() as f64 / self.params.len() as f64
        };
        Some(Resolved {
            score,
            parameter_match: OrderedFloat(parameter_match),
            order,
        })
    }
}

impl fmt::Display for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}#{}({})",
            self.ret.data_type,
            self.owner_name,
            self.name,
            self.render_params()
        )
    }
}

/// The score of one candidate for one call.
///
/// Orders by aggregate score, then by the fraction of parameters supplied
/// explicitly, then by registration order (earlier ranks higher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub score: Convertible,
    pub parameter_match: OrderedFloat<f64>,
    /// Position among the pooled candidates.
    pub order: usize,
}

impl Ord for Resolved {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.parameter_match.cmp(&other.parameter_match))
            .then(other.order.cmp(&self.order))
    }
}

impl PartialOrd for Resolved {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
