//! Overload sets and resolution.
//!
//! Natives are grouped by scope (a host class, or the global scope) and call
//! name. A host class may also define a method on the host side, which
//! overrides any native of the same name on its ancestors.
//!
//! Lookup walks the receiver's class chain, most-derived first. The first
//! class defining the name decides what is called: a host method there wins
//! outright, otherwise the natives of that class and of every ancestor are
//! pooled, most-derived first and in registration order within a class.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use bindery_core::{DispatchError, Dynamic, ObjectHandle, OverloadDiagnostic, RegistrationError};
use bindery_registry::{ClassId, ClassTable};

use crate::native::{Native, Resolved};
use crate::runtime::Runtime;
use crate::store::Store;

/// Receiver name of global functions in diagnostics.
pub const GLOBAL_SCOPE: &str = "<global>";

/// A method defined on the host side.
pub type HostMethod =
    Arc<dyn Fn(&mut Runtime, ObjectHandle, &[Dynamic]) -> Result<Dynamic, DispatchError> + Send + Sync>;

/// What a call name resolves to before scoring.
#[derive(Clone)]
pub enum Callee {
    /// A host-side method.
    Host(HostMethod),
    /// Native candidates, in pool order.
    Natives(Vec<Arc<Native>>),
}

impl fmt::Debug for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Host(_) => f.write_str("Host"),
            Callee::Natives(natives) => f
                .debug_tuple("Natives")
                .field(&natives.iter().map(|n| n.to_string()).collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[derive(Default)]
struct Entry {
    natives: Vec<Arc<Native>>,
    host: Option<HostMethod>,
}

/// Overload sets of one runtime.
#[derive(Default)]
pub struct Resolver {
    scopes: FxHashMap<Option<ClassId>, FxHashMap<String, Entry>>,
    native_count: usize,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a native to the overload set of `(class, name)`.
    ///
    /// A native with the same signature hash in the same set is rejected.
    pub fn register(
        &mut self,
        class: Option<ClassId>,
        native: Native,
    ) -> Result<Arc<Native>, RegistrationError> {
        let signature = native.signature_hash();
        let entry = self
            .scopes
            .entry(class)
            .or_default()
            .entry(native.name.clone())
            .or_default();
        if entry.natives.iter().any(|n| n.signature_hash() == signature) {
            return Err(RegistrationError::DuplicateOverload {
                scope: native.owner_name.clone(),
                name: native.name.clone(),
                signature: native.render_params(),
            });
        }

        debug!(native = %native, %signature, "registered native");
        let native = Arc::new(native);
        entry.natives.push(Arc::clone(&native));
        self.native_count += 1;
        Ok(native)
    }

    /// Define a host method on `class`, returning the one it replaces.
    pub fn define_host(
        &mut self,
        class: ClassId,
        name: &str,
        method: HostMethod,
    ) -> Option<HostMethod> {
        self.scopes
            .entry(Some(class))
            .or_default()
            .entry(name.to_string())
            .or_default()
            .host
            .replace(method)
    }

    /// Natives registered directly on `(class, name)`.
    pub fn overloads(&self, class: Option<ClassId>, name: &str) -> &[Arc<Native>] {
        self.entry(class, name)
            .map(|e| e.natives.as_slice())
            .unwrap_or(&[])
    }

    /// Host method defined directly on `(class, name)`.
    pub fn host_method(&self, class: ClassId, name: &str) -> Option<&HostMethod> {
        self.entry(Some(class), name).and_then(|e| e.host.as_ref())
    }

    fn entry(&self, class: Option<ClassId>, name: &str) -> Option<&Entry> {
        self.scopes.get(&class).and_then(|names| names.get(name))
    }

    /// Find what `name` means for a receiver of class `class`.
    ///
    /// `None` as class looks up global functions. With `bypass_host`, host
    /// methods are skipped and natives are pooled from the whole chain.
    pub fn lookup(
        &self,
        classes: &ClassTable,
        class: Option<ClassId>,
        name: &str,
        bypass_host: bool,
    ) -> Option<Callee> {
        let Some(class) = class else {
            let natives = self.overloads(None, name);
            return (!natives.is_empty()).then(|| Callee::Natives(natives.to_vec()));
        };

        let mut pooled: Vec<Arc<Native>> = Vec::new();
        for ancestor in classes.ancestors(class) {
            let Some(entry) = self.entry(Some(ancestor), name) else {
                continue;
            };
            if pooled.is_empty()
                && !bypass_host
                && let Some(host) = &entry.host
            {
                return Some(Callee::Host(Arc::clone(host)));
            }
            pooled.extend(entry.natives.iter().cloned());
        }
        (!pooled.is_empty()).then_some(Callee::Natives(pooled))
    }

    /// Pick the best candidate for `args`.
    ///
    /// Raises [`DispatchError::ArityMismatch`] when no candidate accepts the
    /// argument count and [`DispatchError::NoMatchingOverload`] when none
    /// accepts the argument types. Both carry every candidate.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(
        &self,
        candidates: &[Arc<Native>],
        args: &[Dynamic],
        store: &Store,
        receiver: &str,
        name: &str,
    ) -> Result<Arc<Native>, DispatchError> {
        let mut best: Option<(Resolved, &Arc<Native>)> = None;
        for (order, native) in candidates.iter().enumerate() {
            let Some(resolved) = native.matches(args, store, order) else {
                trace!(candidate = %native, "rejected");
                continue;
            };
            trace!(
                candidate = %native,
                score = %resolved.score,
                parameter_match = %resolved.parameter_match,
                "scored"
            );
            if best.as_ref().is_none_or(|(top, _)| resolved > *top) {
                best = Some((resolved, native));
            }
        }

        if let Some((resolved, native)) = best {
            trace!(selected = %native, score = %resolved.score, "selected overload");
            return Ok(Arc::clone(native));
        }

        let diagnostic = OverloadDiagnostic {
            receiver: receiver.to_string(),
            method: name.to_string(),
            arguments: args.iter().map(|a| store.describe(a)).collect(),
            candidates: candidates.iter().map(|n| n.to_string()).collect(),
        };
        if candidates.iter().all(|n| !n.accepts_arity(args.len())) {
            Err(DispatchError::ArityMismatch {
                given: args.len(),
                diagnostic,
            })
        } else {
            Err(DispatchError::NoMatchingOverload(diagnostic))
        }
    }

    /// Number of registered natives.
    pub fn len(&self) -> usize {
        self.native_count
    }

    pub fn is_empty(&self) -> bool {
        self.native_count == 0
    }

    pub fn clear(&mut self) {
        self.scopes.clear();
        self.native_count = 0;
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("scopes", &self.scopes.len())
            .field("natives", &self.native_count)
            .finish()
    }
}
