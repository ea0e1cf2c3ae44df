//! The runtime context.
//!
//! A [`Runtime`] owns everything one host interpreter needs to call native
//! code: bound types and host classes, the object and native heaps, the
//! overload sets and the active call stack. Nothing is global; tests build a
//! fresh runtime or [`reset`](Runtime::reset) an existing one.
//!
//! ```
//! use bindery_dispatch::{Native, Runtime};
//! use bindery_core::Dynamic;
//!
//! let mut runtime = Runtime::new();
//! runtime
//!     .register_native(Native::function("double", |x: i64| x * 2))
//!     .unwrap();
//! let result = runtime.call_function("double", &[Dynamic::Int(21)]).unwrap();
//! assert_eq!(result, Dynamic::Int(42));
//! ```

use std::any::{Any, type_name};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace};

use bindery_core::{
    ConversionError, DispatchError, Dynamic, IntKind, NativeAddress, NativeError, ObjectHandle,
    OverloadDiagnostic, RegistrationError, RuntimeConfig, TypeHash, TypeKind, short_type_name,
};
use bindery_registry::{ClassId, Ownership, TypeRecord, Upcast, Wrapper};

use crate::call_context::{Block, CallContext};
use crate::director::{CallDirection, CallFrame, CallStack};
use crate::native::{Native, NativeKind, Scope};
use crate::parameter::ParamFlags;
use crate::resolver::{Callee, GLOBAL_SCOPE, HostMethod, Resolver};
use crate::store::Store;

/// Injectable context for registration and dispatch.
#[derive(Debug)]
pub struct Runtime {
    config: RuntimeConfig,
    store: Store,
    resolver: Resolver,
    frames: CallStack,
    validated: bool,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            store: Store::new(config.tracking),
            resolver: Resolver::new(),
            frames: CallStack::new(),
            validated: false,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Drop every registration, object and record, keeping the configuration.
    pub fn reset(&mut self) {
        debug!(
            natives = self.resolver.len(),
            objects = self.store.objects.len(),
            "resetting runtime"
        );
        *self = Self::with_config(self.config);
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Active calls, innermost last.
    pub fn frames(&self) -> &CallStack {
        &self.frames
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Bind native type `T` to a host class named `name`.
    ///
    /// Binding the same type to the same class again is a no-op.
    pub fn bind_type<T: Any + Send + Sync>(
        &mut self,
        name: &str,
    ) -> Result<ClassId, RegistrationError> {
        self.bind_record::<T>(name, None, None)
    }

    /// Bind native type `D` deriving from the already bound `B`.
    ///
    /// The host class of `D` becomes a subclass of the class of `B`. The two
    /// projections are the only way a `D` is ever viewed as a `B`.
    pub fn bind_derived_type<D, B>(
        &mut self,
        name: &str,
        as_base: fn(&D) -> &B,
        as_base_mut: fn(&mut D) -> &mut B,
    ) -> Result<ClassId, RegistrationError>
    where
        D: Any + Send + Sync,
        B: Any + Send + Sync,
    {
        let base = self
            .store
            .types
            .get(TypeHash::of::<B>())
            .map(|r| r.class)
            .ok_or_else(|| {
                RegistrationError::UnknownType(short_type_name(type_name::<B>()).to_string())
            })?;
        self.bind_record::<D>(name, Some(base), Some(Upcast::new(as_base, as_base_mut)))
    }

    fn bind_record<T: Any>(
        &mut self,
        name: &str,
        superclass: Option<ClassId>,
        upcast: Option<Upcast>,
    ) -> Result<ClassId, RegistrationError> {
        let hash = TypeHash::of::<T>();
        if let Some(existing) = self.store.types.get(hash)
            && existing.class_name != name
        {
            return Err(RegistrationError::ConflictingBinding {
                type_name: existing.name.to_string(),
                existing: existing.class_name.clone(),
                requested: name.to_string(),
            });
        }

        let class = self.store.classes.define(name, superclass)?;
        if let Some(bound) = self.store.classes.get(class).and_then(|c| c.native)
            && bound != hash
        {
            return Err(RegistrationError::ConflictingBinding {
                type_name: short_type_name(type_name::<T>()).to_string(),
                existing: self.store.type_name(bound),
                requested: name.to_string(),
            });
        }

        let mut record = TypeRecord::of::<T>(class, name);
        if let Some(upcast) = upcast {
            record = record.with_upcast(upcast);
        }
        self.store.types.add(record)?;
        self.store.classes.set_native(class, hash);
        Ok(class)
    }

    /// Define a host class with no native binding.
    pub fn define_host_class(
        &mut self,
        name: &str,
        superclass: Option<ClassId>,
    ) -> Result<ClassId, RegistrationError> {
        let class = self.store.classes.define(name, superclass)?;
        debug!(class = name, %class, "defined host class");
        Ok(class)
    }

    /// Define a method on the host side of `class`.
    ///
    /// A host method overrides natives of the same name on ancestor classes.
    /// Natives reach it through [`CallContext::call_virtual`].
    pub fn define_host_method<F>(
        &mut self,
        class: ClassId,
        name: &str,
        f: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&mut Runtime, ObjectHandle, &[Dynamic]) -> Result<Dynamic, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        if self.store.classes.get(class).is_none() {
            return Err(RegistrationError::UnknownClass(class.to_string()));
        }
        let method: HostMethod = Arc::new(f);
        if self.resolver.define_host(class, name, method).is_some() {
            debug!(class = self.store.classes.name(class), name, "replaced host method");
        } else {
            debug!(class = self.store.classes.name(class), name, "defined host method");
        }
        Ok(())
    }

    /// Add a native to its overload set.
    ///
    /// Object types referenced by the signature that are not bound yet are
    /// recorded as unverified; see [`validate`](Self::validate).
    pub fn register_native(&mut self, mut native: Native) -> Result<Arc<Native>, RegistrationError> {
        let class = match native.scope {
            Scope::Global => None,
            Scope::Type(hash) => Some(
                self.store
                    .types
                    .get(hash)
                    .map(|r| r.class)
                    .ok_or_else(|| RegistrationError::UnknownType(hash.to_string()))?,
            ),
            Scope::Class(id) => {
                if self.store.classes.get(id).is_none() {
                    return Err(RegistrationError::UnknownClass(id.to_string()));
                }
                Some(id)
            }
        };
        native.owner_name = match class {
            Some(id) => self.store.classes.name(id).to_string(),
            None => GLOBAL_SCOPE.to_string(),
        };

        self.check_defaults(&native)?;
        check_ownership(&native)?;

        let referenced = native
            .params
            .iter()
            .map(|p| &p.data_type)
            .chain(std::iter::once(&native.ret.data_type));
        for data_type in referenced {
            if let Some(hash) = data_type.object_hash()
                && !self.store.types.is_defined(hash)
            {
                self.store.types.mark_unverified(hash, data_type.name);
                self.validated = false;
            }
        }

        self.resolver.register(class, native)
    }

    fn check_defaults(&self, native: &Native) -> Result<(), RegistrationError> {
        let mut defaulted = false;
        for param in &native.params {
            match &param.default {
                Some(default) => {
                    defaulted = true;
                    if param.convert(default, &self.store).is_err() {
                        return Err(RegistrationError::InvalidDefault {
                            name: native.name.clone(),
                            param: param.name.clone(),
                            expected: param.type_label(),
                        });
                    }
                }
                None if defaulted => {
                    return Err(RegistrationError::InvalidDefaults {
                        name: native.name.clone(),
                        param: param.name.clone(),
                    });
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Fail if any type used in a registered signature is still unbound.
    pub fn validate(&mut self) -> Result<(), RegistrationError> {
        self.store.types.validate_unverified_types()?;
        self.validated = true;
        Ok(())
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Resolve and call `name` on `receiver` (or the global scope).
    pub fn dispatch(
        &mut self,
        name: &str,
        args: &[Dynamic],
        receiver: Option<ObjectHandle>,
    ) -> Result<Dynamic, DispatchError> {
        self.dispatch_from(None, name, args, receiver, None)
    }

    /// Like [`dispatch`](Self::dispatch), passing a block the native may
    /// yield to.
    pub fn dispatch_with_block(
        &mut self,
        name: &str,
        args: &[Dynamic],
        receiver: Option<ObjectHandle>,
        block: &mut Block<'_>,
    ) -> Result<Dynamic, DispatchError> {
        self.dispatch_from(None, name, args, receiver, Some(block))
    }

    /// Call `name` as defined above `from` in the receiver's class chain.
    ///
    /// Host overrides use this to reach the definition they override.
    pub fn dispatch_super(
        &mut self,
        from: ClassId,
        name: &str,
        args: &[Dynamic],
        receiver: ObjectHandle,
    ) -> Result<Dynamic, DispatchError> {
        match self.store.classes.get(from).and_then(|c| c.superclass) {
            Some(superclass) => self.dispatch_from(Some(superclass), name, args, Some(receiver), None),
            None => Err(DispatchError::UndefinedMethod {
                receiver: format!("super of {}", self.store.classes.name(from)),
                method: name.to_string(),
            }),
        }
    }

    /// Call a global function.
    pub fn call_function(&mut self, name: &str, args: &[Dynamic]) -> Result<Dynamic, DispatchError> {
        self.dispatch(name, args, None)
    }

    /// Call a method on `receiver`.
    pub fn call_method(
        &mut self,
        receiver: ObjectHandle,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Dynamic, DispatchError> {
        self.dispatch(name, args, Some(receiver))
    }

    /// Allocate an instance of `class` and run its `initialize`.
    ///
    /// A class without any `initialize` can be instantiated without
    /// arguments; its instance stays uninitialized. Every error raised by
    /// `initialize` itself is returned and the instance destroyed.
    pub fn instantiate(
        &mut self,
        class: ClassId,
        args: &[Dynamic],
    ) -> Result<ObjectHandle, DispatchError> {
        let has_initializer = self
            .resolver
            .lookup(&self.store.classes, Some(class), "initialize", false)
            .is_some();
        let handle = self.allocate_instance(class)?;
        if !has_initializer && args.is_empty() {
            return Ok(handle);
        }
        match self.dispatch("initialize", args, Some(handle)) {
            Ok(_) => Ok(handle),
            Err(err) => {
                if let Some(object) = self.store.objects.destroy(handle) {
                    self.store.finalize(handle, object);
                }
                Err(err)
            }
        }
    }

    /// Reach a host override of `name` on `receiver`, if there is one.
    ///
    /// Returns `None` when the most-derived definition is native, or when a
    /// call from native code into that override is already active.
    pub fn call_virtual(
        &mut self,
        receiver: ObjectHandle,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Option<Dynamic>, DispatchError> {
        if self.frames.in_override(Some(receiver), name) {
            trace!(%receiver, name, "override already active, using native default");
            return Ok(None);
        }
        let Some(class) = self.store.class_of(receiver) else {
            return Ok(None);
        };
        let Some(Callee::Host(method)) = self.resolver.lookup(&self.store.classes, Some(class), name, false)
        else {
            return Ok(None);
        };

        trace!(%receiver, name, "calling host override");
        let frame = CallFrame::new(CallDirection::NativeToHost, Some(receiver), name);
        self.framed(frame, |rt| method(rt, receiver, args))
            .map(Some)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn dispatch_from(
        &mut self,
        start: Option<ClassId>,
        name: &str,
        args: &[Dynamic],
        receiver: Option<ObjectHandle>,
        block: Option<&mut Block<'_>>,
    ) -> Result<Dynamic, DispatchError> {
        if self.config.validate_on_dispatch && !self.validated {
            self.validate()?;
        }

        let (class, receiver_name) = match receiver {
            Some(handle) => {
                let class = self.store.class_of(handle).ok_or_else(|| {
                    DispatchError::InvalidReceiver {
                        class: "<collected>".to_string(),
                        method: name.to_string(),
                        reason: format!("{} is stale", handle),
                    }
                })?;
                let lookup = start.unwrap_or(class);
                (Some(lookup), self.store.classes.name(class).to_string())
            }
            None => (None, GLOBAL_SCOPE.to_string()),
        };

        let bypass_host = self.frames.in_override(receiver, name);
        let callee = self
            .resolver
            .lookup(&self.store.classes, class, name, bypass_host)
            .ok_or_else(|| DispatchError::UndefinedMethod {
                receiver: receiver_name.clone(),
                method: name.to_string(),
            })?;
        trace!(receiver = %receiver_name, name, argc = args.len(), bypass_host, "dispatch");

        let frame = CallFrame::new(CallDirection::HostToNative, receiver, name);
        self.framed(frame, |rt| match (callee, receiver) {
            (Callee::Host(method), Some(this)) => method(rt, this, args),
            (Callee::Host(_), None) => Err(DispatchError::UndefinedMethod {
                receiver: receiver_name,
                method: name.to_string(),
            }),
            (Callee::Natives(candidates), _) => rt
                .resolver
                .resolve(&candidates, args, &rt.store, &receiver_name, name)
                .and_then(|native| rt.invoke(&native, args, receiver, block)),
        })
    }

    /// Run `f` with `frame` pushed.
    ///
    /// The stack is restored to its depth before the push whether `f`
    /// returns or unwinds; a panic is resumed afterwards.
    fn framed<R>(&mut self, frame: CallFrame, f: impl FnOnce(&mut Self) -> R) -> R {
        let depth = self.frames.depth();
        self.frames.push(frame);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        self.frames.truncate(depth);
        match outcome {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Convert the arguments, call the native and apply ownership effects.
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke(
        &mut self,
        native: &Native,
        args: &[Dynamic],
        receiver: Option<ObjectHandle>,
        block: Option<&mut Block<'_>>,
    ) -> Result<Dynamic, DispatchError> {
        let mut converted = Vec::with_capacity(native.params.len());
        for (position, param) in native.params.iter().enumerate() {
            let Some(value) = args.get(position).or(param.default.as_ref()) else {
                return Err(DispatchError::ArityMismatch {
                    given: args.len(),
                    diagnostic: OverloadDiagnostic {
                        receiver: native.owner_name.clone(),
                        method: native.name.clone(),
                        arguments: args.iter().map(|a| self.store.describe(a)).collect(),
                        candidates: vec![native.to_string()],
                    },
                });
            };
            let value = param
                .convert(value, &self.store)
                .map_err(|source| DispatchError::Conversion {
                    method: native.name.clone(),
                    position,
                    param: param.name.clone(),
                    expected: param.type_label(),
                    actual: self.store.describe(value),
                    source,
                })?;
            converted.push(value);
        }

        if native.kind.needs_receiver() {
            self.check_receiver(native, receiver)?;
        }

        let kept = flagged_objects(native, &converted, ParamFlags::KEEP_ALIVE);
        let transferred = flagged_objects(native, &converted, ParamFlags::TRANSFER_OWNERSHIP);

        let catch_panics = self.config.catch_panics;
        let depth = self.frames.depth();
        let mut ctx = CallContext::new(
            self,
            native,
            receiver,
            converted,
            match block {
                Some(block) => Some(block),
                None => None,
            },
        );
        let outcome = if catch_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| native.callable().call(&mut ctx))) {
                Ok(outcome) => outcome,
                Err(payload) => {
                    drop(ctx);
                    // Frames pushed by re-entrant calls the panic unwound through.
                    self.frames.truncate(depth);
                    return Err(DispatchError::NativePanic {
                        method: native.name.clone(),
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        } else {
            native.callable().call(&mut ctx)
        };
        let ret = match outcome {
            Ok(()) => ctx.finish(),
            Err(NativeError::Dispatch(inner)) => return Err(*inner),
            Err(source) => {
                return Err(DispatchError::Native {
                    method: native.name.clone(),
                    source,
                });
            }
        };

        // Kept arguments hang off the receiver, or off the returned object
        // of a free function.
        if let Some(owner) = receiver.or_else(|| ret.as_object())
            && let Some(wrapper) = self.store.objects.wrapper_mut(owner)
        {
            for handle in kept.into_iter().filter(|&h| h != owner) {
                wrapper.add_keep_alive(handle);
            }
        }
        for handle in transferred {
            if let Some(wrapper) = self.store.objects.wrapper_mut(handle)
                && wrapper.transfer_to_native()
            {
                debug!(%handle, method = %native.name, "ownership transferred to native code");
            }
        }
        if native.ret.keep_alive
            && let (Some(this), Some(returned)) = (receiver, ret.as_object())
            && returned != this
            && let Some(wrapper) = self.store.objects.wrapper_mut(returned)
        {
            wrapper.add_keep_alive(this);
        }

        Ok(ret)
    }

    fn check_receiver(
        &self,
        native: &Native,
        receiver: Option<ObjectHandle>,
    ) -> Result<(), DispatchError> {
        let invalid = |class: &str, reason: String| DispatchError::InvalidReceiver {
            class: class.to_string(),
            method: native.name.clone(),
            reason,
        };
        let Some(this) = receiver else {
            return Err(invalid(&native.owner_name, "called without a receiver".to_string()));
        };
        let class = self
            .store
            .class_of(this)
            .map(|c| self.store.classes.name(c))
            .unwrap_or("<collected>");
        let wrapper = match self.store.wrapper(this) {
            Ok(wrapper) => wrapper,
            Err(ConversionError::Uninitialized { .. }) => {
                return Err(invalid(
                    class,
                    "native object is not initialized (an initializer that skips the native \
                     initialize leaves the receiver unbound)"
                        .to_string(),
                ));
            }
            Err(err) => return Err(invalid(class, err.to_string())),
        };
        if let Scope::Type(hash) = native.scope {
            wrapper
                .check(hash, &self.store.types)
                .map_err(|err| invalid(class, err.to_string()))?;
        }
        Ok(())
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Move `value` onto the native heap and surface it, owned by the host.
    pub fn wrap_owned<T: Any + Send + Sync>(
        &mut self,
        value: T,
        is_const: bool,
    ) -> Result<ObjectHandle, ConversionError> {
        let address = self.store.heap.allocate(value);
        self.store
            .surface(address, TypeHash::of::<T>(), Ownership::Host, is_const)
            .inspect_err(|_| {
                self.store.heap.free(address);
            })
    }

    /// Surface a native object already on the native heap, declared as `T`.
    pub fn wrap_address<T: Any>(
        &mut self,
        address: NativeAddress,
        ownership: Ownership,
        is_const: bool,
    ) -> Result<ObjectHandle, ConversionError> {
        self.store
            .surface(address, TypeHash::of::<T>(), ownership, is_const)
    }

    /// Allocate an uninitialized instance of `class`.
    pub fn allocate_instance(&mut self, class: ClassId) -> Result<ObjectHandle, RegistrationError> {
        if self.store.classes.get(class).is_none() {
            return Err(RegistrationError::UnknownClass(class.to_string()));
        }
        Ok(self.store.objects.allocate(class, None))
    }

    /// Borrow the native object behind `handle` as a `T`.
    pub fn get<T: Any>(&self, handle: ObjectHandle) -> Result<&T, ConversionError> {
        self.store.object::<T>(handle)
    }

    /// Mutably borrow the native object behind `handle` as a `T`.
    pub fn get_mut<T: Any>(&mut self, handle: ObjectHandle) -> Result<&mut T, ConversionError> {
        self.store.object_mut::<T>(handle)
    }

    /// Make the host responsible for destroying the pointee.
    pub fn transfer_to_host(&mut self, handle: ObjectHandle) -> Result<bool, ConversionError> {
        let changed = self.wrapper_mut(handle)?.transfer_to_host();
        debug!(%handle, changed, "ownership transferred to host");
        Ok(changed)
    }

    /// Make native code responsible for destroying the pointee.
    pub fn transfer_to_native(&mut self, handle: ObjectHandle) -> Result<bool, ConversionError> {
        let changed = self.wrapper_mut(handle)?.transfer_to_native();
        debug!(%handle, changed, "ownership transferred to native code");
        Ok(changed)
    }

    fn wrapper_mut(
        &mut self,
        handle: ObjectHandle,
    ) -> Result<&mut Wrapper, ConversionError> {
        self.store.wrapper(handle)?;
        self.store
            .objects
            .wrapper_mut(handle)
            .ok_or_else(|| ConversionError::StaleHandle(handle.to_string()))
    }

    /// Collect every host object unreachable from `roots`.
    ///
    /// Keep-alive lists are traced. Swept wrappers are finalized, so owned
    /// pointees are freed and instance records removed. Returns the number of
    /// swept objects.
    pub fn collect_garbage<I>(&mut self, roots: I) -> usize
    where
        I: IntoIterator<Item = ObjectHandle>,
    {
        let swept = self.store.objects.collect(roots);
        let count = swept.len();
        let mut freed = 0;
        for (handle, object) in swept {
            if self.store.finalize(handle, object) {
                freed += 1;
            }
        }
        debug!(swept = count, freed, "garbage collected");
        count
    }
}

/// Reject signatures whose ownership effects cannot be honored.
fn check_ownership(native: &Native) -> Result<(), RegistrationError> {
    if native.ret.data_type.kind == TypeKind::Int(IntKind::U64) {
        return Err(RegistrationError::UnsupportedReturn {
            name: native.name.clone(),
            return_type: native.ret.data_type.to_string(),
        });
    }
    let has_owner = native.kind.needs_receiver()
        || native.kind == NativeKind::Constructor
        || native.ret.data_type.object_hash().is_some();
    match native
        .params
        .iter()
        .find(|p| p.flags.contains(ParamFlags::KEEP_ALIVE))
    {
        Some(param) if !has_owner => Err(RegistrationError::KeepAliveWithoutOwner {
            name: native.name.clone(),
            param: param.name.clone(),
        }),
        _ => Ok(()),
    }
}

/// Objects passed in parameters carrying `flag`, array elements included.
fn flagged_objects(native: &Native, values: &[Dynamic], flag: ParamFlags) -> Vec<ObjectHandle> {
    native
        .params
        .iter()
        .zip(values)
        .filter(|(param, _)| param.flags.contains(flag))
        .flat_map(|(_, value)| match value {
            Dynamic::Object(handle) => vec![*handle],
            Dynamic::Array(items) => items.iter().filter_map(Dynamic::as_object).collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ObjRef, Owned};
    use crate::parameter::{Arg, Parameter};
    use bindery_core::{DataType, ErrorKind, TrackingMode};

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        hits: i64,
    }

    fn counter_runtime() -> (Runtime, ClassId) {
        let mut runtime = Runtime::new();
        let class = runtime.bind_type::<Counter>("Counter").unwrap();
        runtime
            .register_native(Native::constructor(|start: i64| Counter { hits: start }))
            .unwrap();
        runtime
            .register_native(Native::method_mut("hit", |c: &mut Counter, by: i64| {
                c.hits += by;
                c.hits
            }).with_args([Arg::new("by").default(1)]))
            .unwrap();
        runtime
            .register_native(Native::attr_reader("hits", |c: &Counter| c.hits))
            .unwrap();
        (runtime, class)
    }

    #[test]
    fn bind_type_is_idempotent_per_class() {
        let mut runtime = Runtime::new();
        let a = runtime.bind_type::<Counter>("Counter").unwrap();
        let b = runtime.bind_type::<Counter>("Counter").unwrap();
        assert_eq!(a, b);

        let err = runtime.bind_type::<Counter>("Tally").unwrap_err();
        assert!(matches!(err, RegistrationError::ConflictingBinding { .. }));
        assert!(runtime.store().classes.by_name("Tally").is_none());
    }

    #[test]
    fn class_cannot_rebind_to_another_type() {
        let mut runtime = Runtime::new();
        runtime.bind_type::<Counter>("Counter").unwrap();
        let err = runtime.bind_type::<String>("Counter").unwrap_err();
        assert!(matches!(err, RegistrationError::ConflictingBinding { .. }));
    }

    #[test]
    fn derived_type_needs_bound_base() {
        struct Base;
        struct Derived {
            base: Base,
        }
        let mut runtime = Runtime::new();
        let err = runtime
            .bind_derived_type::<Derived, Base>("Derived", |d| &d.base, |d| &mut d.base)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownType(_)));
    }

    #[test]
    fn instantiate_and_call_methods() {
        let (mut runtime, class) = counter_runtime();
        let counter = runtime.instantiate(class, &[Dynamic::Int(10)]).unwrap();

        assert_eq!(runtime.call_method(counter, "hit", &[]).unwrap(), Dynamic::Int(11));
        assert_eq!(
            runtime.call_method(counter, "hit", &[Dynamic::Int(5)]).unwrap(),
            Dynamic::Int(16)
        );
        assert_eq!(runtime.call_method(counter, "hits", &[]).unwrap(), Dynamic::Int(16));
        assert_eq!(runtime.get::<Counter>(counter).unwrap().hits, 16);
        assert_eq!(runtime.frames().depth(), 0);
    }

    #[test]
    fn uninitialized_receiver_is_reported() {
        let (mut runtime, class) = counter_runtime();
        let bare = runtime.allocate_instance(class).unwrap();
        let err = runtime.call_method(bare, "hits", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReceiver);
        assert!(err.to_string().contains("not initialized"));
    }

    #[test]
    fn conversion_error_names_parameter() {
        let (mut runtime, class) = counter_runtime();
        let counter = runtime.instantiate(class, &[Dynamic::Int(0)]).unwrap();
        let err = runtime
            .call_method(counter, "hit", &[Dynamic::Float(1e30)])
            .unwrap_err();
        match err {
            DispatchError::Conversion {
                position,
                param,
                expected,
                actual,
                ..
            } => {
                assert_eq!(position, 0);
                assert_eq!(param, "by");
                assert_eq!(expected, "i64");
                assert_eq!(actual, "float");
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_must_be_trailing_and_valid() {
        let mut runtime = Runtime::new();
        let bad_order = Native::function("f", |_a: i64, _b: i64| ())
            .with_args([Arg::new("a").default(1), Arg::new("b")]);
        assert!(matches!(
            runtime.register_native(bad_order),
            Err(RegistrationError::InvalidDefaults { .. })
        ));

        let bad_value = Native::function("g", |_a: i64| ()).with_args([Arg::new("a").default("x")]);
        assert!(matches!(
            runtime.register_native(bad_value),
            Err(RegistrationError::InvalidDefault { .. })
        ));
    }

    #[test]
    fn unbound_signature_types_fail_validation() {
        #[derive(Clone)]
        struct Later;

        let mut runtime = Runtime::with_config(RuntimeConfig::new().with_validate_on_dispatch(true));
        runtime
            .register_native(Native::function("make", || Owned(Later)))
            .unwrap();
        runtime
            .register_native(Native::function("answer", || 42i64))
            .unwrap();

        let err = runtime.call_function("answer", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalInvariant);

        runtime.bind_type::<Later>("Later").unwrap();
        assert!(runtime.validate().is_ok());
        assert_eq!(runtime.call_function("answer", &[]).unwrap(), Dynamic::Int(42));
    }

    #[test]
    fn native_panics_are_caught() {
        let mut runtime = Runtime::new();
        runtime
            .register_native(Native::function("boom", || -> i64 { panic!("kaboom") }))
            .unwrap();
        let err = runtime.call_function("boom", &[]).unwrap_err();
        assert_eq!(
            err,
            DispatchError::NativePanic {
                method: "boom".into(),
                message: "kaboom".into()
            }
        );
        assert_eq!(runtime.frames().depth(), 0);
    }

    #[test]
    fn keep_alive_parameter_survives_collection() {
        #[derive(Clone)]
        struct Child;
        #[derive(Default)]
        struct Parent {
            children: usize,
        }

        let mut runtime = Runtime::new();
        runtime.bind_type::<Child>("Child").unwrap();
        let parent_class = runtime.bind_type::<Parent>("Parent").unwrap();
        runtime
            .register_native(Native::constructor(Parent::default))
            .unwrap();
        runtime
            .register_native(
                Native::method_mut("adopt", |p: &mut Parent, _c: ObjRef<Child>| p.children += 1)
                    .with_args([Arg::new("child").keep_alive()]),
            )
            .unwrap();

        let parent = runtime.instantiate(parent_class, &[]).unwrap();
        let child = runtime.wrap_owned(Child, false).unwrap();
        runtime
            .call_method(parent, "adopt", &[Dynamic::Object(child)])
            .unwrap();

        assert_eq!(runtime.collect_garbage([parent]), 0);
        assert!(runtime.get::<Child>(child).is_ok());

        assert_eq!(runtime.collect_garbage([]), 2);
        assert!(runtime.store().heap.is_empty());
    }

    #[test]
    fn reset_keeps_config() {
        let config = RuntimeConfig::new().with_tracking(TrackingMode::All);
        let (mut runtime, _) = counter_runtime();
        runtime.config = config;
        runtime.reset();
        assert_eq!(runtime.config().tracking, TrackingMode::All);
        assert!(runtime.resolver().is_empty());
        assert!(runtime.store().classes.is_empty());
    }

    #[test]
    fn raw_natives_on_host_classes() {
        let mut runtime = Runtime::new();
        let class = runtime.define_host_class("Greeter", None).unwrap();
        runtime
            .register_native(Native::raw(
                crate::native::NativeKind::Function,
                "greet",
                Scope::Class(class),
                vec![Parameter::new("name", DataType::string())],
                crate::native::ReturnSpec::new(DataType::string()),
                crate::native::NativeFn::new(|ctx| {
                    let name: String = ctx.arg_as(0)?;
                    ctx.set_return(Dynamic::String(format!("hello {name}")));
                    Ok(())
                }),
            ))
            .unwrap();
        let greeter = runtime.instantiate(class, &[]).unwrap();
        assert_eq!(
            runtime
                .call_method(greeter, "greet", &[Dynamic::from("bob")])
                .unwrap(),
            Dynamic::from("hello bob")
        );
        let err = runtime.call_method(greeter, "greet", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
    }
}
