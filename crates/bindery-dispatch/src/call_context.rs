//! Context for native calls.
//!
//! A [`CallContext`] bridges the runtime and a native callable. It holds the
//! converted arguments, the receiver, the return slot and the block passed
//! with the call, and lends out the runtime for re-entrant calls.

use std::any::Any;
use std::fmt;

use tracing::trace_span;

use bindery_core::{
    ConversionError, DispatchError, Dynamic, NativeAddress, NativeError, ObjectHandle, TypeHash,
};
use bindery_registry::{Ownership, Wrapper};

use crate::convert::{FromArg, IntoReturn};
use crate::native::{Native, NativeKind};
use crate::runtime::Runtime;
use crate::store::Store;

/// Host block passed along with a call.
pub type Block<'a> = dyn FnMut(&mut Runtime, &[Dynamic]) -> Result<Dynamic, DispatchError> + 'a;

/// Context for one native invocation.
pub struct CallContext<'a> {
    runtime: &'a mut Runtime,
    native: &'a Native,
    this: Option<ObjectHandle>,
    args: Vec<Dynamic>,
    ret: Dynamic,
    block: Option<&'a mut Block<'a>>,
}

impl<'a> CallContext<'a> {
    /// Create a call context.
    ///
    /// `args` must already be converted and padded with defaults.
    pub fn new(
        runtime: &'a mut Runtime,
        native: &'a Native,
        this: Option<ObjectHandle>,
        args: Vec<Dynamic>,
        block: Option<&'a mut Block<'a>>,
    ) -> Self {
        Self {
            runtime,
            native,
            this,
            args,
            ret: Dynamic::Nil,
            block,
        }
    }

    pub fn native(&self) -> &Native {
        self.native
    }

    pub fn name(&self) -> &str {
        &self.native.name
    }

    pub fn kind(&self) -> NativeKind {
        self.native.kind
    }

    /// Number of arguments, defaults included.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[Dynamic] {
        &self.args
    }

    /// A raw argument.
    pub fn arg(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.args.len(),
            })
    }

    /// A typed argument.
    pub fn arg_as<T: FromArg>(&self, index: usize) -> Result<T, NativeError> {
        let value = self.arg(index)?;
        T::from_arg(value, self.runtime.store()).map_err(NativeError::from)
    }

    /// Handle of the receiver.
    pub fn this_handle(&self) -> Result<ObjectHandle, NativeError> {
        self.this
            .ok_or_else(|| NativeError::invalid_this("called without a receiver"))
    }

    /// The receiver's native object.
    pub fn this<T: Any>(&self) -> Result<&T, NativeError> {
        let handle = self.this_handle()?;
        self.runtime
            .store()
            .object::<T>(handle)
            .map_err(|e| NativeError::invalid_this(e.to_string()))
    }

    /// The receiver's native object, mutably.
    pub fn this_mut<T: Any>(&mut self) -> Result<&mut T, NativeError> {
        let handle = self.this_handle()?;
        self.runtime
            .store_mut()
            .object_mut::<T>(handle)
            .map_err(|e| NativeError::invalid_this(e.to_string()))
    }

    pub fn store(&self) -> &Store {
        self.runtime.store()
    }

    pub fn store_mut(&mut self) -> &mut Store {
        self.runtime.store_mut()
    }

    /// Set the raw return value.
    pub fn set_return(&mut self, value: Dynamic) {
        self.ret = value;
    }

    /// Convert and set the return value.
    pub fn set_return_value<R: IntoReturn>(&mut self, value: R) -> Result<(), NativeError> {
        let value = value.into_return(self)?;
        self.ret = value;
        Ok(())
    }

    pub fn return_value(&self) -> &Dynamic {
        &self.ret
    }

    pub(crate) fn finish(self) -> Dynamic {
        self.ret
    }

    /// Move `value` onto the native heap and surface it, owned by the host.
    pub fn surface_owned<T: Any + Send + Sync>(
        &mut self,
        value: T,
    ) -> Result<ObjectHandle, NativeError> {
        let is_const = self.native.ret.is_const;
        let store = self.runtime.store_mut();
        let address = store.heap.allocate(value);
        match store.surface(address, TypeHash::of::<T>(), Ownership::Host, is_const) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                store.heap.free(address);
                Err(err.into())
            }
        }
    }

    /// Surface an object already on the native heap, declared as a `T`.
    pub fn surface_address<T: Any>(
        &mut self,
        address: NativeAddress,
        ownership: Ownership,
    ) -> Result<ObjectHandle, NativeError> {
        let is_const = self.native.ret.is_const;
        self.runtime
            .store_mut()
            .surface(address, TypeHash::of::<T>(), ownership, is_const)
            .map_err(NativeError::from)
    }

    /// Bind a freshly constructed native object to the receiver.
    ///
    /// Replaces (and finalizes) any object bound earlier.
    pub fn initialize_this<T: Any + Send + Sync>(&mut self, value: T) -> Result<(), NativeError> {
        let handle = self.this_handle()?;
        let descriptor = TypeHash::of::<T>();
        let store = self.runtime.store_mut();
        if !store.types.is_defined(descriptor) {
            return Err(ConversionError::TypeMismatch {
                expected: "a bound native type".to_string(),
                actual: std::any::type_name::<T>().to_string(),
            }
            .into());
        }
        let address = store.heap.allocate(value);
        let wrapper = Wrapper::owned(address, descriptor);
        match store.objects.bind(handle, wrapper) {
            Some(previous) => {
                store.instances.remove_if(previous.address(), handle);
                previous.finalize(&mut store.heap);
            }
            None if !store.objects.contains(handle) => {
                store.heap.free(address);
                return Err(NativeError::invalid_this("receiver was collected"));
            }
            None => {}
        }
        if store.instances.tracks(true) {
            store.instances.add(address, handle);
        }
        Ok(())
    }

    pub fn block_given(&self) -> bool {
        self.block.is_some()
    }

    /// Call the block passed with this call.
    pub fn yield_block(&mut self, args: &[Dynamic]) -> Result<Dynamic, NativeError> {
        match self.block.as_deref_mut() {
            Some(block) => block(&mut *self.runtime, args).map_err(NativeError::from),
            None => Err(NativeError::other("no block given")),
        }
    }

    /// Defer to a host override of `name` on the receiver.
    ///
    /// Returns `None` when there is no host override, or when this call is
    /// already running inside that override. Native code then runs its own
    /// default.
    pub fn call_virtual(
        &mut self,
        name: &str,
        args: &[Dynamic],
    ) -> Result<Option<Dynamic>, NativeError> {
        let this = self.this_handle()?;
        self.runtime
            .call_virtual(this, name, args)
            .map_err(NativeError::from)
    }

    /// Re-enter the runtime with a nested dispatch.
    pub fn dispatch(
        &mut self,
        name: &str,
        args: &[Dynamic],
        receiver: Option<ObjectHandle>,
    ) -> Result<Dynamic, NativeError> {
        self.runtime
            .dispatch(name, args, receiver)
            .map_err(NativeError::from)
    }

    /// Run blocking native work without touching any host value.
    ///
    /// `f` cannot reach the context, so no host value can be observed until
    /// it returns.
    pub fn without_host_lock<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let _span = trace_span!("without_host_lock", native = %self.native.name).entered();
        f()
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("native", &self.native.name)
            .field("this", &self.this)
            .field("arg_count", &self.args.len())
            .field("block", &self.block.is_some())
            .finish()
    }
}
