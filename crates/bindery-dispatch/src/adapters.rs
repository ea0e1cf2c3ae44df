//! Typed adapters turning Rust closures into natives.
//!
//! Each adapter trait is implemented for closures of arity 0 through 4 whose
//! arguments implement [`FromArg`] and whose result implements
//! [`IntoReturn`]. The marker type parameter only exists to keep the blanket
//! implementations apart; it is always inferred.
//!
//! ```
//! use bindery_dispatch::{Native, NativeKind};
//!
//! struct Counter {
//!     hits: u32,
//! }
//!
//! let add = Native::function("add", |a: i64, b: i64| a + b);
//! assert_eq!(add.params.len(), 2);
//!
//! let hits = Native::method("hits", |c: &Counter| c.hits);
//! assert_eq!(hits.kind, NativeKind::Method);
//! ```

use std::any::Any;

use bindery_core::{DataType, Dynamic, TypeHash};

use crate::convert::{FromArg, IntoReturn};
use crate::native::{Native, NativeFn, NativeKind, ReturnSpec, Scope};
use crate::parameter::Parameter;

/// A closure usable as a free function.
pub trait IntoFunction<Marker>: Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;
    fn return_type() -> DataType;
    fn into_callable(self) -> NativeFn;
}

/// A closure usable as a method taking `&T`.
pub trait IntoMethod<T, Marker>: Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;
    fn return_type() -> DataType;
    fn into_callable(self) -> NativeFn;
}

/// A closure usable as a method taking `&mut T`.
pub trait IntoMethodMut<T, Marker>: Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;
    fn return_type() -> DataType;
    fn into_callable(self) -> NativeFn;
}

/// A closure building a `T` for the host `initialize`.
pub trait IntoConstructor<T, Marker>: Send + Sync + 'static {
    fn parameters() -> Vec<Parameter>;
    fn into_callable(self) -> NativeFn;
}

macro_rules! impl_adapters {
    ($($arg:ident $idx:tt),*) => {
        impl<F, R, $($arg,)*> IntoFunction<fn($($arg,)*) -> R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$arg as FromArg>::parameter($idx)),*]
            }

            fn return_type() -> DataType {
                R::data_type()
            }

            #[allow(non_snake_case)]
            fn into_callable(self) -> NativeFn {
                NativeFn::new(move |ctx| {
                    $(let $arg = ctx.arg_as::<$arg>($idx)?;)*
                    let ret = (self)($($arg),*);
                    ctx.set_return_value(ret)
                })
            }
        }

        impl<F, T, R, $($arg,)*> IntoMethod<T, fn(&T, $($arg,)*) -> R> for F
        where
            F: Fn(&T, $($arg),*) -> R + Send + Sync + 'static,
            T: Any,
            R: IntoReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$arg as FromArg>::parameter($idx)),*]
            }

            fn return_type() -> DataType {
                R::data_type()
            }

            #[allow(non_snake_case)]
            fn into_callable(self) -> NativeFn {
                NativeFn::new(move |ctx| {
                    $(let $arg = ctx.arg_as::<$arg>($idx)?;)*
                    let ret = (self)(ctx.this::<T>()?, $($arg),*);
                    ctx.set_return_value(ret)
                })
            }
        }

        impl<F, T, R, $($arg,)*> IntoMethodMut<T, fn(&mut T, $($arg,)*) -> R> for F
        where
            F: Fn(&mut T, $($arg),*) -> R + Send + Sync + 'static,
            T: Any,
            R: IntoReturn + 'static,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$arg as FromArg>::parameter($idx)),*]
            }

            fn return_type() -> DataType {
                R::data_type()
            }

            #[allow(non_snake_case)]
            fn into_callable(self) -> NativeFn {
                NativeFn::new(move |ctx| {
                    $(let $arg = ctx.arg_as::<$arg>($idx)?;)*
                    let ret = (self)(ctx.this_mut::<T>()?, $($arg),*);
                    ctx.set_return_value(ret)
                })
            }
        }

        impl<F, T, $($arg,)*> IntoConstructor<T, fn($($arg,)*) -> T> for F
        where
            F: Fn($($arg),*) -> T + Send + Sync + 'static,
            T: Any + Send + Sync,
            $($arg: FromArg + 'static,)*
        {
            fn parameters() -> Vec<Parameter> {
                vec![$(<$arg as FromArg>::parameter($idx)),*]
            }

            #[allow(non_snake_case)]
            fn into_callable(self) -> NativeFn {
                NativeFn::new(move |ctx| {
                    $(let $arg = ctx.arg_as::<$arg>($idx)?;)*
                    let value = (self)($($arg),*);
                    ctx.initialize_this(value)?;
                    let this = ctx.this_handle()?;
                    ctx.set_return(Dynamic::Object(this));
                    Ok(())
                })
            }
        }
    };
}

impl_adapters!();
impl_adapters!(A0 0);
impl_adapters!(A0 0, A1 1);
impl_adapters!(A0 0, A1 1, A2 2);
impl_adapters!(A0 0, A1 1, A2 2, A3 3);

// ============================================================================
// Native constructors
// ============================================================================

impl Native {
    /// A free function.
    pub fn function<M, F>(name: &str, f: F) -> Self
    where
        F: IntoFunction<M>,
    {
        Native::raw(
            NativeKind::Function,
            name,
            Scope::Global,
            F::parameters(),
            ReturnSpec::new(F::return_type()),
            f.into_callable(),
        )
    }

    /// A method reading a `T` receiver.
    pub fn method<T, M, F>(name: &str, f: F) -> Self
    where
        T: Any,
        F: IntoMethod<T, M>,
    {
        Native::raw(
            NativeKind::Method,
            name,
            Scope::Type(TypeHash::of::<T>()),
            F::parameters(),
            ReturnSpec::new(F::return_type()),
            f.into_callable(),
        )
    }

    /// A method mutating a `T` receiver.
    pub fn method_mut<T, M, F>(name: &str, f: F) -> Self
    where
        T: Any,
        F: IntoMethodMut<T, M>,
    {
        Native::raw(
            NativeKind::Method,
            name,
            Scope::Type(TypeHash::of::<T>()),
            F::parameters(),
            ReturnSpec::new(F::return_type()),
            f.into_callable(),
        )
    }

    /// The native initializer of `T`, bound to `initialize`.
    pub fn constructor<T, M, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: IntoConstructor<T, M>,
    {
        Native::raw(
            NativeKind::Constructor,
            "initialize",
            Scope::Type(TypeHash::of::<T>()),
            F::parameters(),
            ReturnSpec::new(DataType::object::<T>()),
            f.into_callable(),
        )
    }

    /// Attribute getter.
    pub fn attr_reader<T, V, F>(name: &str, f: F) -> Self
    where
        T: Any,
        V: IntoReturn + 'static,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let mut native = Native::method::<T, fn(&T) -> V, F>(name, f);
        native.kind = NativeKind::AttributeReader;
        native
    }

    /// Attribute setter, registered as `name=`.
    pub fn attr_writer<T, V, F>(name: &str, f: F) -> Self
    where
        T: Any,
        V: FromArg + 'static,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let mut native = Native::method_mut::<T, fn(&mut T, V), F>(&format!("{}=", name), f);
        native.kind = NativeKind::AttributeWriter;
        native
    }

    /// Iterator yielding each element to the block.
    ///
    /// With a block the receiver is returned, without one the elements are
    /// returned as an array.
    pub fn iterator<T, V, I, F>(name: &str, f: F) -> Self
    where
        T: Any,
        V: IntoReturn + 'static,
        I: IntoIterator<Item = V> + 'static,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        let callable = NativeFn::new(move |ctx| {
            let items: Vec<V> = f(ctx.this::<T>()?).into_iter().collect();
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(item.into_return(ctx)?);
            }
            if ctx.block_given() {
                for value in values {
                    ctx.yield_block(&[value])?;
                }
                let this = ctx.this_handle()?;
                ctx.set_return(Dynamic::Object(this));
            } else {
                ctx.set_return(Dynamic::Array(values));
            }
            Ok(())
        });
        Native::raw(
            NativeKind::Iterator,
            name,
            Scope::Type(TypeHash::of::<T>()),
            Vec::new(),
            // Receiver with a block, array without.
            ReturnSpec::new(DataType::any()),
            callable,
        )
    }
}
