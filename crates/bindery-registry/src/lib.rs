//! Registries backing native dispatch.
//!
//! - [`TypeRegistry`]: native type to host class bindings and upcasts
//! - [`InstanceRegistry`]: native address to canonical host handle
//! - [`Wrapper`]: ownership-tracking binding of one host object
//! - [`NativeHeap`]: native-side object storage
//! - [`ObjectSpace`]: host object table and mark-sweep collector
//! - [`ClassTable`]: host class descriptors

pub mod class;
pub mod instance_registry;
pub mod native_heap;
pub mod object_space;
pub mod type_registry;
pub mod wrapper;

pub use class::{ClassId, ClassTable, HostClass};
pub use instance_registry::{InstanceRecord, InstanceRegistry};
pub use native_heap::NativeHeap;
pub use object_space::{HostObject, ObjectSpace};
pub use type_registry::{TypeRecord, TypeRegistry, Upcast, UpcastMut, UpcastRef};
pub use wrapper::{Ownership, Wrapper};
