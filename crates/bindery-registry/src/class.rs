//! Host class descriptors.
//!
//! A host class is what the host runtime sees: a name and a single
//! superclass. Classes bound to a native type carry that type's hash; host-only
//! subclasses of bound classes carry none and inherit the bound ancestor's
//! natives through the superclass chain.

use std::fmt;

use rustc_hash::FxHashMap;

use bindery_core::{RegistrationError, TypeHash};

/// Identifier of a host class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// A host class descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct HostClass {
    pub id: ClassId,
    pub name: String,
    pub superclass: Option<ClassId>,
    /// Native type bound to this class, if any.
    pub native: Option<TypeHash>,
}

/// All host classes known to a runtime.
#[derive(Debug, Default)]
pub struct ClassTable {
    classes: Vec<HostClass>,
    by_name: FxHashMap<String, ClassId>,
}

impl ClassTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a class, or return the existing one of the same name.
    ///
    /// Redefining a class with a different superclass is an error.
    pub fn define(
        &mut self,
        name: &str,
        superclass: Option<ClassId>,
    ) -> Result<ClassId, RegistrationError> {
        if let Some(&existing) = self.by_name.get(name) {
            let class = &self.classes[existing.0 as usize];
            if class.superclass != superclass {
                return Err(RegistrationError::ConflictingBinding {
                    type_name: name.to_string(),
                    existing: self.superclass_name(class.superclass),
                    requested: self.superclass_name(superclass),
                });
            }
            return Ok(existing);
        }
        if let Some(parent) = superclass
            && self.get(parent).is_none()
        {
            return Err(RegistrationError::UnknownClass(parent.to_string()));
        }

        let id = ClassId(self.classes.len() as u32);
        self.classes.push(HostClass {
            id,
            name: name.to_string(),
            superclass,
            native: None,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    fn superclass_name(&self, id: Option<ClassId>) -> String {
        id.and_then(|id| self.get(id))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "<none>".to_string())
    }

    pub fn get(&self, id: ClassId) -> Option<&HostClass> {
        self.classes.get(id.0 as usize)
    }

    pub fn by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// Class name, or a placeholder for unknown ids.
    pub fn name(&self, id: ClassId) -> &str {
        self.get(id).map(|c| c.name.as_str()).unwrap_or("<unknown>")
    }

    /// Record the native type bound to a class.
    pub fn set_native(&mut self, id: ClassId, native: TypeHash) {
        if let Some(class) = self.classes.get_mut(id.0 as usize) {
            class.native = Some(native);
        }
    }

    /// The class and its superclasses, most-derived first.
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current
            && let Some(class) = self.get(cid)
        {
            chain.push(cid);
            current = class.superclass;
        }
        chain
    }

    /// True if `id` is `ancestor` or inherits from it.
    pub fn is_a(&self, id: ClassId, ancestor: ClassId) -> bool {
        self.ancestors(id).contains(&ancestor)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn clear(&mut self) {
        self.classes.clear();
        self.by_name.clear();
    }
}
