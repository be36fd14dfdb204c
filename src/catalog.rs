use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::composition::composer::ComposeOptions;
use crate::composition::ComponentInstance;
use crate::descriptor::ComponentDescriptor;
use crate::error::TypeError;
use crate::types::{MethodSignature, TypeServices, COLLECTION_ADD};

/// In-memory [`TypeServices`] backed by explicit declarations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCatalog {
    /// Component descriptors keyed by type name.
    components: BTreeMap<String, Arc<ComponentDescriptor>>,
    /// Direct supertypes (base types and interfaces) of each type.
    supertypes: BTreeMap<String, Vec<String>>,
    methods: Vec<MethodSignature>,
    /// Mutable collection types.
    collections: BTreeSet<String>,
    /// Types whose information is unavailable.
    unresolvable: BTreeSet<String>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, descriptor: ComponentDescriptor) -> Self {
        self.components
            .insert(descriptor.type_name.clone(), Arc::new(descriptor));
        self
    }

    /// Declare `supertype` as a base type or interface of `ty`.
    pub fn with_supertype(mut self, ty: impl Into<String>, supertype: impl Into<String>) -> Self {
        self.supertypes
            .entry(ty.into())
            .or_default()
            .push(supertype.into());
        self
    }

    pub fn with_method(mut self, method: MethodSignature) -> Self {
        self.methods.push(method);
        self
    }

    /// Declare a mutable collection type with an `add(element)` operation.
    pub fn with_collection(mut self, ty: impl Into<String>, element: impl Into<String>) -> Self {
        let ty = ty.into();
        self.methods
            .push(MethodSignature::new(ty.clone(), COLLECTION_ADD).with_parameter(element));
        self.collections.insert(ty);
        self
    }

    /// Make descriptor lookups for `ty` fail.
    pub fn with_unresolvable(mut self, ty: impl Into<String>) -> Self {
        self.unresolvable.insert(ty.into());
        self
    }

    fn reaches(&self, from: &str, target: &str, seen: &mut BTreeSet<String>) -> bool {
        if from == target {
            return true;
        }
        if !seen.insert(from.to_string()) {
            return false;
        }
        self.supertypes
            .get(from)
            .into_iter()
            .flatten()
            .any(|parent| self.reaches(parent, target, seen))
    }
}

impl TypeServices for TypeCatalog {
    fn component_descriptor(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<ComponentDescriptor>>, TypeError> {
        if self.unresolvable.contains(type_name) {
            return Err(TypeError::Unresolved(type_name.to_string()));
        }
        Ok(self.components.get(type_name).cloned())
    }

    fn get_overloads(&self, ty: &str, name: &str) -> Vec<MethodSignature> {
        self.methods
            .iter()
            .filter(|method| method.owner == ty && method.name == name)
            .cloned()
            .collect()
    }

    fn is_of_type(&self, candidate: &str, target: &str) -> bool {
        if self.reaches(candidate, target, &mut BTreeSet::new()) {
            return true;
        }
        // Arrays are covariant in their element type.
        match (candidate.strip_suffix("[]"), target.strip_suffix("[]")) {
            (Some(from), Some(to)) => self.is_of_type(from, to),
            _ => false,
        }
    }

    fn is_mutable_collection(&self, ty: &str) -> bool {
        self.collections.contains(ty)
    }
}

/// A full composition request: types, instances and options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub catalog: TypeCatalog,
    pub instances: Vec<ComponentInstance>,
    #[serde(default)]
    pub options: ComposeOptions,
}
