use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::descriptor::ComponentDescriptor;
use crate::error::CompositionError;
use crate::types::TypeServices;

use super::{ComponentInstance, InstanceId};

/// Component instances of one run, indexed by the contracts they export.
pub struct ComponentStorage {
    instances: Vec<ComponentInstance>,
    descriptors: Vec<Option<Arc<ComponentDescriptor>>>,
    by_contract: HashMap<String, Vec<InstanceId>>,
}

impl ComponentStorage {
    /// Fetch descriptors for every instance and build the contract index.
    ///
    /// Fails as a whole when type information for any instance is unavailable.
    pub fn build(
        types: &dyn TypeServices,
        instances: Vec<ComponentInstance>,
    ) -> Result<Self, CompositionError> {
        let mut descriptors = Vec::with_capacity(instances.len());
        let mut by_contract: HashMap<String, Vec<InstanceId>> = HashMap::new();

        for (index, instance) in instances.iter().enumerate() {
            let descriptor = types
                .component_descriptor(&instance.type_name)
                .map_err(|e| {
                    warn!(instance = %instance.name, error = %e, "component storage failed");
                    CompositionError::StorageFailure {
                        type_name: instance.type_name.clone(),
                        reason: e.to_string(),
                    }
                })?;

            if let Some(descriptor) = &descriptor {
                let id = InstanceId(index);
                for export in &descriptor.exports {
                    let entry = by_contract.entry(export.contract.clone()).or_default();
                    if entry.last() != Some(&id) {
                        entry.push(id);
                    }
                }
                trace!(
                    instance = %instance.name,
                    exports = descriptor.exports.len(),
                    "indexed component"
                );
            }
            descriptors.push(descriptor);
        }

        Ok(Self {
            instances,
            descriptors,
            by_contract,
        })
    }

    /// Instances exporting `contract`, in insertion order.
    pub fn candidates(&self, contract: &str) -> &[InstanceId] {
        self.by_contract
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn instance(&self, id: InstanceId) -> &ComponentInstance {
        &self.instances[id.0]
    }

    pub fn descriptor(&self, id: InstanceId) -> Option<&Arc<ComponentDescriptor>> {
        self.descriptors[id.0].as_ref()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> {
        (0..self.instances.len()).map(InstanceId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TypeCatalog;
    use crate::descriptor::ExportDeclaration;

    fn catalog() -> TypeCatalog {
        TypeCatalog::new()
            .with_component(
                ComponentDescriptor::new("Console")
                    .with_export(ExportDeclaration::new("Log", "Console"))
                    .with_export(
                        ExportDeclaration::new("Log", "Console").with_metadata("Level", "debug"),
                    ),
            )
            .with_component(
                ComponentDescriptor::new("File").with_export(ExportDeclaration::new("Log", "File")),
            )
    }

    #[test]
    fn indexes_each_instance_once_per_contract() {
        let storage = ComponentStorage::build(
            &catalog(),
            vec![
                ComponentInstance::new("plain", "Plain"),
                ComponentInstance::new("console", "Console"),
                ComponentInstance::new("file", "File"),
            ],
        )
        .unwrap();

        assert_eq!(storage.candidates("Log"), &[InstanceId(1), InstanceId(2)]);
        assert!(storage.candidates("Missing").is_empty());
        assert!(storage.descriptor(InstanceId(0)).is_none());
    }

    #[test]
    fn unresolvable_type_fails_the_storage() {
        let types = catalog().with_unresolvable("Broken");
        let err = ComponentStorage::build(
            &types,
            vec![
                ComponentInstance::new("console", "Console"),
                ComponentInstance::new("broken", "Broken"),
            ],
        )
        .err()
        .unwrap();

        assert!(matches!(
            err,
            CompositionError::StorageFailure { ref type_name, .. } if type_name == "Broken"
        ));
    }
}
