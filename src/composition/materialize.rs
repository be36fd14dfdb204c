use std::rc::Rc;

use crate::descriptor::{Cardinality, ExportDeclaration, ImportDeclaration, ImportSite};
use crate::error::{Diagnostic, ErrorKind};
use crate::types::{MethodSignature, COLLECTION_ADD};
use crate::value::{Deferred, MetadataProxy, NativeClosure, Value};

use super::diagnostics;
use super::worker::{CompositionWorker, Unsatisfied};
use super::{InstanceId, PointId, PointSite};

impl CompositionWorker<'_> {
    /// Materialize and deliver a satisfied normal import through its setter,
    /// or by filling its collection.
    pub(crate) fn deliver(
        &mut self,
        owner: InstanceId,
        point: PointId,
        import: &ImportDeclaration,
    ) -> Result<(), Unsatisfied> {
        let ImportSite::Property {
            name,
            setter,
            getter,
        } = &import.site
        else {
            return Err(self.fail_import(
                point,
                ErrorKind::UnsatisfiedImport,
                diagnostics::no_setter(import),
            ));
        };

        let exports = self.pending.get(&point).cloned().unwrap_or_default();
        if exports.is_empty() {
            self.pending.remove(&point);
            return Ok(());
        }

        if self.is_collection_import(import) {
            let getter = getter
                .clone()
                .or_else(|| self.collection_getter(owner, name));
            self.fill_collection(owner, point, import, getter, &exports)?;
        } else {
            let value = self.resolve_value(point, import, &exports)?;
            self.context
                .borrow_mut()
                .call(&Value::Instance(owner), setter, vec![value]);
        }

        self.commit_joins(point);
        Ok(())
    }

    /// Check one importing-constructor slot before any value is materialized.
    pub(crate) fn check_parameter(
        &mut self,
        point: PointId,
        import: &ImportDeclaration,
    ) -> Result<(), Unsatisfied> {
        let exports = self.pending.get(&point).cloned().unwrap_or_default();
        if exports.is_empty() {
            return Ok(());
        }
        if self.is_collection_import(import) {
            return Err(self.fail_import(
                point,
                ErrorKind::MissingCollectionGetter,
                diagnostics::missing_collection_getter(import),
            ));
        }
        self.check_value(point, import, &exports)
    }

    /// Value for a checked constructor slot; `Null` when nothing matched.
    pub(crate) fn parameter_value(&mut self, point: PointId, import: &ImportDeclaration) -> Value {
        match self.pending.get(&point).cloned() {
            Some(exports) if !exports.is_empty() => self.build_value(import, &exports),
            _ => Value::Null,
        }
    }

    fn is_collection_import(&self, import: &ImportDeclaration) -> bool {
        import.cardinality == Cardinality::Many
            && self.types.is_mutable_collection(&import.declared_type)
    }

    fn collection_getter(&self, owner: InstanceId, property: &str) -> Option<MethodSignature> {
        let owner_type = &self.records[owner.0].type_name;
        self.types
            .try_get_method(owner_type, &format!("get_{property}"))
    }

    /// Single value or fixed-size array for the matched exports.
    fn resolve_value(
        &mut self,
        point: PointId,
        import: &ImportDeclaration,
        exports: &[PointId],
    ) -> Result<Value, Unsatisfied> {
        self.check_value(point, import, exports)?;
        Ok(self.build_value(import, exports))
    }

    fn check_value(
        &mut self,
        point: PointId,
        import: &ImportDeclaration,
        exports: &[PointId],
    ) -> Result<(), Unsatisfied> {
        self.check_export_types(point, import, exports)?;
        let element_type = import.item_type.element_type(import.metadata_type.as_ref());
        let value_type = match import.cardinality {
            Cardinality::Single => element_type,
            Cardinality::Many => format!("{element_type}[]"),
        };
        self.check_assignable(point, &value_type, &import.declared_type)
    }

    fn build_value(&mut self, import: &ImportDeclaration, exports: &[PointId]) -> Value {
        match import.cardinality {
            Cardinality::Single => {
                debug_assert_eq!(exports.len(), 1);
                self.export_value(import, exports[0])
            }
            Cardinality::Many => {
                let element_type = import.item_type.element_type(import.metadata_type.as_ref());
                let items = exports
                    .iter()
                    .map(|&export| self.export_value(import, export))
                    .collect();
                Value::Array {
                    element_type,
                    items,
                }
            }
        }
    }

    /// Read the current collection through its getter and add each export to it.
    fn fill_collection(
        &mut self,
        owner: InstanceId,
        point: PointId,
        import: &ImportDeclaration,
        getter: Option<MethodSignature>,
        exports: &[PointId],
    ) -> Result<(), Unsatisfied> {
        let getter = getter.and_then(|getter| {
            let collection_type = getter.return_type.clone()?;
            self.types
                .is_mutable_collection(&collection_type)
                .then_some((getter, collection_type))
        });
        let Some((getter, collection_type)) = getter else {
            return Err(self.fail_import(
                point,
                ErrorKind::MissingCollectionGetter,
                diagnostics::missing_collection_getter(import),
            ));
        };

        self.check_export_types(point, import, exports)?;
        let element_type = import.item_type.element_type(import.metadata_type.as_ref());
        let add = self
            .types
            .get_overloads(&collection_type, COLLECTION_ADD)
            .into_iter()
            .find(|method| match method.parameters.as_slice() {
                [param] => self.types.is_of_type(&element_type, param),
                _ => false,
            });
        let Some(add) = add else {
            return Err(self.fail_import(
                point,
                ErrorKind::TypeMismatch,
                diagnostics::missing_add(&collection_type, &element_type),
            ));
        };

        let collection = self
            .context
            .borrow_mut()
            .call_with_return(&Value::Instance(owner), &getter, Vec::new());
        if self.context.borrow().is_null(&collection) {
            return Err(self.fail_import(
                point,
                ErrorKind::NullCollection,
                diagnostics::null_collection(import),
            ));
        }

        for &export in exports {
            let value = self.export_value(import, export);
            self.context.borrow_mut().call(&collection, &add, vec![value]);
        }
        Ok(())
    }

    /// Every matched export must provide the import's value type.
    fn check_export_types(
        &mut self,
        point: PointId,
        import: &ImportDeclaration,
        exports: &[PointId],
    ) -> Result<(), Unsatisfied> {
        let expected = import.item_type.value_type();
        let mismatched: Vec<(PointId, String)> = exports
            .iter()
            .filter_map(|&export| {
                let (_, declaration) = self.export_declaration(export);
                (!self.types.is_of_type(&declaration.type_name, expected))
                    .then(|| (export, declaration.type_name.clone()))
            })
            .collect();

        let Some((_, first_type)) = mismatched.first().cloned() else {
            return Ok(());
        };
        let importer = self.describe(point);
        for (export, export_type) in mismatched {
            self.warn(export, diagnostics::export_type(&importer, &export_type, expected));
            self.error_join(point, export);
        }
        Err(self.fail_import(
            point,
            ErrorKind::TypeMismatch,
            diagnostics::type_mismatch(&first_type, expected),
        ))
    }

    fn check_assignable(
        &mut self,
        point: PointId,
        value_type: &str,
        declared_type: &str,
    ) -> Result<(), Unsatisfied> {
        if self.types.is_of_type(value_type, declared_type) {
            return Ok(());
        }
        Err(self.fail_import(
            point,
            ErrorKind::TypeMismatch,
            diagnostics::type_mismatch(value_type, declared_type),
        ))
    }

    /// Value of one export: the instance itself, its getter's result, or a lazy wrapper.
    fn export_value(&mut self, import: &ImportDeclaration, export: PointId) -> Value {
        let (owner, declaration) = self.export_declaration(export);
        let target = Value::Instance(owner);

        if import.item_type.is_lazy() {
            return self.lazy_value(import, target, declaration);
        }
        match &declaration.getter {
            None => target,
            Some(getter) => self
                .context
                .borrow_mut()
                .call_with_return(&target, getter, Vec::new()),
        }
    }

    fn lazy_value(
        &mut self,
        import: &ImportDeclaration,
        target: Value,
        declaration: ExportDeclaration,
    ) -> Value {
        let context = Rc::clone(&self.context);
        let getter = declaration.getter;
        let deferred = Deferred::new(move || match getter {
            None => target,
            Some(getter) => context
                .borrow_mut()
                .call_with_return(&target, &getter, Vec::new()),
        });

        let metadata = import.metadata_type.as_ref().map(|view| {
            let proxy = MetadataProxy::new(view.type_name.clone(), declaration.metadata);
            self.context
                .borrow_mut()
                .call_direct_with_return(&NativeClosure::metadata_proxy(proxy), Vec::new())
        });

        let type_name = import.item_type.element_type(import.metadata_type.as_ref());
        let closure = NativeClosure::lazy_wrapper(type_name, deferred, metadata);
        self.context
            .borrow_mut()
            .call_direct_with_return(&closure, Vec::new())
    }

    fn export_declaration(&self, export: PointId) -> (InstanceId, ExportDeclaration) {
        let point = &self.points[export.0];
        let PointSite::Export(index) = point.site else {
            unreachable!("pending join targets an import point");
        };
        let descriptor = self.descriptor(point.instance);
        (point.instance, descriptor.exports[index].clone())
    }

    fn fail_import(&mut self, point: PointId, kind: ErrorKind, message: String) -> Unsatisfied {
        self.pending.remove(&point);
        self.record_error(point, Diagnostic::new(kind, message));
        Unsatisfied::new(kind)
    }
}
