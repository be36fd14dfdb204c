use crate::descriptor::ImportDeclaration;
use crate::error::ErrorKind;

use super::matcher::MetadataMismatch;

pub(crate) fn no_exports(import: &ImportDeclaration) -> String {
    format!("no exports match contract '{}'", import.contract)
}

pub(crate) fn incompatible_metadata(import: &ImportDeclaration) -> String {
    let view = import
        .metadata_type
        .as_ref()
        .map(|view| view.type_name.as_str())
        .unwrap_or_default();
    format!(
        "exports for contract '{}' exist but their metadata is incompatible with '{view}'",
        import.contract
    )
}

pub(crate) fn circular(import: &ImportDeclaration) -> String {
    format!(
        "circular prerequisite: every candidate for contract '{}' is still resolving its own prerequisites",
        import.contract
    )
}

pub(crate) fn ambiguous(import: &ImportDeclaration, count: usize) -> String {
    format!(
        "ambiguous import: {count} exports match contract '{}' but only one is accepted",
        import.contract
    )
}

pub(crate) fn dependency_failed(component: &str) -> String {
    format!("depends on component '{component}' that could not be instantiated")
}

pub(crate) fn export_ambiguous(importer: &str) -> String {
    format!("ambiguous export for import {importer}")
}

pub(crate) fn export_several_matches(importer: &str) -> String {
    format!("component offers several matching exports to the single import {importer}")
}

pub(crate) fn export_circular(importer: &str) -> String {
    format!("cannot serve {importer}: component is still resolving its prerequisites (circular)")
}

pub(crate) fn export_metadata(importer: &str, mismatch: &MetadataMismatch) -> String {
    let label = ErrorKind::IncompatibleMetadata.label();
    format!("{label} for {importer}: {mismatch}")
}

pub(crate) fn export_unusable(importer: &str) -> String {
    format!("could not be used by {importer}: the component failed")
}

pub(crate) fn export_type(importer: &str, export_type: &str, expected: &str) -> String {
    format!("'{export_type}' delivered to {importer} is not assignable to '{expected}'")
}

pub(crate) fn type_mismatch(value_type: &str, declared: &str) -> String {
    format!("value of type '{value_type}' is not assignable to declared type '{declared}'")
}

pub(crate) fn missing_constructor(type_name: &str) -> String {
    format!("'{type_name}' declares neither an importing nor a parameterless constructor")
}

pub(crate) fn missing_collection_getter(import: &ImportDeclaration) -> String {
    format!(
        "'{}' is a mutable collection but {} has no compatible getter to fill it through",
        import.declared_type,
        import.site_label()
    )
}

pub(crate) fn missing_add(collection: &str, element: &str) -> String {
    format!("collection '{collection}' has no add operation accepting '{element}'")
}

pub(crate) fn null_collection(import: &ImportDeclaration) -> String {
    format!(
        "collection behind {} is null and cannot be filled",
        import.site_label()
    )
}

pub(crate) fn no_setter(import: &ImportDeclaration) -> String {
    format!(
        "{} is a constructor slot listed among normal imports and has no setter",
        import.site_label()
    )
}
