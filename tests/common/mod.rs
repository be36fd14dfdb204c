#![allow(dead_code)]

use component_composer::{
    CallIntent, CallRecorder, ComponentDescriptor, ComponentInstance, ComposeOptions, Composer,
    CompositionResult, ErrorKind, MethodSignature, TypeCatalog,
};

/// Catalog with every listed component and a parameterless constructor for
/// each component lacking an importing constructor.
pub fn catalog(components: Vec<ComponentDescriptor>) -> TypeCatalog {
    components
        .into_iter()
        .fold(TypeCatalog::new(), |catalog, descriptor| {
            let catalog = if descriptor.constructor.is_none() {
                let ctor = MethodSignature::default_constructor(descriptor.type_name.clone());
                catalog.with_method(ctor)
            } else {
                catalog
            };
            catalog.with_component(descriptor)
        })
}

pub fn instances(pairs: &[(&str, &str)]) -> Vec<ComponentInstance> {
    pairs
        .iter()
        .map(|(name, ty)| ComponentInstance::new(*name, *ty))
        .collect()
}

pub fn compose(types: &TypeCatalog, pairs: &[(&str, &str)]) -> CompositionResult {
    compose_with(types, pairs, ComposeOptions::default(), CallRecorder::new())
}

pub fn compose_with(
    types: &TypeCatalog,
    pairs: &[(&str, &str)],
    options: ComposeOptions,
    recorder: CallRecorder,
) -> CompositionResult {
    let mut composer = Composer::new(types);
    composer
        .add_all(instances(pairs))
        .with_options(options)
        .with_recorder(recorder);
    composer.compose().unwrap()
}

/// Recorded intents invoking a method or closure named `name`.
pub fn calls_named(result: &CompositionResult, name: &str) -> Vec<CallIntent> {
    result
        .calls()
        .intents()
        .into_iter()
        .filter(|intent| intent.method_name() == name)
        .collect()
}

/// Error kind recorded on the import labelled `label` of `instance`.
pub fn import_error(result: &CompositionResult, instance: &str, label: &str) -> Option<ErrorKind> {
    let point = result.import_point(instance, label)?;
    result.point(point).error().map(|error| error.kind)
}

/// Warnings attached to the first export of `contract` on `instance`.
pub fn export_warnings(result: &CompositionResult, instance: &str, contract: &str) -> Vec<String> {
    result
        .export_point(instance, contract)
        .map(|point| result.point(point).warnings().to_vec())
        .unwrap_or_default()
}
