mod common;

use component_composer::{
    CallIntent, ComponentDescriptor, ErrorKind, ExportDeclaration, ImportDeclaration,
    InstanceState, MethodSignature, Value,
};

use common::{calls_named, catalog, compose, export_warnings, import_error};

/// A normal import is wired to the single matching self-export.
#[test]
fn test_single_import_is_wired_through_setter() {
    let types = catalog(vec![
        ComponentDescriptor::new("Client")
            .with_import(ImportDeclaration::property("Client", "Logger", "X", "ILogger")),
        ComponentDescriptor::new("Service").with_export(ExportDeclaration::new("X", "Service")),
    ])
    .with_supertype("Service", "ILogger");

    let result = compose(&types, &[("a", "Client"), ("b", "Service")]);

    assert!(!result.failed());
    assert_eq!(result.error_message(), None);

    let wiring: Vec<_> = result.wiring().collect();
    assert_eq!(wiring.len(), 1);
    assert_eq!(Some(wiring[0].import), result.import_point("a", "Logger"));
    assert_eq!(Some(wiring[0].export), result.export_point("b", "X"));
    assert_eq!(wiring[0].contract, "X");

    let sets = calls_named(&result, "set_Logger");
    assert_eq!(sets.len(), 1);
    let b = result.instance_id("b").unwrap();
    assert_eq!(sets[0].args(), &[Value::Instance(b)]);

    assert_eq!(result.instance("a").unwrap().state, InstanceState::Satisfied);
    assert_eq!(result.instance("b").unwrap().state, InstanceState::Satisfied);
}

/// Two importing constructors requiring each other are reported as a cycle on both slots.
#[test]
fn test_mutual_constructor_imports_are_circular() {
    let types = catalog(vec![
        ComponentDescriptor::new("Alpha")
            .with_importing_constructor(vec![ImportDeclaration::parameter(0, "X", "Beta")])
            .with_export(ExportDeclaration::new("Y", "Alpha")),
        ComponentDescriptor::new("Beta")
            .with_importing_constructor(vec![ImportDeclaration::parameter(0, "Y", "Alpha")])
            .with_export(ExportDeclaration::new("X", "Beta")),
    ]);

    let result = compose(&types, &[("a", "Alpha"), ("b", "Beta")]);

    assert!(result.failed());
    assert_eq!(import_error(&result, "a", "ctor[0]"), Some(ErrorKind::CircularPrerequisite));
    assert_eq!(import_error(&result, "b", "ctor[0]"), Some(ErrorKind::CircularPrerequisite));
    assert_eq!(result.instance("a").unwrap().state, InstanceState::Failed);
    assert_eq!(result.instance("b").unwrap().state, InstanceState::Failed);
    assert!(calls_named(&result, "new").is_empty());
    assert_eq!(result.wiring().count(), 0);
}

/// Three exporters for a single import make it ambiguous and warn on every export.
#[test]
fn test_three_exporters_for_single_import_are_ambiguous() {
    let types = catalog(vec![
        ComponentDescriptor::new("Host")
            .with_import(ImportDeclaration::property("Host", "Plugin", "X", "Plugin")),
        ComponentDescriptor::new("Plugin").with_export(ExportDeclaration::new("X", "Plugin")),
    ]);

    let result = compose(
        &types,
        &[("host", "Host"), ("p1", "Plugin"), ("p2", "Plugin"), ("p3", "Plugin")],
    );

    assert!(result.failed());
    assert_eq!(import_error(&result, "host", "Plugin"), Some(ErrorKind::AmbiguousImport));
    for plugin in ["p1", "p2", "p3"] {
        let warnings = export_warnings(&result, plugin, "X");
        assert_eq!(warnings, vec!["ambiguous export for import host.Plugin".to_string()]);
    }

    let import = result.import_point("host", "Plugin").unwrap();
    assert_eq!(result.joins_for(import).filter(|join| join.is_error_join).count(), 3);
    assert_eq!(result.wiring().count(), 0);
    assert!(calls_named(&result, "set_Plugin").is_empty());
}

/// A defaultable import without exporters succeeds without delivering anything.
#[test]
fn test_allow_default_without_exporter_delivers_nothing() {
    let types = catalog(vec![ComponentDescriptor::new("Host").with_import(
        ImportDeclaration::property("Host", "Cache", "Z", "ICache").allow_default(),
    )]);

    let result = compose(&types, &[("host", "Host")]);

    assert!(!result.failed());
    assert_eq!(import_error(&result, "host", "Cache"), None);
    assert!(calls_named(&result, "set_Cache").is_empty());
    assert_eq!(result.joins().len(), 0);
    assert_eq!(result.instance("host").unwrap().state, InstanceState::Satisfied);
}

/// A many-import declared as a mutable collection is filled with one `add` per export.
#[test]
fn test_collection_import_is_filled_in_discovery_order() {
    let types = catalog(vec![
        ComponentDescriptor::new("Host").with_import(
            ImportDeclaration::property("Host", "Plugins", "X", "List<IPlugin>").many("IPlugin"),
        ),
        ComponentDescriptor::new("Plugin").with_export(ExportDeclaration::new("X", "Plugin")),
    ])
    .with_supertype("Plugin", "IPlugin")
    .with_collection("List<IPlugin>", "IPlugin")
    .with_method(MethodSignature::getter("Host", "Plugins", "List<IPlugin>"));

    let result = compose(
        &types,
        &[("host", "Host"), ("p1", "Plugin"), ("p2", "Plugin"), ("p3", "Plugin")],
    );

    assert!(!result.failed(), "{:?}", result.error_message());
    assert!(calls_named(&result, "set_Plugins").is_empty());

    let reads = calls_named(&result, "get_Plugins");
    assert_eq!(reads.len(), 1);
    let CallIntent::CallWithReturn { result: collection, .. } = &reads[0] else {
        panic!("collection getter should return a value");
    };
    let collection = Value::Returned(*collection);

    let adds = calls_named(&result, "add");
    assert_eq!(adds.len(), 3);
    for (intent, plugin) in adds.iter().zip(["p1", "p2", "p3"]) {
        let CallIntent::Call { target, args, .. } = intent else {
            panic!("add should be a plain call");
        };
        assert_eq!(target, &collection);
        assert_eq!(args, &[Value::Instance(result.instance_id(plugin).unwrap())]);
    }

    let import = result.import_point("host", "Plugins").unwrap();
    assert_eq!(result.joins_for(import).count(), 3);
}
