use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MethodSignature, CONSTRUCTOR};

/// How many exports an import accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Single,
    Many,
}

/// Element type of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// The export value itself.
    Direct(String),
    /// A lazy wrapper around the export value of this type.
    Lazy(String),
}

impl ItemType {
    /// Type of the wrapped export value.
    pub fn value_type(&self) -> &str {
        match self {
            ItemType::Direct(ty) | ItemType::Lazy(ty) => ty,
        }
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ItemType::Lazy(_))
    }

    /// Type name of one delivered element, `Lazy<T>` or `Lazy<T, M>` for lazy items.
    pub fn element_type(&self, metadata: Option<&MetadataType>) -> String {
        match (self, metadata) {
            (ItemType::Direct(ty), _) => ty.clone(),
            (ItemType::Lazy(ty), None) => format!("Lazy<{ty}>"),
            (ItemType::Lazy(ty), Some(meta)) => format!("Lazy<{ty}, {}>", meta.type_name),
        }
    }
}

/// Return shape of a metadata view member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataShape {
    /// Exactly one stored value of this type.
    Value(String),
    /// Any number of stored values, each assignable to this type.
    Array(String),
}

/// One metadata-retrieving member of a metadata view type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMember {
    /// Metadata key the member reads.
    pub key: String,
    pub shape: MetadataShape,
}

/// Metadata view type an import filters its candidates with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataType {
    pub type_name: String,
    #[serde(default)]
    pub members: Vec<MetadataMember>,
}

impl MetadataType {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, ty: impl Into<String>) -> Self {
        self.members.push(MetadataMember {
            key: key.into(),
            shape: MetadataShape::Value(ty.into()),
        });
        self
    }

    pub fn with_array(mut self, key: impl Into<String>, ty: impl Into<String>) -> Self {
        self.members.push(MetadataMember {
            key: key.into(),
            shape: MetadataShape::Array(ty.into()),
        });
        self
    }
}

/// A value stored in an export's metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValue {
    Str(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    /// Arbitrary value tagged with its type name.
    Typed { type_name: String, value: String },
}

impl MetadataValue {
    pub fn type_name(&self) -> &str {
        match self {
            MetadataValue::Str(_) => "string",
            MetadataValue::Int(_) => "int",
            MetadataValue::Bool(_) => "bool",
            MetadataValue::Float(_) => "float",
            MetadataValue::Typed { type_name, .. } => type_name,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Str(s) => write!(f, "{s:?}"),
            MetadataValue::Int(i) => write!(f, "{i}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Float(x) => write!(f, "{x}"),
            MetadataValue::Typed { type_name, value } => write!(f, "{value}: {type_name}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Str(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Metadata bag of an export: key to one or more values.
pub type MetadataBag = BTreeMap<String, Vec<MetadataValue>>;

/// Where an import's value is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSite {
    /// A settable member. `getter` reads the current value for collection fills.
    Property {
        name: String,
        setter: MethodSignature,
        #[serde(default)]
        getter: Option<MethodSignature>,
    },
    /// A slot of the importing constructor.
    Parameter { index: usize },
}

/// A dependency declared by a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDeclaration {
    pub contract: String,
    pub item_type: ItemType,
    /// Type the delivery site accepts.
    pub declared_type: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub allow_default: bool,
    #[serde(default)]
    pub is_prerequisite: bool,
    #[serde(default)]
    pub metadata_type: Option<MetadataType>,
    pub site: ImportSite,
}

impl ImportDeclaration {
    /// Single import delivered through `set_{property}(ty)` on `owner`.
    pub fn property(
        owner: &str,
        property: &str,
        contract: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        let ty = ty.into();
        Self {
            contract: contract.into(),
            item_type: ItemType::Direct(ty.clone()),
            site: ImportSite::Property {
                name: property.to_string(),
                setter: MethodSignature::setter(owner, property, ty.clone()),
                getter: None,
            },
            declared_type: ty,
            cardinality: Cardinality::Single,
            allow_default: false,
            is_prerequisite: false,
            metadata_type: None,
        }
    }

    /// Single prerequisite import delivered as constructor argument `index`.
    pub fn parameter(index: usize, contract: impl Into<String>, ty: impl Into<String>) -> Self {
        let ty = ty.into();
        Self {
            contract: contract.into(),
            item_type: ItemType::Direct(ty.clone()),
            declared_type: ty,
            cardinality: Cardinality::Single,
            allow_default: false,
            is_prerequisite: true,
            metadata_type: None,
            site: ImportSite::Parameter { index },
        }
    }

    /// Turn into a many-valued import of `item_type` elements.
    ///
    /// Many-valued imports tolerate zero exports unless [`required`](Self::required)
    /// is called afterwards.
    pub fn many(mut self, item_type: impl Into<String>) -> Self {
        self.cardinality = Cardinality::Many;
        self.item_type = ItemType::Direct(item_type.into());
        self.allow_default = true;
        self
    }

    /// Wrap each delivered element in a lazy wrapper.
    ///
    /// A single import's declared type becomes the wrapper type.
    pub fn lazy(mut self) -> Self {
        self.item_type = ItemType::Lazy(self.item_type.value_type().to_string());
        self.sync_single_lazy();
        self
    }

    pub fn allow_default(mut self) -> Self {
        self.allow_default = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.allow_default = false;
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataType) -> Self {
        self.metadata_type = Some(metadata);
        self.sync_single_lazy();
        self
    }

    fn sync_single_lazy(&mut self) {
        if self.cardinality == Cardinality::Single && self.item_type.is_lazy() {
            let ty = self.item_type.element_type(self.metadata_type.as_ref());
            self.set_declared_type(ty);
        }
    }

    /// Replace the type the delivery site accepts, keeping the setter in sync.
    pub fn with_declared_type(mut self, ty: impl Into<String>) -> Self {
        self.set_declared_type(ty.into());
        self
    }

    fn set_declared_type(&mut self, ty: String) {
        if let ImportSite::Property { setter, .. } = &mut self.site {
            setter.parameters = vec![ty.clone()];
        }
        self.declared_type = ty;
    }

    pub fn with_getter(mut self, getter: MethodSignature) -> Self {
        if let ImportSite::Property { getter: slot, .. } = &mut self.site {
            *slot = Some(getter);
        }
        self
    }

    /// Short site label, e.g. `Logger` or `ctor[0]`.
    pub fn site_label(&self) -> String {
        match &self.site {
            ImportSite::Property { name, .. } => name.clone(),
            ImportSite::Parameter { index } => format!("ctor[{index}]"),
        }
    }
}

/// A service provided by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDeclaration {
    pub contract: String,
    pub type_name: String,
    /// Absent for self-exports: the value is the owning instance.
    #[serde(default)]
    pub getter: Option<MethodSignature>,
    #[serde(default)]
    pub metadata: MetadataBag,
}

impl ExportDeclaration {
    /// Self-export of the owning instance.
    pub fn new(contract: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            type_name: type_name.into(),
            getter: None,
            metadata: MetadataBag::new(),
        }
    }

    /// Export read through `get_{property}() -> ty` on `owner`.
    pub fn property(
        owner: &str,
        property: &str,
        contract: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        let ty = ty.into();
        Self {
            contract: contract.into(),
            getter: Some(MethodSignature::getter(owner, property, ty.clone())),
            type_name: ty,
            metadata: MetadataBag::new(),
        }
    }

    /// Append a metadata value under `key`.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<MetadataValue>,
    ) -> Self {
        self.metadata.entry(key.into()).or_default().push(value.into());
        self
    }

    pub fn is_self_export(&self) -> bool {
        self.getter.is_none()
    }

    pub fn site_label(&self) -> String {
        match &self.getter {
            Some(getter) => getter.name.clone(),
            None => "self".to_string(),
        }
    }
}

/// Importing constructor: invoked once all its parameters resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportingConstructor {
    pub method: MethodSignature,
    pub parameters: Vec<ImportDeclaration>,
}

/// Immutable description of a component type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub type_name: String,
    #[serde(default)]
    pub imports: Vec<ImportDeclaration>,
    #[serde(default)]
    pub exports: Vec<ExportDeclaration>,
    #[serde(default)]
    pub constructor: Option<ImportingConstructor>,
}

impl ComponentDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            imports: Vec::new(),
            exports: Vec::new(),
            constructor: None,
        }
    }

    pub fn with_import(mut self, import: ImportDeclaration) -> Self {
        self.imports.push(import);
        self
    }

    pub fn with_export(mut self, export: ExportDeclaration) -> Self {
        self.exports.push(export);
        self
    }

    /// Declare the importing constructor.
    ///
    /// Parameter imports are renumbered in the given order and flagged as
    /// prerequisites.
    pub fn with_importing_constructor(mut self, parameters: Vec<ImportDeclaration>) -> Self {
        let mut method = MethodSignature::new(self.type_name.clone(), CONSTRUCTOR);
        let parameters = parameters
            .into_iter()
            .enumerate()
            .map(|(index, mut param)| {
                param.is_prerequisite = true;
                param.site = ImportSite::Parameter { index };
                method.parameters.push(param.declared_type.clone());
                param
            })
            .collect();
        self.constructor = Some(ImportingConstructor { method, parameters });
        self
    }

    /// Imports that must resolve before construction.
    pub fn prerequisite_imports(&self) -> &[ImportDeclaration] {
        self.constructor
            .as_ref()
            .map(|ctor| ctor.parameters.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importing_constructor_flags_parameters() {
        let descriptor = ComponentDescriptor::new("Service").with_importing_constructor(vec![
            ImportDeclaration::property("Service", "ignored", "Log", "ILog"),
            ImportDeclaration::parameter(7, "Clock", "IClock"),
        ]);

        let ctor = descriptor.constructor.as_ref().unwrap();
        assert_eq!(ctor.method.parameters, vec!["ILog", "IClock"]);
        for (index, param) in descriptor.prerequisite_imports().iter().enumerate() {
            assert!(param.is_prerequisite);
            assert_eq!(param.site, ImportSite::Parameter { index });
        }
    }

    #[test]
    fn required_overrides_many_default() {
        let import = ImportDeclaration::property("Host", "Plugins", "Plugin", "Plugin[]")
            .many("Plugin")
            .required();
        assert_eq!(import.cardinality, Cardinality::Many);
        assert!(!import.allow_default);
    }

    #[test]
    fn declared_type_updates_setter_parameter() {
        let import = ImportDeclaration::property("Host", "Log", "Log", "ILog")
            .with_declared_type("IConsoleLog");
        assert_eq!(import.declared_type, "IConsoleLog");
        let ImportSite::Property { setter, .. } = &import.site else {
            panic!("expected property site");
        };
        assert_eq!(setter.parameters, vec!["IConsoleLog"]);
    }

    #[test]
    fn getter_less_export_is_a_self_export() {
        assert!(ExportDeclaration::new("Clock", "Clock").is_self_export());
        let property = ExportDeclaration::property("Config", "Port", "Port", "u16");
        assert!(!property.is_self_export());
        assert_eq!(property.site_label(), "get_Port");
    }

    #[test]
    fn lazy_element_type_includes_metadata_view() {
        let import = ImportDeclaration::property("Host", "Plugin", "Plugin", "IPlugin")
            .lazy()
            .with_metadata(MetadataType::new("IMeta"));
        assert_eq!(import.declared_type, "Lazy<IPlugin, IMeta>");
        let ImportSite::Property { setter, .. } = &import.site else {
            panic!("expected property site");
        };
        assert_eq!(setter.parameters, vec!["Lazy<IPlugin, IMeta>"]);

        let declared = "Lazy<IPlugin, IMeta>[]";
        let import = ImportDeclaration::property("Host", "Plugins", "Plugin", declared)
            .many("IPlugin")
            .lazy()
            .with_metadata(MetadataType::new("IMeta"));
        assert_eq!(
            import.item_type.element_type(import.metadata_type.as_ref()),
            "Lazy<IPlugin, IMeta>"
        );
        assert_eq!(import.declared_type, "Lazy<IPlugin, IMeta>[]");
        assert!(import.allow_default);
    }
}
