use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::descriptor::ComponentDescriptor;
use crate::error::TypeError;

/// Name of constructor methods as seen through [`TypeServices`].
pub const CONSTRUCTOR: &str = "new";

/// Name of the collection method used to fill many-valued imports.
pub const COLLECTION_ADD: &str = "add";

/// Signature of a method known to the type service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Type declaring the method.
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub return_type: Option<String>,
}

impl MethodSignature {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
        }
    }

    pub fn with_parameter(mut self, ty: impl Into<String>) -> Self {
        self.parameters.push(ty.into());
        self
    }

    pub fn returning(mut self, ty: impl Into<String>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Parameterless constructor of `owner`.
    pub fn default_constructor(owner: impl Into<String>) -> Self {
        Self::new(owner, CONSTRUCTOR)
    }

    /// Property setter `set_{property}(ty)`.
    pub fn setter(owner: impl Into<String>, property: &str, ty: impl Into<String>) -> Self {
        Self::new(owner, format!("set_{property}")).with_parameter(ty)
    }

    /// Property getter `get_{property}() -> ty`.
    pub fn getter(owner: impl Into<String>, property: &str, ty: impl Into<String>) -> Self {
        Self::new(owner, format!("get_{property}")).returning(ty)
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.owner, self.name, self.parameters.join(", "))?;
        if let Some(ret) = &self.return_type {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

/// Type/assembly service consulted by the composer.
///
/// The composer never discovers descriptors itself; everything it knows about
/// types flows through this trait.
pub trait TypeServices {
    /// Descriptor for the instance's type.
    ///
    /// `Ok(None)` means the type is not a component. `Err` means type
    /// information is unavailable, which aborts the whole run.
    fn component_descriptor(
        &self,
        type_name: &str,
    ) -> Result<Option<Arc<ComponentDescriptor>>, TypeError>;

    /// All overloads of `name` declared on `ty`, in declaration order.
    fn get_overloads(&self, ty: &str, name: &str) -> Vec<MethodSignature>;

    /// First overload of `name` on `ty`, if any.
    fn try_get_method(&self, ty: &str, name: &str) -> Option<MethodSignature> {
        self.get_overloads(ty, name).into_iter().next()
    }

    /// Whether a value of `candidate` type can be assigned to `target`.
    fn is_of_type(&self, candidate: &str, target: &str) -> bool;

    /// Whether `ty` is a mutable collection that exposes an `add` operation.
    fn is_mutable_collection(&self, ty: &str) -> bool;
}
