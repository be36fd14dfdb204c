pub mod call;
pub mod catalog;
pub mod composition;
pub mod descriptor;
pub mod error;
pub mod types;
pub mod value;

pub use call::{CallContext, CallIntent, CallLog, CallRecorder, SharedContext};
pub use catalog::{Manifest, TypeCatalog};
pub use composition::composer::{ComposeOptions, Composer};
pub use composition::storage::ComponentStorage;
pub use composition::{
    ComponentInstance, CompositionResult, InstanceId, InstanceRecord, InstanceState, Join,
    JoinPoint, PointId, PointSite,
};
pub use descriptor::{
    Cardinality, ComponentDescriptor, ExportDeclaration, ImportDeclaration, ImportSite,
    ImportingConstructor, ItemType, MetadataBag, MetadataMember, MetadataShape, MetadataType,
    MetadataValue,
};
pub use error::{CompositionError, Diagnostic, ErrorKind, TypeError};
pub use types::{MethodSignature, TypeServices};
pub use value::{Deferred, LazyValue, MetadataProxy, NativeClosure, ResultId, Value};
