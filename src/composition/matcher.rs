use std::fmt;

use crate::descriptor::{ExportDeclaration, ImportDeclaration, MetadataShape, MetadataType};
use crate::types::TypeServices;

/// Why an export's metadata does not satisfy an import's metadata view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MetadataMismatch {
    MissingKey(String),
    NotSingle { key: String, count: usize },
    WrongType {
        key: String,
        expected: String,
        found: String,
    },
}

impl fmt::Display for MetadataMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataMismatch::MissingKey(key) => write!(f, "metadata key '{key}' is missing"),
            MetadataMismatch::NotSingle { key, count } => {
                write!(f, "metadata key '{key}' holds {count} values, expected exactly one")
            }
            MetadataMismatch::WrongType {
                key,
                expected,
                found,
            } => write!(f, "metadata key '{key}' holds a '{found}', expected '{expected}'"),
        }
    }
}

/// Outcome of matching one export against one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExportMatch {
    Matched,
    ContractMismatch,
    /// Contract matched, metadata did not.
    Rejected(MetadataMismatch),
}

/// Match `export` against `import`: exact, case-sensitive contract, then metadata.
pub(crate) fn match_export(
    types: &dyn TypeServices,
    import: &ImportDeclaration,
    export: &ExportDeclaration,
) -> ExportMatch {
    if import.contract != export.contract {
        return ExportMatch::ContractMismatch;
    }
    match check_metadata(types, import, export) {
        Ok(()) => ExportMatch::Matched,
        Err(mismatch) => ExportMatch::Rejected(mismatch),
    }
}

/// Check the export's metadata bag against the import's metadata view, if any.
fn check_metadata(
    types: &dyn TypeServices,
    import: &ImportDeclaration,
    export: &ExportDeclaration,
) -> Result<(), MetadataMismatch> {
    match &import.metadata_type {
        Some(view) => check_view(types, view, export),
        None => Ok(()),
    }
}

fn check_view(
    types: &dyn TypeServices,
    view: &MetadataType,
    export: &ExportDeclaration,
) -> Result<(), MetadataMismatch> {
    for member in &view.members {
        let values = export
            .metadata
            .get(&member.key)
            .ok_or_else(|| MetadataMismatch::MissingKey(member.key.clone()))?;

        let expected = match &member.shape {
            MetadataShape::Value(ty) => {
                if values.len() != 1 {
                    return Err(MetadataMismatch::NotSingle {
                        key: member.key.clone(),
                        count: values.len(),
                    });
                }
                ty
            }
            MetadataShape::Array(ty) => ty,
        };

        if let Some(bad) = values.iter().find(|v| !types.is_of_type(v.type_name(), expected)) {
            return Err(MetadataMismatch::WrongType {
                key: member.key.clone(),
                expected: expected.clone(),
                found: bad.type_name().to_string(),
            });
        }
    }
    Ok(())
}
