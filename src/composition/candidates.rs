use tracing::trace;

use crate::descriptor::{Cardinality, ImportDeclaration};
use crate::types::TypeServices;

use super::matcher::{match_export, ExportMatch, MetadataMismatch};
use super::storage::ComponentStorage;
use super::{InstanceId, InstanceRecord, PointId};

/// A component exporting an import's contract, with its export points split
/// by metadata outcome.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub instance: InstanceId,
    pub matching: Vec<PointId>,
    pub rejected: Vec<(PointId, MetadataMismatch)>,
}

impl Candidate {
    /// One matching export, or several when the import takes many.
    pub(crate) fn is_accepted(&self, cardinality: Cardinality) -> bool {
        match self.matching.len() {
            0 => false,
            1 => true,
            _ => cardinality == Cardinality::Many,
        }
    }

    /// Several matching exports offered to a single import.
    pub(crate) fn is_ambiguous(&self, cardinality: Cardinality) -> bool {
        self.matching.len() > 1 && cardinality != Cardinality::Many
    }
}

/// All candidates for `import`, in storage order, whether accepted or not.
pub(crate) fn export_candidates(
    types: &dyn TypeServices,
    storage: &ComponentStorage,
    records: &[InstanceRecord],
    import: &ImportDeclaration,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for &instance in storage.candidates(&import.contract) {
        let Some(descriptor) = storage.descriptor(instance) else {
            continue;
        };
        let points = &records[instance.0].export_points;

        let mut candidate = Candidate {
            instance,
            matching: Vec::new(),
            rejected: Vec::new(),
        };
        for (export, &point) in descriptor.exports.iter().zip(points) {
            match match_export(types, import, export) {
                ExportMatch::Matched => candidate.matching.push(point),
                ExportMatch::Rejected(reason) => candidate.rejected.push((point, reason)),
                ExportMatch::ContractMismatch => {}
            }
        }

        trace!(
            contract = %import.contract,
            candidate = %storage.instance(instance).name,
            matching = candidate.matching.len(),
            rejected = candidate.rejected.len(),
            "classified candidate"
        );
        candidates.push(candidate);
    }

    candidates
}
