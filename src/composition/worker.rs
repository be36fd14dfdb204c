use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::call::{CallLog, SharedContext};
use crate::descriptor::{Cardinality, ComponentDescriptor, ImportDeclaration};
use crate::error::{CompositionError, Diagnostic, ErrorKind};
use crate::types::{TypeServices, CONSTRUCTOR};

use super::candidates::{export_candidates, Candidate};
use super::composer::ComposeOptions;
use super::diagnostics;
use super::storage::ComponentStorage;
use super::{
    CompositionResult, InstanceId, InstanceRecord, InstanceState, Join, JoinPoint, PointId,
    PointSite,
};

/// Failure of an import or a component, carrying the originating cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Unsatisfied {
    pub kind: ErrorKind,
}

impl Unsatisfied {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }
}

/// Runs the two-phase satisfaction algorithm over one storage.
///
/// All run state (instance states, join points, pending joins) lives here and
/// is dropped with the worker; only the finished [`CompositionResult`] survives.
pub(crate) struct CompositionWorker<'a> {
    pub(super) types: &'a dyn TypeServices,
    pub(super) storage: &'a ComponentStorage,
    pub(super) options: &'a ComposeOptions,
    pub(super) context: SharedContext,
    pub(super) records: Vec<InstanceRecord>,
    pub(super) points: Vec<JoinPoint>,
    joins: Vec<Join>,
    /// Matched export points per import point, in discovery order.
    pub(super) pending: HashMap<PointId, Vec<PointId>>,
    failures: Vec<Option<ErrorKind>>,
    /// Set once the constructor has been invoked; survives a later normal-phase failure.
    constructed: Vec<bool>,
    failed: bool,
}

impl<'a> CompositionWorker<'a> {
    pub(crate) fn new(
        types: &'a dyn TypeServices,
        storage: &'a ComponentStorage,
        options: &'a ComposeOptions,
        context: SharedContext,
    ) -> Self {
        let mut records = Vec::with_capacity(storage.len());
        let mut points = Vec::new();

        for id in storage.ids() {
            let descriptor = storage.descriptor(id).cloned();
            let mut record = InstanceRecord::new(storage.instance(id), descriptor.clone());

            if let Some(descriptor) = descriptor {
                for (index, import) in descriptor.imports.iter().enumerate() {
                    record.import_points.push(PointId(points.len()));
                    points.push(JoinPoint::new(
                        id,
                        PointSite::Import(index),
                        import.contract.clone(),
                        import.site_label(),
                    ));
                }
                for (index, import) in descriptor.prerequisite_imports().iter().enumerate() {
                    record.parameter_points.push(PointId(points.len()));
                    points.push(JoinPoint::new(
                        id,
                        PointSite::Parameter(index),
                        import.contract.clone(),
                        import.site_label(),
                    ));
                }
                for (index, export) in descriptor.exports.iter().enumerate() {
                    record.export_points.push(PointId(points.len()));
                    points.push(JoinPoint::new(
                        id,
                        PointSite::Export(index),
                        export.contract.clone(),
                        export.site_label(),
                    ));
                }
            }
            records.push(record);
        }

        Self {
            types,
            storage,
            options,
            context,
            failures: vec![None; records.len()],
            constructed: vec![false; records.len()],
            records,
            points,
            joins: Vec::new(),
            pending: HashMap::new(),
            failed: false,
        }
    }

    /// Satisfy every component instance, continuing past failed ones.
    pub(crate) fn run(&mut self) -> Result<(), CompositionError> {
        for id in self.storage.ids() {
            if self.records[id.0].descriptor.is_none() {
                continue;
            }
            if self.satisfy_pre_imports(id).is_err() {
                continue;
            }
            self.satisfy_norm_imports(id)?;
        }
        Ok(())
    }

    pub(crate) fn finish(self, calls: CallLog) -> CompositionResult {
        CompositionResult::new(self.records, self.points, self.joins, self.failed, calls)
    }

    /// Resolve prerequisite imports and invoke the constructor.
    pub(crate) fn satisfy_pre_imports(&mut self, id: InstanceId) -> Result<(), Unsatisfied> {
        match self.records[id.0].state {
            InstanceState::Constructed | InstanceState::Satisfied => return Ok(()),
            InstanceState::PrereqInProgress => {
                return Err(Unsatisfied::new(ErrorKind::CircularPrerequisite))
            }
            InstanceState::Failed if self.constructed[id.0] => return Ok(()),
            InstanceState::Failed => {
                let kind = self.failures[id.0].unwrap_or(ErrorKind::UnsatisfiedImport);
                return Err(Unsatisfied::new(kind));
            }
            InstanceState::Unvisited => {}
        }

        let descriptor = self.descriptor(id);
        self.set_state(id, InstanceState::PrereqInProgress);

        let params = self.records[id.0].parameter_points.clone();
        for (import, &point) in descriptor.prerequisite_imports().iter().zip(&params) {
            if let Err(failure) = self.satisfy_import(point, import) {
                return Err(self.fail_instance(id, failure));
            }
        }

        match self.construct(id, &descriptor) {
            Ok(()) => {
                self.constructed[id.0] = true;
                self.set_state(id, InstanceState::Constructed);
                Ok(())
            }
            Err(failure) => Err(self.fail_instance(id, failure)),
        }
    }

    /// Resolve and deliver normal imports of a constructed instance.
    pub(crate) fn satisfy_norm_imports(&mut self, id: InstanceId) -> Result<(), CompositionError> {
        let state = self.records[id.0].state;
        if state != InstanceState::Constructed {
            return Err(CompositionError::Invariant(format!(
                "normal imports of '{}' requested in state {state:?}",
                self.records[id.0].name
            )));
        }

        let descriptor = self.descriptor(id);
        let import_points = self.records[id.0].import_points.clone();
        let mut first_failure = None;

        for (import, &point) in descriptor.imports.iter().zip(&import_points) {
            let outcome = self
                .satisfy_import(point, import)
                .and_then(|()| self.deliver(id, point, import));
            if let Err(failure) = outcome {
                first_failure.get_or_insert(failure);
            }
        }

        match first_failure {
            Some(failure) => {
                self.fail_instance(id, failure);
            }
            None => self.set_state(id, InstanceState::Satisfied),
        }
        Ok(())
    }

    /// Select exports for one import and register them as pending joins.
    pub(crate) fn satisfy_import(
        &mut self,
        point: PointId,
        import: &ImportDeclaration,
    ) -> Result<(), Unsatisfied> {
        let candidates = export_candidates(self.types, self.storage, &self.records, import);
        let (ready, in_progress): (Vec<&Candidate>, Vec<&Candidate>) = candidates
            .iter()
            .filter(|c| c.is_accepted(import.cardinality))
            .partition(|c| self.records[c.instance.0].state != InstanceState::PrereqInProgress);
        let importer = self.describe(point);

        if ready.is_empty() {
            if import.allow_default {
                self.warn_skipped_cycles(&importer, &in_progress);
                self.pending.insert(point, Vec::new());
                return Ok(());
            }

            let cause = unsatisfied_cause(import, &candidates, !in_progress.is_empty());
            let kind = cause.kind;
            self.record_error(point, cause);
            for candidate in &candidates {
                self.explain_candidate(point, &importer, import, candidate);
            }
            return Err(Unsatisfied::new(kind));
        }

        if ready.len() > 1 && import.cardinality != Cardinality::Many {
            let count = ready.iter().map(|c| c.matching.len()).sum();
            self.record_error(
                point,
                Diagnostic::new(ErrorKind::AmbiguousImport, diagnostics::ambiguous(import, count)),
            );
            for candidate in &ready {
                for &export in &candidate.matching {
                    self.warn(export, diagnostics::export_ambiguous(&importer));
                    self.error_join(point, export);
                }
            }
            return Err(Unsatisfied::new(ErrorKind::AmbiguousImport));
        }

        self.warn_skipped_cycles(&importer, &in_progress);

        let mut matched = Vec::new();
        for candidate in ready {
            if let Err(failure) = self.satisfy_pre_imports(candidate.instance) {
                let component = self.records[candidate.instance.0].name.clone();
                self.record_error(
                    point,
                    Diagnostic::new(failure.kind, diagnostics::dependency_failed(&component)),
                );
                for &export in &candidate.matching {
                    self.warn(export, diagnostics::export_unusable(&importer));
                    self.error_join(point, export);
                }
                return Err(failure);
            }
            matched.extend(candidate.matching.iter().copied());
        }

        debug!(import = %importer, exports = matched.len(), "import satisfied");
        self.pending.insert(point, matched);
        Ok(())
    }

    fn construct(
        &mut self,
        id: InstanceId,
        descriptor: &ComponentDescriptor,
    ) -> Result<(), Unsatisfied> {
        let Some(ctor) = &descriptor.constructor else {
            let default = self
                .types
                .get_overloads(&descriptor.type_name, CONSTRUCTOR)
                .into_iter()
                .find(|method| method.parameters.is_empty());
            return match default {
                Some(method) => {
                    self.context.borrow_mut().construct(id, &method, Vec::new());
                    Ok(())
                }
                None => {
                    let diagnostic = Diagnostic::new(
                        ErrorKind::MissingConstructor,
                        diagnostics::missing_constructor(&descriptor.type_name),
                    );
                    debug!(instance = %self.records[id.0].name, %diagnostic, "component error");
                    self.records[id.0].error = Some(diagnostic);
                    self.failed = true;
                    Err(Unsatisfied::new(ErrorKind::MissingConstructor))
                }
            };
        };

        let params = self.records[id.0].parameter_points.clone();
        for (import, &point) in ctor.parameters.iter().zip(&params) {
            self.check_parameter(point, import)?;
        }
        // Getter reads are only recorded once every slot is known to resolve.
        let args = ctor
            .parameters
            .iter()
            .zip(&params)
            .map(|(import, &point)| self.parameter_value(point, import))
            .collect();

        self.context.borrow_mut().construct(id, &ctor.method, args);
        for point in params {
            self.commit_joins(point);
        }
        Ok(())
    }

    fn warn_skipped_cycles(&mut self, importer: &str, in_progress: &[&Candidate]) {
        if !self.options.warn_skipped_cycles {
            return;
        }
        for candidate in in_progress {
            for &export in &candidate.matching {
                self.warn(export, diagnostics::export_circular(importer));
            }
        }
    }

    /// Attach the most specific reason a candidate could not serve `import`.
    fn explain_candidate(
        &mut self,
        point: PointId,
        importer: &str,
        import: &ImportDeclaration,
        candidate: &Candidate,
    ) {
        let state = self.records[candidate.instance.0].state;
        let accepted = candidate.is_accepted(import.cardinality);

        for &export in &candidate.matching {
            let warning = if accepted && state == InstanceState::PrereqInProgress {
                diagnostics::export_circular(importer)
            } else if candidate.is_ambiguous(import.cardinality) {
                diagnostics::export_several_matches(importer)
            } else {
                diagnostics::export_unusable(importer)
            };
            self.warn(export, warning);
            self.error_join(point, export);
        }
        for (export, mismatch) in &candidate.rejected {
            self.warn(*export, diagnostics::export_metadata(importer, mismatch));
            self.error_join(point, *export);
        }
    }

    pub(super) fn descriptor(&self, id: InstanceId) -> Arc<ComponentDescriptor> {
        match &self.records[id.0].descriptor {
            Some(descriptor) => Arc::clone(descriptor),
            None => unreachable!("instance without descriptor reached the composer"),
        }
    }

    pub(super) fn describe(&self, point: PointId) -> String {
        let point = &self.points[point.0];
        format!("{}.{}", self.records[point.instance.0].name, point.label)
    }

    pub(super) fn record_error(&mut self, point: PointId, diagnostic: Diagnostic) {
        debug!(point = %self.describe(point), %diagnostic, "import error");
        self.points[point.0].set_error(diagnostic);
        self.failed = true;
    }

    pub(super) fn warn(&mut self, point: PointId, warning: String) {
        self.points[point.0].add_warning(warning);
    }

    pub(super) fn error_join(&mut self, import: PointId, export: PointId) {
        if !self.options.record_error_joins {
            return;
        }
        let exists = self
            .joins
            .iter()
            .any(|join| join.import == import && join.export == export && join.is_error_join);
        if !exists {
            self.joins.push(Join {
                import,
                export,
                contract: self.points[import.0].contract.clone(),
                is_error_join: true,
            });
        }
    }

    /// Turn the pending joins of a delivered import into wiring.
    pub(super) fn commit_joins(&mut self, import: PointId) {
        let Some(exports) = self.pending.remove(&import) else {
            return;
        };
        for export in exports {
            self.joins.push(Join {
                import,
                export,
                contract: self.points[import.0].contract.clone(),
                is_error_join: false,
            });
        }
    }

    fn set_state(&mut self, id: InstanceId, state: InstanceState) {
        debug!(instance = %self.records[id.0].name, ?state, "state transition");
        self.records[id.0].state = state;
    }

    fn fail_instance(&mut self, id: InstanceId, failure: Unsatisfied) -> Unsatisfied {
        self.set_state(id, InstanceState::Failed);
        self.failures[id.0] = Some(failure.kind);
        self.failed = true;
        failure
    }

    #[cfg(test)]
    pub(crate) fn state(&self, id: InstanceId) -> InstanceState {
        self.records[id.0].state
    }
}

/// Pick the error for an import left with no ready candidate.
fn unsatisfied_cause(
    import: &ImportDeclaration,
    candidates: &[Candidate],
    any_in_progress: bool,
) -> Diagnostic {
    if any_in_progress {
        return Diagnostic::new(ErrorKind::CircularPrerequisite, diagnostics::circular(import));
    }

    let ambiguous: usize = candidates
        .iter()
        .filter(|c| c.is_ambiguous(import.cardinality))
        .map(|c| c.matching.len())
        .sum();
    if ambiguous > 0 {
        return Diagnostic::new(
            ErrorKind::AmbiguousImport,
            diagnostics::ambiguous(import, ambiguous),
        );
    }

    if candidates.iter().any(|c| !c.rejected.is_empty()) {
        return Diagnostic::new(
            ErrorKind::UnsatisfiedImport,
            diagnostics::incompatible_metadata(import),
        );
    }

    Diagnostic::new(ErrorKind::UnsatisfiedImport, diagnostics::no_exports(import))
}
