pub mod composer;
pub mod storage;

pub(crate) mod candidates;
pub(crate) mod diagnostics;
pub(crate) mod materialize;
pub(crate) mod matcher;
pub(crate) mod worker;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::call::CallLog;
use crate::descriptor::ComponentDescriptor;
use crate::error::Diagnostic;

/// A component instance taking part in one composition run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInstance {
    pub name: String,
    pub type_name: String,
}

impl ComponentInstance {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Index of an instance in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct InstanceId(pub(crate) usize);

impl InstanceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PointId(pub(crate) usize);

impl PointId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Satisfaction state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Unvisited,
    PrereqInProgress,
    Constructed,
    Satisfied,
    Failed,
}

impl InstanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, InstanceState::Satisfied | InstanceState::Failed)
    }
}

/// Which declaration of the owning descriptor a join point stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSite {
    /// Index into `ComponentDescriptor::imports`.
    Import(usize),
    /// Index into the importing constructor's parameters.
    Parameter(usize),
    /// Index into `ComponentDescriptor::exports`.
    Export(usize),
}

/// An import or export site of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct JoinPoint {
    pub instance: InstanceId,
    pub site: PointSite,
    pub contract: String,
    /// Member label, e.g. `Logger`, `ctor[0]` or `self`.
    pub label: String,
    error: Option<Diagnostic>,
    warnings: Vec<String>,
}

impl JoinPoint {
    pub(crate) fn new(
        instance: InstanceId,
        site: PointSite,
        contract: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            instance,
            site,
            contract: contract.into(),
            label: label.into(),
            error: None,
            warnings: Vec::new(),
        }
    }

    pub fn is_import(&self) -> bool {
        !matches!(self.site, PointSite::Export(_))
    }

    pub fn error(&self) -> Option<&Diagnostic> {
        self.error.as_ref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// All warnings joined by newlines.
    pub fn warning(&self) -> Option<String> {
        (!self.warnings.is_empty()).then(|| self.warnings.join("\n"))
    }

    /// Record the error unless one is already present. Returns whether it was recorded.
    pub(crate) fn set_error(&mut self, diagnostic: Diagnostic) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(diagnostic);
        true
    }

    /// Add a warning unless an existing warning already contains it.
    pub(crate) fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.iter().any(|existing| existing.contains(&warning)) {
            self.warnings.push(warning);
        }
    }
}

/// An edge between an import point and an export point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Join {
    pub import: PointId,
    pub export: PointId,
    pub contract: String,
    /// Drawn only to explain a rejected pairing; not part of the wiring.
    pub is_error_join: bool,
}

/// Per-instance view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceRecord {
    pub name: String,
    pub type_name: String,
    pub state: InstanceState,
    /// Component-level error that no join point owns.
    pub error: Option<Diagnostic>,
    pub import_points: Vec<PointId>,
    pub parameter_points: Vec<PointId>,
    pub export_points: Vec<PointId>,
    #[serde(skip)]
    pub(crate) descriptor: Option<Arc<ComponentDescriptor>>,
}

impl InstanceRecord {
    pub(crate) fn new(
        instance: &ComponentInstance,
        descriptor: Option<Arc<ComponentDescriptor>>,
    ) -> Self {
        Self {
            name: instance.name.clone(),
            type_name: instance.type_name.clone(),
            state: InstanceState::Unvisited,
            error: None,
            import_points: Vec::new(),
            parameter_points: Vec::new(),
            export_points: Vec::new(),
            descriptor,
        }
    }

    pub fn descriptor(&self) -> Option<&ComponentDescriptor> {
        self.descriptor.as_deref()
    }
}

/// Immutable outcome of one composition run.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionResult {
    instances: Vec<InstanceRecord>,
    points: Vec<JoinPoint>,
    joins: Vec<Join>,
    failed: bool,
    error_message: Option<String>,
    #[serde(skip)]
    calls: CallLog,
}

impl CompositionResult {
    pub(crate) fn new(
        instances: Vec<InstanceRecord>,
        points: Vec<JoinPoint>,
        joins: Vec<Join>,
        failed: bool,
        calls: CallLog,
    ) -> Self {
        let error_message = failed.then(|| summarize_errors(&instances, &points));
        Self {
            instances,
            points,
            joins,
            failed,
            error_message,
            calls,
        }
    }

    /// Result of a run aborted before resolution started.
    pub(crate) fn aborted(message: String, calls: CallLog) -> Self {
        Self {
            instances: Vec::new(),
            points: Vec::new(),
            joins: Vec::new(),
            failed: true,
            error_message: Some(message),
            calls,
        }
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    /// Joins that form the effective wiring.
    pub fn wiring(&self) -> impl Iterator<Item = &Join> {
        self.joins.iter().filter(|join| !join.is_error_join)
    }

    pub fn points(&self) -> &[JoinPoint] {
        &self.points
    }

    pub fn point(&self, id: PointId) -> &JoinPoint {
        &self.points[id.0]
    }

    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceRecord> {
        self.instances.iter().find(|record| record.name == name)
    }

    pub fn instance_id(&self, name: &str) -> Option<InstanceId> {
        self.instances
            .iter()
            .position(|record| record.name == name)
            .map(InstanceId)
    }

    pub fn record(&self, id: InstanceId) -> &InstanceRecord {
        &self.instances[id.0]
    }

    /// Joins (real and diagnostic) attached to an import point.
    pub fn joins_for(&self, import: PointId) -> impl Iterator<Item = &Join> {
        self.joins.iter().filter(move |join| join.import == import)
    }

    /// Import point of `instance` for the descriptor import labelled `label`.
    pub fn import_point(&self, instance: &str, label: &str) -> Option<PointId> {
        let record = self.instance(instance)?;
        record
            .import_points
            .iter()
            .chain(&record.parameter_points)
            .copied()
            .find(|id| self.point(*id).label == label)
    }

    /// Export point of `instance` for `contract`, first in declaration order.
    pub fn export_point(&self, instance: &str, contract: &str) -> Option<PointId> {
        let record = self.instance(instance)?;
        record
            .export_points
            .iter()
            .copied()
            .find(|id| self.point(*id).contract == contract)
    }

    /// The recorded call intents of this run.
    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    /// Human-readable `instance.site` label of a point.
    pub fn describe_point(&self, id: PointId) -> String {
        let point = self.point(id);
        format!("{}.{}", self.record(point.instance).name, point.label)
    }
}

fn summarize_errors(instances: &[InstanceRecord], points: &[JoinPoint]) -> String {
    let point_errors = points.iter().filter_map(|point| {
        point.error().map(|error| {
            format!(
                "{}.{} [{}]: {}",
                instances[point.instance.0].name, point.label, error.kind, error.message
            )
        })
    });
    let component_errors = instances.iter().filter_map(|record| {
        record
            .error
            .as_ref()
            .map(|error| format!("{} [{}]: {}", record.name, error.kind, error.message))
    });
    point_errors.chain(component_errors).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn error_is_set_once() {
        let mut point = JoinPoint::new(InstanceId(0), PointSite::Import(0), "X", "Dep");
        assert!(point.set_error(Diagnostic::new(ErrorKind::UnsatisfiedImport, "first")));
        assert!(!point.set_error(Diagnostic::new(ErrorKind::AmbiguousImport, "second")));
        assert_eq!(point.error().unwrap().message, "first");
    }

    #[test]
    fn only_satisfied_and_failed_are_terminal() {
        assert!(InstanceState::Satisfied.is_terminal());
        assert!(InstanceState::Failed.is_terminal());
        assert!(!InstanceState::Constructed.is_terminal());
        assert!(!InstanceState::PrereqInProgress.is_terminal());
        assert!(!InstanceState::Unvisited.is_terminal());
    }

    #[test]
    fn warnings_are_deduplicated_by_containment() {
        let mut point = JoinPoint::new(InstanceId(0), PointSite::Export(0), "X", "self");
        point.add_warning("ambiguous export for 'X' imported by A.Dep");
        point.add_warning("ambiguous export for 'X'");
        point.add_warning("circular prerequisite");
        point.add_warning("circular prerequisite");

        assert_eq!(point.warnings().len(), 2);
        assert_eq!(
            point.warning().unwrap(),
            "ambiguous export for 'X' imported by A.Dep\ncircular prerequisite"
        );
    }
}
