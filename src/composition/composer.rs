use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::call::{CallRecorder, SharedContext};
use crate::error::CompositionError;
use crate::types::TypeServices;
use super::storage::ComponentStorage;
use super::worker::CompositionWorker;
use super::{ComponentInstance, CompositionResult};

/// Knobs for the diagnostic side of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeOptions {
    /// Add diagnostic-only joins from failed imports to the exports that explain them.
    pub record_error_joins: bool,
    /// Warn on in-progress candidates skipped by a many or defaultable import.
    pub warn_skipped_cycles: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            record_error_joins: true,
            warn_skipped_cycles: true,
        }
    }
}

/// Builder for one composition run.
pub struct Composer<'a> {
    types: &'a dyn TypeServices,
    instances: Vec<ComponentInstance>,
    options: ComposeOptions,
    recorder: CallRecorder,
}

impl<'a> Composer<'a> {
    pub fn new(types: &'a dyn TypeServices) -> Self {
        Self {
            types,
            instances: Vec::new(),
            options: ComposeOptions::default(),
            recorder: CallRecorder::new(),
        }
    }

    /// Add a component instance.
    pub fn add(&mut self, instance: ComponentInstance) -> &mut Self {
        self.instances.push(instance);
        self
    }

    pub fn add_all(&mut self, instances: impl IntoIterator<Item = ComponentInstance>) -> &mut Self {
        self.instances.extend(instances);
        self
    }

    pub fn with_options(&mut self, options: ComposeOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Use a preconfigured recorder, for instance one with stubbed returns.
    pub fn with_recorder(&mut self, recorder: CallRecorder) -> &mut Self {
        self.recorder = recorder;
        self
    }

    /// Resolve every instance and return the diagnostic graph with the recorded calls.
    ///
    /// A storage failure yields a failed result; only a broken internal
    /// invariant is returned as `Err`.
    pub fn compose(self) -> Result<CompositionResult, CompositionError> {
        let calls = self.recorder.log();

        // 1. Build storage
        let storage = match ComponentStorage::build(self.types, self.instances) {
            Ok(storage) => storage,
            Err(err) => {
                info!(error = %err, "composition aborted");
                return Ok(CompositionResult::aborted(err.to_string(), calls));
            }
        };

        // 2. Satisfy every instance in insertion order
        let context: SharedContext = Rc::new(RefCell::new(self.recorder));
        let mut worker = CompositionWorker::new(self.types, &storage, &self.options, context);
        worker.run()?;

        // 3. Freeze the graph
        let result = worker.finish(calls);
        info!(
            instances = result.instances().len(),
            joins = result.wiring().count(),
            failed = result.failed(),
            "composition finished"
        );
        Ok(result)
    }
}
