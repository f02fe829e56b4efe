//! Batch pipeline execution.
//!
//! A [`Pipeline`] folds an item through an ordered list of stages. A
//! stage returning [`StageOutput::Skip`] short-circuits the execution
//! without error; a stage error either aborts the execution or, when an
//! error handler is installed, is replaced by a substitute value and the
//! execution continues from the next stage.

use log::{debug, warn};

use crate::common::{Error, Result};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::stage::{Stage, StageOutput};
use crate::pipeline::stats::PipelineStats;

/// Substitute-or-abort decision made when a stage fails.
pub type ErrorHandler<T> =
    Box<dyn Fn(&Error, &PipelineContext) -> Option<T> + Send + Sync>;

/// An ordered, named sequence of stages over items of type `T`.
///
/// # Usage
/// ```
/// use framepool::pipeline::{stage, Pipeline, StageOutput};
///
/// let mut pipeline = Pipeline::new("adjust");
/// pipeline
///     .add_stage(stage::map("double", |x: i32| x * 2))
///     .add_stage(stage::filter("positive", |x: &i32| *x > 0));
///
/// assert_eq!(pipeline.execute(5).unwrap(), StageOutput::Value(10));
/// assert_eq!(pipeline.execute(-3).unwrap(), StageOutput::Skip);
/// ```
pub struct Pipeline<T> {
    name: String,
    stages: Vec<Box<dyn Stage<T>>>,
    error_handler: Option<ErrorHandler<T>>,
    stats: PipelineStats,
}

impl<T> Pipeline<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            error_handler: None,
            stats: PipelineStats::new(),
        }
    }

    /// Append a stage. Chainable.
    pub fn add_stage(&mut self, stage: Box<dyn Stage<T>>) -> &mut Self {
        self.stages.push(stage);
        self
    }

    /// Install a handler consulted when a stage fails. Returning a value
    /// substitutes it for the failed stage's output; returning `None`
    /// lets the error abort the execution.
    pub fn set_error_handler(&mut self, handler: ErrorHandler<T>) -> &mut Self {
        self.error_handler = Some(handler);
        self
    }

    /// Run one item through every stage.
    ///
    /// Returns `Ok(StageOutput::Skip)` when a stage dropped the item;
    /// that is a normal outcome, not an error.
    ///
    /// # Errors
    /// [`Error::Processing`] naming the failing stage, unless the error
    /// handler substituted a value.
    pub fn execute(&self, input: T) -> Result<StageOutput<T>> {
        PipelineStats::bump(&self.stats.executions);
        let mut ctx = PipelineContext::start();
        let mut value = input;

        for (index, stage) in self.stages.iter().enumerate() {
            ctx.enter_stage(index, stage.name());

            match stage.process(value) {
                Ok(StageOutput::Value(next)) => {
                    PipelineStats::bump(&self.stats.stages_run);
                    value = next;
                }
                Ok(StageOutput::Skip) => {
                    PipelineStats::bump(&self.stats.skips);
                    ctx.finish();
                    debug!(
                        "pipeline '{}': stage '{}' skipped the item",
                        self.name,
                        stage.name()
                    );
                    return Ok(StageOutput::Skip);
                }
                Err(e) => {
                    let error = Error::Processing {
                        operation: stage.name().to_string(),
                        mode: "batch".to_string(),
                        message: e.to_string(),
                    };
                    match self.error_handler.as_ref().and_then(|h| h(&error, &ctx)) {
                        Some(substitute) => {
                            warn!(
                                "pipeline '{}': stage '{}' failed, substituted value: {}",
                                self.name,
                                stage.name(),
                                error
                            );
                            value = substitute;
                        }
                        None => {
                            PipelineStats::bump(&self.stats.failures);
                            ctx.finish();
                            return Err(error);
                        }
                    }
                }
            }
        }

        PipelineStats::bump(&self.stats.completions);
        ctx.finish();
        Ok(StageOutput::Value(value))
    }

    /// Run a whole batch, collecting the surviving values in order.
    /// Skipped items are silently dropped; the first unrecovered stage
    /// error aborts the batch.
    pub fn execute_batch(&self, inputs: impl IntoIterator<Item = T>) -> Result<Vec<T>> {
        let mut outputs = Vec::new();
        for input in inputs {
            if let StageOutput::Value(value) = self.execute(input)? {
                outputs.push(value);
            }
        }
        Ok(outputs)
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Execution statistics.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }
}
