//! Pipeline stages.

use crate::common::Result;

/// What a stage produced for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutput<T> {
    /// A value for the next stage.
    Value(T),
    /// Drop this item; later stages never see it.
    Skip,
}

impl<T> StageOutput<T> {
    /// The produced value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            StageOutput::Value(value) => Some(value),
            StageOutput::Skip => None,
        }
    }

    /// Whether the item was dropped.
    pub fn is_skip(&self) -> bool {
        matches!(self, StageOutput::Skip)
    }
}

/// One step of a pipeline.
///
/// Stages are shared across worker threads, so they take `&self`; any
/// internal state must be synchronized by the stage itself.
pub trait Stage<T>: Send + Sync {
    /// Stage name, used in error context and logs.
    fn name(&self) -> &str;

    /// Transform, pass through, or skip one item.
    fn process(&self, input: T) -> Result<StageOutput<T>>;
}

/// A stage built from a closure.
pub struct FnStage<T, F>
where
    F: Fn(T) -> Result<StageOutput<T>> + Send + Sync,
{
    name: String,
    func: F,
    _marker: std::marker::PhantomData<fn(T) -> T>,
}

impl<T, F> FnStage<T, F>
where
    F: Fn(T) -> Result<StageOutput<T>> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T, F> Stage<T> for FnStage<T, F>
where
    F: Fn(T) -> Result<StageOutput<T>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, input: T) -> Result<StageOutput<T>> {
        (self.func)(input)
    }
}

/// Infallible transform stage.
pub fn map<T, F>(name: impl Into<String>, func: F) -> Box<dyn Stage<T>>
where
    T: 'static,
    F: Fn(T) -> T + Send + Sync + 'static,
{
    Box::new(FnStage::new(name, move |input| {
        Ok(StageOutput::Value(func(input)))
    }))
}

/// Predicate stage: items failing the predicate are skipped.
pub fn filter<T, F>(name: impl Into<String>, predicate: F) -> Box<dyn Stage<T>>
where
    T: 'static,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    Box::new(FnStage::new(name, move |input| {
        if predicate(&input) {
            Ok(StageOutput::Value(input))
        } else {
            Ok(StageOutput::Skip)
        }
    }))
}

/// Fallible transform stage.
pub fn try_map<T, F>(name: impl Into<String>, func: F) -> Box<dyn Stage<T>>
where
    T: 'static,
    F: Fn(T) -> Result<T> + Send + Sync + 'static,
{
    Box::new(FnStage::new(name, move |input| {
        func(input).map(StageOutput::Value)
    }))
}
