//! Streaming pipeline execution.
//!
//! A [`StreamingPipeline`] applies a batch [`Pipeline`] lazily to a
//! source of chunks: nothing runs until the resulting [`ProcessStream`]
//! iterator is advanced, skipped chunks vanish from the stream, and the
//! stream fuses after yielding its first error.

use crate::common::Result;
use crate::pipeline::batch::Pipeline;
use crate::pipeline::stage::{Stage, StageOutput};
use crate::pipeline::stats::PipelineStats;

/// Lazily applies a stage sequence to each chunk of a stream.
pub struct StreamingPipeline<T> {
    inner: Pipeline<T>,
}

impl<T> StreamingPipeline<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Pipeline::new(name),
        }
    }

    /// Wrap an already-configured batch pipeline.
    pub fn from_pipeline(pipeline: Pipeline<T>) -> Self {
        Self { inner: pipeline }
    }

    /// Append a stage. Chainable.
    pub fn add_stage(&mut self, stage: Box<dyn Stage<T>>) -> &mut Self {
        self.inner.add_stage(stage);
        self
    }

    /// Lazily process `chunks`.
    ///
    /// Each call to the returned iterator pulls one chunk from the source
    /// and folds it through the stages. Chunks a stage skips are consumed
    /// without being yielded; after the first error the stream yields
    /// that error once and then ends.
    pub fn process_stream<I>(&self, chunks: I) -> ProcessStream<'_, T, I::IntoIter>
    where
        I: IntoIterator<Item = T>,
    {
        ProcessStream {
            pipeline: &self.inner,
            source: chunks.into_iter(),
            done: false,
        }
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Execution statistics, shared with any in-flight streams.
    pub fn stats(&self) -> &PipelineStats {
        self.inner.stats()
    }
}

/// Lazy iterator over a streamed pipeline's outputs.
pub struct ProcessStream<'a, T, I> {
    pipeline: &'a Pipeline<T>,
    source: I,
    done: bool,
}

impl<T, I> Iterator for ProcessStream<'_, T, I>
where
    I: Iterator<Item = T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let chunk = match self.source.next() {
                Some(chunk) => chunk,
                None => {
                    self.done = true;
                    return None;
                }
            };
            match self.pipeline.execute(chunk) {
                Ok(StageOutput::Value(value)) => return Some(Ok(value)),
                Ok(StageOutput::Skip) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
