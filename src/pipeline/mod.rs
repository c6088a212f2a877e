//! Orchestration of a full rolling-origin run.

pub mod runner;

pub use runner::{PipelineError, PipelineRunner, PipelineStage, RunReport};
