//! Service Module
//!
//! Business logic layer of the server. The pipeline orchestrates between
//! the job repository, the artifact store and the generation backends.

pub mod pipeline;

pub use pipeline::{MelodyArtifacts, Pipeline, PipelineError, ScoreOrigin};
