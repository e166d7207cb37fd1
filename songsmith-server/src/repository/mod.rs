//! Repository Module
//!
//! Data access layer for the server.
//! - `job`: job records in the database
//! - `artifact`: generated files on durable storage

pub mod artifact;
pub mod job;

// Re-export for convenience
pub use artifact::{ArtifactStore, StoreError};
pub use job as job_repository;
