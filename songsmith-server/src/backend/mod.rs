//! Melody backend adapters
//!
//! One capability, three invocation styles:
//! - `remote`: an HTTP generation service
//! - `local`: an in-process music model
//! - `subprocess`: an external inference executable
//!
//! A deployment selects exactly one adapter at start-up. Adapters write
//! their outputs into a staging workspace owned by the caller and report
//! both files or a failure, never one without the other.

pub mod local;
pub mod remote;
pub mod subprocess;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use songsmith_core::domain::brief::StyleParams;
use uuid::Uuid;

pub use local::{LocalModelBackend, MusicModel};
pub use remote::{RemoteMelodyBackend, RemoteMelodyConfig};
pub use subprocess::{SubprocessBackend, SubprocessConfig};

/// Input of one melody generation
#[derive(Debug, Clone)]
pub struct MelodyRequest {
    pub job_id: Uuid,
    pub lyrics: String,
    pub style: StyleParams,
}

impl MelodyRequest {
    /// Composes a single textual prompt embedding the lyrics and every
    /// non-empty style field.
    pub fn compose_prompt(&self) -> String {
        let mut prompt = String::new();
        for (name, value) in self.style.fields() {
            prompt.push_str(&format!("{}: {}\n", name, value));
        }
        prompt.push_str("lyrics:\n");
        prompt.push_str(self.lyrics.trim());
        prompt
    }
}

/// A file produced by a backend inside the staging workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    /// Canonical extension the artifact will be stored under
    pub extension: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            extension: extension.into(),
        }
    }
}

/// Outcome of a melody generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendResult {
    Ready {
        midi: GeneratedFile,
        audio: GeneratedFile,
    },
    Failed {
        reason: String,
    },
}

impl BackendResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Generates a melody and its audio rendering for a set of lyrics
///
/// Implementations never panic or error out of band: every problem is a
/// `BackendResult::Failed` with a readable reason.
#[async_trait]
pub trait MelodyBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Runs one generation
    ///
    /// # Arguments
    /// * `request` - Lyrics and style parameters
    /// * `workspace` - Empty staging directory for output files
    async fn generate_melody(&self, request: &MelodyRequest, workspace: &Path) -> BackendResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_prompt_embeds_style_and_lyrics() {
        let request = MelodyRequest {
            job_id: Uuid::new_v4(),
            lyrics: "  [Verse]\nFalling leaves\n".to_string(),
            style: StyleParams {
                tempo: Some("slow".to_string()),
                mood: Some("wistful".to_string()),
                ..Default::default()
            },
        };

        let prompt = request.compose_prompt();
        assert!(prompt.starts_with("genre: pop\n"));
        assert!(prompt.contains("tempo: slow\n"));
        assert!(prompt.contains("mood: wistful\n"));
        assert!(prompt.ends_with("lyrics:\n[Verse]\nFalling leaves"));
    }
}
