//! Remote melody backend
//!
//! Calls an external generation service over HTTP. Each output role is a
//! separate `POST {base}/generate?file=<format>` carrying the lyrics and
//! style fields as a form; the two requests run concurrently. Response
//! bodies are streamed chunk by chunk into the staging workspace.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use songsmith_core::domain::artifact::ArtifactKind;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{BackendResult, GeneratedFile, MelodyBackend, MelodyRequest};

/// Longest slice of an error body kept in a failure reason
const MAX_ERROR_BODY: usize = 512;

/// Remote generation service settings
#[derive(Debug, Clone)]
pub struct RemoteMelodyConfig {
    /// Base URL of the service, without the `/generate` path
    pub base_url: String,

    /// Timeout of each request, body download included
    pub timeout: Duration,

    /// `file` query value requesting the MIDI rendering
    pub midi_format: String,

    /// `file` query value requesting the audio rendering
    pub audio_format: String,
}

impl Default for RemoteMelodyConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5001".to_string(),
            timeout: Duration::from_secs(600),
            midi_format: "midi".to_string(),
            audio_format: "mp3".to_string(),
        }
    }
}

pub struct RemoteMelodyBackend {
    client: Client,
    config: RemoteMelodyConfig,
}

impl RemoteMelodyBackend {
    /// Creates a new remote backend
    ///
    /// # Arguments
    /// * `config` - Service location, timeout and requested formats
    pub fn new(config: RemoteMelodyConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/generate", self.config.base_url.trim_end_matches('/'))
    }

    /// Downloads one rendering into `dest`
    async fn fetch(
        &self,
        form: &[(&'static str, String)],
        format: &str,
        dest: &Path,
    ) -> Result<(), String> {
        debug!("Requesting file={} from {}", format, self.endpoint());

        let mut response = self
            .client
            .post(self.endpoint())
            .query(&[("file", format)])
            .form(form)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| transport_reason(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
            return Err(if body.is_empty() {
                format!("remote service returned {} for file={}", status, format)
            } else {
                format!(
                    "remote service returned {} for file={}: {}",
                    status, format, body
                )
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| format!("failed to create {}: {}", dest.display(), e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| transport_reason(&e))? {
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("failed to write {}: {}", dest.display(), e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| format!("failed to write {}: {}", dest.display(), e))?;

        if written == 0 {
            return Err(format!("remote service returned an empty file={}", format));
        }

        debug!("Received {} bytes for file={}", written, format);
        Ok(())
    }
}

fn transport_reason(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "timeout".to_string()
    } else if error.is_connect() {
        format!("cannot reach remote service: {}", error)
    } else {
        format!("remote request failed: {}", error)
    }
}

/// Maps a requested format to the canonical extension of `kind`.
fn extension_for(format: &str, kind: ArtifactKind) -> Option<&'static str> {
    ArtifactKind::classify_generated(format)
        .filter(|(classified, _)| *classified == kind)
        .map(|(_, ext)| ext)
}

#[async_trait]
impl MelodyBackend for RemoteMelodyBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn generate_melody(&self, request: &MelodyRequest, workspace: &Path) -> BackendResult {
        let Some(midi_ext) = extension_for(&self.config.midi_format, ArtifactKind::Midi) else {
            return BackendResult::failed(format!(
                "unsupported midi format '{}'",
                self.config.midi_format
            ));
        };
        let Some(audio_ext) = extension_for(&self.config.audio_format, ArtifactKind::Audio) else {
            return BackendResult::failed(format!(
                "unsupported audio format '{}'",
                self.config.audio_format
            ));
        };

        let mut form = vec![("lyrics", request.lyrics.clone())];
        form.extend(request.style.fields());

        let midi_path = workspace.join(format!("melody.{}", midi_ext));
        let audio_path = workspace.join(format!("audio.{}", audio_ext));

        info!(
            "Job {}: requesting melody from remote service {}",
            request.job_id, self.config.base_url
        );
        let (midi, audio) = tokio::join!(
            self.fetch(&form, &self.config.midi_format, &midi_path),
            self.fetch(&form, &self.config.audio_format, &audio_path),
        );

        match (midi, audio) {
            (Ok(()), Ok(())) => BackendResult::Ready {
                midi: GeneratedFile::new(midi_path, midi_ext),
                audio: GeneratedFile::new(audio_path, audio_ext),
            },
            (Err(reason), _) | (_, Err(reason)) => {
                warn!("Job {}: remote generation failed: {}", request.job_id, reason);
                BackendResult::Failed { reason }
            }
        }
    }
}
