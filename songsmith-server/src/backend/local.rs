//! Local model backend
//!
//! Runs an in-process music model. The model is owned by the backend
//! instance, built once by the embedding application and shared across
//! jobs. Inference is blocking, so it runs on tokio's blocking pool.
//!
//! The model is expected to answer in ABC notation. Its output is decoded
//! into a melody, written as MIDI and rendered to a WAV preview.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{BackendResult, GeneratedFile, MelodyBackend, MelodyRequest};
use crate::music::{NotationError, abc, midi, synth};

/// Instruction prepended to every prompt
const PROMPT_PREAMBLE: &str =
    "Compose a singable melody in ABC notation (with X:, T:, L:, Q: and K: headers) for the song below.";

/// A generative music model
///
/// Both calls are blocking and may take a long time.
pub trait MusicModel: Send + Sync + 'static {
    /// Generates a token sequence for a prompt
    fn generate(&self, prompt: &str) -> anyhow::Result<Vec<u32>>;

    /// Turns generated tokens back into text
    fn decode(&self, tokens: &[u32]) -> anyhow::Result<String>;
}

pub struct LocalModelBackend {
    model: Arc<dyn MusicModel>,
    program: u8,
    sample_rate: u32,
}

impl LocalModelBackend {
    /// Creates a backend around an already loaded model
    pub fn new(model: Arc<dyn MusicModel>) -> Self {
        Self {
            model,
            program: midi::PIANO_PROGRAM,
            sample_rate: synth::DEFAULT_SAMPLE_RATE,
        }
    }

    /// Sets the General MIDI program written into generated files
    pub fn with_program(mut self, program: u8) -> Self {
        self.program = program.min(127);
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

/// Runs the model and encodes its answer; called on the blocking pool.
fn infer(
    model: &dyn MusicModel,
    prompt: &str,
    program: u8,
    sample_rate: u32,
) -> Result<(Vec<u8>, Vec<u8>), String> {
    let tokens = model
        .generate(prompt)
        .map_err(|e| format!("model generation failed: {:#}", e))?;
    let text = model
        .decode(&tokens)
        .map_err(|e| format!("model decoding failed: {:#}", e))?;

    let melody = abc::parse(&text).map_err(|e| match e {
        NotationError::Empty => "model output contained no recognizable music".to_string(),
        other => other.to_string(),
    })?;

    let midi_bytes = midi::write_melody(&melody, program).map_err(|e| e.to_string())?;
    let wav_bytes = synth::render_wav(&melody, sample_rate).map_err(|e| e.to_string())?;
    Ok((midi_bytes, wav_bytes))
}

#[async_trait]
impl MelodyBackend for LocalModelBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate_melody(&self, request: &MelodyRequest, workspace: &Path) -> BackendResult {
        let prompt = format!("{}\n\n{}", PROMPT_PREAMBLE, request.compose_prompt());
        let model = Arc::clone(&self.model);
        let (program, sample_rate) = (self.program, self.sample_rate);

        info!("Job {}: running local music model", request.job_id);
        let outcome = tokio::task::spawn_blocking(move || {
            infer(model.as_ref(), &prompt, program, sample_rate)
        })
        .await;

        let (midi_bytes, wav_bytes) = match outcome {
            Ok(Ok(encoded)) => encoded,
            Ok(Err(reason)) => {
                warn!("Job {}: local generation failed: {}", request.job_id, reason);
                return BackendResult::Failed { reason };
            }
            Err(e) => {
                warn!("Job {}: model task aborted: {}", request.job_id, e);
                return BackendResult::failed("model task aborted");
            }
        };

        let midi_path = workspace.join("melody.mid");
        let audio_path = workspace.join("audio.wav");
        for (path, bytes) in [(&midi_path, &midi_bytes), (&audio_path, &wav_bytes)] {
            if let Err(e) = tokio::fs::write(path, bytes).await {
                return BackendResult::failed(format!("failed to write {}: {}", path.display(), e));
            }
        }

        debug!(
            "Job {}: encoded {} bytes of MIDI and {} bytes of audio",
            request.job_id,
            midi_bytes.len(),
            wav_bytes.len()
        );
        BackendResult::Ready {
            midi: GeneratedFile::new(midi_path, "mid"),
            audio: GeneratedFile::new(audio_path, "wav"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songsmith_core::domain::brief::StyleParams;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Echoes a canned answer byte by byte, remembering the prompt
    struct CannedModel {
        answer: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedModel {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl MusicModel for CannedModel {
        fn generate(&self, prompt: &str) -> anyhow::Result<Vec<u32>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.answer.bytes().map(u32::from).collect())
        }

        fn decode(&self, tokens: &[u32]) -> anyhow::Result<String> {
            let bytes: Vec<u8> = tokens.iter().map(|t| *t as u8).collect();
            Ok(String::from_utf8(bytes)?)
        }
    }

    struct BrokenModel;

    impl MusicModel for BrokenModel {
        fn generate(&self, _prompt: &str) -> anyhow::Result<Vec<u32>> {
            anyhow::bail!("CUDA out of memory")
        }

        fn decode(&self, _tokens: &[u32]) -> anyhow::Result<String> {
            unreachable!()
        }
    }

    fn request() -> MelodyRequest {
        MelodyRequest {
            job_id: Uuid::new_v4(),
            lyrics: "Autumn rain on the window".to_string(),
            style: StyleParams {
                mood: Some("calm".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_abc_answer_becomes_midi_and_wav() {
        let model = CannedModel::new("X:1\nT:Rain\nL:1/8\nK:G\nGABc d2 B2|");
        let backend = LocalModelBackend::new(model.clone());
        let workspace = tempfile::tempdir().unwrap();

        let result = backend.generate_melody(&request(), workspace.path()).await;
        let BackendResult::Ready { midi: midi_file, audio } = result else {
            panic!("expected Ready, got {:?}", result);
        };

        let melody = midi::read_melody(&std::fs::read(&midi_file.path).unwrap()).unwrap();
        assert_eq!(melody.notes.len(), 6);
        assert_eq!(melody.title.as_deref(), Some("Rain"));
        assert_eq!(audio.extension, "wav");
        assert_eq!(&std::fs::read(&audio.path).unwrap()[..4], b"RIFF");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("mood: calm"));
        assert!(prompts[0].contains("Autumn rain on the window"));
    }

    #[tokio::test]
    async fn test_answer_without_music_is_failed() {
        let backend = LocalModelBackend::new(CannedModel::new("I'd love to help with that!"));
        let workspace = tempfile::tempdir().unwrap();

        let result = backend.generate_melody(&request(), workspace.path()).await;
        assert_eq!(
            result,
            BackendResult::failed("model output contained no recognizable music")
        );
        assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_model_error_is_failed() {
        let backend = LocalModelBackend::new(Arc::new(BrokenModel));
        let workspace = tempfile::tempdir().unwrap();

        match backend.generate_melody(&request(), workspace.path()).await {
            BackendResult::Failed { reason } => assert!(reason.contains("CUDA out of memory")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_overlong_answer_is_failed() {
        let backend = LocalModelBackend::new(CannedModel::new("X:1\nK:C\nZ130000 C"));
        let workspace = tempfile::tempdir().unwrap();

        match backend.generate_melody(&request(), workspace.path()).await {
            BackendResult::Failed { reason } => assert!(reason.contains("too long")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(std::fs::read_dir(workspace.path()).unwrap().count(), 0);
    }
}
