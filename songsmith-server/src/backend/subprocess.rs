//! Subprocess backend
//!
//! Shells out to an external inference executable:
//!
//! ```text
//! <executable> <args...> --prompt <prompt> --output_dir <dir> --use_tts <true|false>
//! ```
//!
//! Configured args come first so an interpreter can be pointed at a script
//! (`python infer.py ...`). The child runs with a bounded timeout and is
//! killed when the timeout fires or the calling future is dropped. After a
//! successful exit the output directory must hold exactly one MIDI file and
//! one audio file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use songsmith_core::domain::artifact::ArtifactKind;
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{BackendResult, GeneratedFile, MelodyBackend, MelodyRequest};

/// Longest slice of stderr kept in a failure reason
const MAX_STDERR: usize = 2000;

/// Inference executable settings
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub executable: PathBuf,

    /// Extra arguments placed before the required flags
    pub args: Vec<String>,

    /// Working directory of the child; inherits the server's when unset
    pub working_dir: Option<PathBuf>,

    pub timeout: Duration,

    /// Value of the `--use_tts` flag
    pub use_tts: bool,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("infer"),
            args: Vec::new(),
            working_dir: None,
            timeout: Duration::from_secs(1800),
            use_tts: false,
        }
    }
}

pub struct SubprocessBackend {
    config: SubprocessConfig,
}

impl SubprocessBackend {
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    fn command(&self, prompt: &str, output_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .arg("--prompt")
            .arg(prompt)
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--use_tts")
            .arg(self.config.use_tts.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// Keeps the end of stderr, where tracebacks put the actual error.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= MAX_STDERR {
        text.to_string()
    } else {
        text.chars().skip(count - MAX_STDERR).collect()
    }
}

/// Classifies the files under `output_dir` into the MIDI and audio roles.
///
/// Files with other extensions are ignored. Each role must be filled by
/// exactly one file.
pub fn collect_outputs(output_dir: &Path) -> Result<(GeneratedFile, GeneratedFile), String> {
    let mut midi = Vec::new();
    let mut audio = Vec::new();

    for entry in WalkDir::new(output_dir).into_iter() {
        let entry = entry.map_err(|e| format!("failed to scan output directory: {}", e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
            continue;
        };
        match ArtifactKind::classify_generated(ext) {
            Some((ArtifactKind::Midi, ext)) => midi.push(GeneratedFile::new(entry.path(), ext)),
            Some((ArtifactKind::Audio, ext)) => audio.push(GeneratedFile::new(entry.path(), ext)),
            _ => debug!("Ignoring output file {}", entry.path().display()),
        }
    }

    let midi = single(midi, ArtifactKind::Midi)?;
    let audio = single(audio, ArtifactKind::Audio)?;
    Ok((midi, audio))
}

fn single(mut files: Vec<GeneratedFile>, kind: ArtifactKind) -> Result<GeneratedFile, String> {
    match files.len() {
        0 => Err(format!("missing expected output: no {} file produced", kind)),
        1 => Ok(files.remove(0)),
        n => {
            files.sort_by(|a, b| a.path.cmp(&b.path));
            let names: Vec<String> = files
                .iter()
                .filter_map(|f| f.path.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            Err(format!(
                "ambiguous output: {} {} files produced ({})",
                n,
                kind,
                names.join(", ")
            ))
        }
    }
}

#[async_trait]
impl MelodyBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn generate_melody(&self, request: &MelodyRequest, workspace: &Path) -> BackendResult {
        let output_dir = workspace.join("output");
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return BackendResult::failed(format!("failed to create output directory: {}", e));
        }

        let prompt = request.compose_prompt();
        info!(
            "Job {}: launching {}",
            request.job_id,
            self.config.executable.display()
        );

        let child = match self.command(&prompt, &output_dir).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(
                    "Job {}: failed to launch {}: {}",
                    request.job_id,
                    self.config.executable.display(),
                    e
                );
                return BackendResult::failed(format!(
                    "failed to launch {}: {}",
                    self.config.executable.display(),
                    e
                ));
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it
        let output =
            match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return BackendResult::failed(format!("failed to wait for inference: {}", e));
                }
                Err(_) => {
                    warn!(
                        "Job {}: inference timed out after {}s",
                        request.job_id,
                        self.config.timeout.as_secs()
                    );
                    return BackendResult::failed("timeout");
                }
            };

        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            warn!(
                "Job {}: inference exited with {}: {}",
                request.job_id, output.status, stderr
            );
            return BackendResult::Failed {
                reason: if stderr.is_empty() {
                    format!("inference exited with {}", output.status)
                } else {
                    stderr
                },
            };
        }

        // Directory walk is blocking I/O
        let scanned = tokio::task::spawn_blocking(move || collect_outputs(&output_dir))
            .await
            .unwrap_or_else(|e| Err(format!("output scan aborted: {}", e)));

        match scanned {
            Ok((midi, audio)) => {
                debug!(
                    "Job {}: inference produced {} and {}",
                    request.job_id,
                    midi.path.display(),
                    audio.path.display()
                );
                BackendResult::Ready { midi, audio }
            }
            Err(reason) => {
                warn!("Job {}: {}", request.job_id, reason);
                BackendResult::Failed { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use songsmith_core::domain::brief::StyleParams;
    use std::fs;
    use uuid::Uuid;

    fn touch(dir: &Path, name: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_collect_outputs_finds_both_roles() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "stage1/song.MIDI");
        touch(dir.path(), "vocoder/mix/song.mp3");
        touch(dir.path(), "prompt.txt");

        let (midi, audio) = collect_outputs(dir.path()).unwrap();
        assert_eq!(midi.extension, "mid");
        assert!(midi.path.ends_with("stage1/song.MIDI"));
        assert_eq!(audio.extension, "mp3");
    }

    #[test]
    fn test_collect_outputs_midi_without_audio_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "song.mid");

        let reason = collect_outputs(dir.path()).unwrap_err();
        assert!(reason.starts_with("missing expected output"), "{}", reason);
        assert!(reason.contains("audio"));
    }

    #[test]
    fn test_collect_outputs_rejects_two_audio_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "song.mid");
        touch(dir.path(), "vocals.wav");
        touch(dir.path(), "mix.wav");

        let reason = collect_outputs(dir.path()).unwrap_err();
        assert!(reason.starts_with("ambiguous output"), "{}", reason);
        assert!(reason.contains("mix.wav, vocals.wav"));
    }

    #[test]
    fn test_stderr_tail_keeps_the_end() {
        let long = format!("{}Traceback: boom", "x".repeat(5000));
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.chars().count(), MAX_STDERR);
        assert!(tail.ends_with("Traceback: boom"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn backend(script: &str, timeout: Duration) -> SubprocessBackend {
            // sh -c <script> assigns the flags that follow to $0..$5
            SubprocessBackend::new(SubprocessConfig {
                executable: PathBuf::from("sh"),
                args: vec!["-c".to_string(), script.to_string()],
                working_dir: None,
                timeout,
                use_tts: true,
            })
        }

        fn request() -> MelodyRequest {
            MelodyRequest {
                job_id: Uuid::new_v4(),
                lyrics: "autumn rain".to_string(),
                style: StyleParams::default(),
            }
        }

        #[tokio::test]
        async fn test_successful_run_is_ready() {
            let backend = backend(
                r#"[ "$4" = "--use_tts" ] && [ "$5" = "true" ] && touch "$3/out.mid" "$3/out.wav""#,
                Duration::from_secs(10),
            );
            let workspace = tempfile::tempdir().unwrap();

            let result = backend.generate_melody(&request(), workspace.path()).await;
            let BackendResult::Ready { midi, audio } = result else {
                panic!("expected Ready, got {:?}", result);
            };
            assert!(midi.path.starts_with(workspace.path()));
            assert_eq!(audio.extension, "wav");
        }

        #[tokio::test]
        async fn test_nonzero_exit_surfaces_stderr() {
            let backend = backend("echo 'model weights not found' >&2; exit 3", Duration::from_secs(10));
            let workspace = tempfile::tempdir().unwrap();

            let result = backend.generate_melody(&request(), workspace.path()).await;
            assert_eq!(result, BackendResult::failed("model weights not found"));
        }

        #[tokio::test]
        async fn test_midi_only_run_is_missing_output() {
            let backend = backend(r#"touch "$3/out.mid""#, Duration::from_secs(10));
            let workspace = tempfile::tempdir().unwrap();

            match backend.generate_melody(&request(), workspace.path()).await {
                BackendResult::Failed { reason } => {
                    assert!(reason.starts_with("missing expected output"), "{}", reason)
                }
                other => panic!("expected Failed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_hung_process_times_out() {
            let backend = backend("sleep 30", Duration::from_millis(200));
            let workspace = tempfile::tempdir().unwrap();

            let started = std::time::Instant::now();
            let result = backend.generate_melody(&request(), workspace.path()).await;
            assert_eq!(result, BackendResult::failed("timeout"));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_missing_executable_is_failed() {
            let backend = SubprocessBackend::new(SubprocessConfig {
                executable: PathBuf::from("/nonexistent/songsmith-infer"),
                ..Default::default()
            });
            let workspace = tempfile::tempdir().unwrap();

            let result = backend.generate_melody(&request(), workspace.path()).await;
            assert!(matches!(result, BackendResult::Failed { .. }));
        }
    }
}
