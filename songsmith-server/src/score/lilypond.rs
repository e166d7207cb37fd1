//! LilyPond engraving backend
//!
//! Writes the document into a fresh temporary directory, runs `lilypond`
//! there and reads the engraved file back. The directory is removed when
//! the render returns, whatever the outcome.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{RenderError, ScoreBackend};

/// Output format of engraved scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreFormat {
    Pdf,
    Png,
}

impl ScoreFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            Self::Pdf => "--pdf",
            Self::Png => "--png",
        }
    }
}

impl FromStr for ScoreFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "png" => Ok(Self::Png),
            other => anyhow::bail!("unsupported score format '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LilypondConfig {
    pub executable: PathBuf,

    /// Extra arguments placed before the output flags
    pub args: Vec<String>,

    pub format: ScoreFormat,
    pub timeout: Duration,
}

impl Default for LilypondConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("lilypond"),
            args: Vec::new(),
            format: ScoreFormat::Pdf,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct LilypondBackend {
    config: LilypondConfig,
}

impl LilypondBackend {
    pub fn new(config: LilypondConfig) -> Self {
        Self { config }
    }

    /// Locates the engraved file; multi-page PNG output is numbered.
    async fn read_output(&self, dir: &Path) -> Result<Vec<u8>, RenderError> {
        let ext = self.config.format.extension();
        for name in [format!("score.{}", ext), format!("score-page1.{}", ext)] {
            match tokio::fs::read(dir.join(&name)).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(RenderError::Engraver(format!(
            "lilypond produced no {} output",
            ext
        )))
    }
}

#[async_trait]
impl ScoreBackend for LilypondBackend {
    fn extension(&self) -> &'static str {
        self.config.format.extension()
    }

    async fn render(&self, document: &str) -> Result<Vec<u8>, RenderError> {
        let workdir = tempfile::tempdir()?;
        let source = workdir.path().join("score.ly");
        tokio::fs::write(&source, document).await?;

        let mut cmd = Command::new(&self.config.executable);
        cmd.args(&self.config.args)
            .arg(self.config.format.flag())
            .arg("-o")
            .arg(workdir.path().join("score"))
            .arg(&source)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} in {}", self.config.executable.display(), workdir.path().display());
        let child = cmd.spawn().map_err(|e| {
            RenderError::Engraver(format!(
                "failed to launch {}: {}",
                self.config.executable.display(),
                e
            ))
        })?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| RenderError::Timeout)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_lines: Vec<&str> = stderr.trim().lines().rev().take(20).collect();
            let reason = last_lines.into_iter().rev().collect::<Vec<_>>().join("\n");
            warn!("lilypond exited with {}: {}", output.status, reason);
            return Err(RenderError::Engraver(if reason.is_empty() {
                format!("lilypond exited with {}", output.status)
            } else {
                reason
            }));
        }

        self.read_output(workdir.path()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_format_from_str() {
        assert_eq!("PDF".parse::<ScoreFormat>().unwrap(), ScoreFormat::Pdf);
        assert_eq!(" png ".parse::<ScoreFormat>().unwrap(), ScoreFormat::Png);
        assert!("gif".parse::<ScoreFormat>().is_err());
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// `sh -c <script>` stands in for lilypond; the output flags land in
        /// $0 (format), $1 (-o), $2 (output base) and $3 (source file)
        fn backend(script: &str, format: ScoreFormat) -> LilypondBackend {
            LilypondBackend::new(LilypondConfig {
                executable: PathBuf::from("sh"),
                args: vec!["-c".to_string(), script.to_string()],
                format,
                timeout: Duration::from_secs(10),
            })
        }

        #[tokio::test]
        async fn test_render_reads_output_and_cleans_up() {
            // Echo the working directory so the test can check it is gone
            let backend = backend(
                r#"[ "$0" = "--pdf" ] && grep -q melody "$3" && pwd > "$2.pdf""#,
                ScoreFormat::Pdf,
            );

            let bytes = backend.render("melody = { c'4 }").await.unwrap();
            let workdir = PathBuf::from(String::from_utf8(bytes).unwrap().trim());
            assert!(workdir.is_absolute());
            assert!(!workdir.exists());
        }

        #[tokio::test]
        async fn test_multi_page_png_is_found() {
            let backend = backend(r#"printf png > "$2-page1.png""#, ScoreFormat::Png);
            assert_eq!(backend.render("{ }").await.unwrap(), b"png");
        }

        #[tokio::test]
        async fn test_failure_surfaces_stderr() {
            let backend = backend(
                "echo 'score.ly:3:1: error: syntax error' >&2; exit 1",
                ScoreFormat::Pdf,
            );

            match backend.render("{ c'4 ").await {
                Err(RenderError::Engraver(reason)) => assert!(reason.contains("syntax error")),
                other => panic!("expected Engraver error, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_missing_output_is_an_error() {
            let backend = backend("exit 0", ScoreFormat::Pdf);
            assert!(matches!(
                backend.render("{ }").await,
                Err(RenderError::Engraver(_))
            ));
        }
    }
}
