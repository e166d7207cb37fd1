//! Server configuration
//!
//! Defines every tunable of the orchestrator: bind address, storage
//! locations, the melody backend selected for this deployment and the
//! settings of each external collaborator.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::backend::remote::RemoteMelodyConfig;
use crate::backend::subprocess::SubprocessConfig;
use crate::score::lilypond::{LilypondConfig, ScoreFormat};
use crate::speech::openai::SpeechConfig;
use crate::text::openai::OpenAiConfig;
use crate::text::LyricsStyle;

/// Melody backend used by this deployment
///
/// Selection is static: one backend serves every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodyBackendKind {
    Remote,
    Subprocess,
}

impl FromStr for MelodyBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "subprocess" => Ok(Self::Subprocess),
            other => anyhow::bail!("unknown melody backend '{}'", other),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// sqlx connection string for the job database
    pub database_url: String,

    /// Root directory holding one subdirectory per job
    pub results_dir: PathBuf,

    /// Maximum number of melody generations running at once
    pub max_concurrent_generations: usize,

    pub melody_backend: MelodyBackendKind,
    pub remote: RemoteMelodyConfig,
    pub subprocess: SubprocessConfig,
    pub text: OpenAiConfig,
    pub lyrics: LyricsStyle,
    pub score: LilypondConfig,
    /// Speech synthesis for `/tts`; shares the text API's key
    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            database_url: "sqlite://songsmith.db".to_string(),
            results_dir: PathBuf::from("./results"),
            max_concurrent_generations: 2,
            melody_backend: MelodyBackendKind::Remote,
            remote: RemoteMelodyConfig::default(),
            subprocess: SubprocessConfig::default(),
            text: OpenAiConfig::default(),
            lyrics: LyricsStyle::default(),
            score: LilypondConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset or unparsable numeric values fall
    /// back to their defaults. An unknown `MELODY_BACKEND`, `SCORE_FORMAT`
    /// or badly quoted `INFER_ARGS` is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads and validates the start-up configuration
    ///
    /// A variable that is set but invalid stops start-up instead of being
    /// replaced by a default.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    fn load_from<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_lookup(lookup).context("Invalid configuration in environment")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let melody_backend = match lookup("MELODY_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.melody_backend,
        };

        let remote = RemoteMelodyConfig {
            base_url: lookup("REMOTE_MELODY_URL").unwrap_or(defaults.remote.base_url),
            timeout: secs("REMOTE_TIMEOUT", defaults.remote.timeout),
            ..defaults.remote
        };

        let args = match lookup("INFER_ARGS") {
            Some(raw) => shlex::split(&raw)
                .ok_or_else(|| anyhow::anyhow!("INFER_ARGS is not valid shell syntax"))?,
            None => defaults.subprocess.args,
        };
        let subprocess = SubprocessConfig {
            executable: lookup("INFER_EXECUTABLE")
                .map(PathBuf::from)
                .unwrap_or(defaults.subprocess.executable),
            args,
            working_dir: lookup("INFER_WORKDIR")
                .map(PathBuf::from)
                .or(defaults.subprocess.working_dir),
            timeout: secs("INFER_TIMEOUT", defaults.subprocess.timeout),
            use_tts: lookup("INFER_USE_TTS")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.subprocess.use_tts),
        };

        let text = OpenAiConfig {
            base_url: lookup("OPENAI_BASE_URL").unwrap_or(defaults.text.base_url),
            api_key: lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()),
            model: lookup("OPENAI_MODEL").unwrap_or(defaults.text.model),
            timeout: secs("TEXT_TIMEOUT", defaults.text.timeout),
        };

        let speech = SpeechConfig {
            base_url: lookup("TTS_BASE_URL").unwrap_or_else(|| text.base_url.clone()),
            api_key: text.api_key.clone(),
            model: lookup("TTS_MODEL").unwrap_or(defaults.speech.model),
            voice: lookup("TTS_VOICE").unwrap_or(defaults.speech.voice),
            speed: lookup("TTS_SPEED")
                .and_then(|s| s.trim().parse::<f32>().ok())
                .unwrap_or(defaults.speech.speed),
            timeout: secs("TTS_TIMEOUT", defaults.speech.timeout),
        };

        let lyrics = LyricsStyle {
            language: lookup("LYRICS_LANGUAGE").unwrap_or(defaults.lyrics.language),
            temperature: lookup("LYRICS_TEMPERATURE")
                .and_then(|s| s.trim().parse::<f32>().ok())
                .unwrap_or(defaults.lyrics.temperature),
            max_tokens: lookup("LYRICS_MAX_TOKENS")
                .and_then(|s| s.trim().parse::<u32>().ok())
                .unwrap_or(defaults.lyrics.max_tokens),
        };

        let format = match lookup("SCORE_FORMAT") {
            Some(value) => value.parse::<ScoreFormat>()?,
            None => defaults.score.format,
        };
        let score = LilypondConfig {
            executable: lookup("LILYPOND_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.score.executable),
            args: defaults.score.args,
            format,
            timeout: secs("SCORE_TIMEOUT", defaults.score.timeout),
        };

        Ok(Self {
            bind_addr: lookup("SONGSMITH_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            results_dir: lookup("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            max_concurrent_generations: lookup("MAX_CONCURRENT_GENERATIONS")
                .and_then(|s| s.trim().parse::<usize>().ok())
                .unwrap_or(defaults.max_concurrent_generations),
            melody_backend,
            remote,
            subprocess,
            text,
            lyrics,
            score,
            speech,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if self.max_concurrent_generations == 0 {
            anyhow::bail!("max_concurrent_generations must be greater than 0");
        }

        match self.melody_backend {
            MelodyBackendKind::Remote => {
                let url = &self.remote.base_url;
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("REMOTE_MELODY_URL must start with http:// or https://");
                }
                if self.remote.timeout.is_zero() {
                    anyhow::bail!("remote timeout must be greater than 0");
                }
            }
            MelodyBackendKind::Subprocess => {
                if self.subprocess.executable.as_os_str().is_empty() {
                    anyhow::bail!("INFER_EXECUTABLE cannot be empty");
                }
                if self.subprocess.timeout.is_zero() {
                    anyhow::bail!("subprocess timeout must be greater than 0");
                }
            }
        }

        if !self.text.base_url.starts_with("http://") && !self.text.base_url.starts_with("https://")
        {
            anyhow::bail!("OPENAI_BASE_URL must start with http:// or https://");
        }

        if !(0.0..=2.0).contains(&self.lyrics.temperature) {
            anyhow::bail!("LYRICS_TEMPERATURE must be between 0 and 2");
        }

        let speech_url = &self.speech.base_url;
        if !speech_url.starts_with("http://") && !speech_url.starts_with("https://") {
            anyhow::bail!("TTS_BASE_URL must start with http:// or https://");
        }

        if !(0.25..=4.0).contains(&self.speech.speed) {
            anyhow::bail!("TTS_SPEED must be between 0.25 and 4");
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
