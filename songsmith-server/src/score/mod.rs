//! Score rendering
//!
//! Turns a stored melody (MIDI) or a chord progression into printable sheet
//! music. The renderer builds a LilyPond document (see `document`) and hands
//! it to a `ScoreBackend` for engraving (see `lilypond`).

pub mod document;
pub mod lilypond;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::music::{MAX_BARS, NotationError, midi};

pub use lilypond::{LilypondBackend, LilypondConfig, ScoreFormat};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot read melody: {0}")]
    InvalidMidi(#[from] NotationError),

    #[error("unrecognized chord '{0}'")]
    InvalidChord(String),

    #[error("chord progression is empty")]
    EmptyProgression,

    #[error("chord progression is too long: {bars} bars (at most {MAX_BARS})")]
    ProgressionTooLong { bars: u64 },

    #[error("engraving failed: {0}")]
    Engraver(String),

    #[error("engraving timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Instrument voices a score can be written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Piano,
    Guitar,
    Violin,
    Cello,
    Flute,
    Bass,
    Voice,
}

impl Instrument {
    /// Maps a free-form instrument name to a supported voice.
    ///
    /// Unrecognized names fall back to piano.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if name.contains("guitar") && !name.contains("bass") {
            Self::Guitar
        } else if name.contains("violin") || name.contains("fiddle") {
            Self::Violin
        } else if name.contains("cello") {
            Self::Cello
        } else if name.contains("flute") {
            Self::Flute
        } else if name.contains("bass") {
            Self::Bass
        } else if name.contains("voice") || name.contains("vocal") || name.contains("sing") {
            Self::Voice
        } else {
            Self::Piano
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Piano => "Piano",
            Self::Guitar => "Guitar",
            Self::Violin => "Violin",
            Self::Cello => "Cello",
            Self::Flute => "Flute",
            Self::Bass => "Bass",
            Self::Voice => "Voice",
        }
    }

    /// LilyPond clef of the staff
    pub fn clef(&self) -> &'static str {
        match self {
            Self::Guitar => "\"treble_8\"",
            Self::Cello | Self::Bass => "bass",
            _ => "treble",
        }
    }

    /// General MIDI instrument name understood by LilyPond
    pub fn midi_instrument(&self) -> &'static str {
        match self {
            Self::Piano => "acoustic grand",
            Self::Guitar => "acoustic guitar (nylon)",
            Self::Violin => "violin",
            Self::Cello => "cello",
            Self::Flute => "flute",
            Self::Bass => "acoustic bass",
            Self::Voice => "choir aahs",
        }
    }
}

/// Maps requested names to staves, dropping duplicates.
///
/// An empty request yields a single piano staff.
pub fn resolve_instruments(names: &[String]) -> Vec<Instrument> {
    let mut instruments = Vec::new();
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let instrument = Instrument::from_name(name);
        if !instruments.contains(&instrument) {
            instruments.push(instrument);
        }
    }
    if instruments.is_empty() {
        instruments.push(Instrument::Piano);
    }
    instruments
}

/// What to engrave
#[derive(Debug, Clone)]
pub enum ScoreSource {
    /// A Standard MIDI File
    Midi(Vec<u8>),
    /// A chord progression such as `C G Am F`, played `repeat` times
    Chords { progression: String, repeat: u32 },
}

/// Engraved score
#[derive(Debug, Clone)]
pub struct RenderedScore {
    pub bytes: Vec<u8>,
    /// File extension of `bytes`, e.g. `pdf`
    pub extension: &'static str,
}

/// Engraves a LilyPond document
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    /// Extension of the files this backend produces
    fn extension(&self) -> &'static str;

    async fn render(&self, document: &str) -> Result<Vec<u8>, RenderError>;
}

#[derive(Clone)]
pub struct ScoreRenderer {
    backend: Arc<dyn ScoreBackend>,
}

impl ScoreRenderer {
    pub fn new(backend: Arc<dyn ScoreBackend>) -> Self {
        Self { backend }
    }

    /// Builds the LilyPond document for a source
    pub fn document(source: &ScoreSource, instruments: &[Instrument]) -> Result<String, RenderError> {
        match source {
            ScoreSource::Midi(bytes) => {
                let melody = midi::read_melody(bytes)?;
                Ok(document::melody_document(&melody, instruments))
            }
            ScoreSource::Chords {
                progression,
                repeat,
            } => {
                let chords = document::parse_progression(progression)?;
                // One bar per chord
                let bars = chords.len() as u64 * u64::from((*repeat).max(1));
                if bars > u64::from(MAX_BARS) {
                    return Err(RenderError::ProgressionTooLong { bars });
                }
                Ok(document::chord_document(&chords, *repeat, instruments))
            }
        }
    }

    /// Renders a score for the requested instruments
    pub async fn render(
        &self,
        source: &ScoreSource,
        instruments: &[String],
    ) -> Result<RenderedScore, RenderError> {
        let instruments = resolve_instruments(instruments);
        let document = Self::document(source, &instruments)?;
        debug!("Built LilyPond document of {} bytes", document.len());

        let bytes = self.backend.render(&document).await?;
        info!(
            "Engraved score for {} staff(s), {} bytes",
            instruments.len(),
            bytes.len()
        );
        Ok(RenderedScore {
            bytes,
            extension: self.backend.extension(),
        })
    }
}
