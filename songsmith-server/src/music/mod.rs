//! Music encodings
//!
//! A small monophonic melody model shared by the local model backend and
//! the score renderer, plus its three encodings:
//! - `abc`: decoding ABC notation produced by a model
//! - `midi`: Standard MIDI File writing and reading (midly)
//! - `synth`: a WAV preview rendering (hound)
//!
//! Time is measured in steps of a sixteenth note.

pub mod abc;
pub mod midi;
pub mod synth;

use thiserror::Error;

/// Steps in one quarter note
pub const STEPS_PER_QUARTER: u32 = 4;

/// Steps in one 4/4 bar
pub const STEPS_PER_BAR: u32 = 16;

/// Tempo used when an encoding does not carry one
pub const DEFAULT_TEMPO_BPM: u16 = 120;

/// Longest melody accepted from any encoding, in bars
pub const MAX_BARS: u32 = 500;

/// [`MAX_BARS`] in steps
pub const MAX_STEPS: u32 = MAX_BARS * STEPS_PER_BAR;

#[derive(Debug, Error)]
pub enum NotationError {
    #[error("no recognizable music content")]
    Empty,

    #[error("invalid MIDI data: {0}")]
    Midi(String),

    #[error("unsupported MIDI timing (only metrical timing is supported)")]
    UnsupportedTiming,

    #[error("melody is too long: {bars} bars (at most {MAX_BARS})")]
    TooLong { bars: u64 },

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

/// A sounding note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    /// MIDI pitch number (60 = middle C)
    pub pitch: u8,
    /// Onset, in steps from the start
    pub start: u32,
    /// Length in steps, at least 1
    pub duration: u32,
}

impl Note {
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.duration)
    }
}

/// A single melodic line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melody {
    pub title: Option<String>,
    pub tempo_bpm: u16,
    /// Notes ordered by onset, never overlapping
    pub notes: Vec<Note>,
}

impl Melody {
    pub fn new(notes: Vec<Note>) -> Self {
        Self {
            title: None,
            tempo_bpm: DEFAULT_TEMPO_BPM,
            notes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Step at which the last note ends
    pub fn end(&self) -> u32 {
        self.notes.iter().map(Note::end).max().unwrap_or(0)
    }

    /// Rejects melodies running past [`MAX_STEPS`].
    pub fn check_length(&self) -> Result<(), NotationError> {
        check_steps(u64::from(self.end()))
    }
}

/// Fails with [`NotationError::TooLong`] when `steps` exceeds [`MAX_STEPS`].
pub fn check_steps(steps: u64) -> Result<(), NotationError> {
    if steps > u64::from(MAX_STEPS) {
        Err(NotationError::TooLong {
            bars: steps.div_ceil(u64::from(STEPS_PER_BAR)),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_cap_counts_started_bars() {
        assert!(check_steps(u64::from(MAX_STEPS)).is_ok());
        assert!(matches!(
            check_steps(u64::from(MAX_STEPS) + 1),
            Err(NotationError::TooLong { bars }) if bars == u64::from(MAX_BARS) + 1
        ));

        let note = Note { pitch: 60, start: u32::MAX - 1, duration: 16 };
        assert_eq!(note.end(), u32::MAX);
        assert!(Melody::new(vec![note]).check_length().is_err());
    }
}
