//! WAV preview rendering
//!
//! Renders a melody as 16-bit mono PCM with a simple additive voice: a sine
//! fundamental with two quieter harmonics under a short attack/release
//! envelope. Good enough to audition a generated melody.

use std::f32::consts::TAU;
use std::io::Cursor;

use super::{Melody, NotationError, STEPS_PER_QUARTER};

pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

const AMPLITUDE: f32 = 0.3;
const ATTACK_SECS: f32 = 0.01;
const RELEASE_SECS: f32 = 0.05;
const HARMONICS: [(f32, f32); 3] = [(1.0, 1.0), (2.0, 0.35), (3.0, 0.15)];

/// Renders the melody into an in-memory WAV file.
pub fn render_wav(melody: &Melody, sample_rate: u32) -> Result<Vec<u8>, NotationError> {
    melody.check_length()?;
    let sample_rate = sample_rate.max(8_000);
    let secs_per_step = 60.0 / (f32::from(melody.tempo_bpm.max(1)) * STEPS_PER_QUARTER as f32);
    let samples_per_step = secs_per_step * sample_rate as f32;

    let tail = (RELEASE_SECS * sample_rate as f32) as usize;
    let total = (melody.end() as f32 * samples_per_step) as usize + tail;
    let mut mix = vec![0.0f32; total];

    let norm: f32 = HARMONICS.iter().map(|(_, gain)| gain).sum();
    for note in &melody.notes {
        let freq = 440.0 * 2f32.powf((f32::from(note.pitch) - 69.0) / 12.0);
        let start = (note.start as f32 * samples_per_step) as usize;
        let len = (note.duration as f32 * samples_per_step) as usize;

        for i in 0..len {
            let Some(slot) = mix.get_mut(start + i) else {
                break;
            };
            let t = i as f32 / sample_rate as f32;
            let remaining = (len - i) as f32 / sample_rate as f32;
            let envelope = (t / ATTACK_SECS).min(1.0) * (remaining / RELEASE_SECS).min(1.0);

            let voice: f32 = HARMONICS
                .iter()
                .map(|(mult, gain)| gain * (TAU * freq * mult * t).sin())
                .sum();
            *slot += AMPLITUDE * envelope * voice / norm;
        }
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for sample in mix {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}
