// LilyPond document generation.
//
// A melody is written as absolute pitches on a sixteenth-note grid. LilyPond
// needs durations as power-of-two note values (optionally dotted), and notes
// crossing a barline must be split into tied segments, so every note and
// rest is first cut at barlines and then decomposed into engraveable values.
//
// A chord progression is written in \chordmode, one chord per bar, wrapped
// in \repeat unfold. Every requested instrument gets its own staff showing
// the same music.

use std::fmt::Write;

use super::{Instrument, RenderError};
use crate::music::{Melody, STEPS_PER_BAR};

const LILYPOND_VERSION: &str = "2.24.0";

/// Pitch class names in LilyPond notation (indexed by pitch class 0-11).
const LY_PITCH_NAMES: [&str; 12] = [
    "c", "cis", "d", "ees", "e", "f", "fis", "g", "aes", "a", "bes", "b",
];

/// Engraveable durations in sixteenth-note steps, largest first.
const DURATION_TABLE: [(u32, &str); 8] = [
    (16, "1"),
    (12, "2."),
    (8, "2"),
    (6, "4."),
    (4, "4"),
    (3, "8."),
    (2, "8"),
    (1, "16"),
];

/// Convert a MIDI pitch number to a LilyPond absolute pitch string.
///
/// LilyPond's `c` with no octave marks = MIDI 48.
pub fn midi_to_ly_note(midi_pitch: u8) -> String {
    let octave = i32::from(midi_pitch / 12) - 4;
    let mut result = LY_PITCH_NAMES[usize::from(midi_pitch % 12)].to_string();
    let mark = if octave > 0 { '\'' } else { ',' };
    for _ in 0..octave.unsigned_abs() {
        result.push(mark);
    }
    result
}

/// Decompose a duration in steps into LilyPond durations, largest first.
pub fn decompose_steps(mut steps: u32) -> Vec<&'static str> {
    let mut parts = Vec::new();
    for &(value, name) in &DURATION_TABLE {
        while steps >= value {
            parts.push(name);
            steps -= value;
        }
    }
    parts
}

/// Split a duration at 4/4 barlines into per-bar fragments.
pub fn split_at_barlines(start: u32, duration: u32) -> Vec<u32> {
    let mut fragments = Vec::new();
    let mut remaining = duration;
    // Wide enough that the last bar before u32::MAX still closes
    let bar = u64::from(STEPS_PER_BAR);
    let mut pos = u64::from(start);

    while remaining > 0 {
        let to_bar = bar - pos % bar;
        let fragment = remaining.min(u32::try_from(to_bar).unwrap_or(STEPS_PER_BAR));
        fragments.push(fragment);
        remaining -= fragment;
        pos += u64::from(fragment);
    }
    fragments
}

/// Appends one note (or rest, when `pitch` is `None`) with ties as needed.
fn push_event(out: &mut String, pitch: Option<u8>, start: u32, duration: u32) {
    let name = pitch.map(midi_to_ly_note).unwrap_or_else(|| "r".to_string());
    let fragments = split_at_barlines(start, duration);

    for (i, fragment) in fragments.iter().enumerate() {
        let parts = decompose_steps(*fragment);
        for (j, part) in parts.iter().enumerate() {
            if !out.is_empty() {
                out.push(' ');
            }
            let _ = write!(out, "{}{}", name, part);
            let more = j + 1 < parts.len() || i + 1 < fragments.len();
            if pitch.is_some() && more {
                out.push('~');
            }
        }
    }
}

/// Render a melody as a LilyPond music expression.
pub fn melody_music(melody: &Melody) -> String {
    let mut out = String::new();
    let mut cursor = 0;

    for note in &melody.notes {
        if note.start > cursor {
            push_event(&mut out, None, cursor, note.start - cursor);
        }
        let start = note.start.max(cursor);
        let duration = note.end().saturating_sub(start);
        if duration > 0 {
            push_event(&mut out, Some(note.pitch), start, duration);
        }
        cursor = cursor.max(note.end());
    }
    out
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn header(out: &mut String, title: &str) {
    let _ = writeln!(out, "\\version \"{}\"\n", LILYPOND_VERSION);
    let _ = writeln!(
        out,
        "\\header {{\n  title = \"{}\"\n  tagline = ##f\n}}\n",
        escape(title)
    );
}

fn staff(out: &mut String, instrument: Instrument, music: &str) {
    let _ = writeln!(
        out,
        "    \\new Staff \\with {{ instrumentName = \"{}\" midiInstrument = \"{}\" }} {{\n      \\clef {}\n      \\global\n      \\{}\n    }}",
        instrument.display_name(),
        instrument.midi_instrument(),
        instrument.clef(),
        music
    );
}

/// Generate a complete LilyPond file for a melody.
pub fn melody_document(melody: &Melody, instruments: &[Instrument]) -> String {
    let mut ly = String::new();
    header(&mut ly, melody.title.as_deref().unwrap_or("Untitled"));

    let _ = writeln!(
        ly,
        "global = {{\n  \\time 4/4 \\tempo 4 = {}\n}}\n",
        melody.tempo_bpm
    );
    let _ = writeln!(ly, "melody = \\absolute {{\n  {}\n}}\n", melody_music(melody));

    ly.push_str("\\score {\n  <<\n");
    for instrument in instruments {
        staff(&mut ly, *instrument, "melody");
    }
    ly.push_str("  >>\n  \\layout { }\n}\n");
    ly
}

/// A chord symbol translated to chord mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    root: String,
    quality: &'static str,
    bass: Option<String>,
}

impl Chord {
    /// Chord-mode spelling with the given duration, e.g. `a1:m7/g`.
    pub fn to_ly(&self, duration: &str) -> String {
        let mut out = format!("{}{}", self.root, duration);
        if !self.quality.is_empty() {
            out.push(':');
            out.push_str(self.quality);
        }
        if let Some(bass) = &self.bass {
            out.push('/');
            out.push_str(bass);
        }
        out
    }
}

/// Reads a note name such as `C`, `F#` or `Bb` from the start of `text`.
fn parse_root(text: &str) -> Option<(String, &str)> {
    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if !('A'..='G').contains(&letter) {
        return None;
    }
    let mut name = letter.to_ascii_lowercase().to_string();
    let rest = chars.as_str();
    let rest = if let Some(rest) = rest.strip_prefix('#') {
        name.push_str("is");
        rest
    } else if let Some(rest) = rest.strip_prefix('b') {
        name.push_str("es");
        rest
    } else {
        rest
    };
    Some((name, rest))
}

fn parse_quality(text: &str) -> Option<&'static str> {
    let quality = match text {
        "" | "maj" | "M" => "",
        "m" | "min" | "-" => "m",
        "7" => "7",
        "maj7" | "M7" | "Δ7" => "maj7",
        "m7" | "min7" | "-7" => "m7",
        "m7b5" | "ø" | "ø7" => "m7.5-",
        "dim" | "°" => "dim",
        "dim7" | "°7" => "dim7",
        "aug" | "+" => "aug",
        "sus" | "sus4" => "sus4",
        "sus2" => "sus2",
        "6" => "6",
        "m6" => "m6",
        "9" => "9",
        "m9" => "m9",
        "add9" => "5.9",
        _ => return None,
    };
    Some(quality)
}

fn parse_chord(symbol: &str) -> Option<Chord> {
    let (head, bass) = match symbol.split_once('/') {
        Some((head, bass)) => {
            let (bass, rest) = parse_root(bass)?;
            if !rest.is_empty() {
                return None;
            }
            (head, Some(bass))
        }
        None => (symbol, None),
    };
    let (root, rest) = parse_root(head)?;
    Some(Chord {
        root,
        quality: parse_quality(rest)?,
        bass,
    })
}

/// Parses a progression like `C G7 | Am F/C`.
///
/// Chords are separated by whitespace, commas or bar lines.
pub fn parse_progression(text: &str) -> Result<Vec<Chord>, RenderError> {
    let chords = text
        .split(|c: char| c.is_whitespace() || c == ',' || c == '|')
        .filter(|s| !s.is_empty())
        .map(|symbol| parse_chord(symbol).ok_or_else(|| RenderError::InvalidChord(symbol.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    if chords.is_empty() {
        return Err(RenderError::EmptyProgression);
    }
    Ok(chords)
}

/// Generate a complete LilyPond file for a chord progression, one chord per
/// bar, repeated `repeat` times.
pub fn chord_document(chords: &[Chord], repeat: u32, instruments: &[Instrument]) -> String {
    let mut ly = String::new();
    header(&mut ly, "Chord Chart");

    let spelled: Vec<String> = chords.iter().map(|c| c.to_ly("1")).collect();
    let _ = writeln!(ly, "global = {{\n  \\time 4/4\n}}\n");
    let _ = writeln!(
        ly,
        "progression = \\chordmode {{\n  \\repeat unfold {} {{ {} }}\n}}\n",
        repeat.max(1),
        spelled.join(" ")
    );

    ly.push_str("\\score {\n  <<\n    \\new ChordNames { \\progression }\n");
    for instrument in instruments {
        staff(&mut ly, *instrument, "progression");
    }
    ly.push_str("  >>\n  \\layout { }\n}\n");
    ly
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::Note;

    #[test]
    fn test_midi_to_ly_note() {
        assert_eq!(midi_to_ly_note(48), "c");
        assert_eq!(midi_to_ly_note(60), "c'");
        assert_eq!(midi_to_ly_note(73), "cis''");
        assert_eq!(midi_to_ly_note(46), "bes,");
        assert_eq!(midi_to_ly_note(34), "bes,,");
    }

    #[test]
    fn test_decompose_and_split() {
        assert_eq!(decompose_steps(16), vec!["1"]);
        assert_eq!(decompose_steps(5), vec!["4", "16"]);
        assert_eq!(decompose_steps(14), vec!["2.", "8"]);
        assert_eq!(split_at_barlines(12, 8), vec![4, 4]);
        assert_eq!(split_at_barlines(0, 40), vec![16, 16, 8]);
        assert_eq!(split_at_barlines(u32::MAX - 3, 20), vec![4, 16]);
    }

    #[test]
    fn test_melody_music_ties_across_barlines_and_fills_rests() {
        let melody = Melody::new(vec![
            Note { pitch: 60, start: 2, duration: 2 },
            Note { pitch: 62, start: 12, duration: 8 },
        ]);
        assert_eq!(melody_music(&melody), "r8 c'8 r2 d'4~ d'4");
    }

    #[test]
    fn test_melody_document_has_one_staff_per_instrument() {
        let mut melody = Melody::new(vec![Note { pitch: 67, start: 0, duration: 16 }]);
        melody.title = Some("Say \"hi\"".to_string());
        let ly = melody_document(&melody, &[Instrument::Violin, Instrument::Guitar]);

        assert!(ly.starts_with("\\version \"2.24.0\""));
        assert!(ly.contains("title = \"Say \\\"hi\\\"\""));
        assert!(ly.contains("\\tempo 4 = 120"));
        assert!(ly.contains("g'1"));
        assert_eq!(ly.matches("\\new Staff").count(), 2);
        assert!(ly.contains("\\clef \"treble_8\""));
    }

    #[test]
    fn test_parse_progression() {
        let chords = parse_progression("C, F#m7 | Bb/D  Gsus4").unwrap();
        let spelled: Vec<String> = chords.iter().map(|c| c.to_ly("1")).collect();
        assert_eq!(spelled, vec!["c1", "fis1:m7", "bes1/d", "g1:sus4"]);

        assert!(matches!(parse_progression(" | , "), Err(RenderError::EmptyProgression)));
        assert!(matches!(parse_progression("C Xm"), Err(RenderError::InvalidChord(c)) if c == "Xm"));
        assert!(matches!(parse_progression("C/Q"), Err(RenderError::InvalidChord(_))));
    }

    #[test]
    fn test_chord_document_repeats_progression() {
        let chords = parse_progression("Am F C G").unwrap();
        let ly = chord_document(&chords, 0, &[Instrument::Bass]);

        assert!(ly.contains("\\repeat unfold 1 { a1:m f1 c1 g1 }"));
        assert!(ly.contains("\\new ChordNames"));
        assert!(ly.contains("\\clef bass"));
    }
}
