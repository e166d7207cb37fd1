// ABC notation decoding.
//
// Turns the text a music model emits into a `Melody`. Only the subset of ABC
// that matters for a single melodic line is understood: the T/L/Q/K header
// fields (also inline as `[L:1/4]`), notes with accidentals, octave marks and
// lengths, rests, ties, and bar lines resetting accidentals. Chords keep
// their first note. Decorations, chord symbols, tuplet markers and lyric
// lines are skipped.
//
// The body starts at the first K: line. Text without a K: line therefore
// decodes to nothing, which keeps prose from being read as notes.

use std::collections::HashMap;

use super::{DEFAULT_TEMPO_BPM, MAX_STEPS, Melody, NotationError, Note, STEPS_PER_BAR, check_steps};

/// Semitone offsets of C D E F G A B.
const LETTER_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Position of each letter (C D E F G A B) on the circle of fifths, F = -1.
const LETTER_FIFTHS: [i32; 7] = [0, 2, 4, -1, 1, 3, 5];

/// Order in which sharps enter a key signature: F C G D A E B.
const SHARP_ORDER: [usize; 7] = [3, 0, 4, 1, 5, 2, 6];

/// Decodes ABC text into a melody.
///
/// Returns [`NotationError::Empty`] when no note could be read and
/// [`NotationError::TooLong`] when the tune runs past [`MAX_STEPS`].
pub fn parse(text: &str) -> Result<Melody, NotationError> {
    let mut body = BodyState::new();
    let mut title = None;
    let mut in_body = false;

    for raw in text.lines() {
        let line = raw.split('%').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if let Some((field, value)) = header_field(line) {
            if field == 'T' && title.is_none() && !value.is_empty() {
                title = Some(value.to_string());
            }
            if body.apply_field(field, value) == Some('K') {
                in_body = true;
            }
            continue;
        }

        if in_body {
            body.parse_line(line);
            check_steps(u64::from(body.cursor))?;
        }
    }

    if body.notes.is_empty() {
        return Err(NotationError::Empty);
    }

    let melody = Melody {
        title,
        tempo_bpm: body.tempo,
        notes: body.notes,
    };
    melody.check_length()?;
    Ok(melody)
}

/// `X:value` style line, returning the field letter and its value.
fn header_field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let field = chars.next()?;
    if field.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some((field, line[2..].trim()))
    } else {
        None
    }
}

fn parse_fraction(value: &str) -> Option<(u32, u32)> {
    let (num, den) = value.trim().split_once('/')?;
    let num = num.trim().parse::<u32>().ok()?;
    let den = den.trim().parse::<u32>().ok()?;
    (num > 0 && den > 0).then_some((num, den))
}

/// Reads `Q:` values such as `1/4=120`, `3/8=60` or a bare `120`, and
/// returns quarter notes per minute.
fn parse_tempo(value: &str) -> Option<u16> {
    let (beat, rate) = match value.rsplit_once('=') {
        Some((beat, rate)) => {
            let beat = beat.split_whitespace().last().and_then(parse_fraction);
            (beat.unwrap_or((1, 4)), rate)
        }
        None => ((1, 4), value),
    };

    let digits: String = rate.trim().chars().take_while(char::is_ascii_digit).collect();
    let rate = digits.parse::<u32>().ok().filter(|r| *r > 0)?;

    let bpm = u64::from(rate) * 4 * u64::from(beat.0) / u64::from(beat.1);
    u16::try_from(bpm).ok().filter(|b| *b > 0)
}

/// Accidental applied to each letter (C..B) by a `K:` value.
fn key_signature(value: &str) -> [i32; 7] {
    let mut signature = [0; 7];
    let value = value.trim();
    let mut chars = value.chars();

    let Some(letter) = chars.next().and_then(letter_index) else {
        return signature;
    };
    let rest: String = chars.collect();
    let (accidental, mode) = match rest.chars().next() {
        Some('#') => (7, &rest[1..]),
        Some('b') => (-7, &rest[1..]),
        _ => (0, rest.as_str()),
    };

    let mode = mode.trim().to_ascii_lowercase();
    let mode_shift = match mode.get(..3).unwrap_or(mode.as_str()) {
        "" | "maj" | "ion" => 0,
        "mix" => -1,
        "dor" => -2,
        "aeo" | "min" | "m" => -3,
        "phr" => -4,
        "loc" => -5,
        "lyd" => 1,
        m if m.starts_with('m') => -3,
        _ => 0,
    };

    let fifths = (LETTER_FIFTHS[letter] + accidental + mode_shift).clamp(-7, 7);
    if fifths > 0 {
        for &idx in SHARP_ORDER.iter().take(fifths as usize) {
            signature[idx] = 1;
        }
    } else {
        for &idx in SHARP_ORDER.iter().rev().take(fifths.unsigned_abs() as usize) {
            signature[idx] = -1;
        }
    }
    signature
}

fn letter_index(c: char) -> Option<usize> {
    match c.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(1),
        'E' => Some(2),
        'F' => Some(3),
        'G' => Some(4),
        'A' => Some(5),
        'B' => Some(6),
        _ => None,
    }
}

struct BodyState {
    unit: (u32, u32),
    tempo: u16,
    key: [i32; 7],
    /// Accidentals written earlier in the current bar, by (letter, octave)
    bar_accidentals: HashMap<(usize, i32), i32>,
    notes: Vec<Note>,
    cursor: u32,
    tie_pending: bool,
}

impl BodyState {
    fn new() -> Self {
        Self {
            unit: (1, 8),
            tempo: DEFAULT_TEMPO_BPM,
            key: [0; 7],
            bar_accidentals: HashMap::new(),
            notes: Vec::new(),
            cursor: 0,
            tie_pending: false,
        }
    }

    /// Applies a header or inline field; returns the field letter if it was
    /// understood.
    fn apply_field(&mut self, field: char, value: &str) -> Option<char> {
        match field {
            'L' => {
                if let Some(unit) = parse_fraction(value) {
                    self.unit = unit;
                }
            }
            'Q' => {
                if let Some(tempo) = parse_tempo(value) {
                    self.tempo = tempo;
                }
            }
            'K' => {
                self.key = key_signature(value);
                self.bar_accidentals.clear();
            }
            'T' | 'M' | 'X' => {}
            _ => return None,
        }
        Some(field)
    }

    fn parse_line(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '"' | '!' | '+' => {
                    let close = chars[i];
                    i += 1;
                    while i < chars.len() && chars[i] != close {
                        i += 1;
                    }
                    i += 1;
                }
                '|' => {
                    self.bar_accidentals.clear();
                    i += 1;
                }
                '[' => i = self.parse_bracket(&chars, i),
                '(' => {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                '-' => {
                    self.tie_pending = true;
                    i += 1;
                }
                'z' | 'x' => {
                    let (steps, next) = self.parse_length(&chars, i + 1);
                    self.rest(steps);
                    i = next;
                }
                'Z' => {
                    let (bars, next) = parse_number(&chars, i + 1);
                    self.rest(bars.unwrap_or(1).saturating_mul(STEPS_PER_BAR));
                    i = next;
                }
                '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => {
                    let (note, next) = self.parse_note(&chars, i);
                    if let Some((pitch, steps)) = note {
                        self.push_note(pitch, steps);
                    }
                    i = next;
                }
                _ => i += 1,
            }
        }
    }

    /// Handles `[`: inline fields, repeat endings, or a chord.
    fn parse_bracket(&mut self, chars: &[char], start: usize) -> usize {
        let mut i = start + 1;
        let close = chars[i..]
            .iter()
            .position(|c| *c == ']')
            .map(|p| i + p)
            .unwrap_or(chars.len());

        if chars.get(i).is_some_and(|c| c.is_ascii_alphabetic()) && chars.get(i + 1) == Some(&':')
        {
            let value: String = chars[i + 2..close].iter().collect();
            self.apply_field(chars[i], value.trim());
            return close + 1;
        }

        if chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            return i;
        }

        let mut first = None;
        while i < close {
            match chars[i] {
                '^' | '_' | '=' | 'A'..='G' | 'a'..='g' => {
                    let (note, next) = self.parse_note(chars, i);
                    if first.is_none() {
                        first = note;
                    }
                    i = next;
                }
                _ => i += 1,
            }
        }
        // A length after the closing bracket scales the whole chord
        let ((num, den), next) = parse_multiplier(chars, close + 1);
        if let Some((pitch, steps)) = first {
            self.push_note(pitch, round_steps(u64::from(steps) * u64::from(num), u64::from(den)));
        }
        next
    }

    /// Reads one note starting at `start`. Returns the pitch (None when out
    /// of MIDI range) with its length in steps, and the next index.
    fn parse_note(&mut self, chars: &[char], start: usize) -> (Option<(u8, u32)>, usize) {
        let mut i = start;
        let mut explicit: Option<i32> = None;

        while i < chars.len() && matches!(chars[i], '^' | '_' | '=') {
            let step = match chars[i] {
                '^' => 1,
                '_' => -1,
                _ => 0,
            };
            explicit = Some(if step == 0 { 0 } else { explicit.unwrap_or(0) + step });
            i += 1;
        }

        let Some(letter_char) = chars.get(i).copied() else {
            return (None, i);
        };
        let Some(letter) = letter_index(letter_char) else {
            return (None, i);
        };
        i += 1;

        let mut octave = if letter_char.is_ascii_lowercase() { 1 } else { 0 };
        while i < chars.len() {
            match chars[i] {
                '\'' => octave += 1,
                ',' => octave -= 1,
                _ => break,
            }
            i += 1;
        }

        let accidental = match explicit {
            Some(acc) => {
                self.bar_accidentals.insert((letter, octave), acc);
                acc
            }
            None => self
                .bar_accidentals
                .get(&(letter, octave))
                .copied()
                .unwrap_or(self.key[letter]),
        };

        let (steps, next) = self.parse_length(chars, i);
        let pitch = 60 + 12 * octave + LETTER_SEMITONES[letter] + accidental;
        let pitch = u8::try_from(pitch).ok().filter(|p| *p <= 127);

        (pitch.map(|p| (p, steps)), next)
    }

    /// Reads a length suffix (`2`, `/`, `3/2`, `//`) and converts it to
    /// steps, rounding to the nearest step with a minimum of one.
    fn parse_length(&self, chars: &[char], start: usize) -> (u32, usize) {
        let ((numerator, denominator), i) = parse_multiplier(chars, start);
        let num = u64::from(STEPS_PER_BAR * self.unit.0.min(MAX_STEPS)) * u64::from(numerator);
        let den = u64::from(self.unit.1) * u64::from(denominator);
        (round_steps(num, den), i)
    }

    fn push_note(&mut self, pitch: u8, steps: u32) {
        let cursor = self.cursor;
        match self.notes.last_mut() {
            Some(last) if self.tie_pending && last.pitch == pitch && last.end() == cursor => {
                last.duration = last.duration.saturating_add(steps);
            }
            _ => self.notes.push(Note {
                pitch,
                start: cursor,
                duration: steps,
            }),
        }
        self.cursor = self.cursor.saturating_add(steps);
        self.tie_pending = false;
    }

    fn rest(&mut self, steps: u32) {
        self.cursor = self.cursor.saturating_add(steps);
        self.tie_pending = false;
    }
}

/// `num / den` rounded to the nearest step, at least one and clamped just
/// past [`MAX_STEPS`] so later arithmetic cannot overflow.
fn round_steps(num: u64, den: u64) -> u32 {
    let den = den.max(1);
    let steps = num.saturating_mul(2).saturating_add(den) / den.saturating_mul(2);
    u32::try_from(steps.clamp(1, u64::from(MAX_STEPS) + 1)).unwrap_or(MAX_STEPS + 1)
}

/// Reads a length suffix as a fraction of the unit note length.
fn parse_multiplier(chars: &[char], start: usize) -> ((u32, u32), usize) {
    let (multiplier, mut i) = parse_number(chars, start);
    let numerator = multiplier.filter(|m| *m > 0).unwrap_or(1);
    let mut denominator: u32 = 1;

    while i < chars.len() && chars[i] == '/' {
        let (value, next) = parse_number(chars, i + 1);
        match value {
            Some(value) if value > 0 => denominator = denominator.saturating_mul(value),
            _ => denominator = denominator.saturating_mul(2),
        }
        i = next;
    }
    ((numerator, denominator), i)
}

fn parse_number(chars: &[char], start: usize) -> (Option<u32>, usize) {
    let mut i = start;
    let mut value: Option<u32> = None;
    while i < chars.len() {
        let Some(digit) = chars[i].to_digit(10) else {
            break;
        };
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
        i += 1;
    }
    (value, i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::MAX_BARS;

    fn pitches(melody: &Melody) -> Vec<u8> {
        melody.notes.iter().map(|n| n.pitch).collect()
    }

    #[test]
    fn test_parse_simple_tune() {
        let abc = "X:1\nT:Autumn Rain\nM:4/4\nL:1/8\nQ:1/4=96\nK:C\nCDEF G2 z2|c4 C,4|]\n";
        let melody = parse(abc).unwrap();

        assert_eq!(melody.title.as_deref(), Some("Autumn Rain"));
        assert_eq!(melody.tempo_bpm, 96);
        assert_eq!(pitches(&melody), vec![60, 62, 64, 65, 67, 72, 48]);

        let g = melody.notes[4];
        assert_eq!((g.start, g.duration), (8, 4));
        // The rest shifts c to the start of bar two
        assert_eq!(melody.notes[5].start, 16);
        assert_eq!(melody.end(), 32);
    }

    #[test]
    fn test_key_signature_and_bar_accidentals() {
        // G major sharpens F; =F cancels it until the bar line
        let melody = parse("K:G\nF =F F | F").unwrap();
        assert_eq!(pitches(&melody), vec![66, 65, 65, 66]);

        // D minor flattens B
        let melody = parse("K:Dm\nB ^B").unwrap();
        assert_eq!(pitches(&melody), vec![70, 72]);

        // Bb major: B and E flat
        let melody = parse("K:Bb\nB E A").unwrap();
        assert_eq!(pitches(&melody), vec![70, 63, 69]);
    }

    #[test]
    fn test_lengths_and_unit() {
        let melody = parse("L:1/4\nK:C\nC C/ C3/2 C//").unwrap();
        let durations: Vec<u32> = melody.notes.iter().map(|n| n.duration).collect();
        assert_eq!(durations, vec![4, 2, 6, 1]);
    }

    #[test]
    fn test_ties_merge_equal_pitches() {
        let melody = parse("K:C\nC2-C2 D").unwrap();
        assert_eq!(melody.notes.len(), 2);
        assert_eq!(melody.notes[0].duration, 8);
        assert_eq!(melody.notes[1].start, 8);
    }

    #[test]
    fn test_chords_keep_first_note_and_symbols_are_skipped() {
        let melody = parse("K:C\n\"Am\"[ACE]2 !trill!G").unwrap();
        assert_eq!(pitches(&melody), vec![69, 67]);
        assert_eq!(melody.notes[0].duration, 4);
    }

    #[test]
    fn test_inline_fields_apply_mid_tune() {
        let melody = parse("K:C\nC [L:1/4] C [K:D] F").unwrap();
        assert_eq!(melody.notes[1].duration, 4);
        assert_eq!(melody.notes[2].pitch, 66);
    }

    #[test]
    fn test_text_without_music_is_empty() {
        assert!(matches!(
            parse("Here is a lovely song about autumn rain."),
            Err(NotationError::Empty)
        ));
        assert!(matches!(parse("X:1\nT:Nothing\nK:C\n| z4 |"), Err(NotationError::Empty)));
        assert!(matches!(parse(""), Err(NotationError::Empty)));
    }

    #[test]
    fn test_overlong_tunes_are_rejected() {
        assert!(matches!(
            parse("X:1\nK:C\nZ130000 C"),
            Err(NotationError::TooLong { bars: 130001 })
        ));
        assert!(matches!(
            parse("X:1\nL:1/1\nK:C\nC4294967295"),
            Err(NotationError::TooLong { .. })
        ));
        assert!(matches!(
            parse("X:1\nK:C\n[CEG]4294967295 D"),
            Err(NotationError::TooLong { .. })
        ));
        let tied = format!("X:1\nL:1/1\nK:C\n{}C", "C-".repeat(600));
        assert!(matches!(parse(&tied), Err(NotationError::TooLong { .. })));
    }

    #[test]
    fn test_tune_at_the_length_limit_parses() {
        let bars = format!("X:1\nL:1/1\nK:C\nZ{} C", MAX_BARS - 1);
        let melody = parse(&bars).unwrap();
        assert_eq!(melody.end(), MAX_STEPS);
    }

    #[test]
    fn test_parse_tempo_forms() {
        assert_eq!(parse_tempo("1/4=120"), Some(120));
        assert_eq!(parse_tempo("1/8=240"), Some(120));
        assert_eq!(parse_tempo("\"Allegro\" 1/4=140"), Some(140));
        assert_eq!(parse_tempo("90"), Some(90));
        assert_eq!(parse_tempo("fast"), None);
        assert_eq!(parse_tempo("1/1=4294967295"), None);
    }
}
