// Standard MIDI File encoding of a melody.
//
// Writing produces SMF format 1 with a tempo track and one melody track.
// Reading accepts any metrical SMF: the track with the most notes becomes the
// melody, reduced to a single line (simultaneous onsets keep the highest
// pitch, overlaps are cut at the next onset).
//
// Uses the `midly` crate for parsing and writing.

use std::cmp::Reverse;
use std::collections::HashMap;

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

use super::{DEFAULT_TEMPO_BPM, Melody, NotationError, Note, STEPS_PER_QUARTER};

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Ticks per sixteenth-note step.
const TICKS_PER_STEP: u32 = TICKS_PER_QUARTER as u32 / STEPS_PER_QUARTER;

/// General MIDI program 0, acoustic grand piano.
pub const PIANO_PROGRAM: u8 = 0;

const MELODY_CHANNEL: u8 = 0;
const NOTE_VELOCITY: u8 = 80;

/// Encodes a melody as a Standard MIDI File.
pub fn write_melody(melody: &Melody, program: u8) -> Result<Vec<u8>, NotationError> {
    melody.check_length()?;
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    let bpm = u32::from(melody.tempo_bpm.clamp(20, 400));
    smf.tracks.push(vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(60_000_000 / bpm))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]);

    let channel = u4::new(MELODY_CHANNEL);
    let mut track: Track<'_> = Vec::new();
    if let Some(title) = &melody.title {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(title.as_bytes())),
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(program.min(127)),
            },
        },
    });

    // (tick, is_note_on, pitch); offs sort before ons at the same tick
    let mut events: Vec<(u32, bool, u8)> = Vec::with_capacity(melody.notes.len() * 2);
    for note in &melody.notes {
        let pitch = note.pitch.min(127);
        events.push((note.start * TICKS_PER_STEP, true, pitch));
        events.push((note.end() * TICKS_PER_STEP, false, pitch));
    }
    events.sort_by_key(|(tick, on, _)| (*tick, *on));

    let mut last_tick = 0;
    for (tick, on, pitch) in events {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(NOTE_VELOCITY),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(tick - last_tick),
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);

    let mut buf = Vec::new();
    smf.write_std(&mut buf)
        .map_err(|e| NotationError::Midi(e.to_string()))?;
    Ok(buf)
}

/// Decodes a Standard MIDI File into a single melodic line.
pub fn read_melody(bytes: &[u8]) -> Result<Melody, NotationError> {
    let smf = Smf::parse(bytes).map_err(|e| NotationError::Midi(e.to_string()))?;

    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => u32::from(tpq.as_int()),
        _ => return Err(NotationError::UnsupportedTiming),
    };

    let mut tempo_bpm = None;
    let mut best: Option<(Vec<(u8, u32, u32)>, Option<String>)> = None;

    for track in &smf.tracks {
        let mut tick: u32 = 0;
        let mut open: HashMap<u8, u32> = HashMap::new();
        let mut notes = Vec::new();
        let mut name = None;

        for event in track {
            tick = tick.saturating_add(event.delta.as_int());
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us)) if tempo_bpm.is_none() => {
                    let us = us.as_int().max(1);
                    tempo_bpm = u16::try_from(60_000_000 / us).ok().filter(|b| *b > 0);
                }
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) if name.is_none() => {
                    let text = String::from_utf8_lossy(raw).trim().to_string();
                    if !text.is_empty() {
                        name = Some(text);
                    }
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        let key = key.as_int();
                        if let Some(start) = open.insert(key, tick) {
                            notes.push((key, start, tick));
                        }
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let key = key.as_int();
                        if let Some(start) = open.remove(&key) {
                            notes.push((key, start, tick));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        notes.extend(open.into_iter().map(|(key, start)| (key, start, tick)));

        if best.as_ref().is_none_or(|(b, _)| notes.len() > b.len()) {
            best = Some((notes, name));
        }
    }

    let (raw_notes, title) = best.unwrap_or_default();
    if raw_notes.is_empty() {
        return Err(NotationError::Empty);
    }

    let to_steps = |tick: u32| -> u32 {
        let scaled = u64::from(tick) * u64::from(STEPS_PER_QUARTER);
        let tpq = u64::from(ticks_per_quarter);
        u32::try_from((2 * scaled + tpq) / (2 * tpq)).unwrap_or(u32::MAX)
    };

    let mut candidates: Vec<Note> = raw_notes
        .into_iter()
        .map(|(pitch, start, end)| {
            let start = to_steps(start);
            let end = to_steps(end);
            Note {
                pitch,
                start,
                duration: end.saturating_sub(start).max(1),
            }
        })
        .collect();
    candidates.sort_by_key(|n| (n.start, Reverse(n.pitch)));

    let mut notes: Vec<Note> = Vec::with_capacity(candidates.len());
    for note in candidates {
        if let Some(prev) = notes.last_mut() {
            if prev.start == note.start {
                continue;
            }
            if prev.end() > note.start {
                prev.duration = note.start - prev.start;
            }
        }
        notes.push(note);
    }

    let melody = Melody {
        title,
        tempo_bpm: tempo_bpm.unwrap_or(DEFAULT_TEMPO_BPM),
        notes,
    };
    melody.check_length()?;
    Ok(melody)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: u32, duration: u32) -> Note {
        Note {
            pitch,
            start,
            duration,
        }
    }

    #[test]
    fn test_written_file_reads_back() {
        let melody = Melody {
            title: Some("Rain".to_string()),
            tempo_bpm: 96,
            notes: vec![note(60, 0, 4), note(64, 4, 2), note(67, 8, 8)],
        };

        let bytes = write_melody(&melody, PIANO_PROGRAM).unwrap();
        assert_eq!(&bytes[..4], b"MThd");

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);

        let decoded = read_melody(&bytes).unwrap();
        assert_eq!(decoded, melody);
    }

    #[test]
    fn test_read_reduces_polyphony_to_one_line() {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(96)),
        ));
        let channel = u4::new(0);
        let on = |delta: u32, key: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(90),
                },
            },
        };
        // Note-on with velocity zero acts as note-off
        let off = |delta: u32, key: u8| TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        };
        smf.tracks.push(vec![
            // C and E together for a quarter; E wins
            on(0, 60),
            on(0, 64),
            off(96, 60),
            off(0, 64),
            // G held for a half, overlapped by A after a quarter
            on(0, 67),
            on(96, 69),
            off(96, 67),
            off(96, 69),
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        let melody = read_melody(&bytes).unwrap();
        assert_eq!(melody.tempo_bpm, DEFAULT_TEMPO_BPM);
        assert_eq!(
            melody.notes,
            vec![note(64, 0, 4), note(67, 4, 4), note(69, 8, 8)]
        );
    }

    #[test]
    fn test_read_rejects_garbage_and_empty_files() {
        assert!(matches!(
            read_melody(b"definitely not midi"),
            Err(NotationError::Midi(_))
        ));

        let empty = write_melody(&Melody::new(Vec::new()), PIANO_PROGRAM).unwrap();
        assert!(matches!(read_melody(&empty), Err(NotationError::Empty)));
    }

    /// One note held for the longest delta a file can encode.
    fn endless_note_file() -> Vec<u8> {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(1)),
        ));
        let channel = u4::new(0);
        smf.tracks.push(vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key: u7::new(60),
                        vel: u7::new(90),
                    },
                },
            },
            TrackEvent {
                delta: u28::max_value(),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key: u7::new(60),
                        vel: u7::new(0),
                    },
                },
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            },
        ]);
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_read_rejects_overlong_files() {
        assert!(matches!(
            read_melody(&endless_note_file()),
            Err(NotationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_write_rejects_overlong_melodies() {
        let melody = Melody::new(vec![note(60, u32::MAX - 2, 8)]);
        assert!(matches!(
            write_melody(&melody, PIANO_PROGRAM),
            Err(NotationError::TooLong { .. })
        ));
    }
}
