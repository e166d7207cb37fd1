//! Creative brief types

use serde::{Deserialize, Serialize};

/// Genre used when a brief does not name one.
pub const DEFAULT_GENRE: &str = "pop";

/// User-supplied creative parameters for a job.
///
/// Topic and lyrics are fixed once the job has been created; the style may
/// be refined by later requests (see [`StyleParams::overlay`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brief {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub style: StyleParams,
}

impl Brief {
    /// Returns the supplied lyrics if they contain anything but whitespace.
    pub fn supplied_lyrics(&self) -> Option<&str> {
        non_empty(self.lyrics.as_deref())
    }

    /// Returns the topic if it contains anything but whitespace.
    pub fn topic(&self) -> Option<&str> {
        non_empty(self.topic.as_deref())
    }

    /// A brief is usable when lyrics can be either passed through or derived.
    pub fn has_lyrics_source(&self) -> bool {
        self.supplied_lyrics().is_some() || self.topic().is_some()
    }
}

/// Musical style parameters forwarded to the melody backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleParams {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub tempo: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub accompaniment: Option<String>,
    #[serde(default)]
    pub instruments: Vec<String>,
}

impl StyleParams {
    /// Genre to send downstream, falling back to [`DEFAULT_GENRE`].
    pub fn genre_or_default(&self) -> &str {
        non_empty(self.genre.as_deref()).unwrap_or(DEFAULT_GENRE)
    }

    /// Non-empty style fields as `(name, value)` pairs, in a stable order.
    ///
    /// Genre is always present. Instruments are joined with `", "`.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("genre", self.genre_or_default().to_string())];

        let optional = [
            ("style", self.style.as_deref()),
            ("tempo", self.tempo.as_deref()),
            ("mood", self.mood.as_deref()),
            ("accompaniment", self.accompaniment.as_deref()),
        ];
        for (name, value) in optional {
            if let Some(value) = non_empty(value) {
                fields.push((name, value.to_string()));
            }
        }

        let instruments: Vec<&str> = self
            .instruments
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect();
        if !instruments.is_empty() {
            fields.push(("instruments", instruments.join(", ")));
        }

        fields
    }

    /// Takes every non-empty field of `other` over this one.
    ///
    /// A non-empty instrument list replaces the current one. Returns `true`
    /// if anything changed.
    pub fn overlay(&mut self, other: &StyleParams) -> bool {
        let before = self.clone();

        let pairs = [
            (&mut self.style, &other.style),
            (&mut self.genre, &other.genre),
            (&mut self.tempo, &other.tempo),
            (&mut self.mood, &other.mood),
            (&mut self.accompaniment, &other.accompaniment),
        ];
        for (field, value) in pairs {
            if let Some(value) = non_empty(value.as_deref()) {
                *field = Some(value.to_string());
            }
        }

        let instruments: Vec<String> = other
            .instruments
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .map(str::to_string)
            .collect();
        if !instruments.is_empty() {
            self.instruments = instruments;
        }

        *self != before
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lyrics_are_not_supplied() {
        let brief = Brief {
            lyrics: Some("   \n".to_string()),
            topic: Some("autumn rain".to_string()),
            ..Default::default()
        };
        assert_eq!(brief.supplied_lyrics(), None);
        assert_eq!(brief.topic(), Some("autumn rain"));
        assert!(brief.has_lyrics_source());
    }

    #[test]
    fn test_empty_brief_has_no_lyrics_source() {
        assert!(!Brief::default().has_lyrics_source());
    }

    #[test]
    fn test_fields_default_genre_and_skip_empty() {
        let style = StyleParams {
            mood: Some("wistful".to_string()),
            tempo: Some("".to_string()),
            instruments: vec!["piano".to_string(), " ".to_string(), "cello".to_string()],
            ..Default::default()
        };

        assert_eq!(
            style.fields(),
            vec![
                ("genre", "pop".to_string()),
                ("mood", "wistful".to_string()),
                ("instruments", "piano, cello".to_string()),
            ]
        );
    }

    #[test]
    fn test_overlay_keeps_fields_the_other_side_leaves_blank() {
        let mut style = StyleParams {
            genre: Some("folk".to_string()),
            mood: Some("calm".to_string()),
            instruments: vec!["guitar".to_string()],
            ..Default::default()
        };

        let changed = style.overlay(&StyleParams {
            genre: Some(" ballad ".to_string()),
            mood: Some("  ".to_string()),
            tempo: Some("slow".to_string()),
            ..Default::default()
        });

        assert!(changed);
        assert_eq!(style.genre.as_deref(), Some("ballad"));
        assert_eq!(style.mood.as_deref(), Some("calm"));
        assert_eq!(style.tempo.as_deref(), Some("slow"));
        assert_eq!(style.instruments, vec!["guitar".to_string()]);

        assert!(!style.clone().overlay(&StyleParams::default()));
        assert!(!style.clone().overlay(&StyleParams {
            genre: Some("ballad".to_string()),
            ..Default::default()
        }));
    }
}
