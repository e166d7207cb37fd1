//! Artifact domain types
//!
//! Artifacts are addressed by `(job_id, kind, extension)` only. Storage
//! paths and public download names are both derived from that triple, so
//! nothing a client sends is ever used as a filesystem path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of file a pipeline stage produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Midi,
    Audio,
    Score,
    Lyrics,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::Midi,
        ArtifactKind::Audio,
        ArtifactKind::Score,
        ArtifactKind::Lyrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Midi => "midi",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Score => "score",
            ArtifactKind::Lyrics => "lyrics",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Extensions an artifact of this kind may carry. The first is the default.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            ArtifactKind::Midi => &["mid"],
            ArtifactKind::Audio => &["wav", "mp3", "ogg", "flac"],
            ArtifactKind::Score => &["pdf", "png", "svg"],
            ArtifactKind::Lyrics => &["txt"],
        }
    }

    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions().contains(&extension)
    }

    /// Classifies a produced file by its extension (case-insensitive).
    ///
    /// Only the two generation roles are considered; `.midi` is accepted as
    /// an alias of `.mid`.
    pub fn classify_generated(extension: &str) -> Option<(Self, &'static str)> {
        match extension.to_ascii_lowercase().as_str() {
            "mid" | "midi" => Some((ArtifactKind::Midi, "mid")),
            "wav" => Some((ArtifactKind::Audio, "wav")),
            "mp3" => Some((ArtifactKind::Audio, "mp3")),
            "ogg" => Some((ArtifactKind::Audio, "ogg")),
            "flac" => Some((ArtifactKind::Audio, "flac")),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub job_id: Uuid,
    pub kind: ArtifactKind,
    pub extension: String,
}

impl ArtifactRef {
    /// Builds a reference, rejecting extensions the kind does not permit.
    pub fn new(job_id: Uuid, kind: ArtifactKind, extension: &str) -> Option<Self> {
        kind.allows_extension(extension).then(|| Self {
            job_id,
            kind,
            extension: extension.to_string(),
        })
    }

    /// Name exposed for download: `<job_id>_<kind>.<ext>`.
    pub fn public_name(&self) -> String {
        format!("{}_{}.{}", self.job_id, self.kind, self.extension)
    }

    /// Location relative to the results root: `<job_id>/<kind>.<ext>`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.job_id.to_string()).join(format!("{}.{}", self.kind, self.extension))
    }

    /// Parses a public name produced by [`ArtifactRef::public_name`].
    ///
    /// Anything else, including names with path separators, extra dots,
    /// non-canonical UUIDs, unknown kinds or foreign extensions, yields `None`.
    pub fn parse_public_name(name: &str) -> Option<Self> {
        if !name.is_ascii() || name.contains(['/', '\\']) {
            return None;
        }

        let (stem, extension) = name.split_once('.')?;
        if extension.contains('.') {
            return None;
        }

        let (id, kind) = stem.rsplit_once('_')?;
        let job_id = Uuid::parse_str(id).ok()?;
        if job_id.hyphenated().to_string() != id {
            return None;
        }

        let kind = ArtifactKind::parse(kind)?;
        Self::new(job_id, kind, extension)
    }

    /// MIME type served for this artifact.
    pub fn content_type(&self) -> &'static str {
        match self.extension.as_str() {
            "mid" => "audio/midi",
            "wav" => "audio/wav",
            "mp3" => "audio/mpeg",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            "pdf" => "application/pdf",
            "png" => "image/png",
            "svg" => "image/svg+xml",
            "txt" => "text/plain; charset=utf-8",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_name_round_trips() {
        let job_id = Uuid::new_v4();
        let artifact = ArtifactRef::new(job_id, ArtifactKind::Audio, "mp3").unwrap();

        let name = artifact.public_name();
        assert_eq!(name, format!("{}_audio.mp3", job_id));
        assert_eq!(ArtifactRef::parse_public_name(&name), Some(artifact));
    }

    #[test]
    fn test_relative_path_is_namespaced_by_job() {
        let job_id = Uuid::new_v4();
        let artifact = ArtifactRef::new(job_id, ArtifactKind::Midi, "mid").unwrap();
        assert_eq!(
            artifact.relative_path(),
            PathBuf::from(job_id.to_string()).join("midi.mid")
        );
    }

    #[test]
    fn test_rejects_foreign_extension() {
        assert!(ArtifactRef::new(Uuid::new_v4(), ArtifactKind::Midi, "wav").is_none());
        let name = format!("{}_score.exe", Uuid::new_v4());
        assert!(ArtifactRef::parse_public_name(&name).is_none());
    }

    #[test]
    fn test_rejects_traversal_and_malformed_names() {
        let id = Uuid::new_v4();
        let rejected = [
            "../../etc/passwd".to_string(),
            "..".to_string(),
            "song.mid".to_string(),
            format!("../{}_midi.mid", id),
            format!("{}/midi.mid", id),
            format!("{}_midi.mid\\..", id),
            format!("{}_midi.tar.mid", id),
            format!("{}_vocals.wav", id),
            format!("{}_midi.mid", id.simple()),
            format!("{}_midi.mid", id.to_string().to_uppercase()),
            String::new(),
        ];

        for name in rejected {
            assert!(
                ArtifactRef::parse_public_name(&name).is_none(),
                "{name} should not parse"
            );
        }
    }

    #[test]
    fn test_classify_generated() {
        assert_eq!(
            ArtifactKind::classify_generated("MID"),
            Some((ArtifactKind::Midi, "mid"))
        );
        assert_eq!(
            ArtifactKind::classify_generated("midi"),
            Some((ArtifactKind::Midi, "mid"))
        );
        assert_eq!(
            ArtifactKind::classify_generated("wav"),
            Some((ArtifactKind::Audio, "wav"))
        );
        assert_eq!(ArtifactKind::classify_generated("json"), None);
    }
}
