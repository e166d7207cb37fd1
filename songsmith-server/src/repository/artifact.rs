//! Artifact Store
//!
//! Maps a job to its output files under a single results root:
//! `<root>/<job_id>/<kind>.<ext>`. Every path is derived from an
//! [`ArtifactRef`]; client-supplied names only ever reach the filesystem
//! after [`ArtifactStore::resolve_public_name`] has re-derived them.
//!
//! Writes land in a temporary file inside the job directory and are renamed
//! into place, so readers never observe a half-written artifact. Jobs never
//! share a directory, which is what makes concurrent writes safe.

use songsmith_core::domain::artifact::{ArtifactKind, ArtifactRef};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory under the root holding per-call staging workspaces
const STAGING_DIR: &str = ".staging";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("extension '{extension}' is not valid for {kind} artifacts")]
    InvalidExtension {
        kind: ArtifactKind,
        extension: String,
    },

    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filesystem-backed artifact store
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the results root if it does not exist yet.
    pub async fn init(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))
    }

    /// Writes `bytes` as the `kind` artifact of a job.
    pub async fn put(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        extension: &str,
        bytes: &[u8],
    ) -> StoreResult<ArtifactRef> {
        let artifact = Self::artifact_ref(job_id, kind, extension)?;
        let tmp = self.temp_path(&artifact).await?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        self.publish(&tmp, &artifact).await?;

        debug!("Stored {} ({} bytes)", artifact.public_name(), bytes.len());
        Ok(artifact)
    }

    /// Moves a staged file into place as the `kind` artifact of a job.
    ///
    /// Falls back to copying when the staged file lives on another
    /// filesystem.
    pub async fn commit(
        &self,
        job_id: Uuid,
        kind: ArtifactKind,
        extension: &str,
        staged: &Path,
    ) -> StoreResult<ArtifactRef> {
        let artifact = Self::artifact_ref(job_id, kind, extension)?;
        let tmp = self.temp_path(&artifact).await?;

        if tokio::fs::rename(staged, &tmp).await.is_err() {
            tokio::fs::copy(staged, &tmp)
                .await
                .map_err(|e| StoreError::io(staged, e))?;
        }
        self.publish(&tmp, &artifact).await?;

        debug!("Committed {} from {}", artifact.public_name(), staged.display());
        Ok(artifact)
    }

    /// Reads an artifact back in full.
    pub async fn get(&self, artifact: &ArtifactRef) -> StoreResult<Vec<u8>> {
        let path = self.path_of(artifact);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(artifact.public_name()),
            _ => StoreError::io(&path, e),
        })
    }

    /// Opens an artifact for streaming.
    pub async fn open(&self, artifact: &ArtifactRef) -> StoreResult<tokio::fs::File> {
        let path = self.path_of(artifact);
        tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(artifact.public_name()),
            _ => StoreError::io(&path, e),
        })
    }

    /// Finds the stored artifact of `kind` for a job, whatever its extension.
    pub async fn find(&self, job_id: Uuid, kind: ArtifactKind) -> StoreResult<Option<ArtifactRef>> {
        for extension in kind.extensions() {
            let Some(artifact) = ArtifactRef::new(job_id, kind, extension) else {
                continue;
            };
            let path = self.path_of(&artifact);
            match tokio::fs::try_exists(&path).await {
                Ok(true) => return Ok(Some(artifact)),
                Ok(false) => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Ok(None)
    }

    /// Lists every stored artifact of a job.
    pub async fn list(&self, job_id: Uuid) -> StoreResult<Vec<ArtifactRef>> {
        let mut artifacts = Vec::new();
        for kind in ArtifactKind::ALL {
            if let Some(artifact) = self.find(job_id, kind).await? {
                artifacts.push(artifact);
            }
        }
        Ok(artifacts)
    }

    /// Deletes an artifact. Missing files are not an error.
    pub async fn remove(&self, artifact: &ArtifactRef) -> StoreResult<()> {
        let path = self.path_of(artifact);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Resolves a client-supplied download name to an artifact reference.
    ///
    /// Only names of the exact shape produced by
    /// [`ArtifactRef::public_name`] resolve; everything else, including any
    /// path traversal attempt, is `NotFound`. A resolved name may still
    /// point at an artifact that was never written, which [`Self::get`]
    /// reports as `NotFound`.
    pub fn resolve_public_name(&self, name: &str) -> StoreResult<ArtifactRef> {
        ArtifactRef::parse_public_name(name).ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Creates a scratch directory for a backend call.
    ///
    /// It lives under the results root so staged files can be renamed into
    /// place, and is removed when the returned guard is dropped.
    pub async fn staging(&self, job_id: Uuid) -> StoreResult<TempDir> {
        let staging_root = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging_root)
            .await
            .map_err(|e| StoreError::io(&staging_root, e))?;

        let prefix = format!("{}-", job_id);
        let root = staging_root.clone();
        tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(|e| StoreError::io(&staging_root, std::io::Error::other(e)))?
        .map_err(|e| StoreError::io(&staging_root, e))
    }

    fn artifact_ref(job_id: Uuid, kind: ArtifactKind, extension: &str) -> StoreResult<ArtifactRef> {
        ArtifactRef::new(job_id, kind, extension).ok_or_else(|| StoreError::InvalidExtension {
            kind,
            extension: extension.to_string(),
        })
    }

    fn path_of(&self, artifact: &ArtifactRef) -> PathBuf {
        self.root.join(artifact.relative_path())
    }

    async fn temp_path(&self, artifact: &ArtifactRef) -> StoreResult<PathBuf> {
        let job_dir = self.root.join(artifact.job_id.to_string());
        tokio::fs::create_dir_all(&job_dir)
            .await
            .map_err(|e| StoreError::io(&job_dir, e))?;
        Ok(job_dir.join(format!(".{}.{}.tmp", artifact.kind, Uuid::new_v4())))
    }

    /// Renames a finished temp file into place and drops any copy of the
    /// same kind stored under a different extension.
    async fn publish(&self, tmp: &Path, artifact: &ArtifactRef) -> StoreResult<()> {
        let path = self.path_of(artifact);
        if let Err(e) = tokio::fs::rename(tmp, &path).await {
            let _ = tokio::fs::remove_file(tmp).await;
            return Err(StoreError::io(&path, e));
        }

        for extension in artifact.kind.extensions() {
            if *extension == artifact.extension {
                continue;
            }
            if let Some(stale) = ArtifactRef::new(artifact.job_id, artifact.kind, extension) {
                if let Err(e) = self.remove(&stale).await {
                    warn!("Failed to remove stale artifact {}: {}", stale.public_name(), e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get_is_byte_identical() {
        let (_dir, store) = store();
        let job_id = Uuid::new_v4();
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

        let artifact = store.put(job_id, ArtifactKind::Audio, "wav", &bytes).await.unwrap();

        assert_eq!(store.get(&artifact).await.unwrap(), bytes);
        assert_eq!(
            store.root().join(job_id.to_string()).join("audio.wav"),
            store.path_of(&artifact)
        );
    }

    #[tokio::test]
    async fn test_put_rejects_foreign_extension() {
        let (_dir, store) = store();
        let err = store
            .put(Uuid::new_v4(), ArtifactKind::Midi, "exe", b"MZ")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidExtension { .. }));
    }

    #[tokio::test]
    async fn test_get_unwritten_artifact_is_not_found() {
        let (_dir, store) = store();
        let artifact = ArtifactRef::new(Uuid::new_v4(), ArtifactKind::Score, "pdf").unwrap();
        assert!(matches!(
            store.get(&artifact).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_traversal_names_never_resolve() {
        let (dir, store) = store();
        // A real file right outside the job namespace
        std::fs::write(dir.path().join("secret.txt"), b"nope").unwrap();

        for name in [
            "../../etc/passwd",
            "../secret.txt",
            "secret.txt",
            "/etc/passwd",
            "..%2F..%2Fetc%2Fpasswd",
        ] {
            assert!(
                matches!(store.resolve_public_name(name), Err(StoreError::NotFound(_))),
                "{name} resolved"
            );
        }
    }

    #[tokio::test]
    async fn test_resolved_name_reads_only_real_artifacts() {
        let (_dir, store) = store();
        let job_id = Uuid::new_v4();
        let stored = store.put(job_id, ArtifactKind::Midi, "mid", b"MThd").await.unwrap();

        let resolved = store.resolve_public_name(&stored.public_name()).unwrap();
        assert_eq!(store.get(&resolved).await.unwrap(), b"MThd");

        let other = store
            .resolve_public_name(&format!("{}_midi.mid", Uuid::new_v4()))
            .unwrap();
        assert!(matches!(store.get(&other).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_commit_moves_staged_file() {
        let (_dir, store) = store();
        let job_id = Uuid::new_v4();
        let staging = store.staging(job_id).await.unwrap();
        let staged = staging.path().join("take1.mp3");
        std::fs::write(&staged, b"ID3").unwrap();

        let artifact = store
            .commit(job_id, ArtifactKind::Audio, "mp3", &staged)
            .await
            .unwrap();

        assert_eq!(artifact.public_name(), format!("{}_audio.mp3", job_id));
        assert_eq!(store.get(&artifact).await.unwrap(), b"ID3");
        assert!(!staged.exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_staging_runs_on_a_single_threaded_runtime() {
        let (_dir, store) = store();
        let job_id = Uuid::new_v4();

        let (first, second) = tokio::join!(store.staging(job_id), store.staging(job_id));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_ne!(first.path(), second.path());
        assert!(first.path().starts_with(store.root().join(STAGING_DIR)));
        let name = first.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&job_id.to_string()));
    }

    #[tokio::test]
    async fn test_staging_is_removed_on_drop() {
        let (_dir, store) = store();
        let staging = store.staging(Uuid::new_v4()).await.unwrap();
        let path = staging.path().to_path_buf();
        std::fs::write(path.join("partial.wav"), b"RIFF").unwrap();

        drop(staging);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_find_and_replace_across_extensions() {
        let (_dir, store) = store();
        let job_id = Uuid::new_v4();
        assert!(store.find(job_id, ArtifactKind::Audio).await.unwrap().is_none());

        store.put(job_id, ArtifactKind::Audio, "mp3", b"first").await.unwrap();
        let second = store.put(job_id, ArtifactKind::Audio, "wav", b"second").await.unwrap();

        assert_eq!(store.find(job_id, ArtifactKind::Audio).await.unwrap(), Some(second));
        assert_eq!(store.list(job_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_do_not_interfere() {
        let (_dir, store) = store();
        let jobs: Vec<Uuid> = (0..16).map(|_| Uuid::new_v4()).collect();

        let mut handles = Vec::new();
        for job_id in jobs.clone() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put(job_id, ArtifactKind::Lyrics, "txt", job_id.to_string().as_bytes())
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for job_id in jobs {
            let artifact = store.find(job_id, ArtifactKind::Lyrics).await.unwrap().unwrap();
            assert_eq!(store.get(&artifact).await.unwrap(), job_id.to_string().as_bytes());
        }
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_dir, store) = store();
        let artifact = store
            .put(Uuid::new_v4(), ArtifactKind::Lyrics, "txt", b"la la")
            .await
            .unwrap();

        store.remove(&artifact).await.unwrap();
        store.remove(&artifact).await.unwrap();
        assert!(matches!(store.get(&artifact).await, Err(StoreError::NotFound(_))));
    }
}
