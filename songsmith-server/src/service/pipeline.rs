//! Pipeline Service
//!
//! Drives a job through its three stages:
//! - lyrics: passed through from the brief or written by the text generator
//! - melody: generated by the configured backend, MIDI and audio persisted together
//! - score: engraved from the stored MIDI or from a chord progression
//!
//! Stages are ordered by data dependency only. Every stage outcome is
//! recorded on the job before the call returns, and artifacts are persisted
//! before a stage is reported as successful.

use std::sync::Arc;

use songsmith_core::domain::artifact::{ArtifactKind, ArtifactRef};
use songsmith_core::domain::brief::{Brief, StyleParams};
use songsmith_core::domain::job::{Job, Stage, StageStatus};
use songsmith_core::dto::job::JobDetails;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::backend::{BackendResult, GeneratedFile, MelodyBackend, MelodyRequest};
use crate::repository::{ArtifactStore, StoreError, job_repository};
use crate::score::{RenderError, ScoreRenderer, ScoreSource};
use crate::speech::{self, SpeechBackend, SpeechError};
use crate::text::{TextGenError, TextGenerator};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or malformed input the caller can correct
    #[error("{0}")]
    Input(String),

    /// A generation backend failed; resubmitting may succeed
    #[error("{0}")]
    Backend(String),

    /// A stage ran before the stage it depends on
    #[error("{0}")]
    DependencyMissing(String),

    #[error("score rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("artifact storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PipelineError {
    /// Stable machine-readable category
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input(_) => "input",
            Self::Backend(_) => "backend",
            Self::DependencyMissing(_) => "dependency_missing",
            Self::Render(_) => "render",
            Self::Storage(_) => "storage",
            Self::JobNotFound(_) => "not_found",
            Self::Database(_) => "storage",
        }
    }
}

impl From<SpeechError> for PipelineError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::EmptyText | SpeechError::TooLong(_) => PipelineError::Input(err.to_string()),
            other => PipelineError::Backend(other.to_string()),
        }
    }
}

impl From<TextGenError> for PipelineError {
    fn from(err: TextGenError) -> Self {
        match err {
            TextGenError::MissingTopic => PipelineError::Input(err.to_string()),
            other => PipelineError::Backend(other.to_string()),
        }
    }
}

/// Where a score comes from
#[derive(Debug, Clone)]
pub enum ScoreOrigin {
    /// The MIDI artifact stored for the job
    StoredMidi,
    /// A chord progression played `repeat` times
    Chords { progression: String, repeat: u32 },
}

/// Artifacts persisted by a successful melody stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MelodyArtifacts {
    pub midi: ArtifactRef,
    pub audio: ArtifactRef,
}

/// The generation pipeline
///
/// Cheap to clone; all clones share the same backends and generation
/// permits.
#[derive(Clone)]
pub struct Pipeline {
    pool: SqlitePool,
    store: ArtifactStore,
    text: TextGenerator,
    melody: Arc<dyn MelodyBackend>,
    scores: ScoreRenderer,
    speech: Option<Arc<dyn SpeechBackend>>,
    generations: Arc<Semaphore>,
}

impl Pipeline {
    /// Creates a pipeline
    ///
    /// # Arguments
    /// * `max_concurrent_generations` - Melody generations allowed to run at once
    pub fn new(
        pool: SqlitePool,
        store: ArtifactStore,
        text: TextGenerator,
        melody: Arc<dyn MelodyBackend>,
        scores: ScoreRenderer,
        max_concurrent_generations: usize,
    ) -> Self {
        Self {
            pool,
            store,
            text,
            melody,
            scores,
            speech: None,
            generations: Arc::new(Semaphore::new(max_concurrent_generations.max(1))),
        }
    }

    /// Enables `speak` with the given backend
    pub fn with_speech(mut self, speech: Arc<dyn SpeechBackend>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Validates and persists a new job
    pub async fn create_job(&self, brief: Brief) -> Result<Job, PipelineError> {
        if !brief.has_lyrics_source() {
            return Err(PipelineError::Input(
                "either lyrics or a topic is required".to_string(),
            ));
        }
        self.insert_job(brief).await
    }

    /// Persists a job that only carries a chord chart
    pub async fn create_score_job(&self) -> Result<Job, PipelineError> {
        self.insert_job(Brief::default()).await
    }

    async fn insert_job(&self, brief: Brief) -> Result<Job, PipelineError> {
        let job = Job::new(brief);
        job_repository::create(&self.pool, &job).await?;
        tracing::info!("Job created: {}", job.id);
        Ok(job)
    }

    /// Reads text aloud, returning MP3 audio
    ///
    /// Not tied to a job; nothing is stored.
    pub async fn speak(&self, text: &str) -> Result<Vec<u8>, PipelineError> {
        let text = speech::speakable(text)?;
        let Some(backend) = &self.speech else {
            return Err(PipelineError::Backend(
                "speech synthesis is not configured".to_string(),
            ));
        };

        let audio = backend.synthesize(text).await?;
        tracing::info!(
            "Synthesized {} characters of speech into {} bytes",
            text.chars().count(),
            audio.len()
        );
        Ok(audio)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, PipelineError> {
        job_repository::find_by_id(&self.pool, job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))
    }

    /// Job record with the public names of its artifacts
    pub async fn job_details(&self, job_id: Uuid) -> Result<JobDetails, PipelineError> {
        let job = self.get_job(job_id).await?;
        let artifacts = self
            .store
            .list(job_id)
            .await?
            .iter()
            .map(ArtifactRef::public_name)
            .collect();
        Ok(JobDetails { job, artifacts })
    }

    async fn save(&self, job: &Job) -> Result<(), PipelineError> {
        if job_repository::update(&self.pool, job).await? {
            Ok(())
        } else {
            Err(PipelineError::JobNotFound(job.id))
        }
    }

    /// Marks a stage failed and hands the error back
    async fn fail_stage(&self, job: &mut Job, stage: Stage, err: PipelineError) -> PipelineError {
        tracing::warn!("Job {}: {} stage failed: {}", job.id, stage, err);
        job.mark(stage, StageStatus::Failed, Some(err.to_string()));
        match self.save(job).await {
            Ok(()) => err,
            Err(save_err) => {
                tracing::error!("Job {}: failed to record stage failure: {}", job.id, save_err);
                err
            }
        }
    }

    /// Settles the job's lyrics
    ///
    /// Lyrics already settled are returned as is. Lyrics supplied in the
    /// brief are passed through verbatim without any external call; otherwise
    /// they are written from the brief's topic.
    pub async fn run_lyrics(&self, job_id: Uuid) -> Result<String, PipelineError> {
        let mut job = self.get_job(job_id).await?;

        if job.stages.lyrics == StageStatus::Succeeded {
            if let Some(lyrics) = &job.lyrics {
                return Ok(lyrics.clone());
            }
        }

        let lyrics = if job.brief.supplied_lyrics().is_some() {
            tracing::debug!("Job {}: using supplied lyrics", job.id);
            job.brief.lyrics.clone().unwrap_or_default()
        } else if let Some(topic) = job.brief.topic() {
            match self.text.lyrics_for(topic).await {
                Ok(lyrics) => lyrics,
                Err(e) => return Err(self.fail_stage(&mut job, Stage::Lyrics, e.into()).await),
            }
        } else {
            let err = PipelineError::Input("either lyrics or a topic is required".to_string());
            return Err(self.fail_stage(&mut job, Stage::Lyrics, err).await);
        };

        if let Err(e) = self
            .store
            .put(job.id, ArtifactKind::Lyrics, "txt", lyrics.as_bytes())
            .await
        {
            return Err(self.fail_stage(&mut job, Stage::Lyrics, e.into()).await);
        }

        job.lyrics = Some(lyrics.clone());
        job.mark(Stage::Lyrics, StageStatus::Succeeded, None);
        self.save(&job).await?;

        tracing::info!("Job {}: lyrics settled", job.id);
        Ok(lyrics)
    }

    /// Generates and persists the job's melody and audio
    ///
    /// Runs the lyrics stage first when needed. Non-empty fields of
    /// `overrides` refine the stored style before the backend sees it. Either
    /// both artifacts are stored and the stage succeeds, or neither is and it
    /// fails.
    pub async fn run_melody(
        &self,
        job_id: Uuid,
        overrides: &StyleParams,
    ) -> Result<MelodyArtifacts, PipelineError> {
        let lyrics = self.run_lyrics(job_id).await?;
        let mut job = self.get_job(job_id).await?;

        if job.brief.style.overlay(overrides) {
            tracing::debug!("Job {}: style updated for this run", job_id);
            self.save(&job).await?;
        }

        let _permit = self
            .generations
            .acquire()
            .await
            .map_err(|_| PipelineError::Backend("generation pool is closed".to_string()))?;

        let workspace = match self.store.staging(job_id).await {
            Ok(dir) => dir,
            Err(e) => return Err(self.fail_stage(&mut job, Stage::Melody, e.into()).await),
        };

        let request = MelodyRequest {
            job_id,
            lyrics,
            style: job.brief.style.clone(),
        };

        tracing::info!(
            "Job {}: generating melody with {} backend",
            job_id,
            self.melody.name()
        );
        let outcome = self.melody.generate_melody(&request, workspace.path()).await;

        let committed = match outcome {
            BackendResult::Ready { midi, audio } => self.commit_melody(job_id, &midi, &audio).await,
            BackendResult::Failed { reason } => Err(PipelineError::Backend(reason)),
        };

        match committed {
            Ok(artifacts) => {
                job.mark(Stage::Melody, StageStatus::Succeeded, None);
                self.save(&job).await?;
                tracing::info!(
                    "Job {}: melody stored as {} and {}",
                    job_id,
                    artifacts.midi.public_name(),
                    artifacts.audio.public_name()
                );
                Ok(artifacts)
            }
            Err(err) => {
                self.discard_melody(job_id).await;
                Err(self.fail_stage(&mut job, Stage::Melody, err).await)
            }
        }
    }

    /// Moves both staged files into the store, MIDI first
    async fn commit_melody(
        &self,
        job_id: Uuid,
        midi: &GeneratedFile,
        audio: &GeneratedFile,
    ) -> Result<MelodyArtifacts, PipelineError> {
        let midi_ref = self
            .store
            .commit(job_id, ArtifactKind::Midi, &midi.extension, &midi.path)
            .await?;

        match self
            .store
            .commit(job_id, ArtifactKind::Audio, &audio.extension, &audio.path)
            .await
        {
            Ok(audio_ref) => Ok(MelodyArtifacts {
                midi: midi_ref,
                audio: audio_ref,
            }),
            Err(e) => {
                if let Err(rollback) = self.store.remove(&midi_ref).await {
                    tracing::error!("Job {}: failed to roll back MIDI: {}", job_id, rollback);
                }
                Err(e.into())
            }
        }
    }

    /// Removes melody artifacts so a failed stage leaves none behind
    async fn discard_melody(&self, job_id: Uuid) {
        for kind in [ArtifactKind::Midi, ArtifactKind::Audio] {
            match self.store.find(job_id, kind).await {
                Ok(Some(artifact)) => {
                    if let Err(e) = self.store.remove(&artifact).await {
                        tracing::error!("Job {}: failed to remove {}: {}", job_id, kind, e);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::error!("Job {}: failed to look up {}: {}", job_id, kind, e),
            }
        }
    }

    /// Engraves and persists the job's score
    ///
    /// # Arguments
    /// * `origin` - The job's stored MIDI or a chord progression
    /// * `instruments` - Requested staves; unknown names fall back to piano
    pub async fn run_score(
        &self,
        job_id: Uuid,
        origin: ScoreOrigin,
        instruments: &[String],
    ) -> Result<ArtifactRef, PipelineError> {
        let mut job = self.get_job(job_id).await?;

        let source = match origin {
            ScoreOrigin::StoredMidi => {
                let Some(midi) = self.store.find(job_id, ArtifactKind::Midi).await? else {
                    return Err(PipelineError::DependencyMissing(format!(
                        "job {} has no melody yet; generate the song first",
                        job_id
                    )));
                };
                ScoreSource::Midi(self.store.get(&midi).await?)
            }
            ScoreOrigin::Chords {
                progression,
                repeat,
            } => ScoreSource::Chords {
                progression,
                repeat,
            },
        };

        let rendered = match self.scores.render(&source, instruments).await {
            Ok(rendered) => rendered,
            Err(e) => return Err(self.fail_stage(&mut job, Stage::Score, e.into()).await),
        };

        let score = match self
            .store
            .put(job_id, ArtifactKind::Score, rendered.extension, &rendered.bytes)
            .await
        {
            Ok(score) => score,
            Err(e) => return Err(self.fail_stage(&mut job, Stage::Score, e.into()).await),
        };

        job.mark(Stage::Score, StageStatus::Succeeded, None);
        self.save(&job).await?;

        tracing::info!("Job {}: score stored as {}", job_id, score.public_name());
        Ok(score)
    }
}
