//! Job Repository
//!
//! Handles all database operations related to jobs.

use songsmith_core::domain::brief::Brief;
use songsmith_core::domain::job::{Job, StageStatus, StageStatuses};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Insert a new job
pub async fn create(pool: &SqlitePool, job: &Job) -> Result<(), sqlx::Error> {
    let brief = serde_json::to_value(&job.brief)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO jobs (id, brief, lyrics, lyrics_status, melody_status, score_status,
                          last_error, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(job.id)
    .bind(brief)
    .bind(&job.lyrics)
    .bind(job.stages.lyrics.as_str())
    .bind(job.stages.melody.as_str())
    .bind(job.stages.score.as_str())
    .bind(&job.last_error)
    .bind(job.created_at)
    .bind(job.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a job by ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Job>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, brief, lyrics, lyrics_status, melody_status, score_status,
               last_error, created_at, updated_at
        FROM jobs
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Persist the mutable part of a job: brief style, lyrics, stage statuses,
/// last error
///
/// Returns `false` if the job does not exist.
pub async fn update(pool: &SqlitePool, job: &Job) -> Result<bool, sqlx::Error> {
    let brief = serde_json::to_value(&job.brief)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let result = sqlx::query(
        r#"
        UPDATE jobs
        SET brief = ?, lyrics = ?, lyrics_status = ?, melody_status = ?, score_status = ?,
            last_error = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(brief)
    .bind(&job.lyrics)
    .bind(job.stages.lyrics.as_str())
    .bind(job.stages.melody.as_str())
    .bind(job.stages.score.as_str())
    .bind(&job.last_error)
    .bind(job.updated_at)
    .bind(job.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    brief: serde_json::Value,
    lyrics: Option<String>,
    lyrics_status: String,
    melody_status: String,
    score_status: String,
    last_error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        let brief: Brief = serde_json::from_value(row.brief).unwrap_or_default();

        Job {
            id: row.id,
            brief,
            lyrics: row.lyrics,
            stages: StageStatuses {
                lyrics: StageStatus::parse(&row.lyrics_status),
                melody: StageStatus::parse(&row.melody_status),
                score: StageStatus::parse(&row.score_status),
            },
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
