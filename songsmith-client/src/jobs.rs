//! Job and artifact endpoints

use std::path::Path;

use crate::SongsmithClient;
use crate::error::{ClientError, Result};
use songsmith_core::dto::job::JobDetails;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

impl SongsmithClient {
    /// Get a job by ID
    ///
    /// # Returns
    /// The job record with stage statuses and artifact names
    pub async fn get_job(&self, job_id: Uuid) -> Result<JobDetails> {
        let url = format!("{}/job/{}", self.base_url, job_id);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Download an artifact into `dest`
    ///
    /// # Arguments
    /// * `name` - Public artifact name, as returned by a generation call
    /// * `dest` - File to create or overwrite
    ///
    /// # Returns
    /// Number of bytes written
    pub async fn download(&self, name: &str, dest: impl AsRef<Path>) -> Result<u64> {
        let dest = dest.as_ref();
        let url = format!("{}/download/{}", self.base_url, name);
        let response = self.client.get(&url).send().await?;
        let mut response = self.check_status(response).await?;

        let io_error = |source| ClientError::Io {
            path: dest.display().to_string(),
            source,
        };
        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_error)?;

        tracing::debug!("Downloaded {} ({} bytes) to {}", name, written, dest.display());
        Ok(written)
    }
}
