//! Songsmith HTTP Client
//!
//! A simple, type-safe HTTP client for the Songsmith server API.
//!
//! # Example
//!
//! ```no_run
//! use songsmith_client::SongsmithClient;
//! use songsmith_core::dto::song::GenerateSongRequest;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SongsmithClient::new("http://localhost:5000");
//!
//!     let song = client.generate_song(GenerateSongRequest {
//!         topic: Some("first snow".to_string()),
//!         genre: Some("ballad".to_string()),
//!         ..Default::default()
//!     }).await?;
//!
//!     client.download(&song.audio_path, "song.mp3").await?;
//!     Ok(())
//! }
//! ```

pub mod error;
mod generate;
mod jobs;

// Re-export commonly used types
pub use error::{ClientError, Result};

use reqwest::Client;
use serde::de::DeserializeOwned;

/// HTTP client for the Songsmith server API
///
/// Methods are grouped by concern:
/// - Generation (lyrics, song, score, speech)
/// - Job inspection and artifact download
#[derive(Debug, Clone)]
pub struct SongsmithClient {
    /// Base URL of the server (e.g., "http://localhost:5000")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl SongsmithClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:5000")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// Generation calls can take minutes; configure timeouts accordingly.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Fails with the server's error if the request did not succeed
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::from_body(status.as_u16(), &body))
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        self.check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
