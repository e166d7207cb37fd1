//! Configuration module
//!
//! Handles CLI configuration: server location and request timeout.

use std::time::Duration;

use anyhow::{Context, Result};
use songsmith_client::SongsmithClient;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the Songsmith server
    pub server_url: String,

    /// Timeout of each request; generation can take several minutes
    pub timeout: Duration,
}

impl Config {
    /// Builds a client for the configured server
    pub fn client(&self) -> Result<SongsmithClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(SongsmithClient::with_client(&self.server_url, http))
    }
}
