//! Data Transfer Objects for the HTTP API
//!
//! Request and response bodies exchanged between the server and its
//! clients (front-end, `songsmith-client`, CLI).

pub mod job;
pub mod lyrics;
pub mod score;
pub mod song;
pub mod speech;

use serde::{Deserialize, Serialize};

/// Error body returned with every non-success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}
