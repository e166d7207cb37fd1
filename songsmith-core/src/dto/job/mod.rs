//! Job DTOs

use serde::{Deserialize, Serialize};

use crate::domain::job::Job;

/// Job record together with the public names of its stored artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: Job,
    pub artifacts: Vec<String>,
}
