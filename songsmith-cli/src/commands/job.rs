//! Job command handlers
//!
//! Viewing job records and downloading artifacts.

use anyhow::Result;
use colored::*;
use songsmith_client::SongsmithClient;
use songsmith_core::domain::job::{Stage, StageStatus};
use songsmith_core::dto::job::JobDetails;
use uuid::Uuid;

pub async fn show_job(client: &SongsmithClient, id: Uuid, json: bool) -> Result<()> {
    let details = match client.get_job(id).await {
        Ok(details) => details,
        Err(e) if e.is_not_found() => anyhow::bail!("No job with ID {}", id),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print_job_details(&details);
    }
    Ok(())
}

pub async fn download(client: &SongsmithClient, name: &str, output: Option<&str>) -> Result<()> {
    let dest = output.unwrap_or(name);
    let bytes = match client.download(name, dest).await {
        Ok(bytes) => bytes,
        Err(e) if e.is_not_found() => anyhow::bail!("No artifact named {}", name),
        Err(e) => return Err(e.into()),
    };

    println!("{} Saved {} ({} bytes)", "✓".green(), dest, bytes);
    Ok(())
}

/// Print detailed job information
fn print_job_details(details: &JobDetails) {
    let job = &details.job;

    println!("{}", "Job Details:".bold());
    println!("  ID:       {}", job.id.to_string().cyan());
    println!("  Created:  {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:  {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(topic) = job.brief.topic() {
        println!("  Topic:    {}", topic);
    }

    println!("\n{}", "Stages:".bold());
    for stage in [Stage::Lyrics, Stage::Melody, Stage::Score] {
        println!("  {:<8} {}", stage.to_string(), colorize_status(job.stages.get(stage)));
    }

    if let Some(error) = &job.last_error {
        println!("\n{}", "Last error:".bold());
        println!("  {}", error.red());
    }

    if !details.artifacts.is_empty() {
        println!("\n{}", "Artifacts:".bold());
        for name in &details.artifacts {
            println!("  {} {}", "▸".cyan(), name);
        }
    }

    if let Some(lyrics) = &job.lyrics {
        println!("\n{}", "Lyrics:".bold());
        println!("{}", lyrics);
    }
}

/// Colorize stage status for display
fn colorize_status(status: StageStatus) -> colored::ColoredString {
    let status_str = status.as_str();
    match status {
        StageStatus::NotRun => status_str.dimmed(),
        StageStatus::Succeeded => status_str.green(),
        StageStatus::Failed => status_str.red(),
    }
}
