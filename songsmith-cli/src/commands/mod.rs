//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod generate;
mod job;

pub use generate::{LyricsArgs, ScoreArgs, SongArgs};

use anyhow::Result;
use clap::Subcommand;
use uuid::Uuid;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Write lyrics about a topic, or register your own
    Lyrics(LyricsArgs),
    /// Generate a melody and audio for lyrics
    Song(SongArgs),
    /// Engrave a score from a melody or chord progression
    Score(ScoreArgs),
    /// Read text aloud into an MP3 file
    Speak {
        /// Text to read
        text: String,

        /// Destination file
        #[arg(short, long, default_value = "speech.mp3")]
        output: String,
    },
    /// Show a job's stages and artifacts
    Job {
        /// Job ID
        id: Uuid,

        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },
    /// Download an artifact by its public name
    Download {
        /// Artifact name, e.g. <job_id>_audio.mp3
        name: String,

        /// Destination file; defaults to the artifact name
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        Commands::Lyrics(args) => generate::lyrics(&client, args).await,
        Commands::Song(args) => generate::song(&client, args).await,
        Commands::Score(args) => generate::score(&client, args).await,
        Commands::Speak { text, output } => generate::speak(&client, text, &output).await,
        Commands::Job { id, json } => job::show_job(&client, id, json).await,
        Commands::Download { name, output } => {
            job::download(&client, &name, output.as_deref()).await
        }
    }
}
