//! Generation command handlers

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use songsmith_client::SongsmithClient;
use songsmith_core::dto::lyrics::GenerateLyricsRequest;
use songsmith_core::dto::score::GenerateScoreRequest;
use songsmith_core::dto::song::GenerateSongRequest;
use songsmith_core::dto::speech::SpeechRequest;
use uuid::Uuid;

#[derive(Args)]
pub struct LyricsArgs {
    /// What the song is about
    #[arg(short, long)]
    topic: Option<String>,

    /// File holding ready-made lyrics
    #[arg(short, long)]
    file: Option<String>,
}

#[derive(Args)]
pub struct SongArgs {
    /// Continue an existing job
    #[arg(long)]
    job: Option<Uuid>,

    /// What the song is about, when no lyrics are given
    #[arg(short, long)]
    topic: Option<String>,

    /// File holding the lyrics
    #[arg(short, long)]
    file: Option<String>,

    #[arg(long)]
    genre: Option<String>,

    #[arg(long)]
    style: Option<String>,

    #[arg(long)]
    tempo: Option<String>,

    #[arg(long)]
    mood: Option<String>,

    #[arg(long)]
    accompaniment: Option<String>,

    /// Instruments (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    instruments: Vec<String>,

    /// Directory to download the MIDI and audio into
    #[arg(short, long)]
    output_dir: Option<String>,
}

#[derive(Args)]
pub struct ScoreArgs {
    /// Job whose melody to engrave
    #[arg(long)]
    job: Option<Uuid>,

    /// Public name of the MIDI file, e.g. <job_id>_midi.mid
    #[arg(long)]
    midi: Option<String>,

    /// Chord progression to engrave instead, e.g. "C G Am F"
    #[arg(long)]
    chords: Option<String>,

    /// Times to repeat the progression
    #[arg(long)]
    repeat: Option<u32>,

    /// Instruments (comma-separated); piano when omitted
    #[arg(short, long, value_delimiter = ',')]
    instruments: Vec<String>,

    /// Directory to download the score into
    #[arg(short, long)]
    output_dir: Option<String>,
}

fn read_lyrics(file: Option<&str>) -> Result<Option<String>> {
    file.map(|path| {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read lyrics from {}", path))
    })
    .transpose()
}

pub async fn lyrics(client: &SongsmithClient, args: LyricsArgs) -> Result<()> {
    let req = GenerateLyricsRequest {
        topic: args.topic,
        lyrics: read_lyrics(args.file.as_deref())?,
    };

    println!("{}", "Writing lyrics...".dimmed());
    let response = client.generate_lyrics(req).await?;

    println!("{} Job {}", "✓".green(), response.job_id.to_string().cyan());
    println!();
    println!("{}", response.lyrics);
    Ok(())
}

pub async fn song(client: &SongsmithClient, args: SongArgs) -> Result<()> {
    let req = GenerateSongRequest {
        job_id: args.job,
        lyrics: read_lyrics(args.file.as_deref())?,
        topic: args.topic,
        style: args.style,
        tempo: args.tempo,
        genre: args.genre,
        accompaniment: args.accompaniment,
        mood: args.mood,
        instruments: args.instruments,
    };

    println!("{}", "Generating song, this can take a while...".dimmed());
    let response = client.generate_song(req).await?;

    println!("{} Job {}", "✓".green(), response.job_id.to_string().cyan());
    println!("  MIDI:  {}", response.midi_path);
    println!("  Audio: {}", response.audio_path);

    if let Some(dir) = args.output_dir {
        fetch(client, &response.midi_path, &dir).await?;
        fetch(client, &response.audio_path, &dir).await?;
    }
    Ok(())
}

pub async fn score(client: &SongsmithClient, args: ScoreArgs) -> Result<()> {
    if args.job.is_none() && args.midi.is_none() && args.chords.is_none() {
        anyhow::bail!("one of --job, --midi or --chords is required");
    }

    let req = GenerateScoreRequest {
        job_id: args.job,
        midi_path: args.midi,
        chords: args.chords,
        repeat: args.repeat,
        instruments: args.instruments,
        ..Default::default()
    };

    println!("{}", "Engraving score...".dimmed());
    let response = client.generate_score(req).await?;

    println!("{} Job {}", "✓".green(), response.job_id.to_string().cyan());
    println!("  Score: {}", response.score_path);

    if let Some(dir) = args.output_dir {
        fetch(client, &response.score_path, &dir).await?;
    }
    Ok(())
}

pub async fn speak(client: &SongsmithClient, text: String, output: &str) -> Result<()> {
    println!("{}", "Synthesizing speech...".dimmed());
    let audio = client.text_to_speech(SpeechRequest { text }).await?;

    tokio::fs::write(output, &audio)
        .await
        .with_context(|| format!("Failed to write {}", output))?;
    println!("{} Saved {} ({} bytes)", "✓".green(), output, audio.len());
    Ok(())
}

async fn fetch(client: &SongsmithClient, name: &str, dir: &str) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir))?;
    let dest = Path::new(dir).join(name);
    let bytes = client.download(name, &dest).await?;
    println!(
        "  {} {} ({} bytes)",
        "↓".cyan(),
        dest.display(),
        bytes
    );
    Ok(())
}
