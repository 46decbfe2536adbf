//! `narrate`: inspect the text pipeline and re-export audio from the shell.
//!
//! ```text
//! narrate prepare "Dr. Smith met Mr. Jones. They talked for hours!"
//! narrate export input.wav output.mp3
//! narrate --config narrate.json prepare "..."
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use narrate::{chunk, Config, Exporter, TextNormalizer, Waveform};

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and normalise text, then show how it would be chunked
    Prepare {
        /// Text to prepare
        text: String,
    },

    /// Write a WAV file out again as WAV or MP3
    Export {
        /// Source WAV file
        input: PathBuf,

        /// Destination; the extension selects the format
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Prepare { text } => prepare(&config, &text),
        Commands::Export { input, output } => export(&input, &output),
    }
}

fn prepare(config: &Config, text: &str) -> Result<()> {
    let normalizer = TextNormalizer::with_config(config.normalizer());
    normalizer.validate(text)?;

    let processed = normalizer.preprocess(text);
    println!("Text     : {}", processed);
    println!("Duration : {:.1} s (estimated)", normalizer.estimate_duration(processed.as_str()));

    let chunks = if processed.chars().count() > config.chunk_length {
        chunk::split(&processed, config.chunk_length)
    } else {
        vec![processed]
    };
    println!("Chunks   : {}", chunks.len());
    for (i, c) in chunks.iter().enumerate() {
        println!("  [{}] ({} chars) {}", i + 1, c.chars().count(), c);
    }
    Ok(())
}

fn export(input: &Path, output: &Path) -> Result<()> {
    let mut reader = hound::WavReader::open(input)
        .with_context(|| format!("Cannot open WAV: {}", input.display()))?;
    let spec = reader.spec();

    let audio = match spec.sample_format {
        hound::SampleFormat::Float => Waveform::new(
            reader.samples::<f32>().collect::<Result<_, _>>().context("WAV read error")?,
            spec.sample_rate,
        ),
        hound::SampleFormat::Int if spec.bits_per_sample == 16 => Waveform::from_pcm16(
            reader.samples::<i16>().collect::<Result<_, _>>().context("WAV read error")?,
            spec.sample_rate,
        ),
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            Waveform::new(
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<Result<_, _>>()
                    .context("WAV read error")?,
                spec.sample_rate,
            )
        }
    };

    let written = Exporter::new().export(&audio, output)?;
    println!("Saved {} samples to {}", audio.len(), written.display());
    Ok(())
}
