//! Service configuration.
//!
//! Every field has a default; a JSON file may override any subset of them:
//!
//! ```json
//! { "max_text_length": 1000, "audio_format": "mp3", "output_dir": "/var/lib/narrate" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::{
    chunk::DEFAULT_CHUNK_LENGTH,
    export::AudioFormat,
    normalize::{NormalizerConfig, DEFAULT_MAX_LENGTH, DEFAULT_MIN_LENGTH, DEFAULT_WORDS_PER_MINUTE},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Longest accepted input, in characters.
    pub max_text_length: usize,

    /// Shortest accepted input, in characters.
    pub min_text_length: usize,

    /// Longest text handed to the model in one call.
    pub chunk_length: usize,

    /// Speaking rate used for duration estimates.
    pub words_per_minute: u32,

    /// Requested container for generated files.
    pub audio_format: AudioFormat,

    /// Where generated files are written.
    pub output_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_text_length: DEFAULT_MAX_LENGTH,
            min_text_length: DEFAULT_MIN_LENGTH,
            chunk_length: DEFAULT_CHUNK_LENGTH,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            audio_format: AudioFormat::Wav,
            output_dir: PathBuf::from("./audio_output"),
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read config: {}", path.display()))?;
        let config: Config = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_length == 0 {
            bail!("chunk_length must be greater than zero");
        }
        if self.words_per_minute == 0 {
            bail!("words_per_minute must be greater than zero");
        }
        if self.min_text_length > self.max_text_length {
            bail!(
                "min_text_length ({}) exceeds max_text_length ({})",
                self.min_text_length,
                self.max_text_length
            );
        }
        Ok(())
    }

    pub fn normalizer(&self) -> NormalizerConfig {
        NormalizerConfig {
            max_length: self.max_text_length,
            min_length: self.min_text_length,
            words_per_minute: self.words_per_minute,
        }
    }
}
