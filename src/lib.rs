//! # narrate
//!
//! The deterministic plumbing around a neural text-to-speech model: text goes
//! in, a playable audio file comes out.  The model itself is opaque; anything
//! implementing [`Synthesizer`] will do.
//!
//! ## Quick start
//!
//! ```no_run
//! use narrate::{Config, LazySynthesizer, SpeechService, SynthesisRequest, Synthesizer};
//! # fn load_model() -> anyhow::Result<Box<dyn Synthesizer>> { unimplemented!() }
//!
//! // The model is loaded on the first request, once.
//! let service = SpeechService::new(Config::default(), LazySynthesizer::new(load_model));
//!
//! let resp = service.synthesize(&SynthesisRequest::new("Dr. Smith says hello!")).unwrap();
//! println!("{} ({:.1} s) -> {}", resp.text, resp.estimated_duration, resp.path.display());
//! ```
//!
//! The building blocks are usable on their own:
//!
//! ```
//! assert_eq!(narrate::normalize::preprocess("  Mr. and Mrs. Jones ", 2000), "Mister and Missus Jones");
//! assert_eq!(narrate::chunk::split("Hi! How are you?", 250), vec!["Hi. How are you."]);
//! ```
//!
//! ## Pipeline
//! 1. **Validation**: empty, too short or too long input is rejected.
//! 2. **Normalisation**: whitespace collapsed, abbreviations expanded, text
//!    truncated to the length limit (at a word boundary when possible).
//! 3. **Chunking**: text over 250 characters is split into sentence-aligned
//!    chunks, since one model call only covers ~14 s of speech.
//! 4. **Synthesis**: each chunk is voiced in order with the same voice.
//! 5. **Concat**: per-chunk audio joined into one waveform.
//! 6. **Export**: 16-bit PCM WAV, or MP3 with the `mp3` feature (falling
//!    back to WAV when encoding fails).

pub mod chunk;
pub mod config;
pub mod error;
pub mod export;
pub mod normalize;
pub mod service;
pub mod synth;
pub mod waveform;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use config::Config;
pub use error::{Error, Result};
pub use export::{AudioFormat, Exporter};
pub use normalize::{TextNormalizer, ValidationError};
pub use service::{AudioFile, SpeechService, SynthesisRequest, SynthesisResponse};
pub use synth::{LazySynthesizer, SynthesisError, Synthesizer, VoicePreset, VOICE_PRESETS};
pub use waveform::{Samples, Waveform};
