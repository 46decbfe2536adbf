//! The speech model boundary.
//!
//! The model itself is opaque: anything that turns `(text, voice)` into a
//! [`Waveform`] can implement [`Synthesizer`].  [`LazySynthesizer`] wraps a
//! loader so the expensive model is built once, on first use, and every call
//! into it is serialised.

use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::waveform::Waveform;

/// Boxed error type carried as the cause of a synthesis failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech model failed to load")]
    Load(#[source] BoxError),

    #[error("speech model failed")]
    Model(#[source] BoxError),

    #[error("chunk {chunk} came back at {found} Hz, expected {expected} Hz")]
    SampleRateMismatch { chunk: usize, expected: u32, found: u32 },

    /// Nothing but sentence terminators and whitespace was left to voice.
    #[error("text contains nothing to speak")]
    NoSpeech,
}

impl SynthesisError {
    /// Wrap a backend failure.
    pub fn model(err: impl Into<BoxError>) -> Self {
        SynthesisError::Model(err.into())
    }
}

/// Text (plus an optional voice preset) → audio.
///
/// `voice = None` selects the engine's default voice.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Waveform, SynthesisError>;
}

impl<T: Synthesizer + ?Sized> Synthesizer for Box<T> {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Waveform, SynthesisError> {
        (**self).synthesize(text, voice)
    }
}

impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Waveform, SynthesisError> {
        (**self).synthesize(text, voice)
    }
}

impl<T: Synthesizer + ?Sized> Synthesizer for &T {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Waveform, SynthesisError> {
        (**self).synthesize(text, voice)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice presets
// ─────────────────────────────────────────────────────────────────────────────

/// One selectable voice.  `id` is what goes into a request's voice preset;
/// `None` is the engine's default voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoicePreset {
    pub id: Option<&'static str>,
    pub name: &'static str,
    pub language: &'static str,
}

const fn preset(id: &'static str, name: &'static str) -> VoicePreset {
    VoicePreset { id: Some(id), name, language: "en" }
}

/// Voices the bundled speaker set offers, default first.
pub const VOICE_PRESETS: &[VoicePreset] = &[
    VoicePreset { id: None, name: "Default", language: "en" },
    preset("v2/en_speaker_0", "Speaker 0 (Male)"),
    preset("v2/en_speaker_1", "Speaker 1 (Male)"),
    preset("v2/en_speaker_2", "Speaker 2 (Male)"),
    preset("v2/en_speaker_3", "Speaker 3 (Male)"),
    preset("v2/en_speaker_4", "Speaker 4 (Male)"),
    preset("v2/en_speaker_5", "Speaker 5 (Female)"),
    preset("v2/en_speaker_6", "Speaker 6 (Female)"),
    preset("v2/en_speaker_7", "Speaker 7 (Female)"),
    preset("v2/en_speaker_8", "Speaker 8 (Female)"),
    preset("v2/en_speaker_9", "Speaker 9 (Female)"),
];

// ─────────────────────────────────────────────────────────────────────────────
// LazySynthesizer
// ─────────────────────────────────────────────────────────────────────────────

type Loader = Box<dyn Fn() -> anyhow::Result<Box<dyn Synthesizer>> + Send + Sync>;

/// A model that is loaded on the first synthesis request.
///
/// Concurrent first callers block on a single load.  A failed load is not
/// cached; the next request tries again.
pub struct LazySynthesizer {
    loader: Loader,
    model: OnceCell<Box<dyn Synthesizer>>,
    // The model is not assumed to be re-entrant.
    lock: Mutex<()>,
}

impl LazySynthesizer {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn Synthesizer>> + Send + Sync + 'static,
    {
        Self { loader: Box::new(loader), model: OnceCell::new(), lock: Mutex::new(()) }
    }

    /// Wrap a model that is already loaded.
    pub fn ready(model: Box<dyn Synthesizer>) -> Self {
        let this = Self::new(|| anyhow::bail!("model was supplied pre-loaded"));
        // Fresh cell, cannot already be set.
        let _ = this.model.set(model);
        this
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Return the model, loading it if this is the first call.
    pub fn get(&self) -> Result<&dyn Synthesizer, SynthesisError> {
        let model = self.model.get_or_try_init(|| {
            info!("loading speech model");
            let model = (self.loader)().map_err(|e| SynthesisError::Load(e.into()))?;
            info!("speech model loaded");
            Ok::<_, SynthesisError>(model)
        })?;
        Ok(&**model)
    }
}

impl Synthesizer for LazySynthesizer {
    fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Waveform, SynthesisError> {
        let model = self.get()?;
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        model.synthesize(text, voice)
    }
}

impl std::fmt::Debug for LazySynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazySynthesizer").field("loaded", &self.is_loaded()).finish()
    }
}
