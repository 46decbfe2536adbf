//! Crate-level error type.

use thiserror::Error;

use crate::{export::ExportError, normalize::ValidationError, synth::SynthesisError};

#[derive(Debug, Error)]
pub enum Error {
    /// The input text was rejected before any work was done.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The model failed; no file was written.
    #[error("Synthesis failed")]
    Synthesis(#[from] SynthesisError),

    /// The audio could not be written.
    #[error("Saving audio failed")]
    Export(#[from] ExportError),

    /// No generated file with this name exists (or it has expired).
    #[error("Audio file not found")]
    NotFound(String),
}

impl Error {
    /// `true` for errors whose message is meant for the caller (bad input,
    /// unknown file).  Everything else is an internal failure whose detail
    /// belongs in the logs.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotFound(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
