//! Sentence chunking and waveform assembly.
//!
//! A single model call can only voice roughly 14 seconds of speech, which
//! works out to about 250 characters.  Longer text is split at sentence
//! boundaries, each chunk is synthesised on its own (same voice, strictly in
//! order), and the pieces are joined back end to end.  Nothing smooths the
//! seams: prosody may reset at every chunk boundary.

use tracing::{debug, error, info};

use crate::{
    synth::{SynthesisError, Synthesizer},
    waveform::Waveform,
};

/// Maximum characters handed to the model in one call.
pub const DEFAULT_CHUNK_LENGTH: usize = 250;

// ─────────────────────────────────────────────────────────────────────────────
// Text splitting
// ─────────────────────────────────────────────────────────────────────────────

fn sentences(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(&['.', '!', '?'][..])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s))
}

/// Split `text` into sentence-aligned chunks of at most `max_chunk_length`
/// characters.
///
/// `!` and `?` count as sentence ends and come back as `.`.  Sentences are
/// packed greedily, joined by a single space.  A sentence that is longer than
/// the budget on its own becomes one oversized chunk; it is never cut.
pub fn split(text: &str, max_chunk_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in sentences(text) {
        let sentence_len = sentence.chars().count();
        if current.is_empty() {
            current = sentence;
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len <= max_chunk_length {
            current.push(' ');
            current.push_str(&sentence);
            current_len += 1 + sentence_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current = sentence;
            current_len = sentence_len;
        }
        if current_len > max_chunk_length {
            debug!(len = current_len, max = max_chunk_length, "sentence exceeds chunk budget");
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthesis
// ─────────────────────────────────────────────────────────────────────────────

/// Synthesise `text`, chunking it first when it is longer than
/// `max_chunk_length` characters.
pub fn synthesize<S: Synthesizer + ?Sized>(
    synth: &S,
    text: &str,
    voice: Option<&str>,
    max_chunk_length: usize,
) -> Result<Waveform, SynthesisError> {
    if text.chars().count() > max_chunk_length {
        return synthesize_long(synth, text, voice, max_chunk_length);
    }
    let audio = synth.synthesize(text, voice)?;
    info!(samples = audio.len(), sample_rate = audio.sample_rate, "generated audio");
    Ok(audio)
}

/// Split `text`, synthesise every chunk in order and concatenate the results.
///
/// Fails on the first chunk that fails; nothing generated so far is kept.
/// Every chunk must report the sample rate of the first one.  Text made only
/// of sentence terminators yields no chunks and fails with
/// [`SynthesisError::NoSpeech`].
pub fn synthesize_long<S: Synthesizer + ?Sized>(
    synth: &S,
    text: &str,
    voice: Option<&str>,
    max_chunk_length: usize,
) -> Result<Waveform, SynthesisError> {
    let chunks = split(text, max_chunk_length);
    if chunks.is_empty() {
        return Err(SynthesisError::NoSpeech);
    }
    info!(chunks = chunks.len(), "split text into chunks");

    let mut audio: Option<Waveform> = None;
    for (i, chunk) in chunks.iter().enumerate() {
        debug!("generating chunk {}/{}", i + 1, chunks.len());
        let part = synth.synthesize(chunk, voice).map_err(|e| {
            error!(chunk = i + 1, total = chunks.len(), error = %e, "chunk synthesis failed");
            e
        })?;

        match audio.as_mut() {
            None => audio = Some(part),
            Some(full) => {
                if part.sample_rate != full.sample_rate {
                    return Err(SynthesisError::SampleRateMismatch {
                        chunk: i + 1,
                        expected: full.sample_rate,
                        found: part.sample_rate,
                    });
                }
                full.append(part);
            }
        }
    }

    let audio = audio.ok_or(SynthesisError::NoSpeech)?;
    info!(
        chunks = chunks.len(),
        samples = audio.len(),
        sample_rate = audio.sample_rate,
        "concatenated chunks into full audio"
    );
    Ok(audio)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
