//! Waveform → audio file.
//!
//! WAV (16-bit PCM, mono) is always available.  MP3 goes through a
//! [`Transcoder`]: the PCM is first written to a temporary WAV, which the
//! transcoder turns into the requested file.  When transcoding fails for any
//! reason (including the encoder not being compiled in) the audio is written
//! as WAV next to the requested path instead, so callers must use the path
//! [`Exporter::export`] returns rather than the one they asked for.

use std::{
    fs,
    io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::waveform::Waveform;

// ─────────────────────────────────────────────────────────────────────────────
// Formats
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|e| e.to_str()).and_then(Self::from_extension)
    }

    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, AudioFormat::Wav)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported audio format for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("cannot create output directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write WAV file {}", .path.display())]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("cannot create temporary WAV file")]
    TempFile(#[source] io::Error),

    #[error("invalid sample rate {0} Hz")]
    InvalidSampleRate(u32),
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV writer
// ─────────────────────────────────────────────────────────────────────────────

/// Write mono 16-bit PCM samples to `path`.
pub fn write_wav(samples: &[i16], sample_rate: u32, path: &Path) -> Result<(), ExportError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |source: hound::Error| ExportError::Wav { path: path.to_path_buf(), source };

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &s in samples {
        writer.write_sample(s).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcoding
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a WAV file into another container.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, wav: &Path, target: &Path, format: AudioFormat) -> anyhow::Result<()>;
}

/// Stand-in used when no encoder is compiled in; every attempt fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unavailable;

impl Transcoder for Unavailable {
    fn transcode(&self, _wav: &Path, _target: &Path, format: AudioFormat) -> anyhow::Result<()> {
        anyhow::bail!("no {} encoder available (build with the `mp3` feature)", format)
    }
}

/// MP3 encoding through LAME.
#[cfg(feature = "mp3")]
pub struct LameTranscoder {
    pub bitrate: mp3lame_encoder::Bitrate,
}

#[cfg(feature = "mp3")]
impl Default for LameTranscoder {
    fn default() -> Self {
        Self { bitrate: mp3lame_encoder::Bitrate::Kbps192 }
    }
}

#[cfg(feature = "mp3")]
impl Transcoder for LameTranscoder {
    fn transcode(&self, wav: &Path, target: &Path, format: AudioFormat) -> anyhow::Result<()> {
        use anyhow::Context;
        use mp3lame_encoder::{Builder, FlushNoGap, InterleavedPcm, MonoPcm};

        anyhow::ensure!(format == AudioFormat::Mp3, "LAME cannot produce {}", format);

        let mut reader = hound::WavReader::open(wav)
            .with_context(|| format!("Cannot open WAV: {}", wav.display()))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<Result<_, _>>()
            .context("WAV read error")?;

        let mut builder = Builder::new().context("Failed to create LAME builder")?;
        builder
            .set_num_channels(spec.channels as u8)
            .map_err(|e| anyhow::anyhow!("LAME channels: {:?}", e))?;
        builder
            .set_sample_rate(spec.sample_rate)
            .map_err(|e| anyhow::anyhow!("LAME sample rate: {:?}", e))?;
        builder
            .set_brate(self.bitrate)
            .map_err(|e| anyhow::anyhow!("LAME bitrate: {:?}", e))?;
        let mut encoder = builder
            .build()
            .map_err(|e| anyhow::anyhow!("LAME init: {:?}", e))?;

        let mut mp3 = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(samples.len()));
        let encoded = if spec.channels == 1 {
            encoder.encode_to_vec(MonoPcm(&samples), &mut mp3)
        } else {
            encoder.encode_to_vec(InterleavedPcm(&samples), &mut mp3)
        };
        encoded.map_err(|e| anyhow::anyhow!("LAME encode: {:?}", e))?;
        encoder
            .flush_to_vec::<FlushNoGap>(&mut mp3)
            .map_err(|e| anyhow::anyhow!("LAME flush: {:?}", e))?;

        fs::write(target, &mp3)
            .with_context(|| format!("Cannot write MP3: {}", target.display()))?;
        Ok(())
    }
}

/// The transcoder compiled into this build.
pub fn default_transcoder() -> Box<dyn Transcoder> {
    #[cfg(feature = "mp3")]
    {
        Box::new(LameTranscoder::default())
    }
    #[cfg(not(feature = "mp3"))]
    {
        Box::new(Unavailable)
    }
}

/// Outcome of trying to produce a compressed file.
#[derive(Debug)]
pub enum Transcode {
    Encoded(PathBuf),
    Fallback(anyhow::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// Exporter
// ─────────────────────────────────────────────────────────────────────────────

pub struct Exporter {
    transcoder: Box<dyn Transcoder>,
}

impl Default for Exporter {
    fn default() -> Self {
        Self { transcoder: default_transcoder() }
    }
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter").finish_non_exhaustive()
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcoder(transcoder: Box<dyn Transcoder>) -> Self {
        Self { transcoder }
    }

    /// Write `audio` to `target`, choosing the container from its extension.
    ///
    /// Returns the path actually written, which ends in `.wav` whenever a
    /// compressed format could not be produced.
    pub fn export(&self, audio: &Waveform, target: &Path) -> Result<PathBuf, ExportError> {
        let format = AudioFormat::from_path(target)
            .ok_or_else(|| ExportError::UnsupportedFormat(target.to_path_buf()))?;
        if audio.sample_rate == 0 {
            return Err(ExportError::InvalidSampleRate(audio.sample_rate));
        }

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| ExportError::CreateDir { path: parent.to_path_buf(), source })?;
        }

        let pcm = audio.samples.to_pcm16();

        let path = if format.is_lossless() {
            write_wav(&pcm, audio.sample_rate, target)?;
            target.to_path_buf()
        } else {
            match self.transcode(&pcm, audio.sample_rate, target, format)? {
                Transcode::Encoded(path) => path,
                Transcode::Fallback(reason) => {
                    let fallback = target.with_extension(AudioFormat::Wav.extension());
                    warn!(
                        requested = %target.display(),
                        actual = %fallback.display(),
                        "{} conversion failed, falling back to WAV: {:#}",
                        format,
                        reason
                    );
                    write_wav(&pcm, audio.sample_rate, &fallback)?;
                    fallback
                }
            }
        };

        info!(
            samples = pcm.len(),
            seconds = audio.duration(),
            path = %path.display(),
            "saved audio"
        );
        Ok(path)
    }

    /// Stage the PCM as a temporary WAV and hand it to the transcoder.
    ///
    /// Only failing to stage the temporary file is an error; anything the
    /// transcoder reports becomes [`Transcode::Fallback`].
    fn transcode(
        &self,
        pcm: &[i16],
        sample_rate: u32,
        target: &Path,
        format: AudioFormat,
    ) -> Result<Transcode, ExportError> {
        // Removed when dropped, on every return path.
        let staged = tempfile::Builder::new()
            .prefix("narrate-")
            .suffix(".wav")
            .tempfile()
            .map_err(ExportError::TempFile)?
            .into_temp_path();

        write_wav(pcm, sample_rate, &staged)?;

        Ok(match self.transcoder.transcode(&staged, target, format) {
            Ok(()) => Transcode::Encoded(target.to_path_buf()),
            Err(reason) => Transcode::Fallback(reason),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn read_back(path: &Path) -> (hound::WavSpec, Vec<i16>) {
        let mut reader = hound::WavReader::open(path).unwrap();
        let spec = reader.spec();
        let samples = reader.samples::<i16>().map(Result::unwrap).collect();
        (spec, samples)
    }

    /// Records the staged WAV path, then pretends to encode by copying it.
    struct CopyTranscoder {
        seen: Arc<Mutex<Option<PathBuf>>>,
    }

    impl Transcoder for CopyTranscoder {
        fn transcode(&self, wav: &Path, target: &Path, _format: AudioFormat) -> anyhow::Result<()> {
            *self.seen.lock().unwrap() = Some(wav.to_path_buf());
            fs::copy(wav, target)?;
            Ok(())
        }
    }

    /// Records the staged WAV path, then fails.
    struct BrokenTranscoder {
        seen: Arc<Mutex<Option<PathBuf>>>,
    }

    impl Transcoder for BrokenTranscoder {
        fn transcode(&self, wav: &Path, _target: &Path, _format: AudioFormat) -> anyhow::Result<()> {
            *self.seen.lock().unwrap() = Some(wav.to_path_buf());
            anyhow::bail!("ffmpeg not found")
        }
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(AudioFormat::from_path(Path::new("a/b.wav")), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_path(Path::new("b.MP3")), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_path(Path::new("b.ogg")), None);
        assert_eq!(AudioFormat::from_path(Path::new("noext")), None);
        assert_eq!(AudioFormat::Mp3.mime_type(), "audio/mpeg");
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/dir/out.wav");
        let audio = Waveform::new(vec![0.0, 0.5, -0.5, 1.5, -2.0, 0.25, 1.0], 24_000);

        let path = Exporter::with_transcoder(Box::new(Unavailable)).export(&audio, &target).unwrap();
        assert_eq!(path, target);

        let (spec, samples) = read_back(&path);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(samples.len(), audio.len());
        assert!(samples.iter().all(|s| (-32767..=32767).contains(s)), "got: {:?}", samples);
        assert_eq!(samples[3], 32767);
        assert_eq!(samples[4], -32767);
    }

    #[test]
    fn test_pcm16_is_written_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("pcm.wav");
        let audio = Waveform::from_pcm16(vec![-32768, -1, 0, 1, 32767], 16_000);

        let path = Exporter::new().export(&audio, &target).unwrap();
        assert_eq!(read_back(&path).1, vec![-32768, -1, 0, 1, 32767]);
    }

    #[test]
    fn test_mp3_falls_back_to_wav_when_encoder_missing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.mp3");
        let audio = Waveform::new(vec![0.1; 480], 24_000);

        let path = Exporter::with_transcoder(Box::new(Unavailable)).export(&audio, &target).unwrap();
        assert_eq!(path, dir.path().join("x.wav"));
        assert!(!target.exists());
        assert_eq!(read_back(&path).1.len(), 480);
    }

    #[test]
    fn test_failed_transcode_removes_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let exporter = Exporter::with_transcoder(Box::new(BrokenTranscoder { seen: seen.clone() }));

        let path = exporter
            .export(&Waveform::new(vec![0.0; 10], 8_000), &dir.path().join("y.mp3"))
            .unwrap();
        assert!(path.to_string_lossy().ends_with(".wav"), "got: {}", path.display());

        let staged = seen.lock().unwrap().clone().expect("transcoder was called");
        assert!(!staged.exists(), "staged file left behind: {}", staged.display());
    }

    #[test]
    fn test_successful_transcode_keeps_requested_path() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("z.mp3");
        let seen = Arc::new(Mutex::new(None));
        let exporter = Exporter::with_transcoder(Box::new(CopyTranscoder { seen: seen.clone() }));

        let path = exporter.export(&Waveform::new(vec![0.2; 32], 8_000), &target).unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
        assert!(!dir.path().join("z.wav").exists());

        let staged = seen.lock().unwrap().clone().expect("transcoder was called");
        assert!(!staged.exists());
        // The staged WAV carried every sample.
        assert_eq!(read_back(&target).1.len(), 32);
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["silent.wav", "silent.mp3"] {
            let target = dir.path().join(name);
            let err = Exporter::with_transcoder(Box::new(Unavailable))
                .export(&Waveform::new(Vec::new(), 0), &target)
                .unwrap_err();
            assert!(matches!(err, ExportError::InvalidSampleRate(0)), "got: {:?}", err);
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = Exporter::new()
            .export(&Waveform::new(vec![0.0; 4], 8_000), &dir.path().join("a.ogg"))
            .unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(_)), "got: {:?}", err);
    }

    #[test]
    fn test_unwritable_directory_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = Exporter::new()
            .export(&Waveform::new(vec![0.0; 4], 8_000), &blocker.join("out.wav"))
            .unwrap_err();
        assert!(matches!(err, ExportError::CreateDir { .. }), "got: {:?}", err);
    }
}
