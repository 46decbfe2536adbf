//! Request-level pipeline: validate → normalise → synthesise → export.
//!
//! [`SpeechService`] is the process-wide context a hosting layer keeps
//! (typically behind an `Arc`) and hands to every request.  It owns the
//! configuration, the lazily loaded model and the exporter.  Each request
//! runs start to finish on the calling thread.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    chunk,
    config::Config,
    error::{Error, Result},
    export::{AudioFormat, Exporter},
    normalize::TextNormalizer,
    synth::{LazySynthesizer, VoicePreset, VOICE_PRESETS},
};

/// What a caller asks for.  Both fields may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthesisRequest {
    pub text: Option<String>,
    pub voice_preset: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), voice_preset: None }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice_preset = Some(voice.into());
        self
    }
}

/// A finished request.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResponse {
    pub audio_id: String,
    pub file_name: String,
    pub audio_url: String,
    /// The normalised text that was spoken.
    pub text: String,
    pub estimated_duration: f64,
    #[serde(skip)]
    pub path: PathBuf,
}

/// A generated file found on disk.
///
/// Stream details are read from the header of WAV files only; they stay
/// `None` for MP3 or an unreadable header.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Seconds.
    pub duration: Option<f64>,
}

impl AudioFile {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}

pub struct SpeechService {
    config: Config,
    normalizer: TextNormalizer,
    model: LazySynthesizer,
    exporter: Exporter,
}

impl std::fmt::Debug for SpeechService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechService")
            .field("config", &self.config)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl SpeechService {
    pub fn new(config: Config, model: LazySynthesizer) -> Self {
        Self::with_exporter(config, model, Exporter::new())
    }

    pub fn with_exporter(config: Config, model: LazySynthesizer, exporter: Exporter) -> Self {
        let normalizer = TextNormalizer::with_config(config.normalizer());
        Self { config, normalizer, model, exporter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Run the whole pipeline for one request and write the result under the
    /// configured output directory.
    pub fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        let raw = request.text.as_deref();
        self.normalizer.validate(raw)?;

        let text = self.normalizer.preprocess(raw);
        info!("synthesizing text: {}...", text.chars().take(50).collect::<String>());

        let audio_id = Uuid::new_v4().to_string();
        let requested = self
            .config
            .output_dir
            .join(format!("{}.{}", audio_id, self.config.audio_format.extension()));

        let prompt = with_terminal_punctuation(&text);
        let voice = request.voice_preset.as_deref();
        let audio = chunk::synthesize(&self.model, &prompt, voice, self.config.chunk_length)
            .map_err(|e| {
                error!(error = ?e, "synthesis failed");
                e
            })?;

        let path = self.exporter.export(&audio, &requested).map_err(|e| {
            error!(error = %e, "saving audio failed");
            e
        })?;

        let file_name = file_name_of(&path);
        let estimated_duration = self.normalizer.estimate_duration(text.as_str());
        Ok(SynthesisResponse {
            audio_url: format!("/audio/{}", file_name),
            audio_id,
            file_name,
            text,
            estimated_duration,
            path,
        })
    }

    /// Resolve a file name previously returned in [`SynthesisResponse`].
    ///
    /// Anything that is not a bare `<name>.<wav|mp3>` inside the output
    /// directory is reported as not found.
    pub fn locate(&self, file_name: &str) -> Result<AudioFile> {
        let not_found = || Error::NotFound(file_name.to_string());

        let name = Path::new(file_name);
        if name.file_name().map(|n| n == name.as_os_str()) != Some(true) {
            return Err(not_found());
        }
        let format = AudioFormat::from_path(name).ok_or_else(not_found)?;

        let path = self.config.output_dir.join(name);
        let meta = fs::metadata(&path).map_err(|_| not_found())?;
        if !meta.is_file() {
            return Err(not_found());
        }
        let mut file = AudioFile {
            path,
            format,
            size_bytes: meta.len(),
            sample_rate: None,
            channels: None,
            duration: None,
        };
        if format == AudioFormat::Wav {
            match hound::WavReader::open(&file.path) {
                Ok(reader) => {
                    let spec = reader.spec();
                    file.sample_rate = Some(spec.sample_rate);
                    file.channels = Some(spec.channels);
                    if spec.sample_rate > 0 {
                        file.duration = Some(reader.duration() as f64 / spec.sample_rate as f64);
                    }
                }
                Err(e) => debug!(file = %file.path.display(), error = %e, "unreadable WAV header"),
            }
        }
        Ok(file)
    }

    /// Voices a request may select through `voice_preset`.
    pub fn voices(&self) -> &'static [VoicePreset] {
        VOICE_PRESETS
    }
}

/// The model phrases an utterance better when it ends like a sentence.
fn with_terminal_punctuation(text: &str) -> String {
    match text.chars().last() {
        Some('.' | '!' | '?') | None => text.to_string(),
        Some(_) => format!("{}.", text),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        export::Unavailable,
        synth::{SynthesisError, Synthesizer},
        waveform::Waveform,
    };
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    /// 100 samples per call, remembering every prompt.
    struct Recorder {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Synthesizer for Recorder {
        fn synthesize(&self, text: &str, _voice: Option<&str>) -> Result<Waveform, SynthesisError> {
            self.prompts.lock().unwrap().push(text.to_string());
            Ok(Waveform::new(vec![0.25; 100], 24_000))
        }
    }

    struct Broken;

    impl Synthesizer for Broken {
        fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<Waveform, SynthesisError> {
            Err(SynthesisError::model("model exploded"))
        }
    }

    fn config_in(dir: &Path, format: AudioFormat) -> Config {
        Config { output_dir: dir.join("audio"), audio_format: format, ..Config::default() }
    }

    fn recording_service(config: Config) -> (SpeechService, Arc<Mutex<Vec<String>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let model = LazySynthesizer::ready(Box::new(Recorder { prompts: prompts.clone() }));
        let service =
            SpeechService::with_exporter(config, model, Exporter::with_transcoder(Box::new(Unavailable)));
        (service, prompts)
    }

    #[test]
    fn test_synthesize_writes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let (service, prompts) = recording_service(config_in(dir.path(), AudioFormat::Wav));

        let resp = service.synthesize(&SynthesisRequest::new("  Dr. Smith said hello  ")).unwrap();
        assert_eq!(resp.text, "Doctor Smith said hello");
        assert_eq!(resp.file_name, format!("{}.wav", resp.audio_id));
        assert_eq!(resp.audio_url, format!("/audio/{}", resp.file_name));
        assert!(resp.path.exists());
        assert!((resp.estimated_duration - 4.0 * 60.0 / 150.0).abs() < 1e-9);
        assert_eq!(*prompts.lock().unwrap(), vec!["Doctor Smith said hello."]);

        let file = service.locate(&resp.file_name).unwrap();
        assert_eq!(file.path, resp.path);
        assert_eq!(file.mime_type(), "audio/wav");
        assert!(file.size_bytes > 44);
        assert_eq!(file.sample_rate, Some(24_000));
        assert_eq!(file.channels, Some(1));
        let duration = file.duration.expect("duration read from header");
        assert!((duration - 100.0 / 24_000.0).abs() < 1e-9, "got: {}", duration);
    }

    #[test]
    fn test_mp3_request_reports_actual_file() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = recording_service(config_in(dir.path(), AudioFormat::Mp3));

        let resp = service.synthesize(&SynthesisRequest::new("Hello world!")).unwrap();
        assert!(resp.file_name.ends_with(".wav"), "got: {}", resp.file_name);
        assert!(service.locate(&resp.file_name).is_ok());
    }

    #[test]
    fn test_long_text_is_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let (service, prompts) = recording_service(config_in(dir.path(), AudioFormat::Wav));
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);

        let resp = service.synthesize(&SynthesisRequest::new(text).with_voice("v2/en_speaker_6")).unwrap();
        let calls = prompts.lock().unwrap().len();
        assert!(calls > 1, "got {} calls", calls);

        let mut reader = hound::WavReader::open(&resp.path).unwrap();
        assert_eq!(reader.samples::<i16>().count(), 100 * calls);
    }

    #[test]
    fn test_invalid_text_is_rejected_without_loading_model() {
        let dir = tempfile::tempdir().unwrap();
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let model = LazySynthesizer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(Broken) as Box<dyn Synthesizer>)
        });
        let service = SpeechService::new(config_in(dir.path(), AudioFormat::Wav), model);

        for req in [SynthesisRequest::default(), SynthesisRequest::new("Hi")] {
            let err = service.synthesize(&req).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "got: {:?}", err);
            assert!(err.is_client_error());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 0);
        assert!(!service.is_model_loaded());
    }

    #[test]
    fn test_synthesis_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), AudioFormat::Wav);
        let output_dir = config.output_dir.clone();
        let service = SpeechService::new(config, LazySynthesizer::ready(Box::new(Broken)));

        let err = service.synthesize(&SynthesisRequest::new("Hello world")).unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)), "got: {:?}", err);
        assert!(!err.is_client_error());
        let written = fs::read_dir(&output_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(written, 0);
    }

    #[test]
    fn test_punctuation_only_text_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), AudioFormat::Wav);
        let output_dir = config.output_dir.clone();
        let (service, prompts) = recording_service(config);

        let err = service.synthesize(&SynthesisRequest::new(".".repeat(300))).unwrap_err();
        assert!(
            matches!(err, Error::Synthesis(SynthesisError::NoSpeech)),
            "got: {:?}",
            err
        );
        assert!(prompts.lock().unwrap().is_empty());
        let written = fs::read_dir(&output_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(written, 0);
    }

    #[test]
    fn test_locate_unreadable_wav_keeps_size_only() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = recording_service(config_in(dir.path(), AudioFormat::Wav));
        fs::create_dir_all(dir.path().join("audio")).unwrap();
        fs::write(dir.path().join("audio/junk.wav"), b"not a riff header").unwrap();

        let file = service.locate("junk.wav").unwrap();
        assert_eq!(file.size_bytes, 17);
        assert_eq!((file.sample_rate, file.channels, file.duration), (None, None, None));
    }

    #[test]
    fn test_voices() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = recording_service(config_in(dir.path(), AudioFormat::Wav));
        let voices = service.voices();
        assert_eq!(voices[0].id, None);
        assert!(voices.iter().any(|v| v.id == Some("v2/en_speaker_6")));
    }

    #[test]
    fn test_locate_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _) = recording_service(config_in(dir.path(), AudioFormat::Wav));
        fs::create_dir_all(dir.path().join("audio")).unwrap();
        fs::write(dir.path().join("secret.wav"), b"outside").unwrap();

        for name in ["missing.wav", "../secret.wav", "", "notes.txt", "/etc/passwd"] {
            let err = service.locate(name).unwrap_err();
            assert!(matches!(err, Error::NotFound(_)), "{}: {:?}", name, err);
        }
    }

    #[test]
    fn test_service_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SpeechService>();
    }

    #[test]
    fn test_terminal_punctuation() {
        assert_eq!(with_terminal_punctuation("Hello"), "Hello.");
        assert_eq!(with_terminal_punctuation("Hello?"), "Hello?");
        assert_eq!(with_terminal_punctuation(""), "");
    }
}
