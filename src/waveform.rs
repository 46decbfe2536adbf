//! In-memory audio as it comes out of the model and goes into the exporter.

/// Raw sample storage.
///
/// Models normally hand back floats in `[-1.0, 1.0]`; some backends already
/// produce 16-bit PCM, which the exporter then writes untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Float(Vec<f32>),
    Pcm16(Vec<i16>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Float(s) => s.len(),
            Samples::Pcm16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert to signed 16-bit PCM.
    ///
    /// Float samples are clipped to `[-1.0, 1.0]` and scaled by 32767, so the
    /// output never reaches `i16::MIN`.
    pub fn to_pcm16(&self) -> Vec<i16> {
        match self {
            Samples::Float(s) => s
                .iter()
                .map(|&x| (x.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .collect(),
            Samples::Pcm16(s) => s.clone(),
        }
    }

    fn into_float(self) -> Vec<f32> {
        match self {
            Samples::Float(s) => s,
            Samples::Pcm16(s) => s.into_iter().map(|x| x as f32 / i16::MAX as f32).collect(),
        }
    }
}

/// A mono sample sequence plus its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Samples,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples: Samples::Float(samples), sample_rate }
    }

    pub fn from_pcm16(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples: Samples::Pcm16(samples), sample_rate }
    }

    /// Flatten a multi-row model output (e.g. shape `[1, T]` or `[C, T]`)
    /// row by row into a single sequence.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self::new(channels.into_iter().flatten().collect(), sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Append `other`'s samples end to end.  The sample rate is not touched;
    /// callers check that rates agree.
    ///
    /// Mixing float and PCM storage promotes the result to float.
    pub fn append(&mut self, other: Waveform) {
        let current = std::mem::replace(&mut self.samples, Samples::Float(Vec::new()));
        self.samples = match (current, other.samples) {
            (Samples::Float(mut a), Samples::Float(b)) => {
                a.extend(b);
                Samples::Float(a)
            }
            (Samples::Pcm16(mut a), Samples::Pcm16(b)) => {
                a.extend(b);
                Samples::Pcm16(a)
            }
            (a, b) => {
                let mut a = a.into_float();
                a.extend(b.into_float());
                Samples::Float(a)
            }
        };
    }
}
