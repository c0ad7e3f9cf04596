//! Float to 16-bit PCM quantization

use serde::{Deserialize, Serialize};

/// Full-scale magnitude of signed 16-bit PCM
pub const MAX_WAV_VALUE: f32 = 32768.0;

/// Handling of scaled samples outside the i16 range.
///
/// Both modes truncate toward zero; they differ only for out-of-range input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    /// Saturate to `[-32768, 32767]`; NaN becomes 0
    #[default]
    Clamp,
    /// Keep the low 16 bits of the truncated integer (two's-complement wrap)
    Wrap,
}

impl Quantization {
    /// Quantize one normalized sample
    pub fn quantize(self, sample: f32) -> i16 {
        let scaled = sample * MAX_WAV_VALUE;
        match self {
            // `as` truncates toward zero and saturates at the type bounds
            Quantization::Clamp => scaled as i16,
            Quantization::Wrap => (scaled as i64) as i16,
        }
    }
}

/// Quantized mono waveform; immutable once produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmWaveform {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl PcmWaveform {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Samples mapped back to [-1, 1)
    pub fn to_float(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|&s| s as f32 / MAX_WAV_VALUE)
            .collect()
    }
}

/// Scale a normalized signal by 32768 and quantize it to 16-bit PCM
pub fn encode(signal: &[f32], sample_rate: u32, quantization: Quantization) -> PcmWaveform {
    let samples = signal.iter().map(|&s| quantization.quantize(s)).collect();
    PcmWaveform::new(samples, sample_rate)
}

/// Number of samples whose scaled value does not fit in i16
///
/// NaN is not counted; both quantization modes map it to silence.
pub fn count_out_of_range(signal: &[f32]) -> usize {
    signal
        .iter()
        .filter(|s| !s.is_nan())
        .map(|&s| (s * MAX_WAV_VALUE).trunc())
        .filter(|v| !(i16::MIN as f32..=i16::MAX as f32).contains(v))
        .count()
}
