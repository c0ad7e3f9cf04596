//! Estimation of the vocoder's idle output spectrum

use crate::audio::{Stft, StftParams};
use crate::vocoder::Vocoder;
use crate::{Error, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Content of the reference spectrogram fed to the vocoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiasMode {
    /// All-zero spectrogram
    #[default]
    Zeros,
    /// Standard-normal spectrogram from a seeded generator
    Normal { seed: u64 },
}

/// Per-bin magnitude of the vocoder's output for a degenerate input
#[derive(Debug, Clone, PartialEq)]
pub struct BiasProfile {
    magnitude: Vec<f32>,
    params: StftParams,
}

impl BiasProfile {
    /// Build a profile from known magnitudes
    pub fn new(magnitude: Vec<f32>, params: StftParams) -> Result<Self> {
        if magnitude.len() != params.n_freqs() {
            return Err(Error::Shape(format!(
                "bias profile needs {} bins, got {}",
                params.n_freqs(),
                magnitude.len()
            )));
        }
        if magnitude.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(Error::Inference(
                "bias profile contains negative or non-finite magnitudes".into(),
            ));
        }
        Ok(Self { magnitude, params })
    }

    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    /// Transform parameters the profile was measured with
    pub fn params(&self) -> &StftParams {
        &self.params
    }

    /// Mean bin magnitude, for logging
    pub fn mean_magnitude(&self) -> f32 {
        self.magnitude.iter().sum::<f32>() / self.magnitude.len() as f32
    }
}

/// Runs the vocoder once on a reference input to measure its noise floor
#[derive(Debug, Clone)]
pub struct BiasEstimator {
    reference_frames: usize,
    mode: BiasMode,
}

impl Default for BiasEstimator {
    fn default() -> Self {
        Self::new(crate::BIAS_REFERENCE_FRAMES, BiasMode::Zeros)
    }
}

impl BiasEstimator {
    pub fn new(reference_frames: usize, mode: BiasMode) -> Self {
        Self {
            reference_frames,
            mode,
        }
    }

    pub fn mode(&self) -> BiasMode {
        self.mode
    }

    /// Reference spectrogram of shape `(n_mels, reference_frames)`
    pub fn reference_input(&self, n_mels: usize) -> Result<Array2<f32>> {
        let shape = (n_mels, self.reference_frames);
        match self.mode {
            BiasMode::Zeros => Ok(Array2::zeros(shape)),
            BiasMode::Normal { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                let normal = Normal::new(0.0f32, 1.0)
                    .map_err(|e| Error::Config(format!("Invalid normal distribution: {}", e)))?;
                Ok(Array2::from_shape_simple_fn(shape, || normal.sample(&mut rng)))
            }
        }
    }

    /// Invoke the vocoder with `sigma = 0` and keep the first frame's magnitudes
    pub fn estimate<V: Vocoder + ?Sized>(&self, vocoder: &V, stft: &Stft) -> Result<BiasProfile> {
        let reference = self.reference_input(vocoder.n_mel_channels())?;
        log::debug!(
            "Estimating vocoder bias from {:?} reference of shape {:?}",
            self.mode,
            reference.dim()
        );

        let bias_audio = vocoder.infer(&reference, 0.0)?;
        if bias_audio.is_empty() {
            return Err(Error::Inference(
                "vocoder returned no samples for the bias reference".into(),
            ));
        }

        let spectrum = stft.transform(&bias_audio)?;
        let magnitude: Vec<f32> = spectrum.magnitude.column(0).to_vec();
        let profile = BiasProfile::new(magnitude, *stft.params())?;

        log::info!(
            "Vocoder bias estimated ({} samples, mean bin magnitude {:.6})",
            bias_audio.len(),
            profile.mean_magnitude()
        );
        Ok(profile)
    }
}
