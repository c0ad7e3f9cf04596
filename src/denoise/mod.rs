//! Removal of vocoder bias ("hiss") by spectral subtraction
//!
//! The vocoder's response to a degenerate spectrogram is taken as its noise
//! floor. Its first-frame magnitude spectrum, scaled by a strength factor, is
//! subtracted from every frame of the synthesized audio. Magnitudes are
//! floored at zero and the original phase is kept.

mod bias;

pub use bias::{BiasEstimator, BiasMode, BiasProfile};

use crate::audio::{Stft, StftParams};
use crate::config::DenoiserConfig;
use crate::vocoder::Vocoder;
use crate::{Error, Result};
use ndarray::Array2;
use once_cell::unsync::OnceCell;

/// Subtract `strength * bias[k]` from every frame of bin `k`, floored at zero
pub fn subtract_bias(magnitude: &mut Array2<f32>, bias: &[f32], strength: f32) {
    for (mut row, &b) in magnitude.outer_iter_mut().zip(bias.iter()) {
        let amount = strength * b;
        row.mapv_inplace(|m| (m - amount).max(0.0));
    }
}

/// Denoise `signal` against a known bias profile
///
/// Returns the input unchanged when `strength <= 0`. The output always has
/// the same number of samples as the input.
pub fn denoise_with_profile(
    stft: &Stft,
    signal: &[f32],
    strength: f32,
    bias: &BiasProfile,
) -> Result<Vec<f32>> {
    if strength <= 0.0 || signal.is_empty() {
        return Ok(signal.to_vec());
    }
    if !strength.is_finite() {
        return Err(Error::Config(format!(
            "denoiser strength must be finite, got {}",
            strength
        )));
    }
    if bias.params() != stft.params() {
        return Err(Error::Config(format!(
            "bias profile measured with {:?} cannot be applied with {:?}",
            bias.params(),
            stft.params()
        )));
    }

    let spectrum = stft.transform(signal)?;
    let mut magnitude = spectrum.magnitude;
    subtract_bias(&mut magnitude, bias.magnitude(), strength);

    stft.inverse(&magnitude, &spectrum.phase, signal.len())
}

/// Bias remover owning its transform and a lazily estimated bias profile
#[derive(Debug)]
pub struct Denoiser {
    stft: Stft,
    estimator: BiasEstimator,
    bias: OnceCell<BiasProfile>,
}

impl Denoiser {
    /// Create a denoiser; no vocoder call happens until the first denoise
    pub fn new(config: &DenoiserConfig) -> Result<Self> {
        let params = StftParams {
            filter_length: config.filter_length,
            hop_length: config.hop_length(),
            win_length: config.win_length,
        };
        Ok(Self {
            stft: Stft::new(params)?,
            estimator: BiasEstimator::new(config.reference_frames, config.bias_mode),
            bias: OnceCell::new(),
        })
    }

    /// Create a denoiser around an already measured profile
    pub fn with_profile(profile: BiasProfile) -> Result<Self> {
        let stft = Stft::new(*profile.params())?;
        Ok(Self {
            stft,
            estimator: BiasEstimator::default(),
            bias: OnceCell::with_value(profile),
        })
    }

    pub fn stft(&self) -> &Stft {
        &self.stft
    }

    /// Whether the bias profile has been computed yet
    pub fn is_estimated(&self) -> bool {
        self.bias.get().is_some()
    }

    /// Cached bias profile, estimating it on first use
    pub fn bias_profile<V: Vocoder + ?Sized>(&self, vocoder: &V) -> Result<&BiasProfile> {
        self.bias
            .get_or_try_init(|| self.estimator.estimate(vocoder, &self.stft))
    }

    /// Remove `strength` times the vocoder bias from `signal`
    ///
    /// `strength <= 0` is an exact bypass and never touches the vocoder.
    pub fn denoise<V: Vocoder + ?Sized>(
        &self,
        vocoder: &V,
        signal: &[f32],
        strength: f32,
    ) -> Result<Vec<f32>> {
        if strength <= 0.0 || signal.is_empty() {
            return Ok(signal.to_vec());
        }
        let bias = self.bias_profile(vocoder)?;
        denoise_with_profile(&self.stft, signal, strength, bias)
    }
}
