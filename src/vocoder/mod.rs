//! Vocoder module for mel-spectrogram to waveform conversion
//!
//! The vocoder network is an opaque capability: it maps a mel spectrogram and
//! a noise scale to raw audio. Everything downstream only sees this trait.

mod onnx;

pub use onnx::{OnnxVocoder, VocoderCheckpoint};

use crate::Result;
use ndarray::Array2;

/// Vocoder trait for mel-to-waveform conversion
pub trait Vocoder {
    /// Convert a `(n_mels, frames)` spectrogram to a waveform in roughly [-1, 1]
    ///
    /// `sigma` scales the vocoder's stochastic component; 0 asks for its
    /// deterministic output.
    fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>>;

    /// Number of mel bins the vocoder consumes
    fn n_mel_channels(&self) -> usize;
}

impl<V: Vocoder + ?Sized> Vocoder for &V {
    fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>> {
        (**self).infer(mel, sigma)
    }

    fn n_mel_channels(&self) -> usize {
        (**self).n_mel_channels()
    }
}

impl<V: Vocoder + ?Sized> Vocoder for Box<V> {
    fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>> {
        (**self).infer(mel, sigma)
    }

    fn n_mel_channels(&self) -> usize {
        (**self).n_mel_channels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant;

    impl Vocoder for Constant {
        fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>> {
            Ok(vec![sigma; mel.ncols() * 4])
        }

        fn n_mel_channels(&self) -> usize {
            80
        }
    }

    #[test]
    fn test_boxed_and_borrowed_dispatch() {
        let boxed: Box<dyn Vocoder> = Box::new(Constant);
        let mel = Array2::zeros((80, 3));

        assert_eq!(boxed.infer(&mel, 0.5).unwrap(), vec![0.5; 12]);
        assert_eq!((&boxed).n_mel_channels(), 80);
    }
}
