//! Short-Time Fourier Transform with magnitude/phase split and exact inverse
//!
//! Frames are centred: the signal is reflect-padded by `filter_length / 2` on
//! both sides before framing, and the padding is removed again on inversion.
//! With a periodic Hann window and windowed overlap-add normalised by the
//! summed squared window, `inverse(transform(x))` reproduces `x` sample for
//! sample (up to float rounding) and always has the input's length.

use crate::{Error, Result};
use ndarray::Array2;
use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

/// Transform parameters; bias estimation and denoising must share them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StftParams {
    /// FFT size
    pub filter_length: usize,
    /// Hop length between frames
    pub hop_length: usize,
    /// Window length (centre-padded to `filter_length`)
    pub win_length: usize,
}

impl Default for StftParams {
    fn default() -> Self {
        Self {
            filter_length: crate::FILTER_LENGTH,
            hop_length: crate::FILTER_LENGTH / crate::N_OVERLAP,
            win_length: crate::WIN_LENGTH,
        }
    }
}

impl StftParams {
    /// Number of frequency bins (`filter_length / 2 + 1`)
    pub fn n_freqs(&self) -> usize {
        self.filter_length / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn num_frames(&self, len: usize) -> usize {
        len / self.hop_length + 1
    }

    fn validate(&self) -> Result<()> {
        if self.filter_length < 2 {
            return Err(Error::Config("filter_length must be >= 2".into()));
        }
        if self.hop_length == 0 || self.hop_length > self.filter_length {
            return Err(Error::Config(
                "hop_length must be in 1..=filter_length".into(),
            ));
        }
        if self.win_length == 0 || self.win_length > self.filter_length {
            return Err(Error::Config(
                "win_length must be in 1..=filter_length".into(),
            ));
        }
        Ok(())
    }
}

/// Polar form of a short-time spectrum, both matrices shaped (n_freqs, frames)
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub magnitude: Array2<f32>,
    pub phase: Array2<f32>,
}

impl Spectrum {
    pub fn num_frames(&self) -> usize {
        self.magnitude.ncols()
    }
}

/// Planned forward/inverse STFT for one parameter set
pub struct Stft {
    params: StftParams,
    window: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl fmt::Debug for Stft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stft").field("params", &self.params).finish()
    }
}

/// Periodic Hann window of `win_length`, zero-padded symmetrically to `n_fft`
fn padded_hann_window(win_length: usize, n_fft: usize) -> Vec<f32> {
    let mut window = vec![0.0f32; n_fft];
    let offset = (n_fft - win_length) / 2;
    for n in 0..win_length {
        window[offset + n] = 0.5 * (1.0 - (2.0 * PI * n as f32 / win_length as f32).cos());
    }
    window
}

/// Mirror an index into `0..len` without repeating the edge sample
fn reflect_index(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let m = index.rem_euclid(period);
    if m >= len as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

impl Stft {
    /// Plan FFTs for the given parameters
    pub fn new(params: StftParams) -> Result<Self> {
        params.validate()?;

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(params.filter_length);
        let inverse = planner.plan_fft_inverse(params.filter_length);

        Ok(Self {
            params,
            window: padded_hann_window(params.win_length, params.filter_length),
            forward,
            inverse,
        })
    }

    pub fn params(&self) -> &StftParams {
        &self.params
    }

    /// Analysis/synthesis window (length `filter_length`)
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Compute the centred STFT of `signal` as magnitude and phase
    pub fn transform(&self, signal: &[f32]) -> Result<Spectrum> {
        if signal.is_empty() {
            return Err(Error::Audio("Empty signal".into()));
        }

        let n_fft = self.params.filter_length;
        let hop = self.params.hop_length;
        let pad = (n_fft / 2) as isize;
        let n_freqs = self.params.n_freqs();
        let num_frames = self.params.num_frames(signal.len());

        let mut magnitude = Array2::zeros((n_freqs, num_frames));
        let mut phase = Array2::zeros((n_freqs, num_frames));

        let mut input_buffer = self.forward.make_input_vec();
        let mut output_buffer = self.forward.make_output_vec();

        for frame_idx in 0..num_frames {
            let start = (frame_idx * hop) as isize - pad;

            for (i, slot) in input_buffer.iter_mut().enumerate() {
                let src = reflect_index(start + i as isize, signal.len());
                *slot = signal[src] * self.window[i];
            }

            self.forward
                .process(&mut input_buffer, &mut output_buffer)
                .map_err(|e| Error::Audio(format!("FFT failed: {}", e)))?;

            for (freq_idx, value) in output_buffer.iter().enumerate() {
                magnitude[[freq_idx, frame_idx]] = value.norm();
                phase[[freq_idx, frame_idx]] = value.arg();
            }
        }

        Ok(Spectrum { magnitude, phase })
    }

    /// Rebuild `length` samples from magnitude and phase via overlap-add
    pub fn inverse(&self, magnitude: &Array2<f32>, phase: &Array2<f32>, length: usize) -> Result<Vec<f32>> {
        let n_fft = self.params.filter_length;
        let hop = self.params.hop_length;
        let n_freqs = self.params.n_freqs();

        if magnitude.dim() != phase.dim() {
            return Err(Error::Shape(format!(
                "magnitude {:?} and phase {:?} differ",
                magnitude.dim(),
                phase.dim()
            )));
        }
        if magnitude.nrows() != n_freqs {
            return Err(Error::Shape(format!(
                "expected {} frequency bins, got {}",
                n_freqs,
                magnitude.nrows()
            )));
        }

        let num_frames = magnitude.ncols();
        if num_frames == 0 {
            return Ok(vec![0.0; length]);
        }

        let padded_len = (num_frames - 1) * hop + n_fft;
        let mut output = vec![0.0f32; padded_len];
        let mut window_sum = vec![0.0f32; padded_len];

        let mut spectrum_buffer = self.inverse.make_input_vec();
        let mut frame_buffer = self.inverse.make_output_vec();
        let scale = 1.0 / n_fft as f32;

        for frame_idx in 0..num_frames {
            for (freq_idx, bin) in spectrum_buffer.iter_mut().enumerate() {
                *bin = Complex::from_polar(
                    magnitude[[freq_idx, frame_idx]],
                    phase[[freq_idx, frame_idx]],
                );
            }
            // DC and Nyquist bins of a real signal carry no imaginary part
            spectrum_buffer[0].im = 0.0;
            if n_fft % 2 == 0 {
                spectrum_buffer[n_freqs - 1].im = 0.0;
            }

            self.inverse
                .process(&mut spectrum_buffer, &mut frame_buffer)
                .map_err(|e| Error::Audio(format!("Inverse FFT failed: {}", e)))?;

            let start = frame_idx * hop;
            for i in 0..n_fft {
                let w = self.window[i];
                output[start + i] += frame_buffer[i] * scale * w;
                window_sum[start + i] += w * w;
            }
        }

        for (sample, &norm) in output.iter_mut().zip(window_sum.iter()) {
            if norm > f32::MIN_POSITIVE {
                *sample /= norm;
            }
        }

        let pad = n_fft / 2;
        let mut signal: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        signal.resize(length, 0.0);
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, freq: f32, sr: f32) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr).sin())
            .collect()
    }

    #[test]
    fn test_window_shape() {
        let window = padded_hann_window(1024, 1024);
        assert_eq!(window.len(), 1024);
        assert!(window[0].abs() < 1e-6);
        assert!((window[512] - 1.0).abs() < 1e-4);

        let narrow = padded_hann_window(512, 1024);
        assert_eq!(narrow[..256].iter().filter(|w| **w != 0.0).count(), 0);
        assert!((narrow[256 + 256] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_reflect_index() {
        // signal [a b c d]: reflect pad of 2 gives [c b | a b c d | c b]
        assert_eq!(reflect_index(-2, 4), 2);
        assert_eq!(reflect_index(-1, 4), 1);
        assert_eq!(reflect_index(0, 4), 0);
        assert_eq!(reflect_index(3, 4), 3);
        assert_eq!(reflect_index(4, 4), 2);
        assert_eq!(reflect_index(5, 4), 1);
        assert_eq!(reflect_index(-7, 1), 0);
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::new(StftParams::default()).unwrap();
        let spectrum = stft.transform(&vec![0.1f32; 2048]).unwrap();
        assert_eq!(spectrum.magnitude.shape(), &[513, 9]);
        assert_eq!(spectrum.phase.shape(), &[513, 9]);
    }

    #[test]
    fn test_roundtrip_reconstruction() {
        let stft = Stft::new(StftParams::default()).unwrap();
        let signal = sine(5000, 440.0, 22050.0);

        let spectrum = stft.transform(&signal).unwrap();
        let rebuilt = stft.inverse(&spectrum.magnitude, &spectrum.phase, signal.len()).unwrap();

        assert_eq!(rebuilt.len(), signal.len());
        let max_err = signal
            .iter()
            .zip(rebuilt.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 1e-4, "max reconstruction error {}", max_err);
    }

    #[test]
    fn test_roundtrip_short_signal() {
        let stft = Stft::new(StftParams::default()).unwrap();
        let signal = sine(300, 1000.0, 22050.0);

        let spectrum = stft.transform(&signal).unwrap();
        let rebuilt = stft.inverse(&spectrum.magnitude, &spectrum.phase, signal.len()).unwrap();
        assert_eq!(rebuilt.len(), 300);
    }

    #[test]
    fn test_sine_peak_bin() {
        let stft = Stft::new(StftParams::default()).unwrap();
        // Frequency placed exactly on bin 40
        let freq = 40.0 * 22050.0 / 1024.0;
        let spectrum = stft.transform(&sine(8192, freq, 22050.0)).unwrap();

        let column = spectrum.magnitude.column(4);
        let peak = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 40);
    }

    #[test]
    fn test_empty_signal_rejected() {
        let stft = Stft::new(StftParams::default()).unwrap();
        assert!(stft.transform(&[]).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let params = StftParams {
            filter_length: 1024,
            hop_length: 0,
            win_length: 1024,
        };
        assert!(Stft::new(params).is_err());
    }
}
