//! mel2wav - Batch mel-spectrogram to waveform synthesis
//!
//! Runs precomputed mel spectrograms through a pretrained neural vocoder,
//! optionally removes the vocoder's constant spectral bias, and writes each
//! result as a mono 16-bit PCM WAV file.
//!
//! # Features
//! - ONNX vocoder execution on the CPU via tract
//! - Spectral-subtraction denoiser with a lazily measured bias profile
//! - `.npy` and `.safetensors` spectrogram inputs
//! - Sequential batches with abort or continue-on-error policies
//!
//! # Example
//! ```no_run
//! use mel2wav::{BatchRunner, Config};
//! use mel2wav::spectrogram::read_file_list;
//! use mel2wav::vocoder::VocoderCheckpoint;
//!
//! let config = Config::load("config.yaml").unwrap();
//! let vocoder = VocoderCheckpoint::load("waveglow.onnx", &config.runtime, 80)
//!     .and_then(|c| c.prepare_for_inference(&config.runtime))
//!     .unwrap();
//!
//! let runner = BatchRunner::new(vocoder, config).unwrap();
//! let files = read_file_list("mels.txt").unwrap();
//! runner.run(&files).unwrap();
//! ```

// Allow traditional for loops - often clearer for audio DSP code
#![allow(clippy::needless_range_loop)]

pub mod audio;
pub mod config;
pub mod denoise;
pub mod error;
pub mod pipeline;
pub mod spectrogram;
pub mod vocoder;

pub use config::Config;
pub use denoise::Denoiser;
pub use error::{Error, Result};
pub use pipeline::{BatchReport, BatchRunner, FailurePolicy};
pub use vocoder::Vocoder;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate written to output WAV headers
pub const SAMPLE_RATE: u32 = 22050;

/// Default number of mel filterbank channels
pub const N_MELS: usize = 80;

/// Default FFT size of the denoiser STFT
pub const FILTER_LENGTH: usize = 1024;

/// Default number of overlapping frames per sample (hop = 1024 / 4)
pub const N_OVERLAP: usize = 4;

/// Default window size
pub const WIN_LENGTH: usize = 1024;

/// Frames in the reference spectrogram used to measure vocoder bias
pub const BIAS_REFERENCE_FRAMES: usize = 88;

/// Appended to the input file stem to name the output
pub const OUTPUT_SUFFIX: &str = "_synthesis";
