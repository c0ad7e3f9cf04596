//! Audio processing module for mel2wav
//!
//! Provides the STFT used by bias removal, 16-bit PCM quantization and WAV I/O.

mod dsp;
mod io;
pub mod pcm;
pub mod stft;

pub use dsp::{amplitude_to_db, attenuation_db, compute_peak, compute_rms};
pub use io::{read_wav, write_wav};
pub use pcm::{count_out_of_range, encode, PcmWaveform, Quantization, MAX_WAV_VALUE};
pub use stft::{Spectrum, Stft, StftParams};
