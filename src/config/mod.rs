//! Configuration management for mel2wav

use crate::audio::Quantization;
use crate::denoise::BiasMode;
use crate::pipeline::FailurePolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration for mel2wav
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vocoder model configuration
    pub vocoder: VocoderConfig,
    /// Compute device and precision
    pub runtime: RuntimeConfig,
    /// Bias removal configuration
    pub denoiser: DenoiserConfig,
    /// Output waveform configuration
    pub output: OutputConfig,
    /// Batch behaviour
    pub batch: BatchConfig,
}

/// Vocoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocoderConfig {
    /// Path to the ONNX export of the vocoder
    pub checkpoint: Option<PathBuf>,
    /// Noise scale passed to the vocoder
    pub sigma: f32,
    /// Number of mel channels the vocoder expects
    pub n_mel_channels: usize,
}

/// Process-wide compute settings.
///
/// Threaded explicitly through model loading, bias estimation and the batch
/// runner instead of living in global state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Compute device
    pub device: Device,
    /// Numeric precision
    pub precision: Precision,
}

/// Compute device selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
    Mps,
}

/// Numeric precision of vocoder execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Full,
    Half,
}

/// Bias removal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiserConfig {
    /// Subtraction strength (0 disables the denoiser)
    pub strength: f32,
    /// FFT size
    pub filter_length: usize,
    /// Frames overlapping each sample (hop = filter_length / n_overlap)
    pub n_overlap: usize,
    /// Window length
    pub win_length: usize,
    /// Frames in the reference spectrogram used for bias estimation
    pub reference_frames: usize,
    /// Content of the reference spectrogram
    pub bias_mode: BiasMode,
}

/// Output waveform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `<stem>_synthesis.wav` files
    pub dir: PathBuf,
    /// Sampling rate written to the WAV header (no resampling)
    pub sampling_rate: u32,
    /// Float to i16 overflow handling
    pub quantization: Quantization,
}

/// Batch behaviour configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// What to do when a file fails
    pub failure_policy: FailurePolicy,
}

impl Default for VocoderConfig {
    fn default() -> Self {
        Self {
            checkpoint: None,
            sigma: 1.0,
            n_mel_channels: crate::N_MELS,
        }
    }
}

impl Default for DenoiserConfig {
    fn default() -> Self {
        Self {
            strength: 0.0,
            filter_length: crate::FILTER_LENGTH,
            n_overlap: crate::N_OVERLAP,
            win_length: crate::WIN_LENGTH,
            reference_frames: crate::BIAS_REFERENCE_FRAMES,
            bias_mode: BiasMode::Zeros,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            sampling_rate: crate::SAMPLE_RATE,
            quantization: Quantization::Clamp,
        }
    }
}

impl DenoiserConfig {
    /// Hop length derived from the overlap factor
    pub fn hop_length(&self) -> usize {
        self.filter_length / self.n_overlap.max(1)
    }

    /// Whether bias removal runs at all
    pub fn enabled(&self) -> bool {
        self.strength > 0.0
    }
}

impl Device {
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(index) => write!(f, "cuda:{}", index),
            Device::Mps => write!(f, "mps"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "mps" => Ok(Device::Mps),
            "cuda" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(index) => index
                    .parse::<usize>()
                    .map(Device::Cuda)
                    .map_err(|_| Error::Config(format!("Invalid CUDA device index: {}", index))),
                None => Err(Error::Config(format!("Unknown device: {}", other))),
            },
        }
    }
}

impl TryFrom<String> for Device {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Device> for String {
    fn from(device: Device) -> Self {
        device.to_string()
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.vocoder.sigma.is_finite() || self.vocoder.sigma < 0.0 {
            return Err(Error::Config("sigma must be finite and >= 0".into()));
        }
        if self.vocoder.n_mel_channels == 0 {
            return Err(Error::Config("n_mel_channels must be > 0".into()));
        }

        let denoiser = &self.denoiser;
        if !denoiser.strength.is_finite() || denoiser.strength < 0.0 {
            return Err(Error::Config(
                "denoiser strength must be finite and >= 0".into(),
            ));
        }
        if denoiser.filter_length < 2 {
            return Err(Error::Config("filter_length must be >= 2".into()));
        }
        if denoiser.n_overlap == 0 || denoiser.filter_length % denoiser.n_overlap != 0 {
            return Err(Error::Config(
                "filter_length must be divisible by n_overlap".into(),
            ));
        }
        if denoiser.win_length == 0 || denoiser.win_length > denoiser.filter_length {
            return Err(Error::Config(
                "win_length must be in 1..=filter_length".into(),
            ));
        }
        if denoiser.reference_frames == 0 {
            return Err(Error::Config("reference_frames must be > 0".into()));
        }

        if self.output.sampling_rate == 0 {
            return Err(Error::Config("Sample rate must be > 0".into()));
        }

        if !self.runtime.device.is_cpu() {
            log::warn!(
                "Device {} requested; the ONNX backend executes on the CPU",
                self.runtime.device
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.vocoder.sigma, 1.0);
        assert_eq!(config.output.sampling_rate, 22050);
        assert_eq!(config.denoiser.strength, 0.0);
        assert!(!config.denoiser.enabled());
        assert_eq!(config.denoiser.hop_length(), 256);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA:1".parse::<Device>().unwrap(), Device::Cuda(1));
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("mps".parse::<Device>().unwrap(), Device::Mps);
        assert!("tpu".parse::<Device>().is_err());
        assert!("cuda:x".parse::<Device>().is_err());
        assert_eq!(Device::Cuda(2).to_string(), "cuda:2");
    }

    #[test]
    fn test_rejects_negative_strength() {
        let mut config = Config::default();
        config.denoiser.strength = -0.1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_uneven_overlap() {
        let mut config = Config::default();
        config.denoiser.n_overlap = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.runtime.device = Device::Cuda(1);
        config.denoiser.strength = 0.1;
        config.output.quantization = Quantization::Wrap;

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("cuda:1"));

        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.runtime.device, Device::Cuda(1));
        assert_eq!(parsed.denoiser.strength, 0.1);
        assert_eq!(parsed.output.quantization, Quantization::Wrap);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: Config = serde_yaml::from_str("denoiser:\n  strength: 0.2\n").unwrap();
        assert_eq!(parsed.denoiser.strength, 0.2);
        assert_eq!(parsed.denoiser.filter_length, 1024);
        assert_eq!(parsed.vocoder.sigma, 1.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/mel2wav.yaml");
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
