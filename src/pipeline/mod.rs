//! Batch orchestration
//!
//! Drives spectrogram files one at a time through loading, vocoding, optional
//! bias removal and PCM encoding. Outputs are named after their inputs and
//! written in input order.

mod synthesis;

pub use synthesis::{BatchRunner, SynthesisResult};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the batch does after a file fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first error and return it
    #[default]
    Abort,
    /// Log the error, record the file as failed, keep going
    Continue,
}

/// A file that could not be synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct FailedItem {
    pub input: PathBuf,
    pub kind: &'static str,
    pub message: String,
}

/// Outcome of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Results for every written file
    pub results: Vec<SynthesisResult>,
    /// Files that failed under `FailurePolicy::Continue`
    pub failures: Vec<FailedItem>,
    /// Set when the cancel flag stopped the batch early
    pub cancelled: bool,
}

impl BatchReport {
    /// Paths of the written WAV files
    pub fn outputs(&self) -> Vec<&Path> {
        self.results.iter().map(|r| r.output.as_path()).collect()
    }

    /// True when every requested file was written
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Seconds of audio produced across the batch
    pub fn total_audio_seconds(&self) -> f32 {
        self.results.iter().map(|r| r.duration).sum()
    }

    /// Seconds spent synthesizing across the batch
    pub fn total_processing_seconds(&self) -> f32 {
        self.results.iter().map(|r| r.processing_time).sum()
    }
}

/// `{output_dir}/{stem}_synthesis.wav` for an input spectrogram path
pub fn output_path_for<P: AsRef<Path>, Q: AsRef<Path>>(output_dir: P, input: Q) -> PathBuf {
    let stem = input
        .as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output_dir
        .as_ref()
        .join(format!("{}{}.wav", stem, crate::OUTPUT_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_uses_stem() {
        assert_eq!(
            output_path_for("out", "mels/LJ001-0001.npy"),
            PathBuf::from("out/LJ001-0001_synthesis.wav")
        );
        assert_eq!(
            output_path_for("/tmp/x", "a.b.safetensors"),
            PathBuf::from("/tmp/x/a.b_synthesis.wav")
        );
        assert_eq!(
            output_path_for("out", "noext"),
            PathBuf::from("out/noext_synthesis.wav")
        );
    }

    #[test]
    fn test_failure_policy_serde() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
        let yaml = serde_yaml::to_string(&FailurePolicy::Continue).unwrap();
        assert_eq!(yaml.trim(), "continue");
        let parsed: FailurePolicy = serde_yaml::from_str("abort").unwrap();
        assert_eq!(parsed, FailurePolicy::Abort);
    }

    #[test]
    fn test_empty_report() {
        let report = BatchReport::default();
        assert!(report.is_success());
        assert!(report.outputs().is_empty());
        assert_eq!(report.total_audio_seconds(), 0.0);
    }

    #[test]
    fn test_report_with_failure() {
        let report = BatchReport {
            results: Vec::new(),
            failures: vec![FailedItem {
                input: PathBuf::from("a.npy"),
                kind: "shape",
                message: "bad".into(),
            }],
            cancelled: false,
        };
        assert!(!report.is_success());
    }
}
