//! ONNX vocoder backend running on tract
//!
//! Loading is split in two steps. `VocoderCheckpoint::load` parses the graph;
//! `prepare_for_inference` consumes it, folds normalization parameters into
//! the neighbouring ops and produces a runnable `OnnxVocoder`. Because the
//! checkpoint is moved, preparation can only ever happen once.
//!
//! Graph contract: input 0 is the mel spectrogram `[1, n_mels, frames]`, an
//! optional input 1 is `sigma` as a one-element f32 tensor, output 0 is the
//! audio (any shape, flattened).

use crate::config::{Precision, RuntimeConfig};
use crate::{Error, Result};
use ndarray::Array2;
use std::fmt;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

use super::Vocoder;

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// Parsed but not yet optimized vocoder graph
pub struct VocoderCheckpoint {
    model: InferenceModel,
    path: PathBuf,
    n_mel_channels: usize,
}

impl fmt::Debug for VocoderCheckpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VocoderCheckpoint")
            .field("path", &self.path)
            .field("inputs", &self.model.inputs.len())
            .field("outputs", &self.model.outputs.len())
            .finish()
    }
}

impl VocoderCheckpoint {
    /// Parse an ONNX vocoder export
    ///
    /// Checkpoints produced on an accelerator load fine here; execution is
    /// always mapped onto the CPU backend.
    pub fn load<P: AsRef<Path>>(path: P, runtime: &RuntimeConfig, n_mel_channels: usize) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelLoading(format!(
                "checkpoint not found: {}",
                path.display()
            )));
        }

        log::info!("Loading vocoder from: {}", path.display());

        if !runtime.device.is_cpu() {
            log::warn!(
                "Requested device {} is not available to the ONNX backend; using cpu",
                runtime.device
            );
        }

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| Error::ModelLoading(format!("{}: {}", path.display(), e)))?;

        match model.inputs.len() {
            1 | 2 => {}
            n => {
                return Err(Error::ModelLoading(format!(
                    "{}: expected 1 or 2 graph inputs (mel[, sigma]), found {}",
                    path.display(),
                    n
                )))
            }
        }
        if model.outputs.is_empty() {
            return Err(Error::ModelLoading(format!(
                "{}: graph has no outputs",
                path.display()
            )));
        }

        Ok(Self {
            model,
            path: path.to_path_buf(),
            n_mel_channels,
        })
    }

    /// Whether the graph takes `sigma` as a second input
    pub fn accepts_sigma(&self) -> bool {
        self.model.inputs.len() == 2
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Optimize the graph (fusing normalization layers) and make it runnable
    pub fn prepare_for_inference(self, runtime: &RuntimeConfig) -> Result<OnnxVocoder> {
        let accepts_sigma = self.accepts_sigma();
        if !accepts_sigma {
            log::warn!(
                "{} has no sigma input; the noise scale is fixed by the export",
                self.path.display()
            );
        }
        if runtime.precision == Precision::Half {
            log::warn!("Half precision requested; the CPU backend runs in f32");
        }

        let plan = self
            .model
            .into_optimized()
            .map_err(|e| Error::ModelLoading(format!("Failed to optimize graph: {}", e)))?
            .into_runnable()
            .map_err(|e| Error::ModelLoading(format!("Failed to build plan: {}", e)))?;

        log::debug!("Vocoder prepared for inference ({})", self.path.display());

        Ok(OnnxVocoder {
            plan,
            accepts_sigma,
            n_mel_channels: self.n_mel_channels,
        })
    }
}

/// Runnable ONNX vocoder
pub struct OnnxVocoder {
    plan: OnnxPlan,
    accepts_sigma: bool,
    n_mel_channels: usize,
}

impl fmt::Debug for OnnxVocoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxVocoder")
            .field("accepts_sigma", &self.accepts_sigma)
            .field("n_mel_channels", &self.n_mel_channels)
            .finish()
    }
}

impl Vocoder for OnnxVocoder {
    fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>> {
        if mel.nrows() != self.n_mel_channels {
            return Err(Error::Inference(format!(
                "vocoder expects {} mel channels, got {}",
                self.n_mel_channels,
                mel.nrows()
            )));
        }

        let data: Vec<f32> = mel.iter().copied().collect();
        let input = Tensor::from_shape(&[1, mel.nrows(), mel.ncols()], &data)
            .map_err(|e| Error::Inference(e.to_string()))?;

        let mut inputs: TVec<TValue> = tvec!(input.into());
        if self.accepts_sigma {
            inputs.push(tensor1(&[sigma]).into());
        }

        let outputs = self
            .plan
            .run(inputs)
            .map_err(|e| Error::Inference(e.to_string()))?;

        let audio = outputs
            .first()
            .ok_or_else(|| Error::Inference("Missing audio output".into()))?
            .to_array_view::<f32>()
            .map_err(|e| Error::Inference(e.to_string()))?;

        let samples: Vec<f32> = audio.iter().copied().collect();
        if samples.is_empty() {
            return Err(Error::Inference("vocoder produced no samples".into()));
        }
        Ok(samples)
    }

    fn n_mel_channels(&self) -> usize {
        self.n_mel_channels
    }
}
