//! Mel-spectrogram loading and shape validation
//!
//! Spectrograms arrive as `.npy` or `.safetensors` tensors. Leading (or any)
//! singleton axes are squeezed away; whatever remains must be exactly
//! `(n_mel_bins, n_frames)`.

mod npy;

pub use npy::parse_npy;

use crate::{Error, Result};
use ndarray::{Array2, ArrayD, Ix2, IxDyn};
use std::path::{Path, PathBuf};

/// Name looked up first when a safetensors file holds several tensors
pub const SAFETENSORS_KEY: &str = "mel";

/// Read a file list: one spectrogram path per line, blank lines skipped
pub fn read_file_list<P: AsRef<Path>>(path: P) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Drop singleton axes from a tensor of rank > 2 and require rank 2
pub fn squeeze_to_2d(tensor: ArrayD<f32>) -> Result<Array2<f32>> {
    let original: Vec<usize> = tensor.shape().to_vec();

    let tensor = if tensor.ndim() > 2 {
        let squeezed: Vec<usize> = original.iter().copied().filter(|&d| d != 1).collect();
        let tensor = tensor
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&squeezed))?;
        log::debug!("squeezed {:?} to {:?}", original, squeezed);
        tensor
    } else {
        tensor
    };

    if tensor.ndim() != 2 {
        return Err(Error::Shape(format!(
            "spectrogram of shape {:?} is not reducible to 2 dimensions",
            original
        )));
    }

    Ok(tensor.into_dimensionality::<Ix2>()?)
}

/// Decode a safetensors file, preferring the tensor named `mel`
fn parse_safetensors(bytes: &[u8]) -> Result<ArrayD<f32>> {
    let tensors = safetensors::SafeTensors::deserialize(bytes)?;

    let name = if tensors.names().iter().any(|n| n.as_str() == SAFETENSORS_KEY) {
        SAFETENSORS_KEY.to_string()
    } else {
        let names = tensors.names();
        match names.as_slice() {
            [only] => only.to_string(),
            _ => {
                return Err(Error::InvalidFormat(format!(
                    "safetensors file holds {} tensors and none is named '{}'",
                    names.len(),
                    SAFETENSORS_KEY
                )))
            }
        }
    };

    let view = tensors.tensor(&name)?;
    let data: Vec<f32> = match view.dtype() {
        safetensors::Dtype::F32 => view
            .data()
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        safetensors::Dtype::F64 => view
            .data()
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
        other => {
            return Err(Error::InvalidFormat(format!(
                "tensor '{}' has unsupported dtype {:?}",
                name, other
            )))
        }
    };

    Ok(ArrayD::from_shape_vec(IxDyn(view.shape()), data)?)
}

/// Decode a tensor file by its content
pub fn parse_tensor(bytes: &[u8]) -> Result<ArrayD<f32>> {
    if bytes.starts_with(npy::NPY_MAGIC) {
        parse_npy(bytes)
    } else if bytes.starts_with(b"PK\x03\x04") {
        Err(Error::InvalidFormat(
            "serialized PyTorch tensors are not supported; export to .npy or .safetensors".into(),
        ))
    } else {
        parse_safetensors(bytes)
    }
}

/// Resolves spectrogram files into validated 2-D tensors
#[derive(Debug, Clone, Default)]
pub struct SpectrogramSource {
    expected_mels: Option<usize>,
}

impl SpectrogramSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require loaded spectrograms to have this many mel bins
    pub fn with_mel_channels(mut self, n_mels: usize) -> Self {
        self.expected_mels = Some(n_mels);
        self
    }

    /// Load, squeeze and validate one spectrogram
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Array2<f32>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        let tensor = parse_tensor(&bytes)
            .map_err(|e| match e {
                Error::InvalidFormat(msg) => {
                    Error::InvalidFormat(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;

        let mel = squeeze_to_2d(tensor)?;
        self.validate(&mel)?;

        log::debug!(
            "Loaded {}: {} mel bins x {} frames",
            path.display(),
            mel.nrows(),
            mel.ncols()
        );
        Ok(mel)
    }

    /// Check mel bin count and frame count
    pub fn validate(&self, mel: &Array2<f32>) -> Result<()> {
        if let Some(expected) = self.expected_mels {
            if mel.nrows() != expected {
                return Err(Error::Shape(format!(
                    "expected {} mel bins, got {} (shape {:?})",
                    expected,
                    mel.nrows(),
                    mel.dim()
                )));
            }
        }
        if mel.ncols() == 0 {
            return Err(Error::Shape("spectrogram has no frames".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::npy::tests::npy_bytes;
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mel2wav_spec_{}", name))
    }

    #[test]
    fn test_squeeze_leading_singleton() {
        let tensor = ArrayD::<f32>::zeros(IxDyn(&[1, 80, 200]));
        let mel = squeeze_to_2d(tensor).unwrap();
        assert_eq!(mel.dim(), (80, 200));
    }

    #[test]
    fn test_squeeze_rejects_batch_of_two() {
        let tensor = ArrayD::<f32>::zeros(IxDyn(&[2, 80, 200]));
        assert!(matches!(squeeze_to_2d(tensor), Err(Error::Shape(_))));
    }

    #[test]
    fn test_squeeze_rejects_collapsed_axes() {
        let tensor = ArrayD::<f32>::zeros(IxDyn(&[1, 80, 1]));
        assert!(matches!(squeeze_to_2d(tensor), Err(Error::Shape(_))));

        let tensor = ArrayD::<f32>::zeros(IxDyn(&[200]));
        assert!(matches!(squeeze_to_2d(tensor), Err(Error::Shape(_))));
    }

    #[test]
    fn test_two_dimensional_untouched() {
        let tensor = ArrayD::<f32>::zeros(IxDyn(&[80, 1]));
        let mel = squeeze_to_2d(tensor).unwrap();
        assert_eq!(mel.dim(), (80, 1));
    }

    #[test]
    fn test_squeeze_preserves_values() {
        let data: Vec<f32> = (0..6).map(|i| i as f32).collect();
        let tensor = ArrayD::from_shape_vec(IxDyn(&[1, 2, 1, 3]), data).unwrap();
        let mel = squeeze_to_2d(tensor).unwrap();
        assert_eq!(mel.dim(), (2, 3));
        assert_eq!(mel[[1, 0]], 3.0);
    }

    #[test]
    fn test_read_file_list() {
        let path = temp_path("list.txt");
        std::fs::write(&path, "a.npy\n\nsub/b.npy  \r\nc.safetensors").unwrap();

        let files = read_file_list(&path).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("a.npy"),
                PathBuf::from("sub/b.npy"),
                PathBuf::from("c.safetensors")
            ]
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_npy_with_channel_check() {
        let path = temp_path("load.npy");
        let data = vec![0.5f32; 80 * 12];
        std::fs::write(&path, npy_bytes(&[1, 80, 12], &data)).unwrap();

        let mel = SpectrogramSource::new().with_mel_channels(80).load(&path).unwrap();
        assert_eq!(mel.dim(), (80, 12));

        let result = SpectrogramSource::new().with_mel_channels(64).load(&path);
        assert!(matches!(result, Err(Error::Shape(_))));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing() {
        let result = SpectrogramSource::new().load(temp_path("missing.npy"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_torch_pickle_rejected() {
        let result = parse_tensor(b"PK\x03\x04archive");
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_safetensors() {
        let data: Vec<u8> = (0..8).flat_map(|i| (i as f32).to_le_bytes()).collect();
        let view = safetensors::tensor::TensorView::new(safetensors::Dtype::F32, vec![2, 4], &data).unwrap();
        let bytes = safetensors::serialize(vec![("mel", view)], &None).unwrap();

        let tensor = parse_tensor(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[2, 4]);
        assert_eq!(tensor[[1, 3]], 7.0);
    }
}
