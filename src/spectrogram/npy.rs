//! NumPy `.npy` reader for mel-spectrogram tensors

use crate::{Error, Result};
use ndarray::{ArrayD, IxDyn};

/// Magic bytes opening every NPY file
pub const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Element types accepted for spectrograms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NpyDtype {
    F32,
    F64,
}

impl NpyDtype {
    fn parse(descr: &str) -> Result<Self> {
        match descr {
            "<f4" | "|f4" => Ok(NpyDtype::F32),
            "<f8" | "|f8" => Ok(NpyDtype::F64),
            other => Err(Error::InvalidFormat(format!(
                "unsupported NPY dtype {} (expected little-endian float32/float64)",
                other
            ))),
        }
    }

    fn size(self) -> usize {
        match self {
            NpyDtype::F32 => 4,
            NpyDtype::F64 => 8,
        }
    }
}

/// Decode an in-memory NPY file into an f32 tensor
pub fn parse_npy(bytes: &[u8]) -> Result<ArrayD<f32>> {
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(Error::InvalidFormat("invalid NPY magic number".into()));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(Error::InvalidFormat("truncated NPY header".into()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => {
            return Err(Error::InvalidFormat(format!("unsupported NPY version {}", v)));
        }
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(Error::InvalidFormat("truncated NPY header".into()));
    }
    let header = String::from_utf8_lossy(&bytes[header_start..data_start]);

    let dtype = NpyDtype::parse(&parse_descr(&header)?)?;
    if parse_fortran_order(&header)? {
        return Err(Error::InvalidFormat(
            "Fortran-ordered NPY arrays are not supported".into(),
        ));
    }
    let shape = parse_shape(&header)?;

    let count = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::InvalidFormat(format!("NPY shape {:?} overflows", shape)))?;
    let needed = count
        .checked_mul(dtype.size())
        .ok_or_else(|| Error::InvalidFormat(format!("NPY shape {:?} overflows", shape)))?;
    let data = &bytes[data_start..];
    if data.len() < needed {
        return Err(Error::InvalidFormat(format!(
            "NPY payload has {} bytes, shape {:?} needs {}",
            data.len(),
            shape,
            needed
        )));
    }

    let values: Vec<f32> = match dtype {
        NpyDtype::F32 => data
            .chunks_exact(4)
            .take(count)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        NpyDtype::F64 => data
            .chunks_exact(8)
            .take(count)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32)
            .collect(),
    };

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Value following `'key':` in the header dictionary
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let start = header
        .find(&format!("'{}'", key))
        .or_else(|| header.find(&format!("\"{}\"", key)))
        .ok_or_else(|| Error::InvalidFormat(format!("NPY header has no {}", key)))?;

    let rest = &header[start + key.len() + 2..];
    let colon = rest
        .find(':')
        .ok_or_else(|| Error::InvalidFormat(format!("NPY header: no colon after {}", key)))?;
    Ok(rest[colon + 1..].trim_start())
}

fn parse_descr(header: &str) -> Result<String> {
    let value = header_value(header, "descr")?;
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| Error::InvalidFormat("NPY descr is not a string".into()))?;
    let end = value[1..]
        .find(quote)
        .ok_or_else(|| Error::InvalidFormat("unclosed NPY descr".into()))?;
    Ok(value[1..1 + end].to_string())
}

fn parse_fortran_order(header: &str) -> Result<bool> {
    let value = header_value(header, "fortran_order")?;
    if value.starts_with("True") {
        Ok(true)
    } else if value.starts_with("False") {
        Ok(false)
    } else {
        Err(Error::InvalidFormat("invalid NPY fortran_order".into()))
    }
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let value = header_value(header, "shape")?;
    if !value.starts_with('(') {
        return Err(Error::InvalidFormat("NPY shape is not a tuple".into()));
    }
    let end = value
        .find(')')
        .ok_or_else(|| Error::InvalidFormat("unclosed NPY shape tuple".into()))?;

    value[1..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| Error::InvalidFormat(format!("invalid NPY shape element {}: {}", s, e)))
        })
        .collect()
}
