//! Signal statistics used for progress reporting and inspection

/// Compute RMS energy
pub fn compute_rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|x| x * x).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Compute peak amplitude
pub fn compute_peak(signal: &[f32]) -> f32 {
    signal.iter().map(|x| x.abs()).fold(0.0f32, f32::max)
}

/// Convert a linear amplitude to dBFS, floored at -120 dB
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.max(1e-6).log10()
}

/// Energy removed by a processing step, in dB (positive means quieter)
pub fn attenuation_db(before: &[f32], after: &[f32]) -> f32 {
    amplitude_to_db(compute_rms(before)) - amplitude_to_db(compute_rms(after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_and_peak() {
        let signal = [0.5f32, -0.5, 0.5, -0.5];
        assert!((compute_rms(&signal) - 0.5).abs() < 1e-6);
        assert_eq!(compute_peak(&[0.1, -0.8, 0.3]), 0.8);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn test_db_conversion() {
        assert!(amplitude_to_db(1.0).abs() < 1e-6);
        assert!((amplitude_to_db(0.5) + 6.0206).abs() < 1e-3);
        assert!((amplitude_to_db(0.0) + 120.0).abs() < 1e-3);
    }

    #[test]
    fn test_attenuation() {
        let before = vec![0.5f32; 100];
        let after = vec![0.25f32; 100];
        assert!((attenuation_db(&before, &after) - 6.0206).abs() < 1e-3);
    }
}
