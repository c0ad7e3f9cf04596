//! Per-file synthesis and the sequential batch loop

use crate::{
    audio::{attenuation_db, count_out_of_range, encode, write_wav},
    config::Config,
    denoise::Denoiser,
    spectrogram::SpectrogramSource,
    vocoder::Vocoder,
    Result,
};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{output_path_for, BatchReport, FailedItem, FailurePolicy};

/// Synthesis result for one spectrogram file
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Spectrogram the audio was generated from
    pub input: PathBuf,
    /// Written WAV file
    pub output: PathBuf,
    /// Number of PCM samples written
    pub samples: usize,
    /// Sample rate in the WAV header
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f32,
    /// Processing time in seconds
    pub processing_time: f32,
    /// Real-time factor
    pub rtf: f32,
    /// Samples that fell outside the 16-bit range before quantization
    pub out_of_range: usize,
}

impl SynthesisResult {
    /// Get duration formatted as MM:SS
    pub fn duration_formatted(&self) -> String {
        let minutes = (self.duration / 60.0) as u32;
        let seconds = (self.duration % 60.0) as u32;
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Sequential spectrogram-to-WAV batch driver
///
/// Owns the vocoder for the lifetime of the batch. The denoiser, when
/// enabled, measures the vocoder bias on first use and reuses it for every
/// later file.
pub struct BatchRunner<V: Vocoder> {
    vocoder: V,
    source: SpectrogramSource,
    denoiser: Option<Denoiser>,
    config: Config,
    cancel: Option<Arc<AtomicBool>>,
}

impl<V: Vocoder> BatchRunner<V> {
    /// Create a runner from a prepared vocoder and a configuration
    pub fn new(vocoder: V, config: Config) -> Result<Self> {
        config.validate()?;

        if vocoder.n_mel_channels() != config.vocoder.n_mel_channels {
            log::warn!(
                "Configured for {} mel channels but the vocoder takes {}; using the vocoder's",
                config.vocoder.n_mel_channels,
                vocoder.n_mel_channels()
            );
        }
        let source = SpectrogramSource::new().with_mel_channels(vocoder.n_mel_channels());

        let denoiser = if config.denoiser.enabled() {
            log::info!("Denoiser enabled (strength {})", config.denoiser.strength);
            Some(Denoiser::new(&config.denoiser)?)
        } else {
            None
        };

        Ok(Self {
            vocoder,
            source,
            denoiser,
            config,
            cancel: None,
        })
    }

    /// Stop starting new files once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn vocoder(&self) -> &V {
        &self.vocoder
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn denoiser(&self) -> Option<&Denoiser> {
        self.denoiser.as_ref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Vocode one validated spectrogram and remove the bias if enabled
    pub fn synthesize_array(&self, mel: &Array2<f32>) -> Result<Vec<f32>> {
        self.source.validate(mel)?;

        let audio = self.vocoder.infer(mel, self.config.vocoder.sigma)?;
        log::debug!("Vocoder produced {} samples", audio.len());

        match &self.denoiser {
            Some(denoiser) => {
                let denoised =
                    denoiser.denoise(&self.vocoder, &audio, self.config.denoiser.strength)?;
                log::debug!(
                    "Denoiser removed {:.2} dB",
                    attenuation_db(&audio, &denoised)
                );
                Ok(denoised)
            }
            None => Ok(audio),
        }
    }

    /// Synthesize one spectrogram file into `{output_dir}/{stem}_synthesis.wav`
    pub fn synthesize_file<P: AsRef<Path>>(&self, input: P) -> Result<SynthesisResult> {
        let input = input.as_ref();
        let start_time = Instant::now();

        let mel = self.source.load(input)?;
        log::info!(
            "Synthesizing {} ({} frames)",
            input.display(),
            mel.ncols()
        );

        let audio = self.synthesize_array(&mel)?;

        let out_of_range = count_out_of_range(&audio);
        if out_of_range > 0 {
            log::warn!(
                "{}: {} samples exceed full scale ({:?} quantization)",
                input.display(),
                out_of_range,
                self.config.output.quantization
            );
        }

        let output = &self.config.output;
        let pcm = encode(&audio, output.sampling_rate, output.quantization);
        let path = output_path_for(&output.dir, input);
        write_wav(&path, &pcm)?;

        let processing_time = start_time.elapsed().as_secs_f32();
        let duration = pcm.duration();
        let rtf = if duration > 0.0 {
            processing_time / duration
        } else {
            0.0
        };

        let result = SynthesisResult {
            input: input.to_path_buf(),
            output: path,
            samples: pcm.len(),
            sample_rate: pcm.sample_rate(),
            duration,
            processing_time,
            rtf,
            out_of_range,
        };

        log::info!(
            "Wrote {} ({} audio in {:.2}s, RTF: {:.3})",
            result.output.display(),
            result.duration_formatted(),
            processing_time,
            rtf
        );

        Ok(result)
    }

    /// Process `paths` in order, printing each written file on stdout
    pub fn run<P: AsRef<Path>>(&self, paths: &[P]) -> Result<BatchReport> {
        let dir = &self.config.output.dir;
        std::fs::create_dir_all(dir)?;
        log::info!(
            "Processing {} spectrogram(s) into {}",
            paths.len(),
            dir.display()
        );

        let mut report = BatchReport::default();

        for (index, input) in paths.iter().enumerate() {
            let input = input.as_ref();
            if self.is_cancelled() {
                log::warn!(
                    "Cancelled before {} ({} of {} files started)",
                    input.display(),
                    index,
                    paths.len()
                );
                report.cancelled = true;
                break;
            }

            match self.synthesize_file(input) {
                Ok(result) => {
                    println!("{}", result.output.display());
                    report.results.push(result);
                }
                Err(e) => match self.config.batch.failure_policy {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::Continue => {
                        log::error!("{}: {}", input.display(), e);
                        report.failures.push(FailedItem {
                            input: input.to_path_buf(),
                            kind: e.kind(),
                            message: e.to_string(),
                        });
                    }
                },
            }
        }

        log::info!(
            "Batch finished: {} written, {} failed ({:.2}s audio in {:.2}s)",
            report.results.len(),
            report.failures.len(),
            report.total_audio_seconds(),
            report.total_processing_seconds()
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    struct Ramp;

    impl Vocoder for Ramp {
        fn infer(&self, mel: &Array2<f32>, sigma: f32) -> Result<Vec<f32>> {
            Ok((0..mel.ncols() * 256)
                .map(|i| sigma * 0.5 * (i % 100) as f32 / 100.0)
                .collect())
        }

        fn n_mel_channels(&self) -> usize {
            80
        }
    }

    #[test]
    fn test_synthesize_array_length() {
        let runner = BatchRunner::new(Ramp, Config::default()).unwrap();
        let audio = runner.synthesize_array(&Array2::zeros((80, 10))).unwrap();
        assert_eq!(audio.len(), 2560);
        assert!(runner.denoiser().is_none());
    }

    #[test]
    fn test_channel_mismatch_is_shape_error() {
        let runner = BatchRunner::new(Ramp, Config::default()).unwrap();
        let result = runner.synthesize_array(&Array2::zeros((64, 10)));
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn test_denoiser_created_only_when_enabled() {
        let mut config = Config::default();
        config.denoiser.strength = 0.1;
        let runner = BatchRunner::new(Ramp, config).unwrap();
        let denoiser = runner.denoiser().unwrap();
        assert!(!denoiser.is_estimated());

        runner.synthesize_array(&Array2::zeros((80, 10))).unwrap();
        assert!(denoiser.is_estimated());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.denoiser.strength = -1.0;
        assert!(BatchRunner::new(Ramp, config).is_err());
    }

    #[test]
    fn test_cancelled_before_first_file() {
        let mut config = Config::default();
        config.output.dir = std::env::temp_dir().join("mel2wav_runner_cancel");
        let flag = Arc::new(AtomicBool::new(true));
        let runner = BatchRunner::new(Ramp, config).unwrap().with_cancel(flag);

        let report = runner.run(&["never-read.npy"]).unwrap();
        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert!(!report.is_success());
    }

    #[test]
    fn test_duration_formatted() {
        let result = SynthesisResult {
            input: PathBuf::from("a.npy"),
            output: PathBuf::from("a_synthesis.wav"),
            samples: 0,
            sample_rate: 22050,
            duration: 75.5,
            processing_time: 1.0,
            rtf: 0.01,
            out_of_range: 0,
        };
        assert_eq!(result.duration_formatted(), "01:15");
    }
}
