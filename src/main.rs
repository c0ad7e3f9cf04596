//! mel2wav CLI - batch vocoder synthesis from mel spectrograms
//!
//! Command-line interface for the mel2wav batch runner

use clap::{Parser, Subcommand, ValueEnum};
use mel2wav::{
    audio::{amplitude_to_db, compute_peak, compute_rms, read_wav, Quantization},
    config::{Device, Precision},
    denoise::BiasMode,
    spectrogram::read_file_list,
    vocoder::VocoderCheckpoint,
    BatchRunner, Config, Error, FailurePolicy, Result,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "mel2wav",
    about = "Synthesize WAV files from mel spectrograms with a pretrained vocoder",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BiasModeArg {
    /// All-zero reference spectrogram
    Zeros,
    /// Seeded standard-normal reference spectrogram
    Normal,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize every spectrogram listed in a file
    Synthesize {
        /// Text file with one spectrogram path per line
        #[arg(short = 'f', long)]
        filelist: PathBuf,

        /// Vocoder checkpoint (ONNX)
        #[arg(short = 'w', long)]
        checkpoint: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Vocoder noise scale [default: 1.0]
        #[arg(short, long)]
        sigma: Option<f32>,

        /// Sampling rate written to the WAV header [default: 22050]
        #[arg(long)]
        sampling_rate: Option<u32>,

        /// Request half-precision inference
        #[arg(long)]
        fp16: bool,

        /// Bias removal strength, 0 disables the denoiser [default: 0.0]
        #[arg(short = 'd', long)]
        denoiser_strength: Option<f32>,

        /// Device (cpu, cuda:0, mps) [default: cpu]
        #[arg(short = 'D', long)]
        device: Option<String>,

        /// Configuration file path (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Wrap out-of-range samples instead of clamping them
        #[arg(long)]
        wrap_overflow: bool,

        /// Keep going when a file fails
        #[arg(long)]
        continue_on_error: bool,

        /// Reference spectrogram used to measure the vocoder bias
        #[arg(long, value_enum)]
        bias_mode: Option<BiasModeArg>,

        /// Seed for `--bias-mode normal`
        #[arg(long, default_value = "0")]
        bias_seed: u64,
    },

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Print header and level statistics of a WAV file
    Inspect {
        /// WAV file to inspect
        wav: PathBuf,
    },

    /// Show information about the system
    Info,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synthesize {
            filelist,
            checkpoint,
            output_dir,
            sigma,
            sampling_rate,
            fp16,
            denoiser_strength,
            device,
            config,
            wrap_overflow,
            continue_on_error,
            bias_mode,
            bias_seed,
        } => {
            log::info!("mel2wav Synthesizer");
            log::info!("===================");

            // Load or create config; flags given on the command line win
            let mut cfg = match config {
                Some(config_path) => Config::load(config_path)?,
                None => Config::default(),
            };
            cfg.output.dir = output_dir;
            if let Some(checkpoint) = checkpoint {
                cfg.vocoder.checkpoint = Some(checkpoint);
            }
            if let Some(sigma) = sigma {
                cfg.vocoder.sigma = sigma;
            }
            if let Some(rate) = sampling_rate {
                cfg.output.sampling_rate = rate;
            }
            if let Some(strength) = denoiser_strength {
                cfg.denoiser.strength = strength;
            }
            if let Some(device) = device {
                cfg.runtime.device = device.parse::<Device>()?;
            }
            if fp16 {
                cfg.runtime.precision = Precision::Half;
            }
            if wrap_overflow {
                cfg.output.quantization = Quantization::Wrap;
            }
            if continue_on_error {
                cfg.batch.failure_policy = FailurePolicy::Continue;
            }
            match bias_mode {
                Some(BiasModeArg::Zeros) => cfg.denoiser.bias_mode = BiasMode::Zeros,
                Some(BiasModeArg::Normal) => {
                    cfg.denoiser.bias_mode = BiasMode::Normal { seed: bias_seed }
                }
                None => {}
            }
            cfg.validate()?;

            let checkpoint = cfg.vocoder.checkpoint.clone().ok_or_else(|| {
                Error::Config("no vocoder checkpoint given (use --checkpoint or a config file)".into())
            })?;

            let files = read_file_list(&filelist)?;
            log::info!("File list: {} ({} entries)", filelist.display(), files.len());

            let vocoder = VocoderCheckpoint::load(&checkpoint, &cfg.runtime, cfg.vocoder.n_mel_channels)?
                .prepare_for_inference(&cfg.runtime)?;

            let runner = BatchRunner::new(vocoder, cfg)?;
            let report = runner.run(&files)?;

            log::info!(
                "Synthesized {} file(s), {:.2}s of audio in {:.2}s",
                report.results.len(),
                report.total_audio_seconds(),
                report.total_processing_seconds()
            );

            if !report.failures.is_empty() {
                for failure in &report.failures {
                    log::error!(
                        "[{}] {}: {}",
                        failure.kind,
                        failure.input.display(),
                        failure.message
                    );
                }
                log::error!(
                    "{} of {} files failed",
                    report.failures.len(),
                    files.len()
                );
                std::process::exit(1);
            }
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            let config = Config::default();
            config.save(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Inspect { wav } => {
            let waveform = read_wav(&wav)?;
            let samples = waveform.to_float();
            let full_scale = waveform
                .samples()
                .iter()
                .filter(|&&s| s == i16::MAX || s == i16::MIN)
                .count();

            println!("File: {}", wav.display());
            println!("Sample Rate: {} Hz", waveform.sample_rate());
            println!("Samples: {}", waveform.len());
            println!("Duration: {:.3}s", waveform.duration());
            println!("Peak: {:.1} dBFS", amplitude_to_db(compute_peak(&samples)));
            println!("RMS: {:.1} dBFS", amplitude_to_db(compute_rms(&samples)));
            println!("Full-scale samples: {}", full_scale);
        }

        Commands::Info => {
            let defaults = Config::default();

            println!("mel2wav - Mel-spectrogram to waveform synthesis");
            println!("===============================================");
            println!("Version: {}", mel2wav::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Vocoder backend: tract (ONNX, CPU)");
            println!("Sample Rate: {} Hz", defaults.output.sampling_rate);
            println!("Mel Bands: {}", defaults.vocoder.n_mel_channels);
            println!("Sigma: {}", defaults.vocoder.sigma);
            println!(
                "Denoiser STFT: {} / hop {} / window {}",
                defaults.denoiser.filter_length,
                defaults.denoiser.hop_length(),
                defaults.denoiser.win_length
            );
            println!("Bias reference frames: {}", defaults.denoiser.reference_frames);
            println!();
            println!("CPU Cores: {}", num_cpus::get());
            println!("Physical Cores: {}", num_cpus::get_physical());
        }
    }

    Ok(())
}
