//! Benchmarks for the denoiser STFT, bias subtraction and PCM encoding

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mel2wav::audio::{encode, Quantization, Stft, StftParams};
use mel2wav::denoise::{denoise_with_profile, BiasProfile};

fn test_signal(num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| 0.5 * (i as f32 * 0.01).sin() + 0.01 * (i as f32 * 1.3).sin())
        .collect()
}

fn bench_stft(c: &mut Criterion) {
    let stft = Stft::new(StftParams::default()).unwrap();
    let signal = test_signal(mel2wav::SAMPLE_RATE as usize);

    c.bench_function("stft_forward_1s", |b| {
        b.iter(|| stft.transform(black_box(&signal)))
    });

    let spectrum = stft.transform(&signal).unwrap();
    c.bench_function("stft_inverse_1s", |b| {
        b.iter(|| {
            stft.inverse(
                black_box(&spectrum.magnitude),
                black_box(&spectrum.phase),
                signal.len(),
            )
        })
    });
}

fn bench_denoise(c: &mut Criterion) {
    let params = StftParams::default();
    let stft = Stft::new(params).unwrap();
    let profile = BiasProfile::new(vec![0.01; params.n_freqs()], params).unwrap();

    // Generate 1 second of audio
    let signal = test_signal(mel2wav::SAMPLE_RATE as usize);
    c.bench_function("denoise_1s", |b| {
        b.iter(|| denoise_with_profile(&stft, black_box(&signal), 0.1, &profile))
    });

    // Generate 10 seconds of audio
    let long_signal = test_signal(mel2wav::SAMPLE_RATE as usize * 10);
    c.bench_function("denoise_10s", |b| {
        b.iter(|| denoise_with_profile(&stft, black_box(&long_signal), 0.1, &profile))
    });
}

fn bench_encode(c: &mut Criterion) {
    let signal = test_signal(mel2wav::SAMPLE_RATE as usize * 10);

    c.bench_function("encode_clamp_10s", |b| {
        b.iter(|| encode(black_box(&signal), mel2wav::SAMPLE_RATE, Quantization::Clamp))
    });
}

criterion_group!(benches, bench_stft, bench_denoise, bench_encode);
criterion_main!(benches);
