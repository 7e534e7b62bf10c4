use rustfft::FftPlanner;
use rustfft::num_complex::Complex64;
use rustfft::num_traits::Zero;

/// Analytic signal via FFT (circular, same length as input).
///
/// Positive frequencies doubled, negative zeroed, DC and Nyquist kept.
pub fn analytic_signal(input: &[f64]) -> Vec<Complex64> {
    let n = input.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut x: Vec<Complex64> = input.iter().map(|&v| Complex64::new(v, 0.0)).collect();
    fft.process(&mut x);

    let half = n / 2;
    for (i, xi) in x.iter_mut().enumerate() {
        if i == 0 || (n % 2 == 0 && i == half) {
            // DC / Nyquist keep
        } else if i <= (n - 1) / 2 {
            *xi *= 2.0;
        } else {
            *xi = Complex64::zero();
        }
    }

    ifft.process(&mut x);

    // rustfft does not scale the inverse
    let scale = 1.0 / n as f64;
    for xi in x.iter_mut() {
        *xi *= scale;
    }
    x
}

/// Hilbert envelope |x + j H{x}|.
pub fn hilbert_envelope(input: &[f64]) -> Vec<f64> {
    analytic_signal(input).iter().map(|c| c.norm()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(fs: f64, f: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * f * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_sine_gives_flat_envelope() {
        // 440 Hz at 16 kHz over 1600 samples is exactly 44 cycles.
        let env = hilbert_envelope(&sine(16000.0, 440.0, 1600));
        for (i, e) in env.iter().enumerate() {
            assert!((e - 1.0).abs() < 1e-9, "sample {i}: {e}");
        }
    }

    #[test]
    fn test_real_part_preserved() {
        let x = sine(8000.0, 310.0, 777);
        let z = analytic_signal(&x);
        for (a, b) in x.iter().zip(&z) {
            assert!((a - b.re).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decaying_envelope_tracks_exponential() {
        let fs = 44100.0;
        let n = 44100;
        let x: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                (-t / 0.2).exp() * (2.0 * PI * 1000.0 * t).sin()
            })
            .collect();
        let env = hilbert_envelope(&x);
        for &i in &[4410usize, 11025, 22050] {
            let t = i as f64 / fs;
            let expected = (-t / 0.2).exp();
            assert!((env[i] - expected).abs() < 0.01 * expected.max(0.05), "t={t}: {} vs {expected}", env[i]);
        }
    }

    #[test]
    fn test_dc_signal() {
        let env = hilbert_envelope(&[1.0; 512]);
        assert!(env.iter().all(|e| (e - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_empty() {
        assert!(hilbert_envelope(&[]).is_empty());
    }
}
