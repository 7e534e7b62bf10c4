//! One-shot magnitude spectrum of a recording and peak snapping.

use realfft::RealFftPlanner;

/// Real-FFT magnitude spectrum, bins 0..=n/2.
///
/// Computed once from the full waveform (no window, no padding) and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct Spectrum {
    freqs: Vec<f64>,
    magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn compute(signal: &[f64], sample_rate: f64) -> Self {
        let n = signal.len();
        if n == 0 {
            return Self {
                freqs: Vec::new(),
                magnitudes: Vec::new(),
            };
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(n);
        let mut input = signal.to_vec();
        let mut output = r2c.make_output_vec();
        // Buffers are sized by the plan.
        if let Err(e) = r2c.process(&mut input, &mut output) {
            tracing::error!("real FFT failed: {e}");
        }

        let df = sample_rate / n as f64;
        let freqs = (0..output.len()).map(|k| k as f64 * df).collect();
        let magnitudes = output.iter().map(|c| c.norm()).collect();

        Self { freqs, magnitudes }
    }

    pub fn freqs(&self) -> &[f64] {
        &self.freqs
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Frequency of the strongest local maximum within `f0 ± window_hz`.
    ///
    /// A local maximum is a bin strictly above both neighbours inside the
    /// window; window edges never qualify. Returns `f0` unchanged when the
    /// window holds no bins or no local maximum.
    pub fn nearest_peak(&self, f0: f64, window_hz: f64) -> f64 {
        let lo = f0 - window_hz;
        let hi = f0 + window_hz;
        let start = self.freqs.partition_point(|&f| f < lo);
        let end = self.freqs.partition_point(|&f| f <= hi);
        if start >= end {
            tracing::debug!(f0, "no spectrum bins in search window");
            return f0;
        }

        let local = &self.magnitudes[start..end];
        let mut best: Option<usize> = None;
        for i in 1..local.len().saturating_sub(1) {
            if local[i] > local[i - 1] && local[i] > local[i + 1] {
                match best {
                    Some(b) if local[b] >= local[i] => {}
                    _ => best = Some(i),
                }
            }
        }

        match best {
            Some(i) => self.freqs[start + i],
            None => {
                tracing::debug!(f0, "no local maximum in search window");
                f0
            }
        }
    }

    /// Local maxima over the whole spectrum, strongest first.
    ///
    /// Used to suggest candidate modes before any selection is made.
    pub fn strongest_peaks(&self, count: usize) -> Vec<(f64, f64)> {
        let m = &self.magnitudes;
        let mut peaks: Vec<(f64, f64)> = (1..m.len().saturating_sub(1))
            .filter(|&i| m[i] > m[i - 1] && m[i] > m[i + 1])
            .map(|i| (self.freqs[i], m[i]))
            .collect();
        peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
        peaks.truncate(count);
        peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tones(freqs: &[(f64, f64)], sr: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / sr;
                freqs.iter().map(|&(f, a)| a * (2.0 * PI * f * t).sin()).sum()
            })
            .collect()
    }

    #[test]
    fn test_bin_layout() {
        let s = Spectrum::compute(&vec![0.0; 1000], 1000.0);
        assert_eq!(s.len(), 501);
        assert_eq!(s.freqs()[1], 1.0);
        assert_eq!(s.freqs()[500], 500.0);
    }

    #[test]
    fn test_magnitude_of_bin_centered_sine() {
        let sr = 8000.0;
        let n = 8000;
        let s = Spectrum::compute(&tones(&[(500.0, 1.0)], sr, n), sr);
        // |X[k]| = N/2 for a unit sine on bin k.
        assert!((s.magnitudes()[500] - n as f64 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_snaps_to_nearby_peak() {
        let sr = 8000.0;
        let s = Spectrum::compute(&tones(&[(440.0, 1.0), (1210.0, 0.5)], sr, 8000), sr);
        assert_eq!(s.nearest_peak(400.0, 200.0), 440.0);
        assert_eq!(s.nearest_peak(1300.0, 200.0), 1210.0);
    }

    #[test]
    fn test_picks_strongest_in_window() {
        let sr = 8000.0;
        let s = Spectrum::compute(&tones(&[(440.0, 0.3), (520.0, 1.0)], sr, 8000), sr);
        assert_eq!(s.nearest_peak(450.0, 200.0), 520.0);
        assert_eq!(s.nearest_peak(400.0, 50.0), 440.0);
    }

    #[test]
    fn test_empty_window_returns_input() {
        let sr = 8000.0;
        let s = Spectrum::compute(&tones(&[(440.0, 1.0)], sr, 8000), sr);
        // Entirely above Nyquist.
        assert_eq!(s.nearest_peak(9000.0, 200.0), 9000.0);
        // Narrower than one bin, between bins.
        assert_eq!(s.nearest_peak(440.5, 0.1), 440.5);
        let empty = Spectrum::compute(&[], sr);
        assert_eq!(empty.nearest_peak(440.0, 200.0), 440.0);
    }

    #[test]
    fn test_no_local_maximum_returns_input() {
        // Monotonically falling magnitude: impulse response of a one-pole lowpass.
        let signal: Vec<f64> = (0..1024).map(|i| 0.9f64.powi(i)).collect();
        let s = Spectrum::compute(&signal, 1024.0);
        let m = s.magnitudes();
        assert!(m.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(s.nearest_peak(100.0, 20.0), 100.0);
    }

    #[test]
    fn test_strongest_peaks() {
        let sr = 8000.0;
        let s = Spectrum::compute(&tones(&[(300.0, 0.2), (800.0, 1.0), (2000.0, 0.5)], sr, 8000), sr);
        let peaks = s.strongest_peaks(2);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].0, 800.0);
        assert_eq!(peaks[1].0, 2000.0);
    }
}
