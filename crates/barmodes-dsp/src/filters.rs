//! Band-isolation filters for empirical mode extraction.
//!
//! A 2nd-order Butterworth band-pass prototype becomes two biquad sections
//! (bilinear transform, prewarped edges). `filtfilt` runs the cascade forward
//! and backward so the isolated mode keeps its decay shape without group delay.

use std::f64::consts::PI;

use rustfft::num_complex::Complex64;

/// Biquad filter, Direct Form II Transposed.
#[derive(Debug, Clone)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    s1: f64,
    s2: f64,
}

impl Biquad {
    /// Coefficients with a0 already divided out.
    pub fn from_coefficients(b: [f64; 3], a: [f64; 2]) -> Self {
        Self {
            b0: b[0],
            b1: b[1],
            b2: b[2],
            a1: a[0],
            a2: a[1],
            s1: 0.0,
            s2: 0.0,
        }
    }

    /// Process one sample (Direct Form II Transposed).
    pub fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.s1;
        self.s1 = self.b1 * x - self.a1 * y + self.s2;
        self.s2 = self.b2 * x - self.a2 * y;
        y
    }

    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    /// Load the state a constant input `u` would settle to, returning the
    /// steady output. Avoids a start-up transient on signals with an offset.
    pub fn settle(&mut self, u: f64) -> f64 {
        let y = self.dc_gain() * u;
        self.s2 = self.b2 * u - self.a2 * y;
        self.s1 = self.b1 * u - self.a1 * y + self.s2;
        y
    }

    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < 1e-300 {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }

    /// Complex response at normalized angular frequency `w` (rad/sample).
    pub fn response(&self, w: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;
        let num = self.b0 + z1 * self.b1 + z2 * self.b2;
        let den = 1.0 + z1 * self.a1 + z2 * self.a2;
        num / den
    }

    fn scale_numerator(&mut self, g: f64) {
        self.b0 *= g;
        self.b1 *= g;
        self.b2 *= g;
    }
}

/// Cascade of biquad sections.
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<Biquad>,
}

impl SosFilter {
    /// 2nd-order Butterworth band-pass between `low_hz` and `high_hz`.
    ///
    /// Requires 0 < low < high < nyquist. Unity gain at the geometric
    /// center of the (prewarped) band.
    pub fn butterworth_bandpass(low_hz: f64, high_hz: f64, sample_rate: f64) -> Self {
        let fs2 = 2.0 * sample_rate;
        let wl = fs2 * (PI * low_hz / sample_rate).tan();
        let wh = fs2 * (PI * high_hz / sample_rate).tan();
        let bw = wh - wl;
        let w0_sq = wl * wh;

        // Upper-half-plane lowpass prototype pole; its conjugate yields the
        // conjugate band-pass poles.
        let p = Complex64::from_polar(1.0, 3.0 * PI / 4.0);
        let pb = p * bw;
        let disc = (pb * pb - 4.0 * w0_sq).sqrt();
        let analog = [(pb + disc) * 0.5, (pb - disc) * 0.5];

        let mut sections: Vec<Biquad> = analog
            .iter()
            .map(|&s| {
                let z = (fs2 + s) / (fs2 - s);
                // Zeros at z = 1 and z = -1 (analog zeros at DC and infinity).
                Biquad::from_coefficients([1.0, 0.0, -1.0], [-2.0 * z.re, z.norm_sqr()])
            })
            .collect();

        let w_center = 2.0 * (w0_sq.sqrt() / fs2).atan();
        let gain: f64 = sections.iter().map(|s| s.response(w_center).norm()).product();
        if gain > 0.0 && gain.is_finite() {
            sections[0].scale_numerator(1.0 / gain);
        }

        Self { sections }
    }

    pub fn process(&mut self, x: f64) -> f64 {
        self.sections.iter_mut().fold(x, |acc, s| s.process(acc))
    }

    pub fn reset(&mut self) {
        for s in &mut self.sections {
            s.reset();
        }
    }

    fn settle(&mut self, u: f64) {
        self.sections.iter_mut().fold(u, |acc, s| s.settle(acc));
    }

    /// Magnitude response at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq_hz / sample_rate;
        self.sections.iter().map(|s| s.response(w).norm()).product()
    }

    fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Zero-phase filtering: forward pass, reverse, forward pass, reverse.
    ///
    /// The signal is extended at both ends by odd reflection and each pass
    /// starts from the state settled on its first sample.
    pub fn filtfilt(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }
        let pad = self.pad_len().min(n - 1);

        let first = signal[0];
        let last = signal[n - 1];
        let mut ext = Vec::with_capacity(n + 2 * pad);
        ext.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let mut filt = self.clone();
        filt.run_pass(&mut ext);
        ext.reverse();
        filt.run_pass(&mut ext);
        ext.reverse();

        ext[pad..pad + n].to_vec()
    }

    fn run_pass(&mut self, buf: &mut [f64]) {
        self.reset();
        if let Some(&x0) = buf.first() {
            self.settle(x0);
        }
        for x in buf.iter_mut() {
            *x = self.process(*x);
        }
    }
}
