//! WAV loading: mono mixdown, silence trim, length cap and peak normalization.

use std::path::Path;

use anyhow::{Context, Result, bail};

/// Frame and hop for the silence trim (samples).
const TRIM_FRAME: usize = 2048;
const TRIM_HOP: usize = 512;

pub struct LoadOptions {
    /// Frames quieter than the loudest frame by more than this are silence.
    pub trim_db: f64,
    /// Keep at most this many seconds after trimming.
    pub max_seconds: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            trim_db: 40.0,
            max_seconds: 2.0,
        }
    }
}

/// Read a WAV file as normalized mono samples plus its sample rate.
pub fn load_wav(path: &Path, options: &LoadOptions) -> Result<(Vec<f64>, u32)> {
    let reader = hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{}: no channels", path.display());
    }

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 * scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| v as f64))
            .collect::<Result<_, _>>()?,
    };

    let mono: Vec<f64> = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect();

    let sr = spec.sample_rate;
    let (start, end) = trim_bounds(&mono, options.trim_db);
    let max_len = (options.max_seconds * sr as f64) as usize;
    let end = end.min(start + max_len);
    let mut samples = mono[start..end].to_vec();
    tracing::debug!(
        total = mono.len(),
        start,
        kept = samples.len(),
        "trimmed {}",
        path.display()
    );

    normalize_peak(&mut samples);
    Ok((samples, sr))
}

/// Sample range of non-silent audio: from the first frame within `top_db` of
/// the loudest frame to the end of the last such frame. Empty if all silent.
pub fn trim_bounds(samples: &[f64], top_db: f64) -> (usize, usize) {
    let rms: Vec<f64> = (0..samples.len())
        .step_by(TRIM_HOP)
        .map(|start| {
            let frame = &samples[start..(start + TRIM_FRAME).min(samples.len())];
            (frame.iter().map(|x| x * x).sum::<f64>() / frame.len() as f64).sqrt()
        })
        .collect();

    let loudest = rms.iter().copied().fold(0.0f64, f64::max);
    if !(loudest > 0.0) {
        return (0, 0);
    }

    let threshold = loudest * 10f64.powf(-top_db / 20.0);
    let loud = |r: &f64| *r > threshold;
    let (Some(first), Some(last)) = (rms.iter().position(loud), rms.iter().rposition(loud)) else {
        return (0, 0);
    };
    let start = first * TRIM_HOP;
    let end = (last * TRIM_HOP + TRIM_FRAME).min(samples.len());
    (start, end)
}

/// Scale so the largest magnitude is 1.0. Silence is left alone.
pub fn normalize_peak(samples: &mut [f64]) {
    let peak = samples.iter().map(|x| x.abs()).fold(0.0f64, f64::max);
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_leading_and_trailing_silence() {
        let mut x = vec![0.0; 10_000];
        x.extend((0..20_000).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }));
        x.extend(vec![0.0; 10_000]);
        let (start, end) = trim_bounds(&x, 40.0);
        // Frame granularity: within one frame of the true edges.
        assert!(start <= 10_000 && start + TRIM_FRAME > 10_000, "start {start}");
        assert!(end >= 30_000 && end < 30_000 + TRIM_FRAME, "end {end}");
    }

    #[test]
    fn test_trim_all_silent() {
        assert_eq!(trim_bounds(&[0.0; 4096], 40.0), (0, 0));
        assert_eq!(trim_bounds(&[], 40.0), (0, 0));
    }

    #[test]
    fn test_normalize_peak() {
        let mut x = vec![0.1, -0.4, 0.2];
        normalize_peak(&mut x);
        assert_eq!(x, vec![0.25, -1.0, 0.5]);
        let mut z = vec![0.0; 3];
        normalize_peak(&mut z);
        assert_eq!(z, vec![0.0; 3]);
    }
}
