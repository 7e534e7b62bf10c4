//! Exponential decay fit of an isolated mode.
//!
//! The mode is peak-normalized, its Hilbert envelope taken, and
//! `env(t) = A * exp(-t / tau)` fitted by Levenberg-Marquardt with a bounded
//! evaluation budget. A fit that fails to converge is reported as such
//! instead of being folded into a long decay.

use crate::config::FitConfig;
use crate::envelope::hilbert_envelope;
use crate::modes::Decay;

/// Result of fitting one isolated mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitOutcome {
    Converged { amplitude: f64, decay_time: f64 },
    /// Budget exhausted or the fit went numerically bad. Carries the peak
    /// level of the isolated signal as best available amplitude.
    NotConverged { fallback_amplitude: f64 },
}

impl FitOutcome {
    pub fn amplitude(&self) -> f64 {
        match *self {
            FitOutcome::Converged { amplitude, .. } => amplitude,
            FitOutcome::NotConverged { fallback_amplitude } => fallback_amplitude,
        }
    }

    pub fn decay(&self) -> Decay {
        match *self {
            FitOutcome::Converged { decay_time, .. } => Decay::Seconds(decay_time),
            FitOutcome::NotConverged { .. } => Decay::NonConvergent,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, FitOutcome::Converged { .. })
    }
}

/// Fit the decay of `signal` sampled at `sample_rate`.
///
/// Returns the fitted amplitude in the signal's own scale. A silent or
/// empty signal has no determinable decay and is `NotConverged`.
pub fn fit_decay(signal: &[f64], sample_rate: f64, config: &FitConfig) -> FitOutcome {
    let peak = signal.iter().map(|x| x.abs()).fold(0.0f64, f64::max);
    if signal.is_empty() || !(peak > 0.0) || !peak.is_finite() {
        tracing::debug!("silent band, decay undetermined");
        return FitOutcome::NotConverged {
            fallback_amplitude: if peak.is_finite() { peak } else { 0.0 },
        };
    }

    let normalized: Vec<f64> = signal.iter().map(|x| x / peak).collect();
    let env = hilbert_envelope(&normalized);
    let t: Vec<f64> = (0..env.len()).map(|i| i as f64 / sample_rate).collect();
    let a0 = env.iter().copied().fold(0.0f64, f64::max);

    match fit_exponential(&t, &env, [a0, config.initial_tau], config) {
        Some([a, tau]) if a.is_finite() && tau.is_finite() && tau > 0.0 => FitOutcome::Converged {
            amplitude: a * peak,
            decay_time: tau,
        },
        _ => {
            tracing::warn!(peak, "decay fit did not converge");
            FitOutcome::NotConverged {
                fallback_amplitude: peak,
            }
        }
    }
}

// ── Levenberg-Marquardt for A * exp(-t / tau) ───────────────────────────────

type Mat2 = [[f64; 2]; 2];

/// Half the sum of squared residuals; infinite for tau <= 0 or a bad model.
fn cost(t: &[f64], y: &[f64], p: [f64; 2]) -> f64 {
    let [a, tau] = p;
    if !(tau > 0.0) {
        return f64::INFINITY;
    }
    let sum: f64 = t
        .iter()
        .zip(y)
        .map(|(&ti, &yi)| {
            let r = yi - a * (-ti / tau).exp();
            r * r
        })
        .sum();
    if sum.is_finite() { 0.5 * sum } else { f64::INFINITY }
}

/// J^T J and J^T r at `p`.
fn normal_equations(t: &[f64], y: &[f64], p: [f64; 2]) -> (Mat2, [f64; 2]) {
    let [a, tau] = p;
    let mut jtj = [[0.0f64; 2]; 2];
    let mut g = [0.0f64; 2];
    let inv_tau2 = 1.0 / (tau * tau);

    for (&ti, &yi) in t.iter().zip(y) {
        let e = (-ti / tau).exp();
        let r = yi - a * e;
        let ja = e;
        let jt = a * e * ti * inv_tau2;
        jtj[0][0] += ja * ja;
        jtj[0][1] += ja * jt;
        jtj[1][1] += jt * jt;
        g[0] += ja * r;
        g[1] += jt * r;
    }
    jtj[1][0] = jtj[0][1];
    (jtj, g)
}

/// Solve (J^T J + lambda * D) d = g with D the floored diagonal of J^T J.
fn damped_step(jtj: &Mat2, g: &[f64; 2], lambda: f64) -> Option<([f64; 2], [f64; 2])> {
    let floor = 1e-12 * (jtj[0][0] + jtj[1][1]);
    let d = [jtj[0][0].max(floor), jtj[1][1].max(floor)];

    let m00 = jtj[0][0] + lambda * d[0];
    let m11 = jtj[1][1] + lambda * d[1];
    let m01 = jtj[0][1];
    let det = m00 * m11 - m01 * m01;
    if !(det > 0.0) || !det.is_finite() {
        return None;
    }

    let step = [(g[0] * m11 - m01 * g[1]) / det, (m00 * g[1] - m01 * g[0]) / det];
    Some((step, d))
}

/// Fit `[A, tau]` to `(t, y)` from `p0`. `None` when the evaluation budget
/// runs out or no finite improving step exists.
pub fn fit_exponential(t: &[f64], y: &[f64], p0: [f64; 2], config: &FitConfig) -> Option<[f64; 2]> {
    let max_evals = config.max_evaluations;
    let mut evals = 1usize;
    let mut p = p0;
    let mut c = cost(t, y, p);
    if !c.is_finite() {
        return None;
    }
    let mut lambda = 1e-3;

    loop {
        if c == 0.0 {
            return Some(p);
        }
        if evals >= max_evals {
            tracing::debug!(evals, "fit evaluation budget exhausted");
            return None;
        }
        let (jtj, g) = normal_equations(t, y, p);
        evals += 1;

        loop {
            if evals >= max_evals {
                tracing::debug!(evals, "fit evaluation budget exhausted");
                return None;
            }
            let Some((step, d)) = damped_step(&jtj, &g, lambda) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    return None;
                }
                continue;
            };

            let trial = [p[0] + step[0], p[1] + step[1]];
            let trial_cost = cost(t, y, trial);
            evals += 1;

            let predicted = 0.5
                * (step[0] * (lambda * d[0] * step[0] + g[0]) + step[1] * (lambda * d[1] * step[1] + g[1]));
            let actual = c - trial_cost;

            if trial_cost.is_finite() && actual > 0.0 {
                let step_small = (0..2).all(|i| step[i].abs() <= config.xtol * (p[i].abs() + config.xtol));
                let cost_small = actual <= config.ftol * c && predicted <= config.ftol * c;
                p = trial;
                c = trial_cost;
                lambda = (lambda * 0.1).max(1e-12);
                if step_small || cost_small {
                    return Some(p);
                }
                break;
            }

            // No improvement: either already at the minimum to tolerance, or
            // the step was too bold.
            if predicted.abs() <= config.ftol * c {
                return Some(p);
            }
            lambda *= 10.0;
            if lambda > 1e16 {
                return None;
            }
        }
    }
}
