//! Empirical mode extraction from a recorded strike.
//!
//! Each selected frequency is snapped to the nearest spectral peak, isolated
//! with a zero-phase band-pass, and its decay fitted. A session collects the
//! results in arrival order and turns them into a mode set on commit.
//!
//! Session states:
//!
//! ```text
//! Idle --PeakSelected--> Selecting --PeakSelected--> Selecting
//! Selecting --Commit--> (Finalizing) --> Done        emits ModeSet
//! Idle | Selecting --Cancel--> Cancelled             emits nothing
//! ```

use std::borrow::Cow;
use std::sync::mpsc::Receiver;

use crate::config::ExtractorConfig;
use crate::decay_fit::{FitOutcome, fit_decay};
use crate::error::{ConfigError, SessionError};
use crate::filters::SosFilter;
use crate::modes::{Mode, ModeSet, normalize_amplitudes};
use crate::spectrum::Spectrum;

/// Mono recording, already trimmed and peak-normalized by the loader.
#[derive(Debug, Clone)]
pub struct Waveform {
    samples: Vec<f64>,
    sample_rate: f64,
}

impl Waveform {
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> Result<Self, ConfigError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ConfigError::NonPositiveConstant {
                field: "sample_rate",
                value: sample_rate,
            });
        }
        Ok(Self { samples, sample_rate })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }
}

/// One analyzed selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedMode {
    pub requested_hz: f64,
    pub frequency: f64,
    pub fit: FitOutcome,
}

impl ExtractedMode {
    pub fn to_mode(&self) -> Mode {
        Mode {
            frequency: self.frequency,
            amplitude: self.fit.amplitude(),
            decay_time: self.fit.decay(),
        }
    }
}

/// Analysis context for one recording. The spectrum is computed here, once.
#[derive(Debug)]
pub struct ModeExtractor {
    waveform: Waveform,
    spectrum: Spectrum,
    config: ExtractorConfig,
}

impl ModeExtractor {
    pub fn new(waveform: Waveform, config: ExtractorConfig) -> Self {
        let spectrum = Spectrum::compute(waveform.samples(), waveform.sample_rate());
        tracing::debug!(
            samples = waveform.samples().len(),
            sample_rate = waveform.sample_rate(),
            bins = spectrum.len(),
            "spectrum computed"
        );
        Self {
            waveform,
            spectrum,
            config,
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.spectrum
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn nyquist(&self) -> f64 {
        self.waveform.sample_rate() / 2.0
    }

    /// Snap `f0` to the strongest local spectral peak within the configured window.
    pub fn nearest_peak(&self, f0: f64) -> f64 {
        self.spectrum.nearest_peak(f0, self.config.search_window_hz)
    }

    /// Snap with an explicit search half-width.
    pub fn nearest_peak_within(&self, f0: f64, window_hz: f64) -> f64 {
        self.spectrum.nearest_peak(f0, window_hz)
    }

    /// Band edges for isolating `f0`, or `None` if the band collapses.
    pub fn band_edges(&self, f0: f64, width: Option<f64>) -> Option<(f64, f64)> {
        let width = width.unwrap_or_else(|| self.config.band_width(f0));
        let low = (f0 - width / 2.0).max(self.config.min_low_edge_hz);
        let high = (f0 + width / 2.0).min(self.nyquist() * self.config.nyquist_guard);
        if low >= high || !low.is_finite() || !high.is_finite() {
            None
        } else {
            Some((low, high))
        }
    }

    /// Isolate the mode at `f0`. A collapsed band returns the recording as-is.
    pub fn bandpass_isolate(&self, f0: f64, width: Option<f64>) -> Cow<'_, [f64]> {
        match self.band_edges(f0, width) {
            Some((low, high)) => {
                let sos = SosFilter::butterworth_bandpass(low, high, self.waveform.sample_rate());
                Cow::Owned(sos.filtfilt(self.waveform.samples()))
            }
            None => {
                tracing::debug!(f0, "degenerate band, using unfiltered signal");
                Cow::Borrowed(self.waveform.samples())
            }
        }
    }

    /// Fit the decay of an isolated signal at this recording's sample rate.
    pub fn fit_decay(&self, filtered: &[f64]) -> FitOutcome {
        fit_decay(filtered, self.waveform.sample_rate(), &self.config.fit)
    }

    /// Snap, isolate and fit one approximate frequency.
    pub fn analyze(&self, approx_hz: f64) -> ExtractedMode {
        let frequency = self.nearest_peak(approx_hz);
        let isolated = self.bandpass_isolate(frequency, None);
        let fit = self.fit_decay(&isolated);
        ExtractedMode {
            requested_hz: approx_hz,
            frequency,
            fit,
        }
    }

    pub fn session(&self) -> ExtractionSession<'_> {
        ExtractionSession::new(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    PeakSelected(f64),
    Commit,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Selecting,
    Done,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Cancelled)
    }
}

/// Single-writer accumulator for one extraction pass over a recording.
#[derive(Debug)]
pub struct ExtractionSession<'a> {
    extractor: &'a ModeExtractor,
    state: SessionState,
    selections: Vec<ExtractedMode>,
    result: Option<ModeSet>,
}

impl<'a> ExtractionSession<'a> {
    pub fn new(extractor: &'a ModeExtractor) -> Self {
        Self {
            extractor,
            state: SessionState::Idle,
            selections: Vec::new(),
            result: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selections(&self) -> &[ExtractedMode] {
        &self.selections
    }

    /// Apply one event. Events after `Done` or `Cancelled` are rejected.
    ///
    /// A selection that is not a positive finite frequency is ignored. A
    /// commit with nothing selected ends the session as `Cancelled`.
    pub fn handle(&mut self, event: SessionEvent) -> Result<SessionState, SessionError> {
        if self.state.is_terminal() {
            return Err(SessionError::Finished);
        }

        match event {
            SessionEvent::PeakSelected(hz) => {
                if !(hz.is_finite() && hz > 0.0) {
                    tracing::warn!(hz, "ignoring invalid peak selection");
                    return Ok(self.state);
                }
                let extracted = self.extractor.analyze(hz);
                tracing::info!(
                    requested = hz,
                    snapped = extracted.frequency,
                    converged = extracted.fit.is_converged(),
                    "snapped {:.2} Hz",
                    extracted.frequency
                );
                self.selections.push(extracted);
                self.state = SessionState::Selecting;
            }
            SessionEvent::Commit => {
                if self.selections.is_empty() {
                    tracing::info!("commit with no selections, nothing emitted");
                    self.state = SessionState::Cancelled;
                } else {
                    self.result = Some(self.finalize());
                    self.state = SessionState::Done;
                }
            }
            SessionEvent::Cancel => {
                tracing::info!(discarded = self.selections.len(), "session cancelled");
                self.selections.clear();
                self.state = SessionState::Cancelled;
            }
        }
        Ok(self.state)
    }

    fn finalize(&self) -> ModeSet {
        let mut modes: Vec<Mode> = self.selections.iter().map(ExtractedMode::to_mode).collect();
        normalize_amplitudes(&mut modes);
        tracing::info!(modes = modes.len(), "session committed");
        ModeSet::prenormalized(modes)
    }

    /// The committed mode set, if the session reached `Done`.
    pub fn finish(self) -> Option<ModeSet> {
        self.result
    }
}

/// Drive a session from an event channel until it ends.
///
/// Events are applied strictly in arrival order. A closed channel before
/// commit abandons the session.
pub fn run_session(extractor: &ModeExtractor, events: Receiver<SessionEvent>) -> Option<ModeSet> {
    let mut session = extractor.session();
    for event in events {
        match session.handle(event) {
            Ok(state) if state.is_terminal() => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("{e}");
                break;
            }
        }
    }
    if !session.state().is_terminal() {
        tracing::info!("event source closed before commit, session abandoned");
    }
    session.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::Decay;
    use std::f64::consts::PI;
    use std::sync::mpsc;

    const SR: f64 = 44100.0;

    /// Two decaying partials: 440 Hz (amp 1.0, tau 0.4) and 1210 Hz (amp 0.5, tau 0.15).
    fn strike() -> Waveform {
        let n = (SR * 1.5) as usize;
        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / SR;
                (-t / 0.4).exp() * (2.0 * PI * 440.0 * t).sin()
                    + 0.5 * (-t / 0.15).exp() * (2.0 * PI * 1210.0 * t).sin()
            })
            .collect();
        Waveform::new(samples, SR).unwrap()
    }

    fn extractor() -> ModeExtractor {
        ModeExtractor::new(strike(), ExtractorConfig::default())
    }

    #[test]
    fn test_waveform_rejects_bad_rate() {
        assert!(Waveform::new(vec![0.0; 4], 0.0).is_err());
        assert!(Waveform::new(vec![0.0; 4], f64::NAN).is_err());
    }

    #[test]
    fn test_snaps_and_fits_each_partial() {
        let ex = extractor();
        let a = ex.analyze(430.0);
        assert!((a.frequency - 440.0).abs() < 1.0, "snapped to {}", a.frequency);
        match a.fit {
            FitOutcome::Converged { decay_time, .. } => {
                assert!((decay_time - 0.4).abs() / 0.4 < 0.1, "tau {decay_time}");
            }
            other => panic!("440 Hz fit failed: {other:?}"),
        }

        let b = ex.analyze(1250.0);
        assert!((b.frequency - 1210.0).abs() < 1.0, "snapped to {}", b.frequency);
        match b.fit {
            FitOutcome::Converged { decay_time, .. } => {
                assert!((decay_time - 0.15).abs() / 0.15 < 0.1, "tau {decay_time}");
            }
            other => panic!("1210 Hz fit failed: {other:?}"),
        }
        assert!(a.fit.amplitude() > b.fit.amplitude());
    }

    #[test]
    fn test_degenerate_band_returns_unfiltered() {
        let ex = extractor();
        // Above Nyquist: low edge exceeds the clamped high edge.
        let out = ex.bandpass_isolate(30000.0, None);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, ex.waveform().samples());

        // Zero width collapses the band.
        let out = ex.bandpass_isolate(440.0, Some(0.0));
        assert_eq!(&*out, ex.waveform().samples());
    }

    #[test]
    fn test_band_edges() {
        let ex = extractor();
        let (lo, hi) = ex.band_edges(440.0, None).unwrap();
        assert!((lo - 415.0).abs() < 1e-9 && (hi - 465.0).abs() < 1e-9);

        let (lo, hi) = ex.band_edges(4000.0, None).unwrap();
        assert!((lo - 3900.0).abs() < 1e-9 && (hi - 4100.0).abs() < 1e-9);

        let (lo, _) = ex.band_edges(10.0, None).unwrap();
        assert_eq!(lo, 1.0);

        let (_, hi) = ex.band_edges(22040.0, None).unwrap();
        assert!((hi - 22050.0 * 0.999).abs() < 1e-9);
    }

    #[test]
    fn test_session_commit_normalizes_in_arrival_order() {
        let ex = extractor();
        let mut s = ex.session();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.handle(SessionEvent::PeakSelected(1200.0)).unwrap(), SessionState::Selecting);
        assert_eq!(s.handle(SessionEvent::PeakSelected(445.0)).unwrap(), SessionState::Selecting);
        assert_eq!(s.handle(SessionEvent::Commit).unwrap(), SessionState::Done);
        assert_eq!(s.handle(SessionEvent::PeakSelected(440.0)), Err(SessionError::Finished));

        let set = s.finish().unwrap();
        assert_eq!(set.len(), 2);
        // Selection order, not frequency order.
        assert!((set.modes()[0].frequency - 1210.0).abs() < 1.0);
        assert!((set.modes()[1].frequency - 440.0).abs() < 1.0);
        assert!((set.max_amplitude() - 1.0).abs() < 1e-12);
        assert_eq!(set.modes()[1].amplitude, 1.0);
    }

    #[test]
    fn test_session_cancel_discards() {
        let ex = extractor();
        let mut s = ex.session();
        s.handle(SessionEvent::PeakSelected(440.0)).unwrap();
        assert_eq!(s.handle(SessionEvent::Cancel).unwrap(), SessionState::Cancelled);
        assert!(s.selections().is_empty());
        assert_eq!(s.handle(SessionEvent::Commit), Err(SessionError::Finished));
        assert!(s.finish().is_none());
    }

    #[test]
    fn test_cancel_from_idle_and_empty_commit() {
        let ex = extractor();
        let mut s = ex.session();
        assert_eq!(s.handle(SessionEvent::Cancel).unwrap(), SessionState::Cancelled);
        assert!(s.finish().is_none());

        let mut s = ex.session();
        assert_eq!(s.handle(SessionEvent::Commit).unwrap(), SessionState::Cancelled);
        assert!(s.finish().is_none());
    }

    #[test]
    fn test_invalid_selection_ignored() {
        let ex = extractor();
        let mut s = ex.session();
        assert_eq!(s.handle(SessionEvent::PeakSelected(f64::NAN)).unwrap(), SessionState::Idle);
        assert_eq!(s.handle(SessionEvent::PeakSelected(-5.0)).unwrap(), SessionState::Idle);
        assert!(s.selections().is_empty());
    }

    #[test]
    fn test_run_session_over_channel() {
        let ex = extractor();
        let (tx, rx) = mpsc::channel();
        tx.send(SessionEvent::PeakSelected(440.0)).unwrap();
        tx.send(SessionEvent::PeakSelected(1210.0)).unwrap();
        tx.send(SessionEvent::Commit).unwrap();
        tx.send(SessionEvent::PeakSelected(2000.0)).unwrap();
        drop(tx);

        let set = run_session(&ex, rx).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.modes().iter().all(|m| matches!(m.decay_time, Decay::Seconds(_))));
    }

    #[test]
    fn test_run_session_disconnect_abandons() {
        let ex = extractor();
        let (tx, rx) = mpsc::channel();
        tx.send(SessionEvent::PeakSelected(440.0)).unwrap();
        drop(tx);
        assert!(run_session(&ex, rx).is_none());
    }

    #[test]
    fn test_non_convergent_selection_kept_with_sentinel() {
        let samples = vec![0.0; 4096];
        let ex = ModeExtractor::new(Waveform::new(samples, SR).unwrap(), ExtractorConfig::default());
        let mut s = ex.session();
        s.handle(SessionEvent::PeakSelected(440.0)).unwrap();
        s.handle(SessionEvent::Commit).unwrap();
        let set = s.finish().unwrap();
        assert_eq!(set.modes()[0].decay_time, Decay::NonConvergent);
        assert_eq!(set.modes()[0].amplitude, 0.0);
        assert_eq!(set.modes()[0].frequency, 440.0);
    }
}
