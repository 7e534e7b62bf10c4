//! Mode Picker: extract mode frequencies, amplitudes and decays from a
//! recorded bar strike.
//!
//! Approximate peak frequencies come from `--peaks` or, one per line, from
//! stdin (`commit` finishes, `cancel` aborts). Each is snapped to the nearest
//! spectral peak, band-pass isolated and decay-fitted. The committed set is
//! printed as factor arrays relative to the first mode, or as JSON.

mod audio;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use anyhow::{Context, Result, bail};
use barmodes_dsp::config::ExtractorConfig;
use barmodes_dsp::extractor::{ModeExtractor, SessionEvent, Waveform, run_session};
use barmodes_dsp::modes::{Decay, ModeSet};
use clap::{Parser, ValueEnum};

use crate::audio::LoadOptions;

#[derive(Parser)]
#[command(name = "mode-picker", version, about = "Extract bar modes from a recorded strike")]
struct Cli {
    /// Recording to analyze (WAV)
    input: PathBuf,

    /// Approximate mode frequencies in Hz; commits after the last one.
    /// Without this, events are read from stdin.
    #[arg(long, value_delimiter = ',')]
    peaks: Vec<f64>,

    /// Extractor settings (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log the N strongest spectral peaks before selecting
    #[arg(long, default_value_t = 0)]
    suggest: usize,

    /// Silence trim threshold below the loudest frame (dB)
    #[arg(long, default_value_t = 40.0)]
    trim_db: f64,

    /// Analyze at most this many seconds after trimming
    #[arg(long, default_value_t = 2.0)]
    max_seconds: f64,

    #[arg(long, value_enum, default_value_t = Format::Rust)]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Rust,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let text =
                std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            ExtractorConfig::from_toml_str(&text).with_context(|| format!("loading {}", path.display()))?
        }
        None => ExtractorConfig::default(),
    };

    let options = LoadOptions {
        trim_db: cli.trim_db,
        max_seconds: cli.max_seconds,
    };
    let (samples, sample_rate) = audio::load_wav(&cli.input, &options)?;
    if samples.is_empty() {
        bail!("{}: recording is silent", cli.input.display());
    }
    tracing::info!(
        samples = samples.len(),
        sample_rate,
        "loaded {}",
        cli.input.display()
    );

    let waveform = Waveform::new(samples, sample_rate as f64)?;
    let extractor = ModeExtractor::new(waveform, config);

    for (freq, magnitude) in extractor.spectrum().strongest_peaks(cli.suggest) {
        tracing::info!(magnitude, "candidate peak {freq:.2} Hz");
    }

    let (tx, rx) = mpsc::channel();
    if cli.peaks.is_empty() {
        std::thread::spawn(move || read_events(std::io::stdin().lock(), tx));
    } else {
        for &hz in &cli.peaks {
            tx.send(SessionEvent::PeakSelected(hz))?;
        }
        tx.send(SessionEvent::Commit)?;
        drop(tx);
    }

    let Some(set) = run_session(&extractor, rx) else {
        eprintln!("No modes selected.");
        return Ok(());
    };

    let name = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let text = match cli.format {
        Format::Rust => rust_factors(&set),
        Format::Json => json_output(&name, &set)?,
    };

    match cli.output {
        Some(path) => {
            std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!("written: {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// Parse one line of the stdin protocol. `None` for blank lines and comments.
fn parse_event(line: &str) -> Option<Result<SessionEvent, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(match line.to_ascii_lowercase().as_str() {
        "commit" | "done" => Ok(SessionEvent::Commit),
        "cancel" | "quit" => Ok(SessionEvent::Cancel),
        other => other
            .parse::<f64>()
            .map(SessionEvent::PeakSelected)
            .map_err(|_| format!("unrecognized input '{line}'")),
    })
}

/// Forward stdin lines as session events until EOF or the session stops listening.
fn read_events(input: impl BufRead, tx: Sender<SessionEvent>) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse_event(&line) {
            Some(Ok(event)) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Some(Err(msg)) => tracing::warn!("{msg}"),
            None => {}
        }
    }
}

fn json_output(name: &str, set: &ModeSet) -> Result<String> {
    let value = serde_json::json!({
        "recording": name,
        "modes": set,
        "factors": set.relative_factors(),
    });
    Ok(serde_json::to_string_pretty(&value)? + "\n")
}

fn decay_label(decay: Decay) -> String {
    match decay {
        Decay::Seconds(t) => format!("{t:.3}s"),
        Decay::NonConvergent => "non-convergent".to_string(),
    }
}

/// Factor arrays relative to the first mode, as consumed by the synthesizer.
fn rust_factors(set: &ModeSet) -> String {
    let Some(f) = set.relative_factors() else {
        return String::new();
    };
    let n = f.frequency.len();
    let join = |items: Vec<String>| format!("    {},", items.join(", "));

    let freq: Vec<String> = f.frequency.iter().map(|x| format!("{x:.15}")).collect();
    let amp: Vec<String> = f.amplitude.iter().map(|x| format!("{x:.3}")).collect();
    let decay: Vec<String> = f
        .decay
        .iter()
        .map(|d| match d {
            Some(x) => format!("{x:.15}"),
            None => "f32::INFINITY".to_string(),
        })
        .collect();

    let mut out = format!(
        "// base freq {:.2} Hz, base decay {}\n",
        f.base_frequency,
        decay_label(f.base_decay)
    );
    out += &format!("const FREQ_FACTORS: [f32; {n}] = [\n{}\n];\n", join(freq));
    out += &format!("const AMP_FACTORS: [f32; {n}] = [\n{}\n];\n", join(amp));
    out += &format!("const DECAY_FACTORS: [f32; {n}] = [\n{}\n];\n", join(decay));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use barmodes_dsp::modes::Mode;

    #[test]
    fn test_parse_event() {
        assert_eq!(parse_event("440.5"), Some(Ok(SessionEvent::PeakSelected(440.5))));
        assert_eq!(parse_event(" COMMIT "), Some(Ok(SessionEvent::Commit)));
        assert_eq!(parse_event("cancel"), Some(Ok(SessionEvent::Cancel)));
        assert_eq!(parse_event(""), None);
        assert_eq!(parse_event("# note"), None);
        assert!(matches!(parse_event("loud"), Some(Err(_))));
    }

    #[test]
    fn test_read_events_stops_at_eof() {
        let (tx, rx) = mpsc::channel();
        read_events("440\n\nbogus\n1210\ncommit\n".as_bytes(), tx);
        let events: Vec<SessionEvent> = rx.iter().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::PeakSelected(440.0),
                SessionEvent::PeakSelected(1210.0),
                SessionEvent::Commit,
            ]
        );
    }

    #[test]
    fn test_rust_factors() {
        let set = ModeSet::normalized(vec![
            Mode {
                frequency: 400.0,
                amplitude: 1.0,
                decay_time: Decay::Seconds(0.5),
            },
            Mode {
                frequency: 1100.0,
                amplitude: 0.5,
                decay_time: Decay::NonConvergent,
            },
        ]);
        let text = rust_factors(&set);
        assert!(text.contains("base freq 400.00 Hz, base decay 0.500s"));
        assert!(text.contains("const FREQ_FACTORS: [f32; 2] = [\n    1.000000000000000, 2.750000000000000,\n];"));
        assert!(text.contains("const AMP_FACTORS: [f32; 2] = [\n    1.000, 0.500,\n];"));
        assert!(text.contains("1.000000000000000, f32::INFINITY,"));
    }
}
