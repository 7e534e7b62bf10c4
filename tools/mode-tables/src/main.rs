//! Mode Tables: generate bar resonator mode tables and the excitation
//! noise burst as Rust source or JSON.
//!
//! Analytic tables come from the beam model over a material registry
//! (built-in wood, glass and metal, or a TOML file). Static tables scale the
//! measured overtone tables to each note's pitch.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use barmodes_dsp::beam::{DEFAULT_STRIKE_FRACTION, DEFAULT_STRIKE_STRENGTH};
use barmodes_dsp::build::{self, StrikeSpec, TableBuild};
use barmodes_dsp::material::MaterialRegistry;
use barmodes_dsp::modes::{Decay, ModeTable, TableKey};
use barmodes_dsp::noise::{DEFAULT_SEED, NOISE_BURST_LEN, NoiseBurst};
use barmodes_dsp::overtone::MaterialClass;
use barmodes_dsp::tables::{MIDI_HI, MIDI_LO, NUM_MODES};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mode-tables", version, about = "Generate bar resonator mode tables")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Rust, global = true)]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Beam-model modes for every material and note
    Analytic {
        /// TOML material registry (default: built-in wood, glass, metal)
        #[arg(long)]
        materials: Option<PathBuf>,

        /// Strike position as a fraction of bar length
        #[arg(long, default_value_t = DEFAULT_STRIKE_FRACTION)]
        strike_pos: f64,

        /// Strike strength
        #[arg(long, default_value_t = DEFAULT_STRIKE_STRENGTH)]
        strike_strength: f64,

        /// Lowest MIDI note
        #[arg(long, default_value_t = MIDI_LO)]
        lo: u8,

        /// Highest MIDI note
        #[arg(long, default_value_t = MIDI_HI)]
        hi: u8,
    },
    /// Static overtone modes scaled to each note
    Static {
        /// Material classes (default: all)
        #[arg(long, value_delimiter = ',')]
        classes: Vec<MaterialClass>,

        #[arg(long, default_value_t = MIDI_LO)]
        lo: u8,

        #[arg(long, default_value_t = MIDI_HI)]
        hi: u8,
    },
    /// Seeded uniform noise burst
    Noise {
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        #[arg(long, default_value_t = NOISE_BURST_LEN)]
        count: usize,
    },
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

    let text = match cli.command {
        Command::Analytic {
            materials,
            strike_pos,
            strike_strength,
            lo,
            hi,
        } => {
            check_range(lo, hi)?;
            let registry = match materials {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    MaterialRegistry::from_toml_str(&text)
                        .with_context(|| format!("loading materials from {}", path.display()))?
                }
                None => MaterialRegistry::builtin(),
            };
            if registry.is_empty() {
                bail!("material registry is empty");
            }
            let strike = StrikeSpec {
                position: strike_pos,
                strength: strike_strength,
            };
            let build = build::build_analytic_table(&registry, lo..=hi, strike);
            check_rejections(&build)?;
            render_table(&build.table, cli.format, "MODES", lo, hi)?
        }
        Command::Static { classes, lo, hi } => {
            check_range(lo, hi)?;
            let classes = if classes.is_empty() {
                MaterialClass::ALL.to_vec()
            } else {
                classes
            };
            let build = build::build_static_table(&classes, lo..=hi);
            check_rejections(&build)?;
            render_table(&build.table, cli.format, "OVERTONES", lo, hi)?
        }
        Command::Noise { seed, count } => {
            let burst = NoiseBurst::generate(count, seed);
            tracing::info!(seed, count, "noise burst generated");
            match cli.format {
                Format::Json => serde_json::to_string_pretty(&burst)?,
                Format::Rust => rust_noise(&burst, seed),
            }
        }
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

fn check_range(lo: u8, hi: u8) -> Result<()> {
    if lo < MIDI_LO || hi > MIDI_HI || lo > hi {
        bail!("note range {lo}..={hi} outside {MIDI_LO}..={MIDI_HI}");
    }
    Ok(())
}

fn check_rejections(build: &TableBuild) -> Result<()> {
    for r in &build.rejected {
        tracing::error!(material = %r.material, note = r.note, "{}", r.error);
    }
    if !build.rejected.is_empty() {
        bail!("{} (material, note) pairs rejected", build.rejected.len());
    }
    Ok(())
}

fn render_table(table: &ModeTable, format: Format, suffix: &str, lo: u8, hi: u8) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(&table.entries())?),
        Format::Rust => rust_table(table, suffix, lo, hi),
    }
}

// ── Rust source emission ────────────────────────────────────────────────────

/// Float literal that reads back as the same f32.
fn f32_literal(x: f64) -> String {
    let v = x as f32;
    if v.is_finite() {
        format!("{v:?}")
    } else if v > 0.0 {
        "f32::INFINITY".to_string()
    } else {
        "f32::NAN".to_string()
    }
}

/// `rosewood-2` -> `ROSEWOOD_2`
fn const_ident(material: &str) -> String {
    let mut ident: String = material
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

fn note_name(midi: u8) -> String {
    const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
    format!("{}{}", NAMES[(midi % 12) as usize], (midi / 12) as i32 - 1)
}

fn rust_table(table: &ModeTable, suffix: &str, lo: u8, hi: u8) -> Result<String> {
    let notes = (hi - lo) as usize + 1;
    let mut out = String::new();

    writeln!(out, "// Generated by mode-tables. Do not edit.")?;
    writeln!(out)?;
    writeln!(out, "#[derive(Debug, Clone, Copy)]")?;
    writeln!(out, "pub struct Mode {{")?;
    writeln!(out, "    pub f: f32,")?;
    writeln!(out, "    pub amp: f32,")?;
    writeln!(out, "    pub t60: f32,")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "pub const FIRST_NOTE: u8 = {lo};")?;

    for material in table.materials() {
        writeln!(out)?;
        writeln!(out, "#[rustfmt::skip]")?;
        writeln!(
            out,
            "pub const {}_{suffix}: [[Mode; {NUM_MODES}]; {notes}] = [",
            const_ident(material)
        )?;
        for note in lo..=hi {
            let Some(set) = table.get(material, &TableKey::Note(note)) else {
                bail!("missing entry for {material} note {note}");
            };
            if set.len() != NUM_MODES {
                bail!("{material} note {note}: expected {NUM_MODES} modes, got {}", set.len());
            }
            writeln!(out, "    // {} ({note})", note_name(note))?;
            write!(out, "    [")?;
            for (i, m) in set.modes().iter().enumerate() {
                if i > 0 {
                    write!(out, ", ")?;
                }
                let t60 = match m.decay_time {
                    Decay::Seconds(t) => t,
                    Decay::NonConvergent => f64::INFINITY,
                };
                write!(
                    out,
                    "Mode {{ f: {}, amp: {}, t60: {} }}",
                    f32_literal(m.frequency),
                    f32_literal(m.amplitude),
                    f32_literal(t60)
                )?;
            }
            writeln!(out, "],")?;
        }
        writeln!(out, "];")?;
    }
    Ok(out)
}

fn rust_noise(burst: &[f64], seed: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// Generated by mode-tables (seed {seed:#x}). Do not edit.");
    let _ = writeln!(out);
    let _ = writeln!(out, "#[rustfmt::skip]");
    let _ = writeln!(out, "pub const NOISE_BURST: [f32; {}] = [", burst.len());
    for chunk in burst.chunks(8) {
        let line: Vec<String> = chunk.iter().map(|&x| f32_literal(x)).collect();
        let _ = writeln!(out, "    {},", line.join(", "));
    }
    let _ = writeln!(out, "];");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_ident() {
        assert_eq!(const_ident("wood"), "WOOD");
        assert_eq!(const_ident("rose-wood"), "ROSE_WOOD");
        assert_eq!(const_ident("2x4"), "_2X4");
    }

    #[test]
    fn test_f32_literal() {
        assert_eq!(f32_literal(440.0), "440.0");
        assert_eq!(f32_literal(f64::INFINITY), "f32::INFINITY");
        assert_eq!(f32_literal(0.5), "0.5");
    }

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(21), "A0");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(108), "C8");
    }

    #[test]
    fn test_rust_table_shape() {
        let build = build::build_static_table(&[MaterialClass::Wood], 69..=70);
        let text = rust_table(&build.table, "OVERTONES", 69, 70).unwrap();
        assert!(text.contains("pub const WOOD_OVERTONES: [[Mode; 8]; 2] = ["));
        assert!(text.contains("// A4 (69)"));
        assert!(text.contains("Mode { f: 440.0, amp: 1.0, t60: 0.8 }"));
        assert_eq!(text.matches("Mode { f:").count(), 16);
    }

    #[test]
    fn test_rust_noise_shape() {
        let burst = NoiseBurst::generate(10, 1);
        let text = rust_noise(&burst, 1);
        assert!(text.contains("pub const NOISE_BURST: [f32; 10] = ["));
        assert_eq!(text.lines().filter(|l| l.starts_with("    ")).count(), 2);
    }
}
