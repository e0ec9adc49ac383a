//! slowchik-render: apply the player's effects to a file and export it.

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use slowchik_core::{Param, PlayerConfig, Preset, Session};

#[derive(Parser)]
#[command(name = "slowchik-render")]
#[command(version, about = "Render an audio file through the Slowchik effect chain")]
struct Cli {
    /// Input audio file (WAV, or MP3 with the `codecs` feature)
    input: PathBuf,

    /// Apply a preset first (slowed-reverb, nightcore); sliders below override it
    #[arg(long)]
    preset: Option<Preset>,

    #[arg(long)]
    speed: Option<f64>,

    /// Semitones, -12..12
    #[arg(long, allow_hyphen_values = true)]
    pitch: Option<f64>,

    /// Shelf gain in dB, -40..40
    #[arg(long, allow_hyphen_values = true)]
    bass: Option<f64>,

    /// Percent
    #[arg(long)]
    reverb: Option<f64>,

    /// Percent
    #[arg(long)]
    delay: Option<f64>,

    /// Percent
    #[arg(long)]
    chorus: Option<f64>,

    /// JSON file of PlayerConfig overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the reverb impulse, for reproducible exports
    #[arg(long)]
    seed: Option<u64>,

    /// Output file or directory (default: current directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("wav") | Some("wave") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        _ => "application/octet-stream",
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlayerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PlayerConfig::default(),
    };
    if cli.seed.is_some() {
        config.impulse_seed = cli.seed;
    }

    let mut session = Session::new(config);
    let bytes = std::fs::read(&cli.input)?;
    session.load(&bytes, mime_for(&cli.input))?;

    if let Some(preset) = cli.preset {
        session.apply_preset(preset)?;
    }
    let sliders = [
        (Param::Speed, cli.speed),
        (Param::Pitch, cli.pitch),
        (Param::Bass, cli.bass),
        (Param::Reverb, cli.reverb),
        (Param::Delay, cli.delay),
        (Param::Chorus, cli.chorus),
    ];
    for (param, value) in sliders {
        if let Some(value) = value {
            session.set_param(param, value)?;
        }
    }

    let encoded = session.export()?;
    let path = match cli.output {
        Some(path) if path.is_dir() => path.join(encoded.file_name()),
        Some(path) => path,
        None => PathBuf::from(encoded.file_name()),
    };
    std::fs::write(&path, &encoded.bytes)?;
    info!(path = %path.display(), bytes = encoded.bytes.len(), "export written");

    Ok(())
}
