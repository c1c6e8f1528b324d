//! Command line front end: render a WAV or MP3 file through the hall reverb.
//!
//! Usage: hallverb <input> [-o output.wav] [--params preset.json] [--seed N]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use hallverb_core::decode::AutoDecoder;
use hallverb_core::progress::Stage;
use hallverb_core::{EffectParameters, ReverbError, ReverbPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hallverb", about = "Spatial hall reverb renderer", version)]
struct Cli {
    /// Input audio file (WAV or MP3)
    input: PathBuf,

    /// Output WAV file (defaults to <input>_reverb.wav next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file overriding effect parameters
    #[arg(long)]
    params: Option<PathBuf>,

    /// Seed for the impulse-response noise
    #[arg(long)]
    seed: Option<u64>,
}

fn load_params(cli: &Cli) -> Result<EffectParameters, Box<dyn std::error::Error>> {
    let mut params = match &cli.params {
        Some(path) => {
            let json = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            EffectParameters::from_json(&json).map_err(ReverbError::Config)?
        }
        None => EffectParameters::hall(),
    };
    if let Some(seed) = cli.seed {
        params.seed = Some(seed);
    }
    Ok(params)
}

fn run(cli: &Cli) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let params = load_params(cli)?;
    let bytes = fs::read(&cli.input)
        .map_err(|e| format!("failed to read {}: {e}", cli.input.display()))?;
    let file_name = cli
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output");

    let pipeline = ReverbPipeline::new(params)?;
    let mut last_stage = None;
    let converted = pipeline.convert(&AutoDecoder, &bytes, file_name, &mut |percent: f32, stage: Stage| {
        if last_stage != Some(stage) {
            eprintln!("[{percent:>3.0}%] {}", stage.label());
            last_stage = Some(stage);
        }
    })?;

    let output = cli.output.clone().unwrap_or_else(|| {
        cli.input
            .parent()
            .unwrap_or(Path::new("."))
            .join(&converted.file_name)
    });
    fs::write(&output, &converted.bytes)
        .map_err(|e| format!("failed to write {}: {e}", output.display()))?;
    Ok(output)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            eprintln!("Wrote {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
