//! Face Similarity CLI
//!
//! Compares two face images through the remote rotate/detect/encode services
//! and prints the confidence score.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use face_similarity::{build_runtime, compare_images, Config};

#[derive(Parser)]
#[command(name = "face-similarity")]
#[command(about = "Compare two face images via remote services", long_about = None)]
struct Cli {
    /// Path to configuration file (endpoints come from the environment
    /// when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two images and print the similarity score
    Compare {
        /// First image file
        image_1: PathBuf,

        /// Second image file
        image_2: PathBuf,
    },

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare { image_1, image_2 } => {
            compare_command(cli.config, image_1, image_2)?;
        }

        Commands::Validate => {
            validate_command(cli.config)?;
        }

        Commands::GenerateConfig { output } => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(&path),
        None => Ok(Config::from_env()),
    }
}

fn compare_command(config_path: Option<PathBuf>, image_1: PathBuf, image_2: PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    let base64_1 = read_image(&image_1)?;
    let base64_2 = read_image(&image_2)?;

    let runtime = build_runtime(config.worker_threads)?;
    let score = runtime.block_on(async { compare_images(&config, &base64_1, &base64_2).await })?;

    println!("{}", serde_json::json!({ "similarity": score }));

    Ok(())
}

fn read_image(path: &PathBuf) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(BASE64.encode(bytes))
}

fn validate_command(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;

    // A comparison would still fail fast on missing endpoints; say so here.
    for (name, value) in [
        (face_similarity::config::PRE_PROCESS_URL, &config.endpoints.rotate_url),
        (face_similarity::config::FACE_DETECT_URL, &config.endpoints.detect_url),
        (face_similarity::config::FACE_ENCODING_URL, &config.endpoints.encoding_url),
    ] {
        if value.is_none() {
            println!("warning: {} is not set", name);
        }
    }
    println!("Configuration is valid");
    Ok(())
}

fn generate_config_command(output: PathBuf) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# Face Similarity Pipeline Configuration

# === ENDPOINTS: The three remote services ===
# Any entry left unset falls back to the corresponding environment
# variable being absent, and a comparison fails with a configuration error.
endpoints:
  # Rotation/preprocessing service (PRE_PROCESS_URL)
  rotate_url: "http://127.0.0.1:9001/image/rotate-by-angle"

  # Face detection service (FACE_DETECT_URL)
  detect_url: "http://127.0.0.1:9002/image/face-detect"

  # Face encoding service (FACE_ENCODING_URL)
  encoding_url: "http://127.0.0.1:9003/image/face-encoding"

# === HTTP: Client tuning ===
http:
  # Per-call timeout in seconds. There is no pipeline-wide deadline;
  # enforce an end-to-end SLA in the caller if you need one.
  request_timeout_secs: 30

  # Connection establishment timeout in seconds
  connect_timeout_secs: 5

  # Idle pooled connections kept per host
  pool_max_idle_per_host: 32

# === PROXY: Outbound proxy for non-loopback endpoints ===
proxy:
  # Scheme name selecting the <scheme>_proxy environment entry
  # (required only when an endpoint is not on loopback)
  # scheme: "http"

# Tokio worker threads (null = num CPUs)
# worker_threads: 4
"#;

    std::fs::write(&output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}
