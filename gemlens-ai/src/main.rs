//! gemlens-ai - Gemstone image recognition CLI
//!
//! - `analyze`: classify and extract every image of one gemstone through the
//!   vision oracle, fuse, print the `GemstoneReport` as JSON
//! - `fuse`: fuse saved per-image extractions offline (no oracle)

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gemlens_ai::schema::PerImageExtraction;
use gemlens_ai::{fuse, FusionConfig, GemstoneAnalyzer, HttpVisionOracle, ImageRef};
use gemlens_common::config::{resolve_config, TomlConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gemlens-ai
#[derive(Parser, Debug)]
#[command(name = "gemlens-ai")]
#[command(about = "Gemstone attribute recognition from instrument, label and macro photographs")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = "GEMLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze all images of one gemstone
    Analyze {
        /// Identifier reported back in the output
        #[arg(short, long)]
        gemstone_id: String,

        /// Fuse whatever is available after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Image files or http(s) URLs
        #[arg(required = true)]
        images: Vec<String>,
    },

    /// Fuse a JSON array of per-image extractions
    Fuse {
        /// File holding `[PerImageExtraction, ...]`
        extractions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first: it carries the default log level
    let (config, config_path) =
        resolve_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing (RUST_LOG overrides [logging] level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Starting gemlens-ai {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    match args.command {
        Command::Analyze {
            gemstone_id,
            deadline_secs,
            images,
        } => analyze(&config, &gemstone_id, deadline_secs, &images).await,
        Command::Fuse { extractions } => fuse_file(&config, &extractions).await,
    }
}

async fn analyze(
    config: &TomlConfig,
    gemstone_id: &str,
    deadline_secs: Option<u64>,
    inputs: &[String],
) -> Result<()> {
    let oracle = HttpVisionOracle::from_config(&config.oracle)
        .context("Failed to initialize vision oracle")?;
    info!("Vision oracle: {} ({})", oracle.endpoint(), config.oracle.model);

    let mut images = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        images.push(load_image(index, input).await?);
    }

    let mut analyzer = GemstoneAnalyzer::from_config(Arc::new(oracle), config);
    if let Some(secs) = deadline_secs {
        analyzer = analyzer.with_deadline(Some(Duration::from_secs(secs)));
    }

    // Ctrl+C stops waiting and fuses what is available
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing with partial results");
            on_signal.cancel();
        }
    });

    let report = analyzer
        .analyze_with_cancel(gemstone_id, images, cancel)
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn fuse_file(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let extractions: Vec<PerImageExtraction> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse extractions in {}", path.display()))?;

    info!("Fusing {} extractions from {}", extractions.len(), path.display());
    let result = fuse(&extractions, &FusionConfig::from(config.fusion));

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Turn a CLI argument into an image reference
async fn load_image(index: usize, input: &str) -> Result<ImageRef> {
    if input.starts_with("http://") || input.starts_with("https://") {
        return Ok(ImageRef::from_url(url_image_id(index, input), input));
    }
    ImageRef::from_path(Path::new(input))
        .await
        .with_context(|| format!("Failed to load image {}", input))
}

/// Last path segment without extension, else a positional id
fn url_image_id(index: usize, url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .and_then(|segment| segment.split('.').next())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("image-{}", index + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_image_id() {
        assert_eq!(url_image_id(0, "https://cdn.example.com/stones/scale_01.jpg?x=1"), "scale_01");
        assert_eq!(url_image_id(2, "https://cdn.example.com/"), "image-3");
    }

    #[test]
    fn test_build_stamp() {
        assert!(!env!("GIT_HASH").is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(env!("BUILD_TIMESTAMP")).is_ok());
        assert!(!env!("BUILD_PROFILE").is_empty());
    }

    #[test]
    fn test_args_parse_analyze() {
        let args = Args::parse_from([
            "gemlens-ai",
            "analyze",
            "--gemstone-id",
            "gem-7",
            "a.jpg",
            "https://cdn.example.com/b.png",
        ]);
        match args.command {
            Command::Analyze {
                gemstone_id, images, ..
            } => {
                assert_eq!(gemstone_id, "gem-7");
                assert_eq!(images.len(), 2);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
