//! CAPTCHA OCR Server and CLI
//!
//! A cross-platform binary for CAPTCHA recognition via CLI or HTTP server.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! captcha-ocr-server predict --image captcha.png --model models/captcha.onnx --labels data/labels.csv
//! captcha-ocr-server predict --folder captchas/ --model models/captcha.onnx --labels data/labels.csv --output results/
//! ```
//!
//! ## Server Mode
//! ```bash
//! captcha-ocr-server serve --model models/captcha.onnx --labels data/labels.csv --port 8080
//! ```
//!
//! ## Fetching live CAPTCHAs
//! ```bash
//! captcha-ocr-server fetch --count 5 --output test_captchas
//! ```

mod cli;
mod config;
mod fetch;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "captcha-ocr-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CAPTCHA recognition via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize one image or a folder of images via CLI
    Predict {
        /// Path to a single image to recognize
        #[arg(long, short = 'i', conflicts_with = "folder")]
        image: Option<PathBuf>,

        /// Folder of images to recognize
        #[arg(long, short = 'f', conflicts_with = "image")]
        folder: Option<PathBuf>,

        /// Path to the recognition model
        #[arg(long, short = 'm', env = "CAPTCHA_MODEL")]
        model: PathBuf,

        /// Path to the labels file the alphabet is built from
        #[arg(long, env = "CAPTCHA_LABELS")]
        labels: Option<PathBuf>,

        /// Folder to write a predictions.txt results file into
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Start the HTTP server
    Serve {
        /// Path to the recognition model
        #[arg(long, short = 'm', env = "CAPTCHA_MODEL")]
        model: PathBuf,

        /// Path to the labels file the alphabet is built from
        #[arg(long, env = "CAPTCHA_LABELS")]
        labels: Option<PathBuf>,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1", env = "CAPTCHA_HOST")]
        host: String,

        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "CAPTCHA_PORT")]
        port: u16,

        /// Number of ONNX sessions to pool for concurrent inference
        #[arg(long, default_value = "1", env = "CAPTCHA_SESSION_POOL")]
        session_pool: usize,
    },
    /// Download fresh CAPTCHAs from the FSSP service
    Fetch {
        /// How many CAPTCHAs to download
        #[arg(long, short = 'n', default_value = "5")]
        count: usize,

        /// Folder to save the downloaded images into
        #[arg(long, short = 'o', default_value = "test_captchas")]
        output: PathBuf,

        /// Optional model to run the downloaded CAPTCHAs through
        #[arg(long, short = 'm', env = "CAPTCHA_MODEL")]
        model: Option<PathBuf>,

        /// Path to the labels file the alphabet is built from
        #[arg(long, env = "CAPTCHA_LABELS")]
        labels: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    captcha_ocr::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Predict {
            image,
            folder,
            model,
            labels,
            output,
        } => {
            let config = config::EngineConfig {
                model,
                labels,
                session_pool_size: 1,
            };

            if let Some(image) = image {
                info!("Processing image: {}", image.display());
                cli::process_image(&image, &config)?;
            } else if let Some(folder) = folder {
                info!("Processing folder: {}", folder.display());
                cli::process_folder(&folder, &config, output.as_deref())?;
            } else {
                eprintln!("Error: Either --image or --folder must be provided");
                std::process::exit(1);
            }
        }
        Commands::Serve {
            model,
            labels,
            host,
            port,
            session_pool,
        } => {
            let config = config::ServerConfig {
                engine: config::EngineConfig {
                    model,
                    labels,
                    session_pool_size: session_pool,
                },
                host,
                port,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
        Commands::Fetch {
            count,
            output,
            model,
            labels,
        } => {
            let saved = fetch::fetch_captchas(count, &output).await?;
            info!("Saved {} CAPTCHAs to {}", saved.len(), output.display());

            if let Some(model) = model {
                let config = config::EngineConfig {
                    model,
                    labels,
                    session_pool_size: 1,
                };
                cli::process_folder(&output, &config, None)?;
            }
        }
    }

    Ok(())
}
