use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use duet_app::demo::{self, DemoOptions};
use duet_app::settings::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Authenticated, encrypted peer-to-peer file exchange", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share files between two peers on a simulated network
    Demo {
        /// Files to share (a generated sample when omitted)
        files: Vec<PathBuf>,
        /// Save downloads here instead of the configured directory
        #[arg(short, long)]
        download_dir: Option<PathBuf>,
        /// One-way link latency in milliseconds
        #[arg(long, default_value = "20")]
        latency_ms: u64,
    },
    /// Show settings, or update and save them
    Config {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        download_dir: Option<PathBuf>,
        #[arg(long)]
        chunk_delay_ms: Option<u64>,
        #[arg(long)]
        teardown_grace_ms: Option<u64>,
        #[arg(long)]
        mutual_auth: Option<bool>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load();

    match cli.command {
        Commands::Demo {
            files,
            download_dir,
            latency_ms,
        } => {
            let mut options = DemoOptions::from_settings(&settings, files);
            if let Some(dir) = download_dir {
                options.download_dir = dir;
            }
            options.latency = std::time::Duration::from_millis(latency_ms);
            let saved = demo::run(&settings, options).await?;
            demo::report(&saved);
        }
        Commands::Config {
            display_name,
            download_dir,
            chunk_delay_ms,
            teardown_grace_ms,
            mutual_auth,
        } => {
            let before = settings.clone();
            if let Some(name) = display_name {
                settings.display_name = name;
            }
            if let Some(dir) = download_dir {
                settings.download_dir = dir;
            }
            if let Some(ms) = chunk_delay_ms {
                settings.chunk_delay_ms = ms;
            }
            if let Some(ms) = teardown_grace_ms {
                settings.teardown_grace_ms = ms;
            }
            if let Some(mutual) = mutual_auth {
                settings.mutual_auth = mutual;
            }
            if settings != before {
                let path = settings.save()?;
                println!("# saved to {}", path.display());
            }
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}
