//! boxkit command-line uploader entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Upload a file through a resumable chunked upload session.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// File to upload.
    file: PathBuf,

    /// Destination folder ID.
    #[arg(long, default_value = "0")]
    folder: String,

    /// Continue an existing upload session instead of opening a new one.
    #[arg(long)]
    session: Option<String>,

    /// Configuration file (defaults to the platform location).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Times a failed upload is resumed before the session is aborted.
    #[arg(long)]
    resume_attempts: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting boxkit uploader");

    let config = config::Config::load(args.config.as_deref())?;

    let request = app::UploadRequest {
        path: &args.file,
        folder_id: &args.folder,
        session_id: args.session.as_deref(),
        resume_attempts: args.resume_attempts,
    };
    let file = app::run(&config, &request)?;

    tracing::info!(file_id = %file.id, name = %file.name, "upload complete");
    Ok(())
}
