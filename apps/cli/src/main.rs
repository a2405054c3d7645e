//! nasferry entry point.

mod config;
mod server_adapter;
mod terminal_sink;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nasferry_client::Client;
use nasferry_sessions::{
    ArchiveJobController, ArchiveOutcome, ArchiveTarget, CancelHandle, FileServer,
    ParallelUploadSession, SequentialUploadSession, SessionOutcome, TransferEventSink,
};
use nasferry_transfer::{TransferTask, percent_of, scan_folder};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;
use crate::server_adapter::HttpFileServer;
use crate::terminal_sink::{TerminalSink, format_bytes};

#[derive(Parser)]
#[command(name = "nasferry", version, about = "Move files to and from a NAS file service")]
struct Cli {
    /// Server base URL (overrides the config file).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files one after another into a remote folder.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Remote destination folder.
        #[arg(long, default_value = "/")]
        dest: String,
        /// Keep the partial remote file when cancelled.
        #[arg(long)]
        no_cleanup: bool,
    },
    /// Upload a local folder recursively, all files at once.
    UploadFolder {
        folder: PathBuf,
        /// Remote folder the local folder is recreated under.
        #[arg(long, default_value = "/")]
        dest: String,
        /// Maximum simultaneous uploads.
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Build a zip of remote paths on the server and download it.
    Zip {
        /// One remote folder, or several files and folders.
        #[arg(required = true)]
        paths: Vec<String>,
        /// Local directory for the downloaded archive.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Milliseconds between progress checks.
        #[arg(long)]
        poll_ms: Option<u64>,
    },
    /// Delete a remote file or folder.
    Delete { path: String },
    /// Show or change the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Store the server base URL.
    SetServer { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs on stderr, progress on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match CliConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load config, using defaults");
            CliConfig::default()
        }
    };
    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }

    match cli.command {
        Command::Config { action } => run_config(config, action),
        command => {
            tracing::debug!(server = %config.server_url, "using server");
            let client = Client::new(&config.server_url)
                .with_context(|| format!("bad server URL {}", config.server_url))?;
            run_command(&config, client, command).await
        }
    }
}

fn run_config(mut config: CliConfig, action: ConfigAction) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetServer { url } => {
            Client::new(&url).with_context(|| format!("bad server URL {url}"))?;
            config.server_url = url;
            let path = config.save()?;
            println!("saved {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_command(
    config: &CliConfig,
    client: Client,
    command: Command,
) -> anyhow::Result<ExitCode> {
    let server: Arc<dyn FileServer> = Arc::new(HttpFileServer::new(client.clone()));

    match command {
        Command::Upload {
            files,
            dest,
            no_cleanup,
        } => {
            let tasks = files
                .iter()
                .map(|path| TransferTask::from_path(path, dest.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            let mut seq_config = config.sequential();
            if no_cleanup {
                seq_config.compensating_delete = false;
            }

            let sink = Arc::new(TerminalSink::new("upload"));
            let mut session = SequentialUploadSession::new(server, sink, tasks, seq_config);
            cancel_on_ctrl_c(session.cancel_handle());
            Ok(exit_code(session.run().await))
        }
        Command::UploadFolder { folder, dest, jobs } => {
            let (files, total) = scan_folder(&folder)?;
            tracing::info!(
                folder = %folder.display(),
                files = files.len(),
                size = %format_bytes(total as f64),
                "folder scanned"
            );

            let mut par_config = config.parallel();
            if jobs.is_some() {
                par_config.max_concurrent = jobs;
            }

            let sink = Arc::new(TerminalSink::new("upload"));
            let mut session =
                ParallelUploadSession::from_selection(server, sink, &dest, &files, par_config)?;
            cancel_on_ctrl_c(session.cancel_handle());
            Ok(exit_code(session.run().await))
        }
        Command::Zip {
            mut paths,
            out,
            poll_ms,
        } => {
            let target = if paths.len() == 1 {
                ArchiveTarget::Folder(paths.remove(0))
            } else {
                ArchiveTarget::Paths(paths)
            };
            let mut archive_config = config.archive();
            if let Some(ms) = poll_ms {
                archive_config.poll_interval = std::time::Duration::from_millis(ms.max(1));
            }

            let sink = Arc::new(TerminalSink::new("zip"));
            let controller = Arc::new(ArchiveJobController::new(server, sink, archive_config));
            let watcher = Arc::clone(&controller);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    watcher.cancel().await;
                }
            });

            match controller.run(target).await? {
                ArchiveOutcome::Ready { job_id, .. } => {
                    let dir = out.unwrap_or_else(|| config.download_dir());
                    let path = download(&client, &job_id, &dir).await?;
                    println!("saved {}", path.display());
                    Ok(ExitCode::SUCCESS)
                }
                ArchiveOutcome::Failed(_) => Ok(ExitCode::FAILURE),
                ArchiveOutcome::Cancelled => Ok(ExitCode::from(130)),
            }
        }
        Command::Delete { path } => {
            client.delete(&path).await?;
            println!("deleted {path}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

async fn download(
    client: &Client,
    job_id: &nasferry_protocol::JobId,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let sink = TerminalSink::new("download");
    let path = client
        .download_archive(job_id, dir, |received, total| match total {
            Some(total) if total > 0 => sink.on_progress(percent_of(received, total)),
            _ => print!("\rdownload {}", format_bytes(received as f64)),
        })
        .await?;
    println!();
    Ok(path)
}

fn cancel_on_ctrl_c(handle: CancelHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            handle.cancel();
        }
    });
}

fn exit_code(outcome: SessionOutcome) -> ExitCode {
    match outcome {
        SessionOutcome::Empty => {
            println!("nothing to upload");
            ExitCode::SUCCESS
        }
        SessionOutcome::Completed => ExitCode::SUCCESS,
        SessionOutcome::Failed(_) => ExitCode::FAILURE,
        SessionOutcome::Cancelled => ExitCode::from(130),
    }
}
