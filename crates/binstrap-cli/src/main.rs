//! binstrap - fetch, verify, and cache a server binary before launch

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use binstrap_core::{LoadContext, LoadEvent, Platform, Reporter, load_server, storage};

#[derive(Parser)]
#[command(name = "binstrap")]
#[command(author, version, about = "Fetch, verify, and cache a server binary before launch")]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Tool name used in release asset and binary filenames
    #[arg(long)]
    tool: String,

    /// Release version, without the leading 'v'
    #[arg(long)]
    version: String,

    /// Cache root directory
    #[arg(long, env = "BINSTRAP_HOME")]
    storage_root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure the server binary is downloaded, verified, and ready to run
    Ensure {
        #[command(flatten)]
        target: Target,

        /// Base URL of the release downloads, up to the /v<version>/ segment
        #[arg(long, env = "BINSTRAP_RELEASE_BASE")]
        release_base: String,

        /// Path to the base64 Ed25519 public key the releases are signed with
        #[arg(long)]
        public_key: PathBuf,

        /// Absolute path to a pre-existing server binary, bypassing cache and download
        #[arg(long, env = "BINSTRAP_SERVER_PATH")]
        server_path_override: Option<PathBuf>,

        /// Skip signature verification (not recommended)
        #[arg(long)]
        disable_safety_check: bool,

        /// Trust an already-complete cache entry without re-verifying it
        #[arg(long)]
        trust_cached: bool,
    },
    /// Print the cache paths for a tool and version and whether they exist
    Path {
        #[command(flatten)]
        target: Target,
    },
    /// Delete every cached binary version
    Clean {
        /// Cache root directory
        #[arg(long, env = "BINSTRAP_HOME")]
        storage_root: Option<PathBuf>,
    },
}

/// Bridges the injected reporter onto the process log stream.
struct ConsoleReporter {
    quiet: bool,
}

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        if !self.quiet {
            tracing::info!("{msg}");
        }
    }
    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }
    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
}

fn resolve_storage_root(root: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(root) = root {
        return Ok(root);
    }
    dirs::data_dir()
        .map(|dir| dir.join("binstrap"))
        .context("could not determine a data directory; set --storage-root or BINSTRAP_HOME")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ensure {
            target,
            release_base,
            public_key,
            server_path_override,
            disable_safety_check,
            trust_cached,
        } => {
            let storage_root = resolve_storage_root(target.storage_root)?;
            let mut ctx = LoadContext::new(
                storage_root,
                &target.tool,
                &target.version,
                &release_base,
                public_key,
            );
            ctx.binary_override = server_path_override;
            ctx.disable_verification = disable_safety_check;
            ctx.trust_cached = trust_cached;

            ensure(ctx, cli.quiet).await
        }
        Commands::Path { target } => {
            let storage_root = resolve_storage_root(target.storage_root)?;
            print_paths(&storage_root, &target.tool, &target.version).await
        }
        Commands::Clean { storage_root } => {
            let storage_root = resolve_storage_root(storage_root)?;
            storage::clean_bin_cache(&storage_root)
                .await
                .with_context(|| {
                    format!(
                        "failed to clean {}",
                        storage::bin_cache_dir(&storage_root).display()
                    )
                })?;
            if !cli.quiet {
                tracing::info!(
                    "Cleaned {}",
                    storage::bin_cache_dir(&storage_root).display()
                );
            }
            Ok(())
        }
    }
}

async fn ensure(ctx: LoadContext, quiet: bool) -> Result<()> {
    let reporter = Arc::new(ConsoleReporter { quiet });
    let mut events = load_server(ctx, reporter);

    while let Some(event) = events.recv().await {
        match event {
            LoadEvent::DownloadStarted => {
                if !quiet {
                    tracing::info!("Download started");
                }
            }
            LoadEvent::Ready(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            LoadEvent::Failed(err) => return Err(err.into()),
        }
    }

    anyhow::bail!("readiness computation ended without a terminal event")
}

async fn print_paths(storage_root: &std::path::Path, tool: &str, version: &str) -> Result<()> {
    let platform = Platform::current().context("cannot resolve the host platform")?;
    let layout = storage::StorageLayout::new(storage_root, tool, version, platform.os);

    for (label, path) in [
        ("binary", layout.binary_path()),
        ("signature", layout.signature_path()),
    ] {
        let state = if storage::file_exists(&path).await? {
            "present"
        } else {
            "absent"
        };
        println!("{label}: {} ({state})", path.display());
    }
    Ok(())
}
