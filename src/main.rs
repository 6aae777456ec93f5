//! # Wonderful Bing
//!
//! A wallpaper a day, keep the doctor away.
//!
//! Fetches Bing's picture of the day, saves it to a directory and sets it as
//! the wallpaper of your desktop environment, then shows the story behind
//! the picture as a notification. Meant to be run once per login or from
//! cron; scheduling is left to those.
//!
//! ## Modules
//! - `bing.rs` - Bing API client (metadata and image download)
//! - `environment.rs` - Supported desktop environments and their commands
//! - `orchestrator.rs` - Download-or-skip, apply and notify
//! - `retry.rs` - Delayed retry on network failure
//! - `host.rs` - Spawning the wallpaper command and notifications
//! - `config.rs` - Validated run settings and the optional defaults file
//! - `error.rs` - Error types
//!
//! ## CLI Usage
//! - `bing set [-d DIRECTORY] [-s] [-r] [--xfce4-path PATH] ENVIRONMENT`
//! - `bing story`
//! - `bing environments`

mod bing;
mod config;
mod environment;
mod error;
mod host;
mod orchestrator;
mod retry;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::bing::{BingClient, ImageSource};
use crate::config::{ApplyConfig, Defaults, DEFAULT_XFCE4_PATH};
use crate::environment::EnvironmentRegistry;
use crate::error::Result;
use crate::host::{HostLauncher, NotifySend};
use crate::orchestrator::{Orchestrator, Outcome};
use crate::retry::RetryPolicy;

#[derive(Debug, Parser)]
#[command(name = "bing", version, about = "A wallpaper a day, keep the doctor away.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download today's picture and set it as the wallpaper
    Set(SetArgs),

    /// Print the story behind today's picture
    Story {
        /// Bing regional market, e.g. en-US
        #[arg(short, long)]
        market: Option<String>,
    },

    /// List the supported desktop environments
    Environments,
}

#[derive(Debug, Args)]
struct SetArgs {
    /// Your desktop environment, see `bing environments`.
    /// If yours isn't listed, try "pywal" or "feh"
    environment: String,

    /// Where to save the downloaded picture [default: the temp directory]
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Image path property of the monitor to change (xfce4 only)
    /// [default: /backdrop/screen0/monitor0/image-path]
    #[arg(long = "xfce4-path", value_name = "XFCE4_PATH")]
    xfce4_path: Option<String>,

    /// Save the picture story alongside the image
    #[arg(short, long = "save-story")]
    save_story: bool,

    /// Reapply the wallpaper if it has already been downloaded
    #[arg(short, long)]
    reapply: bool,

    /// Bing regional market, e.g. en-US
    #[arg(short, long)]
    market: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, Defaults::load())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, defaults: Defaults) -> Result<()> {
    let registry = EnvironmentRegistry::builtin()?;

    match command {
        Command::Set(args) => set(args, defaults, &registry).await,
        Command::Story { market } => {
            let client = BingClient::new(market.or(defaults.market).as_deref())?;
            let metadata = RetryPolicy::default().run(|| client.fetch_metadata()).await?;
            println!("{}", metadata.caption);
            Ok(())
        }
        Command::Environments => {
            for name in registry.environments() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

async fn set(args: SetArgs, defaults: Defaults, registry: &EnvironmentRegistry) -> Result<()> {
    let directory = args
        .directory
        .or(defaults.directory)
        .unwrap_or_else(std::env::temp_dir);
    let config = ApplyConfig::new(
        args.environment,
        &directory,
        args.xfce4_path
            .or(defaults.xfce4_path)
            .unwrap_or_else(|| DEFAULT_XFCE4_PATH.to_string()),
        args.save_story || defaults.save_story,
        args.reapply,
    )?;

    // Fail before touching the network when the desktop is unknown.
    registry.resolve(&config.environment)?;

    let client = BingClient::new(args.market.or(defaults.market).as_deref())?;
    let orchestrator = Orchestrator::new(&config, registry, &client, &HostLauncher, &NotifySend);

    match RetryPolicy::default().run(|| orchestrator.fetch_and_apply()).await? {
        Outcome::AlreadyDownloaded(picture) => {
            debug!(picture = %picture.display(), "already up to date")
        }
        Outcome::Applied { picture, status } => {
            debug!(picture = %picture.display(), ?status, "done")
        }
    }
    Ok(())
}
