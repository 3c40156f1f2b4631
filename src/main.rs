use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use autopull::cleanup::{self, DeleteFilesOptions};
use autopull::{Config, Platform, SyncConfig, SyncEngine, SyncSummary};

#[derive(Parser)]
#[command(name = "autopull")]
#[command(about = "Clone or update every repository of a GitHub or Gitee user")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone missing repositories and pull existing ones
    Sync(SyncArgs),

    /// Filesystem cleanup helpers
    Clean {
        #[command(subcommand)]
        clean_command: CleanCommands,
    },

    /// Write a template configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

/// Flags override values from the configuration file
#[derive(clap::Args)]
struct SyncArgs {
    /// Account whose repositories are synced
    #[arg(short, long)]
    username: Option<String>,

    /// Access token (falls back to GITHUB_TOKEN / GITEE_TOKEN)
    #[arg(short, long)]
    token: Option<String>,

    /// Hosting platform
    #[arg(short, long, value_enum)]
    platform: Option<Platform>,

    /// Directory receiving `{username}/{repo}` checkouts
    #[arg(long)]
    clone_dir: Option<String>,

    /// Maximum git operations in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Per-operation timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Override the platform's REST API root
    #[arg(long)]
    api_base_url: Option<String>,
}

#[derive(Subcommand)]
enum CleanCommands {
    /// Delete files matching a glob relative to --dir (hidden entries need a leading `.`)
    Files {
        /// Directory to search
        #[arg(short, long)]
        dir: PathBuf,

        /// Glob pattern, e.g. "*.log", "*.{js,ts}" or "build/*.o"
        #[arg(short, long)]
        pattern: String,

        /// Search subdirectories too
        #[arg(short, long)]
        recursive: bool,
    },

    /// Remove empty directories
    EmptyDirs {
        /// Directory to prune
        #[arg(short, long)]
        dir: PathBuf,

        /// Prune nested empty directories bottom-up
        #[arg(short, long)]
        recursive: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_init = matches!(cli.command, Commands::Init { .. });
    let config = load_config(cli.config.clone(), is_init)?;
    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting autopull v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync(args) => cmd_sync(args, &config).await,
        Commands::Clean { clean_command } => cmd_clean(clean_command),
        Commands::Init { force } => cmd_init(cli.config, force),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
///
/// An explicit path must exist, except for `init`, which is about to create it.
fn load_config(config_path: Option<PathBuf>, allow_missing: bool) -> Result<Config> {
    match config_path {
        Some(path) if allow_missing && !path.exists() => Ok(Config::default()),
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

fn merge_args(args: SyncArgs, base: &SyncConfig) -> Result<SyncConfig> {
    let mut merged = base.clone();

    if let Some(username) = args.username {
        merged.username = username;
    }
    if let Some(token) = args.token {
        merged.token = Some(token);
    }
    if let Some(platform) = args.platform {
        merged.platform = Some(platform);
    }
    if let Some(clone_dir) = args.clone_dir {
        merged.clone_dir = shellexpand::full(&clone_dir)
            .context("Failed to expand clone_dir path")?
            .into_owned();
    }
    if let Some(concurrency) = args.concurrency {
        merged.concurrency = concurrency;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        merged.timeout_ms = timeout_ms;
    }
    if let Some(api_base_url) = args.api_base_url {
        merged.api_base_url = Some(api_base_url);
    }

    Ok(merged)
}

/// Run one full sync; exits with status 2 when any repository failed
async fn cmd_sync(args: SyncArgs, config: &Config) -> Result<()> {
    let sync_config = merge_args(args, &config.sync)?;

    let engine = SyncEngine::with_defaults()?;
    let summary = engine.run(&sync_config).await?;

    print_summary(&summary);

    if !summary.all_succeeded() {
        std::process::exit(2);
    }

    Ok(())
}

fn print_summary(summary: &SyncSummary) {
    println!("\n📊 Sync Summary:");
    println!("   Repositories: {}", summary.total_repositories);
    println!("   🔄 Updated: {}", summary.updated);
    println!("   📥 Cloned: {}", summary.cloned);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.all_succeeded() {
        println!("\n✅ All repositories synced successfully!");
        return;
    }

    println!("\n⚠️  Failed repositories:");
    for failure in summary.failures() {
        if let Some(reason) = failure.failure_reason() {
            println!("   • {}: {}", failure.repository, reason);
        }
    }

    match &summary.failure_log {
        Some(path) => println!("\n   Failure log written to {}", path.display()),
        None => println!("\n   Failure log could not be written"),
    }
}

fn cmd_clean(clean_command: CleanCommands) -> Result<()> {
    match clean_command {
        CleanCommands::Files {
            dir,
            pattern,
            recursive,
        } => {
            let deleted = cleanup::delete_files_by_pattern(&DeleteFilesOptions {
                target_dir: dir,
                pattern,
                recursive,
            })?;

            for path in &deleted {
                println!("   🗑️  {}", path.display());
            }
            println!("✅ Deleted {} file(s)", deleted.len());
        }
        CleanCommands::EmptyDirs { dir, recursive } => {
            let removed = cleanup::delete_empty_dirs(&dir, recursive)?;

            for path in &removed {
                println!("   🗑️  {}", path.display());
            }
            println!("✅ Removed {} empty director(ies)", removed.len());
        }
    }

    Ok(())
}

/// Write a template configuration file
fn cmd_init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            config_path
        );
    }

    let mut template = Config::default();
    template.sync.platform = Some(Platform::GitHub);
    template.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ autopull initialized successfully!");
    println!("   Config: {:?}", config_path);
    println!("   Next: set sync.username and run 'autopull sync'");

    Ok(())
}
