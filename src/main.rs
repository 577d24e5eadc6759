use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use ytbridge_resolver::{Config, MediaSourceResolver};

#[derive(Parser)]
#[command(name = "ytbridge-resolver")]
#[command(version)]
#[command(about = "Resolve video ids into ranked, preflight-validated playable sources")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path (defaults to $YTBRIDGE_CONFIG or ytbridge.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one video and print the ordered sources as JSON
    Resolve {
        /// Video id, bare or `vid:`-prefixed
        video_id: String,

        /// Skip preflight and take the top-ranked candidates as-is
        #[arg(long)]
        no_preflight: bool,

        /// Rank the policy candidate first
        #[arg(long)]
        policy_first: bool,

        /// Additional format id to block (repeatable)
        #[arg(long = "block", value_name = "ID")]
        blocked: Vec<String>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn init_logging(cli: &Cli) {
    let log_filter = format!("ytbridge_resolver={0},resolver={0}", cli.log_level);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries the JSON result
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Resolve {
            video_id,
            no_preflight,
            policy_first,
            blocked,
        } => {
            let mut policy = config.resolution.clone();
            if no_preflight {
                policy.preflight_enabled = false;
            }
            if policy_first {
                policy.policy_first = true;
            }
            for id in blocked {
                policy = policy.with_blocked(id.trim());
            }
            policy.validate()?;

            info!(
                "Starting {} v{} against {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                config.bridge.normalized_base_url()
            );

            let resolver = MediaSourceResolver::from_config(&config.bridge)?;
            let cancel = CancellationToken::new();
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted; cancelling resolution");
                    interrupt.cancel();
                }
            });

            let result = resolver.resolve(&video_id, &policy, &cancel).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
