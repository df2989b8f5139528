mod commands;
mod config;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};

use commands::App;
use config::Config;

#[derive(Parser)]
#[command(name = "reactive-bridge")]
#[command(about = "Route lookup, pair discovery and approvals for the Reactive token bridge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List known chains and the destinations reachable from the origin
    Chains {
        /// Origin chain id (defaults to the wallet's network)
        #[arg(long)]
        origin: Option<String>,
    },

    /// Show the bridge contract serving a chain pair
    Route {
        #[arg(long)]
        origin: String,
        #[arg(long)]
        destination: String,
    },

    /// Discover the token pairs currently registered on a route
    Pairs {
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: String,
    },

    /// Show tokens locked in the bridge for a user
    Balances {
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        destination: String,
        /// Account to query (defaults to the wallet address)
        #[arg(long)]
        user: Option<Address>,
    },

    /// Approve the bridge to lock an origin token
    Approve {
        #[arg(long)]
        destination: String,
        /// Origin token address
        #[arg(long)]
        token: Address,
        /// Human-readable amount, e.g. "12.5"
        #[arg(long)]
        amount: String,
        /// Exit once the approval is confirmed instead of waiting for the balance refresh
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the transaction journal for a user
    History {
        #[arg(long)]
        user: Option<Address>,
        /// Only the latest status per transaction hash
        #[arg(long)]
        latest: bool,
    },

    /// Follow the wallet's network and keep pairs and balances current
    Watch {
        #[arg(long)]
        destination: String,
    },
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");

    let app = App::connect(config).await?;

    match cli.command {
        Commands::Chains { origin } => app.chains(origin.as_deref()).await,
        Commands::Route {
            origin,
            destination,
        } => app.route(&origin, &destination),
        Commands::Pairs {
            origin,
            destination,
        } => app.pairs(origin.as_deref(), &destination).await,
        Commands::Balances {
            origin,
            destination,
            user,
        } => app.balances(origin.as_deref(), &destination, user).await,
        Commands::Approve {
            destination,
            token,
            amount,
            no_wait,
        } => app.approve(&destination, token, &amount, !no_wait).await,
        Commands::History { user, latest } => app.history(user, latest),
        Commands::Watch { destination } => app.watch(&destination).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "debug"
    } else {
        "info,bridge_core=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
pub(crate) async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
