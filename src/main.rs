//! Epoch Rewards - local chain CLI
//!
//!   rewards keygen [name]        - Create or list wallets
//!   rewards deploy-token         - Deploy the reward token
//!   rewards deploy               - Deploy the rewarding contract
//!   rewards supply|claim|...     - Submit transactions
//!   rewards data|user-info|...   - Query contract state

mod cli;

use clap::Parser;
use tracing_subscriber::FmtSubscriber;

fn main() {
    let cli = cli::Cli::parse();

    // Initialize logging with EnvFilter to support RUST_LOG
    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {e}");
    }

    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
