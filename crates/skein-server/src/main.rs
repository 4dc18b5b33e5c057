use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use skein_core::Config;
use skein_server::Context;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Command-line arguments for the `skein-server` binary.
///
/// Modeled on `durable-worker`'s `Args`: `clap`-derived, with environment
/// variable fallbacks via the `env` attribute, matching the `dotenvy` +
/// `clap` combination the teacher's binaries use.
#[derive(Debug, clap::Parser)]
struct Args {
    /// Address to bind the reference TCP transport to.
    #[arg(long, env = "SKEIN_LISTEN_ADDR", default_value = "127.0.0.1:7777")]
    listen_addr: String,

    /// Maximum number of scheduling steps a fair strategy may take per
    /// iteration before `IsMaxStepsReached` reports true.
    #[arg(long, env = "SKEIN_MAX_FAIR_STEPS", default_value_t = Config::default().max_fair_scheduling_steps)]
    max_fair_scheduling_steps: u32,

    /// Maximum number of scheduling steps an unfair strategy (e.g. PCT) may
    /// take per iteration.
    #[arg(long, env = "SKEIN_MAX_UNFAIR_STEPS", default_value_t = Config::default().max_unfair_scheduling_steps)]
    max_unfair_scheduling_steps: u32,

    /// `d`: the number of priority change points PCT is permitted per
    /// iteration.
    #[arg(long, env = "SKEIN_STRATEGY_BOUND", default_value_t = Config::default().strategy_bound)]
    strategy_bound: u32,

    /// Seed for the per-session deterministic random source.
    #[arg(long, env = "SKEIN_RANDOM_SEED", default_value_t = Config::default().random_seed)]
    random_seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_filter(tracing_subscriber::EnvFilter::from_default_env()),
        )
        .init();

    let args = Args::parse();
    let config = Config {
        max_fair_scheduling_steps: args.max_fair_scheduling_steps,
        max_unfair_scheduling_steps: args.max_unfair_scheduling_steps,
        safety_prefix_bound: Config::default().safety_prefix_bound,
        strategy_bound: args.strategy_bound,
        random_seed: args.random_seed,
    };

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    tracing::info!(addr = %args.listen_addr, "skein-server listening");

    let context = Arc::new(Context::new(config));

    tokio::select! {
        result = skein_server::transport::serve(listener, context) => {
            result.context("transport loop exited with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
