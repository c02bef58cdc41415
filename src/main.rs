//! pToken Liquidation Bot
//!
//! Liquidates underwater borrowers on a Compound-style lending protocol.
//! Features:
//! - Periodic per-market risk scans fed by the protocol subgraph
//! - Bounded candidate queue with a single sequential executor
//! - Close-factor repay sizing with bounded collateral search
//! - Graceful shutdown on SIGINT, SIGTERM and SIGQUIT

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_chain::{LegacyGasPricing, RpcGateway, TxSubmitter, WalletBuilder};
use liquidator_core::{load_config_from_env, Engine, EngineConfig, LogConfig, LogFormat, Shutdown};
use liquidator_index::SubgraphClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // LIQUIDATOR_CONFIG selects the file, default ./config/liquidator.toml
    let config = load_config_from_env().context("failed to load configuration")?;

    let _log_guard = init_tracing(&config.log)?;
    config.log_config();

    info!("Starting pToken Liquidation Bot");

    let chain = Arc::new(
        RpcGateway::connect(
            &config.chain.rpc_url,
            config.chain.comptroller,
            config.chain.call_timeout(),
        )
        .await
        .context("chain gateway unavailable")?,
    );

    let gas_pricing = match config.chain.max_gas_price_wei() {
        Some(cap) => LegacyGasPricing::capped(cap),
        None => LegacyGasPricing::node_suggested(),
    };
    let wallet = WalletBuilder::new(&config.chain.rpc_url, config.chain.chain_id)
        .gas_limit(config.chain.gas_limit)
        .gas_pricing(gas_pricing)
        .call_timeout(config.chain.call_timeout())
        .wait_for_receipt(config.chain.wait_for_receipt)
        .build(&config.wallet.private_key)
        .await
        .context("wallet setup failed")?;
    info!(address = %wallet.address(), "Wallet ready");

    let index = Arc::new(
        SubgraphClient::with_timeout(&config.index.url, config.index.timeout())
            .context("index client setup failed")?,
    );
    info!(url = %index.url(), "Index client ready");

    // Bootstrap
    info!("Bootstrapping...");
    let engine = Engine::bootstrap(EngineConfig::from(&config), index, chain, wallet).await?;

    let (trigger, shutdown) = Shutdown::new();
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        info!(signal, "Shutdown requested");
        trigger.trigger();
    });

    // Run until a signal arrives
    info!("Starting pipeline...");
    let stats = engine.run(shutdown).await?;

    info!(
        processed = stats.processed,
        submitted = stats.submitted,
        "Shutdown complete"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
///
/// With a log directory configured, events go through a background writer
/// whose guard must live until exit so buffered lines are flushed.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&log.level)
            .with_context(|| format!("invalid log level '{}'", log.level))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let (Some(dir), Some(path)) = (log.file_dir.as_deref(), log.file_path()) else {
        match log.format {
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
            LogFormat::Pretty => registry.with(fmt::layer()).init(),
        }
        return Ok(None);
    };

    let (writer, guard) = file_writer(dir, &log.file_name)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    match log.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(writer))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .init(),
    }
    Ok(Some(guard))
}

/// Non-blocking writer appending to `dir/file_name`, never rotated.
fn file_writer(dir: &str, file_name: &str) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Resolve on the first shutdown signal and name it.
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut term, mut quit) = match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
        (Ok(term), Ok(quit)) => (term, quit),
        _ => {
            warn!("Cannot install SIGTERM/SIGQUIT handlers, listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl-C"
}

fn print_banner() {
    println!(
        r#"
  ╔═══════════════════════════════════════════════════════════╗
  ║                                                           ║
  ║              pToken Liquidation Bot                       ║
  ║                                                           ║
  ║   Compound-style lending protocol liquidator              ║
  ║   Scan -> Queue -> Execute                                ║
  ║                                                           ║
  ╚═══════════════════════════════════════════════════════════╝
"#
    );
}
