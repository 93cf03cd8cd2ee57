//! `feeder` binary: wires the Telegram transport, the command handler and the
//! dispatch pipeline together and runs until SIGINT or SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use feeder_server::cli::Cli;
use feeder_server::{
    build_dispatch_pipeline, telemetry, Bot, CommandHandler, HttpPageFetcher, TelegramTransport,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio::sync::watch;
use tracing::Instrument;

const APP_NAME: &str = "feeder";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = telemetry::init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("{APP_NAME}: {err}");
        return ExitCode::FAILURE;
    }

    let root = tracing::info_span!("app", app = APP_NAME, ver = env!("CARGO_PKG_VERSION"));
    match run(cli).instrument(root.clone()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error = format!("{err:#}");
            root.in_scope(|| tracing::error!(%error, "feeder stopped with an error"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.dispatch_config()?;
    let token = cli.token()?;

    if let Some(addr) = cli.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install prometheus exporter")?;
        tracing::info!(%addr, "serving prometheus metrics");
    }

    let transport = Arc::new(TelegramTransport::new(&cli.api_url, token)?);
    let handler = CommandHandler::new(Arc::new(HttpPageFetcher::new()));
    let pipeline = build_dispatch_pipeline(handler, &config);
    let bot = Bot::new(transport, pipeline, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(
        async move {
            wait_for_shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        }
        .in_current_span(),
    );

    bot.run(shutdown_rx).await;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
