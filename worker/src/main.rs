use clap::Parser;
use tokio::sync::watch;
use tracing::{event, Level};
use variant_worker::{
    config::Config,
    tracing_config::{self, HoneycombConfig},
};

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    color_eyre::install()?;
    dotenv::dotenv().ok();
    let mut config = Config::parse();

    let honeycomb_config = config.honeycomb_team.take().map(|team| HoneycombConfig {
        team,
        dataset: std::mem::take(&mut config.honeycomb_dataset),
    });

    tracing_config::configure("variant-worker", std::io::stdout, honeycomb_config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker = tokio::spawn(variant_worker::run_worker(config, shutdown_rx));

    tokio::select! {
        result = &mut worker => {
            tracing_config::teardown();
            return result?;
        }
        signal = wait_for_signal() => {
            match signal {
                Ok(()) => event!(Level::INFO, "Shutdown signal received"),
                Err(e) => event!(Level::ERROR, error=%e, "Could not listen for shutdown signals"),
            }
        }
    }

    shutdown_tx.send(true).ok();
    let result = worker.await?;

    event!(Level::INFO, "Worker stopped");
    tracing_config::teardown();
    result
}
