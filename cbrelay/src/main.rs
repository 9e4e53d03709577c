use cbrelay::{Application, Config, config::Args, telemetry};
use clap::Parser;
use tokio::signal;

/// Resolves on SIGTERM. Never resolves where SIGTERM cannot be observed.
async fn terminated() {
    #[cfg(unix)]
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
            return;
        }
        Err(e) => tracing::error!("SIGTERM handler unavailable: {}", e),
    }

    std::future::pending::<()>().await
}

/// Resolves once the process is asked to stop, either by Ctrl+C or SIGTERM.
async fn stop_requested() {
    let source = tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => "Ctrl+C",
            Err(e) => {
                tracing::error!("Ctrl+C handler unavailable: {}", e);
                terminated().await;
                "SIGTERM"
            }
        },
        _ = terminated() => "SIGTERM",
    };

    tracing::info!("{} received, draining connections", source);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.enable_otel_export)?;
    tracing::debug!(?args, "Starting cbrelay");

    Application::new(config).await?.serve(stop_requested()).await
}
