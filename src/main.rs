use crengine::{Error, Result};
use crengine::{ServerBuilder, Settings};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let settings = Settings::load(None)?;

    // Initializing Logs
    let _guard = init_observability(&settings.monitoring.log_dir)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        "starting change revision engine"
    );

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    // Build Server
    let server = ServerBuilder::init(settings, graceful_rx.clone())
        .start_metrics_server(graceful_rx.clone()) //default: prometheus metrics server starts
        .build()
        .await
        .expect("start server failed.");

    info!("Engine started. Waiting for CTRL+C signal...");
    // Listen on Shutdown Signal
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    // Run Server
    match server.run().await {
        Err(Error::Exit) => info!("server stopped"),
        Err(e) => error!("server stops: {:?}", e),
        Ok(()) => {}
    }

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("signal: {}", e)))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("signal: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    graceful_tx
        .send(())
        .map_err(|e| Error::Fatal(format!("failed to fan out shutdown: {}", e)))?;
    Ok(())
}

fn init_observability(log_dir: &str) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(log_dir, "cr-engine.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
