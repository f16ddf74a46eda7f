use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pulsewatch::config::ServerConfig;
use pulsewatch::heartbeat::HeartbeatService;
use pulsewatch::notifications::NotificationDispatcher;
use pulsewatch::outcome::OutcomeRecorder;
use pulsewatch::repository::MemoryStore;
use pulsewatch::scheduler::Scheduler;
use pulsewatch::web::{router, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "pulsewatch.toml")]
    config: PathBuf,
}

fn init_logging(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Stdout is human-readable, the optional file layer is JSON with daily
    // rotation.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer);

    match log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, "pulsewatch.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer().with_writer(writer).with_ansi(false).json();
            registry.with(file_layer).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    let args = Args::parse();

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return Err(e.into());
        }
    };
    let _log_guard = init_logging(config.log_dir.as_deref());
    info!(config = %args.config.display(), "starting pulsewatch");

    let store = MemoryStore::new();
    config.seed_store(&store)?;

    let dispatcher = Arc::new(NotificationDispatcher::new(store.clone()));
    let recorder = Arc::new(OutcomeRecorder::new(
        store.clone(),
        store.clone(),
        dispatcher,
    ));
    let heartbeat = Arc::new(HeartbeatService::new(store.clone(), recorder.clone()));

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        recorder,
        heartbeat.clone(),
        config.max_concurrent_checks,
    ));
    scheduler.start().await;

    let app = router(AppState { heartbeat });
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "http server listening");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install shutdown signal handler");
        }
        info!("shutdown signal received");
    });
    if let Err(e) = serve.await {
        error!(error = %e, "http server error");
    }

    scheduler.stop().await;
    info!("pulsewatch stopped");
    Ok(())
}
