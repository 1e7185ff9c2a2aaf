use posture_sentry::error::AppError;
use posture_sentry::landmark::jsonl::JsonLinesSource;
use posture_sentry::pipeline::{Pipeline, PipelineConfig, spawn_pipeline_thread};
use posture_sentry::voice::{Announcer, CommandSpeaker, LogSpeaker, Speaker};
use posture_sentry::{api, config, report, state};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tokio::sync::{Notify, mpsc};

fn init_tracing(level: &str) {
    let parsed = level.parse::<tracing::Level>();
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(parsed.as_ref().map_or(tracing::Level::INFO, |level| *level))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    if parsed.is_err() {
        tracing::warn!(level, "Unknown log level, using info");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "posture-sentry starting"
    );

    let state = Arc::new(RwLock::new(state::AppState::new()));
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    state
        .write()
        .map_err(|_| AppError::StateLock)?
        .set_command_sender(command_tx);

    let pipeline = Pipeline::new(
        PipelineConfig {
            session: config.session_config(),
            scoring: config.scoring_config(),
            space: config.frame_space(),
        },
        build_announcer(&config),
        Arc::clone(&state),
        command_rx,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let done = Arc::new(Notify::new());
    let pipeline_handle = match config.input_path() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Reading landmarks from file");
            let source = JsonLinesSource::open(path)?;
            spawn_pipeline_thread(source, pipeline, Arc::clone(&stop), Arc::clone(&done))
        }
        None => {
            tracing::info!("Reading landmarks from stdin");
            let source = JsonLinesSource::stdin();
            spawn_pipeline_thread(source, pipeline, Arc::clone(&stop), Arc::clone(&done))
        }
    };

    let app = api::router(Arc::clone(&state));
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            stop.store(true, Ordering::Relaxed);
            return Err(err.into());
        }
    };
    tracing::info!(%addr, "API server listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&done)))
        .await;

    // Signal the pipeline thread to stop
    stop.store(true, Ordering::Relaxed);
    served?;

    let summary = tokio::task::spawn_blocking(move || pipeline_handle.join())
        .await?
        .map_err(|_| "pipeline thread panicked")?;
    let path = report::write_report(&summary, config.report_dir(), SystemTime::now())
        .map_err(AppError::Report)?;
    tracing::info!(path = %path.display(), "posture-sentry stopped");

    Ok(())
}

fn build_announcer(config: &config::Config) -> Announcer {
    if !config.voice_enabled() {
        tracing::info!("Voice announcements disabled");
        return Announcer::disabled();
    }
    let speaker: Box<dyn Speaker> = match CommandSpeaker::from_argv(config.voice_command()) {
        Some(speaker) => {
            tracing::info!(command = ?config.voice_command(), "Using external TTS command");
            Box::new(speaker)
        }
        None => {
            tracing::info!("No TTS command configured, announcements go to the log");
            Box::new(LogSpeaker)
        }
    };
    Announcer::new(speaker, config.voice_workers())
}

async fn shutdown_signal(done: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        () = ctrl_c => tracing::info!("Ctrl-C received, shutting down"),
        () = done.notified() => tracing::info!("Pipeline finished, shutting down"),
    }
}
