//! Drowsiness Monitor Service
//!
//! Wires the monitor to its collaborators: the replayed frame source, the ONNX
//! classifier, SQLite persistence, and a REST surface for the driver commands.

pub mod cli;
pub mod control;
pub mod pipeline;
pub mod routes;
pub mod settings;
pub mod source;
pub mod telemetry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use alerting::LogAudioSink;
use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use chrono::Local;
use classifier::OnnxClassifier;
use dms::Classifier;
use metrics_exporter_prometheus::PrometheusHandle;
use monitor::DriverMonitor;
use storage::Repository;
use tokio::sync::{watch, Mutex};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use control::Controller;
use pipeline::Pipeline;
use settings::Settings;
use source::ReplaySource;

/// Application state shared across handlers
pub struct AppState {
    pub controller: Arc<Mutex<Controller>>,
    pub repository: Repository,
    pub metrics: PrometheusHandle,
    pub version: String,
    pub start_time: Instant,
}

pub type SharedState = Arc<AppState>;

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::status::health))
        .route("/api/v1/status", get(routes::status::status))
        .route("/api/v1/session/start", post(routes::session::start_session))
        .route("/api/v1/session/stop", post(routes::session::stop_session))
        .route("/api/v1/alarm/mute", post(routes::session::toggle_mute))
        .route("/api/v1/sessions", get(routes::session::list_sessions))
        .route("/metrics", get(routes::status::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the classifier, or `None` to run in features-only mode
fn load_classifier(settings: &Settings) -> Option<Arc<dyn Classifier>> {
    match OnnxClassifier::load(&settings.model.path) {
        Ok(model) => Some(Arc::new(model)),
        Err(e) => {
            warn!("Classifier unavailable, tracking head nods only: {}", e);
            None
        }
    }
}

/// Run the service until Ctrl-C
pub async fn run(settings: Settings, metrics: PrometheusHandle) -> anyhow::Result<()> {
    let repository = Repository::connect(
        &settings.storage.database_url,
        settings.storage.max_connections,
    )
    .await
    .context("Failed to open database")?;

    info!("Threshold preset: {:?}", settings.preset);
    let today = Local::now().date_naive();
    let daily_cache = repository.load_daily(today).await?;

    let source = settings
        .source
        .replay_path
        .as_deref()
        .map(|path| ReplaySource::open(path, settings.source.loop_replay))
        .transpose()?;

    let classifier = if settings.source.use_recorded_labels {
        None
    } else {
        load_classifier(&settings)
    };
    let degraded = classifier.is_none() && !settings.source.use_recorded_labels;

    let monitor = DriverMonitor::new(
        settings.monitor.clone(),
        Box::new(LogAudioSink),
        degraded,
        daily_cache,
    )?;
    let controller = Arc::new(Mutex::new(Controller::new(monitor, repository.clone(), today)));

    if settings.session.autostart {
        controller.lock().await.start()?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let pipeline = Pipeline::new(
        controller.clone(),
        source,
        classifier,
        settings.source.use_recorded_labels,
        Duration::from_millis(settings.source.frame_interval_ms.max(1)),
    );
    let pipeline_task = tokio::spawn(pipeline.run(shutdown_rx));

    let state = Arc::new(AppState {
        controller: controller.clone(),
        repository,
        metrics,
        version: env!("CARGO_PKG_VERSION").to_string(),
        start_time: Instant::now(),
    });
    let app = create_router(state);

    info!("Starting API server on {}", settings.server.bind);
    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Err(e) = pipeline_task.await {
        warn!("Frame pipeline ended abnormally: {}", e);
    }

    let mut control = controller.lock().await;
    control.shutdown().await;
    control.repository().close().await;
    info!("Drowsiness monitor stopped");
    Ok(())
}
