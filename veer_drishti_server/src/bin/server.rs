use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use veer_drishti::simulator::default_roster;
use veer_drishti::{DetectionPipeline, EntitySimulator, FrameSource, ImageSequenceSource, MemorySource};
use veer_drishti_server::{AppState, ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veer_drishti=info,veer_drishti_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting VeerDrishti v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        frames_dir = ?config.frames_dir,
        sample_interval_ms = config.sample_interval.as_millis() as u64,
        sim_tick_ms = config.sim_tick_interval.as_millis() as u64,
        alert_window_secs = config.alert_window_secs,
        "Configuration loaded"
    );

    // --- Frame source ---
    let source: Box<dyn FrameSource> = match &config.frames_dir {
        Some(dir) => Box::new(ImageSequenceSource::new(dir)),
        None => {
            warn!("VD_FRAMES_DIR not set, detection pipeline has no video feed");
            Box::new(MemorySource::new(Vec::new()))
        }
    };

    // --- Producers ---
    // No learned classifier ships with this binary, so selection settles on the
    // motion heuristic.
    let detection = Arc::new(DetectionPipeline::new(config.pipeline(), source, None));
    let entities = Arc::new(EntitySimulator::new(config.simulator(), default_roster()));
    detection.start();
    entities.start();

    // --- Transport ---
    let app = router(AppState::new(detection.clone(), entities.clone(), config.alerts()));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Stopping producers");
    detection.stop().await;
    entities.stop().await;
    info!("All services stopped");
    Ok(())
}
