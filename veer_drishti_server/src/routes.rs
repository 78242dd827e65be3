use crate::error::ApiError;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use veer_drishti::{Alert, AlertAggregator, AlertConfig, Detection, DetectionPipeline, EntitySimulator, EntitySnapshot};

pub type Aggregator = AlertAggregator<Arc<DetectionPipeline>, Arc<EntitySimulator>>;

/// Handles shared by every request. Owned by the composition root.
#[derive(Clone)]
pub struct AppState {
    pub detection: Arc<DetectionPipeline>,
    pub entities: Arc<EntitySimulator>,
    pub alerts: Arc<Aggregator>,
}

impl AppState {
    pub fn new(detection: Arc<DetectionPipeline>, entities: Arc<EntitySimulator>, alerts: AlertConfig) -> Self {
        let aggregator = AlertAggregator::new(detection.clone(), entities.clone(), alerts);
        Self {
            detection,
            entities,
            alerts: Arc::new(aggregator),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectionsResponse {
    pub detections: Vec<Detection>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EntitiesResponse {
    pub entities: Vec<EntitySnapshot>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct EmergencyResponse {
    pub message: String,
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct SimulationRequest {
    pub id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/detections", get(detections))
        .route("/api/entities", get(entities))
        .route("/api/entities/simulate", post(simulate_emergency))
        .route("/api/entities/:id/emergency", post(force_emergency))
        .route("/api/alerts", get(alerts))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "VeerDrishti API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "detections": "/api/detections",
            "entities": "/api/entities",
            "force_emergency": "/api/entities/{id}/emergency",
            "simulate_emergency": "/api/entities/simulate",
            "alerts": "/api/alerts",
            "health": "/health",
        }
    }))
}

fn liveness(running: bool) -> &'static str {
    if running { "running" } else { "stopped" }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "services": {
            "detection": liveness(state.detection.is_running()),
            "entity_simulator": liveness(state.entities.is_running()),
        },
        "detection_strategy": state.detection.strategy(),
    }))
}

async fn detections(State(state): State<AppState>) -> Json<DetectionsResponse> {
    Json(DetectionsResponse {
        detections: state.detection.latest_detections(),
        timestamp: Utc::now(),
    })
}

async fn entities(State(state): State<AppState>) -> Json<EntitiesResponse> {
    Json(EntitiesResponse {
        entities: state.entities.roster(),
        timestamp: Utc::now(),
    })
}

async fn alerts(State(state): State<AppState>) -> Json<AlertsResponse> {
    let timestamp = Utc::now();
    Json(AlertsResponse {
        alerts: state.alerts.current_alerts(timestamp),
        timestamp,
    })
}

fn apply_emergency(state: &AppState, id: &str) -> Result<Json<EmergencyResponse>, ApiError> {
    if state.entities.force_emergency(id) {
        Ok(Json(EmergencyResponse {
            message: format!("Emergency simulated for entity {id}"),
            success: true,
        }))
    } else {
        Err(ApiError::NotFound(format!("Entity {id} not found")))
    }
}

async fn force_emergency(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EmergencyResponse>, ApiError> {
    apply_emergency(&state, &id)
}

async fn simulate_emergency(
    State(state): State<AppState>,
    payload: Result<Json<SimulationRequest>, JsonRejection>,
) -> Result<Json<EmergencyResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    apply_emergency(&state, &request.id)
}
