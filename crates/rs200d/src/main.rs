//! rs200d - RS200 rain gauge daemon with a small HTTP status API

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use dashmap::DashMap;
use rain_gauge::{
    runner, BroadcastSink, GaugeConfig, GaugeStatus, IntervalScheduler, LinkState, RainGauge,
    Reading, ReadingKind, Sinks,
};
use rs200_protocol::Rs200Transport;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub status: watch::Receiver<GaugeStatus>,
    pub readings: Arc<DashMap<ReadingKind, f64>>,
}

/// API response wrapper using serde_json::Value for flexibility
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(serde_json::Value::Null)),
            error: None,
        }
    }

    fn error(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: false,
            data,
            error: Some(msg.into()),
        }
    }
}

/// Latest published values; NaN (device failed) serializes as null
#[derive(Serialize)]
struct ReadingsResponse {
    rain: Option<f64>,
    realtime_rain: Option<f64>,
}

/// Get connection status
async fn gauge_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    if status.state == LinkState::Failed {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(
                "Connection with RS200 failed",
                serde_json::to_value(status).ok(),
            )),
        );
    }
    (StatusCode::OK, Json(ApiResponse::success(status)))
}

/// Get the latest readings
async fn latest_readings(State(state): State<AppState>) -> impl IntoResponse {
    let latest = |kind: ReadingKind| state.readings.get(&kind).map(|v| *v);
    Json(ApiResponse::success(ReadingsResponse {
        rain: latest(ReadingKind::Rain),
        realtime_rain: latest(ReadingKind::RealtimeRain),
    }))
}

/// Health check
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Keep the latest value of each reading
fn start_reading_listener(
    mut rx: broadcast::Receiver<Reading>,
    readings: Arc<DashMap<ReadingKind, f64>>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(reading) => {
                    tracing::debug!("{}: {}", reading.kind.name(), reading.value);
                    readings.insert(reading.kind, reading.value);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Reading listener lagged by {} values", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rs200d=debug,rain_gauge=debug,rs200_protocol=debug,info".into()
            }),
        )
        .init();

    tracing::info!("Starting rs200d");

    let config_path =
        PathBuf::from(std::env::var("RS200_CONFIG").unwrap_or_else(|_| "rs200.json".to_string()));
    let mut config = GaugeConfig::load(&config_path).await?;
    config.apply_env();
    config.validate()?;

    let (transport, chunks) =
        Rs200Transport::connect(&config.serial_port, config.line.baud_rate).await?;

    let (reading_tx, reading_rx) = broadcast::channel(64);
    let sinks = Sinks {
        rain: vec![Arc::new(BroadcastSink::new(
            ReadingKind::Rain,
            reading_tx.clone(),
        ))],
        realtime_rain: vec![Arc::new(BroadcastSink::new(
            ReadingKind::RealtimeRain,
            reading_tx,
        ))],
    };

    let (scheduler, timer_rx) = IntervalScheduler::new();
    let gauge = RainGauge::new(&config, transport, scheduler, sinks);
    gauge.log_config();

    let (status_tx, status_rx) = watch::channel(gauge.status());
    let readings = Arc::new(DashMap::new());
    start_reading_listener(reading_rx, Arc::clone(&readings));

    let poll_interval = config.poll_interval();
    tokio::spawn(async move {
        if let Err(e) = runner::run(gauge, chunks, timer_rx, poll_interval, status_tx).await {
            tracing::error!("RS200 runner stopped: {}", e);
        }
    });

    let state = AppState {
        status: status_rx,
        readings,
    };

    // Build the router
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(gauge_status))
        .route("/api/v1/readings", get(latest_readings))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: std::net::SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
        .parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
