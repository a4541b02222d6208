//! HTTP handlers for the camera and sensor endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use base64::Engine;
use chrono::Utc;
use serde::{Serialize, Serializer};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::camera::Snapshotter;
use crate::error::Error;
use crate::sensors::{ClimateProbe, CpuAdapters};

/// Shared state handed to every handler.
///
/// Everything arrives by injection (the snapshotter over the capture
/// loop's buffer, the climate probe, the CPU adapters) so the whole
/// surface can be exercised against fakes.
pub struct AppState {
    snapshotter: Snapshotter,
    climate: Mutex<Box<dyn ClimateProbe>>,
    cpu: CpuAdapters,
}

impl AppState {
    pub fn new(snapshotter: Snapshotter, climate: Box<dyn ClimateProbe>, cpu: CpuAdapters) -> Self {
        Self {
            snapshotter,
            climate: Mutex::new(climate),
            cpu,
        }
    }
}

/// Request-time UTC epoch seconds with sub-second precision.
fn now_epoch() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// The JSON envelope every `/api/` endpoint returns.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub timestamp: f64,
    pub data: T,
}

impl<T> Envelope<T> {
    fn new(data: T) -> Self {
        Self {
            timestamp: now_epoch(),
            data,
        }
    }
}

/// A sensor value that may be unavailable.
///
/// Serializes as the number itself, or as the literal string `"N/A"`.
/// This is the only place that sentinel exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f64),
    Unavailable,
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Unavailable,
        }
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

impl Reading {
    /// Human-readable form for the index page.
    fn display(&self) -> String {
        match self {
            Self::Value(v) => format!("{:.1}", v),
            Self::Unavailable => "N/A".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CpuReport {
    pub cpu_clock: Reading,
    pub cpu_temp: Reading,
}

#[derive(Debug, Serialize)]
pub struct ClimateReport {
    pub room_temperature: Reading,
    pub room_humidity: Reading,
}

/// GET `/camera/current.jpg`: the latest frame as raw JPEG bytes.
pub async fn current_jpg(State(state): State<Arc<AppState>>) -> Response {
    match state.snapshotter.encode_jpeg() {
        Ok(jpeg) => ([(header::CONTENT_TYPE, "image/jpeg")], jpeg).into_response(),
        Err(Error::NoFrame) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "camera image not available yet"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "snapshot encode failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "snapshot encoding failed"})),
            )
                .into_response()
        }
    }
}

/// GET `/api/camera/`: the latest frame, base64-encoded inside the JSON
/// envelope.
pub async fn api_camera(State(state): State<Arc<AppState>>) -> Response {
    match state.snapshotter.encode_jpeg() {
        Ok(jpeg) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
            debug!(bytes = jpeg.len(), "camera snapshot served");
            Json(Envelope::new(encoded)).into_response()
        }
        Err(Error::NoFrame) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"message": "camera image not available yet"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "snapshot encode failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "snapshot encoding failed"})),
            )
                .into_response()
        }
    }
}

/// GET `/api/cpu/`: CPU clock (MHz) and temperature (°C).
pub async fn api_cpu(State(state): State<Arc<AppState>>) -> Json<Envelope<CpuReport>> {
    let report = CpuReport {
        cpu_clock: (state.cpu.clock)().into(),
        cpu_temp: (state.cpu.temp)().into(),
    };
    Json(Envelope::new(report))
}

/// GET `/api/temperatureandhumidity`: room temperature and humidity.
pub async fn api_climate(State(state): State<Arc<AppState>>) -> Json<Envelope<ClimateReport>> {
    let reading = state.climate.lock().await.read();
    let report = ClimateReport {
        room_temperature: reading.map(|r| r.temperature).into(),
        room_humidity: reading.map(|r| r.humidity).into(),
    };
    Json(Envelope::new(report))
}

/// GET `/`: status page rendered server-side at request time.
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let cpu_clock = Reading::from((state.cpu.clock)());
    let cpu_temp = Reading::from((state.cpu.temp)());
    let reading = state.climate.lock().await.read();
    let room_temp = Reading::from(reading.map(|r| r.temperature));
    let room_humidity = Reading::from(reading.map(|r| r.humidity));

    let html = INDEX_TEMPLATE
        .replace("{cpu_clock}", &cpu_clock.display())
        .replace("{cpu_temp}", &cpu_temp.display())
        .replace("{room_temperature}", &room_temp.display())
        .replace("{room_humidity}", &room_humidity.display());
    Html(html)
}

/// GET `/api/health`: liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "picam_server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339()
    }))
}

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Pi Camera Station</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: #1d2228;
            color: #e8e8e8;
            margin: 0;
            padding: 24px;
        }
        h1 { font-size: 1.6rem; }
        .card {
            background: #272e38;
            border-radius: 8px;
            padding: 16px 20px;
            margin-bottom: 16px;
            max-width: 680px;
        }
        .metric { display: flex; justify-content: space-between; padding: 6px 0; }
        .metric span:last-child { font-weight: bold; }
        img { max-width: 680px; width: 100%; border-radius: 8px; }
    </style>
</head>
<body>
    <h1>Pi Camera Station</h1>
    <div class="card">
        <div class="metric"><span>CPU clock</span><span>{cpu_clock} MHz</span></div>
        <div class="metric"><span>CPU temperature</span><span>{cpu_temp} &deg;C</span></div>
        <div class="metric"><span>Room temperature</span><span>{room_temperature} &deg;C</span></div>
        <div class="metric"><span>Room humidity</span><span>{room_humidity} %</span></div>
    </div>
    <div class="card">
        <img src="/camera/current.jpg" alt="latest camera snapshot">
    </div>
</body>
</html>"#;
