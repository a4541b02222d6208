use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::Engine;
use picam_server::camera::driver::testing::FakeSource;
use picam_server::web::create_app;
use picam_server::{
    AppState, ClimateProbe, CpuAdapters, Error, FrameBuffer, FrameSource, RawFrame, SensorReading,
    Snapshotter, VideoStream, WebConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

/// Probe returning a fixed reading, or nothing.
struct FixedProbe(Option<SensorReading>);

impl ClimateProbe for FixedProbe {
    fn read(&mut self) -> Option<SensorReading> {
        self.0
    }
}

/// Source that counts every frame it hands to the capture loop.
struct CountingSource {
    produced: Arc<AtomicUsize>,
}

impl FrameSource for CountingSource {
    fn next_frame(&mut self) -> Result<RawFrame, Error> {
        std::thread::sleep(Duration::from_millis(1));
        self.produced.fetch_add(1, Ordering::SeqCst);
        Ok(RawFrame::solid(2, 2, [1, 2, 3]))
    }
}

fn app_with(
    buffer: FrameBuffer,
    probe: Box<dyn ClimateProbe>,
    cpu: CpuAdapters,
) -> axum::Router {
    let snapshotter = Snapshotter::new(buffer, 90);
    let state = Arc::new(AppState::new(snapshotter, probe, cpu));
    create_app(&WebConfig::default(), state)
}

fn failing_cpu() -> CpuAdapters {
    CpuAdapters {
        clock: || None,
        temp: || None,
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn wait_for_frame(buffer: &FrameBuffer) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !buffer.has_frame() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(buffer.has_frame(), "capture loop produced no frame in time");
}

/// End-to-end: fake driver producing a solid-color BGR frame, served as a
/// decodable JPEG whose pixels match the color within encoder tolerance.
#[tokio::test]
async fn test_current_jpg_roundtrips_solid_color() {
    let buffer = FrameBuffer::new();
    // BGR (20, 40, 200) is RGB (200, 40, 20)
    let source = FakeSource::solid(2, 2, [20, 40, 200]);
    let stream = VideoStream::start(source, buffer.clone()).unwrap();
    wait_for_frame(&buffer);

    let app = app_with(buffer, Box::new(FixedProbe(None)), failing_cpu());
    let (status, body) = get(&app, "/camera/current.jpg").await;
    assert_eq!(status, StatusCode::OK);

    let decoded = image::load_from_memory(&body).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (2, 2));
    for px in decoded.pixels() {
        assert!((px[0] as i32 - 200).abs() <= 12, "red off: {:?}", px);
        assert!((px[1] as i32 - 40).abs() <= 12, "green off: {:?}", px);
        assert!((px[2] as i32 - 20).abs() <= 12, "blue off: {:?}", px);
    }

    assert!(stream.shutdown(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_current_jpg_sets_content_type() {
    let buffer = FrameBuffer::new();
    buffer.publish(RawFrame::solid(2, 2, [0, 0, 0]));
    let app = app_with(buffer, Box::new(FixedProbe(None)), failing_cpu());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/camera/current.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
}

#[tokio::test]
async fn test_api_camera_returns_base64_jpeg_in_envelope() {
    let buffer = FrameBuffer::new();
    buffer.publish(RawFrame::solid(4, 4, [20, 40, 200]));
    let app = app_with(buffer, Box::new(FixedProbe(None)), failing_cpu());

    let (status, body) = get(&app, "/api/camera/").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["timestamp"].as_f64().unwrap() > 0.0);

    let encoded = json["data"].as_str().unwrap();
    let jpeg = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    let decoded = image::load_from_memory(&jpeg).unwrap();
    assert_eq!(decoded.width(), 4);
}

#[tokio::test]
async fn test_image_endpoints_report_not_ready_before_first_frame() {
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), failing_cpu());

    let (status, _) = get(&app, "/camera/current.jpg").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get(&app, "/api/camera/").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["message"].is_string());
}

/// Failing CPU adapters render as the literal "N/A" with a valid timestamp
/// and HTTP 200.
#[tokio::test]
async fn test_api_cpu_renders_na_when_adapters_fail() {
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), failing_cpu());

    let (status, body) = get(&app, "/api/cpu/").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["timestamp"].as_f64().unwrap() > 0.0);
    assert_eq!(json["data"]["cpu_clock"], "N/A");
    assert_eq!(json["data"]["cpu_temp"], "N/A");
}

#[tokio::test]
async fn test_api_cpu_renders_numbers_when_available() {
    let cpu = CpuAdapters {
        clock: || Some(1500.4),
        temp: || Some(42.8),
    };
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), cpu);

    let (status, body) = get(&app, "/api/cpu/").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["cpu_clock"], 1500.4);
    assert_eq!(json["data"]["cpu_temp"], 42.8);
}

#[tokio::test]
async fn test_api_climate_renders_na_for_both_fields() {
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), failing_cpu());

    let (status, body) = get(&app, "/api/temperatureandhumidity").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["room_temperature"], "N/A");
    assert_eq!(json["data"]["room_humidity"], "N/A");
}

#[tokio::test]
async fn test_api_climate_renders_reading() {
    let probe = FixedProbe(Some(SensorReading {
        temperature: 21.3,
        humidity: 48.2,
    }));
    let app = app_with(FrameBuffer::new(), Box::new(probe), failing_cpu());

    let (status, body) = get(&app, "/api/temperatureandhumidity").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["room_temperature"], 21.3);
    assert_eq!(json["data"]["room_humidity"], 48.2);
}

#[tokio::test]
async fn test_index_renders_current_values_server_side() {
    let cpu = CpuAdapters {
        clock: || Some(1500.4),
        temp: || Some(42.8),
    };
    let probe = FixedProbe(Some(SensorReading {
        temperature: 21.3,
        humidity: 48.2,
    }));
    let app = app_with(FrameBuffer::new(), Box::new(probe), cpu);

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);

    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("1500.4"));
    assert!(html.contains("42.8"));
    assert!(html.contains("21.3"));
    assert!(html.contains("48.2"));
    assert!(!html.contains("{cpu_clock}"), "placeholders must be filled");
}

#[tokio::test]
async fn test_index_renders_na_when_everything_is_down() {
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), failing_cpu());

    let (status, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).unwrap().contains("N/A"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app_with(FrameBuffer::new(), Box::new(FixedProbe(None)), failing_cpu());

    let (status, body) = get(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "picam_server");
}

/// Stop right after start: the buffer may stay empty and the camera handle
/// is released within a bounded wait.
#[test]
fn test_stop_immediately_after_start_releases_camera() {
    let buffer = FrameBuffer::new();
    let source = FakeSource::solid(2, 2, [1, 2, 3]).with_interval(Duration::from_millis(30));
    let closed = source.closed_flag();

    let stream = VideoStream::start(source, buffer.clone()).unwrap();
    stream.stop();
    assert!(stream.shutdown(Duration::from_secs(2)));

    assert!(closed.load(Ordering::SeqCst), "camera must be released");
    assert!(buffer.latest().is_none());
}

/// Once the loop has observed the stop signal, no further publishes occur.
#[test]
fn test_no_frames_produced_after_stop_cutoff() {
    let produced = Arc::new(AtomicUsize::new(0));
    let source = CountingSource {
        produced: produced.clone(),
    };
    let buffer = FrameBuffer::new();

    let stream = VideoStream::start(source, buffer).unwrap();
    std::thread::sleep(Duration::from_millis(30));
    assert!(stream.shutdown(Duration::from_secs(2)));

    let cutoff = produced.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(
        produced.load(Ordering::SeqCst),
        cutoff,
        "source must not run after the loop exits"
    );
}

/// Two encodes with no publish in between are byte-identical, end to end.
#[tokio::test]
async fn test_snapshot_idempotent_across_requests() {
    let buffer = FrameBuffer::new();
    buffer.publish(RawFrame::solid(8, 8, [20, 40, 200]));
    let app = app_with(buffer, Box::new(FixedProbe(None)), failing_cpu());

    let (_, first) = get(&app, "/camera/current.jpg").await;
    let (_, second) = get(&app, "/camera/current.jpg").await;
    assert_eq!(first, second);
}
