//! # Pi Camera Station
//!
//! A Raspberry Pi camera and environment snapshot server: a background
//! capture loop keeps the most recent frame in a single-slot buffer, and an
//! HTTP API serves JPEG snapshots plus CPU and room-climate readings.
//!
//! ## Features
//!
//! - **Continuous capture**: a dedicated thread owns the camera and
//!   publishes every decoded frame without ever waiting on a reader
//! - **Snapshot endpoints**: raw JPEG and base64-in-JSON, encoded on demand
//!   per request from the latest frame
//! - **Sensor endpoints**: CPU clock/temperature and DHT22 room
//!   temperature/humidity, degrading to `"N/A"` instead of failing
//! - **Cross-compilation**: the V4L2 and GPIO backends are feature-gated
//!   (`camera`, `gpio`) so the crate builds and tests on any host
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use picam_server::{
//!     start_web_server, AppState, CpuAdapters, FrameBuffer, NullProbe, Snapshotter, WebConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let buffer = FrameBuffer::new();
//!     // With the `camera` feature: V4l2Source::open(&CameraConfig::default())?
//!     // feeds this buffer through VideoStream::start.
//!     let snapshotter = Snapshotter::new(buffer, picam_server::DEFAULT_JPEG_QUALITY);
//!     let state = Arc::new(AppState::new(
//!         snapshotter,
//!         Box::new(NullProbe),
//!         CpuAdapters::default(),
//!     ));
//!     start_web_server(WebConfig::default(), state).await?;
//!     Ok(())
//! }
//! ```

pub mod camera;
pub mod error;
pub mod sensors;
pub mod web;

// Re-export public API
pub use camera::{
    AwbMode, CameraConfig, CropRect, FrameBuffer, FrameSource, ImageEffect, MeterMode, RawFrame,
    Snapshotter, VideoStream,
};
pub use error::{Error, Result};
pub use sensors::{ClimateProbe, CpuAdapters, NullProbe, SensorReading};
pub use web::{start_web_server, AppState, WebConfig};

#[cfg(feature = "camera")]
pub use camera::V4l2Source;

#[cfg(feature = "gpio")]
pub use sensors::Dht22Probe;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 5000;

/// The default capture resolution
pub const DEFAULT_FRAME_WIDTH: u32 = 1024;
pub const DEFAULT_FRAME_HEIGHT: u32 = 768;

/// The default capture frame rate
pub const DEFAULT_FRAMERATE: u32 = 10;

/// The default JPEG quality for snapshots
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// The default BCM pin of the DHT22 climate sensor
pub const DEFAULT_DHT_PIN: u8 = 4;
