//! Camera capture pipeline: configuration, the latest-frame buffer, the
//! background capture loop and the on-demand JPEG snapshotter.

pub mod config;
pub mod driver;
pub mod frame;
pub mod snapshot;
pub mod stream;

// Re-export commonly used items
pub use config::{AwbMode, CameraConfig, CropRect, ImageEffect, MeterMode};
pub use driver::FrameSource;
pub use frame::{FrameBuffer, RawFrame};
pub use snapshot::Snapshotter;
pub use stream::VideoStream;

#[cfg(feature = "camera")]
pub use driver::V4l2Source;
