//! Frame sources: the hardware seam of the capture loop.
//!
//! The capture loop owns a [`FrameSource`] for its entire life and is the
//! only place the hardware handle is touched. The real V4L2 backend is
//! feature-gated so the crate cross-compiles on non-Pi hosts; tests and
//! benches use the sources in [`testing`].

use crate::camera::frame::RawFrame;
use crate::error::Result;

/// A blocking producer of decoded frames.
///
/// `next_frame` blocks until the driver delivers the next buffer, bounded by
/// the configured frame rate. Dropping the source releases the hardware
/// handle; the capture thread drops it exactly once on exit.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<RawFrame>;
}

#[cfg(feature = "camera")]
pub use v4l2::V4l2Source;

#[cfg(feature = "camera")]
mod v4l2 {
    use super::FrameSource;
    use crate::camera::config::{AwbMode, CameraConfig, ImageEffect, MeterMode};
    use crate::camera::frame::RawFrame;
    use crate::error::{Error, Result};
    use tracing::{debug, info};
    use v4l::buffer::Type;
    use v4l::capability::Flags as CapFlags;
    use v4l::control::{Control, Value};
    use v4l::io::traits::CaptureStream;
    use v4l::prelude::MmapStream;
    use v4l::video::capture::Parameters;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    // V4L2 user-class control ids
    const CID_BRIGHTNESS: u32 = 0x0098_0900;
    const CID_CONTRAST: u32 = 0x0098_0901;
    const CID_SATURATION: u32 = 0x0098_0902;
    const CID_HFLIP: u32 = 0x0098_0914;
    const CID_VFLIP: u32 = 0x0098_0915;
    const CID_SHARPNESS: u32 = 0x0098_091b;
    const CID_COLORFX: u32 = 0x0098_091f;
    const CID_ROTATE: u32 = 0x0098_0922;
    // V4L2 camera-class control ids
    const CID_AUTO_EXPOSURE_BIAS: u32 = 0x009a_0913;
    const CID_AUTO_N_PRESET_WHITE_BALANCE: u32 = 0x009a_0914;
    const CID_IMAGE_STABILIZATION: u32 = 0x009a_0917;
    const CID_ISO_SENSITIVITY: u32 = 0x009a_0918;
    const CID_EXPOSURE_METERING: u32 = 0x009a_091a;

    /// V4L2 capture backend producing packed BGR frames.
    pub struct V4l2Source {
        // Held for ownership: the stream reads from this device and the
        // handle must stay open until the stream is gone
        _device: Device,
        stream: Option<MmapStream<'static>>,
        width: u32,
        height: u32,
        frame_len: usize,
    }

    impl V4l2Source {
        /// Open and configure the device, then start the mmap stream.
        ///
        /// Any failure here is [`Error::CameraInit`]: the device is busy,
        /// missing, or rejected the requested format.
        pub fn open(config: &CameraConfig) -> Result<Self> {
            config.validate()?;

            let device = Device::with_path(&config.device)
                .map_err(|e| Error::camera_init(format!("open {}: {}", config.device, e)))?;

            let caps = device
                .query_caps()
                .map_err(|e| Error::camera_init(format!("query caps: {}", e)))?;
            if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
                return Err(Error::camera_init(format!(
                    "{} does not support video capture",
                    config.device
                )));
            }

            let mut fmt = device
                .format()
                .map_err(|e| Error::camera_init(format!("query format: {}", e)))?;
            fmt.width = config.width;
            fmt.height = config.height;
            fmt.fourcc = FourCC::new(b"BGR3");
            let fmt = device
                .set_format(&fmt)
                .map_err(|e| Error::camera_init(format!("set format: {}", e)))?;
            if fmt.fourcc != FourCC::new(b"BGR3") {
                return Err(Error::camera_init(format!(
                    "device does not support packed BGR capture (negotiated {})",
                    fmt.fourcc
                )));
            }
            if fmt.width != config.width || fmt.height != config.height {
                return Err(Error::camera_init(format!(
                    "device rejected {}x{}, offered {}x{}",
                    config.width, config.height, fmt.width, fmt.height
                )));
            }

            device
                .set_params(&Parameters::with_fps(config.framerate))
                .map_err(|e| Error::camera_init(format!("set frame rate: {}", e)))?;

            apply_tuning(&device, config);

            let stream = MmapStream::with_buffers(&device, Type::VideoCapture, 4)
                .map_err(|e| Error::camera_init(format!("start stream: {}", e)))?;

            info!(
                device = %config.device,
                width = config.width,
                height = config.height,
                framerate = config.framerate,
                "camera opened"
            );

            Ok(Self {
                _device: device,
                stream: Some(stream),
                width: config.width,
                height: config.height,
                frame_len: config.frame_len(),
            })
        }
    }

    impl FrameSource for V4l2Source {
        fn next_frame(&mut self) -> Result<RawFrame> {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| Error::camera_gone("stream already shut down"))?;

            let (buf, _meta) = stream.next().map_err(|e| {
                // ENODEV: the device was unplugged or the driver went away
                if e.raw_os_error() == Some(19) {
                    Error::camera_gone(e.to_string())
                } else {
                    Error::camera_read(e.to_string())
                }
            })?;

            if buf.len() < self.frame_len {
                return Err(Error::camera_read(format!(
                    "driver returned {} bytes, expected {}",
                    buf.len(),
                    self.frame_len
                )));
            }
            RawFrame::new(self.width, self.height, buf[..self.frame_len].to_vec())
        }
    }

    impl Drop for V4l2Source {
        fn drop(&mut self) {
            // Stream first, then the device handle
            self.stream.take();
            debug!("camera device released");
        }
    }

    /// Best-effort mapping of the tuning config onto V4L2 controls.
    ///
    /// Not every driver exposes every control; a rejected control is logged
    /// and skipped rather than failing the open.
    fn apply_tuning(device: &Device, config: &CameraConfig) {
        set_ctrl(device, CID_BRIGHTNESS, config.brightness as i64, "brightness");
        set_ctrl(device, CID_CONTRAST, config.contrast as i64, "contrast");
        set_ctrl(device, CID_SATURATION, config.saturation as i64, "saturation");
        set_ctrl(device, CID_SHARPNESS, config.sharpness as i64, "sharpness");
        set_ctrl(device, CID_HFLIP, config.hflip as i64, "hflip");
        set_ctrl(device, CID_VFLIP, config.vflip as i64, "vflip");
        set_ctrl(device, CID_ROTATE, config.rotation as i64, "rotate");
        set_ctrl(
            device,
            CID_AUTO_EXPOSURE_BIAS,
            config.exposure_compensation as i64,
            "exposure bias",
        );
        set_ctrl(
            device,
            CID_IMAGE_STABILIZATION,
            config.video_stabilization as i64,
            "stabilization",
        );
        if config.iso > 0 {
            set_ctrl(device, CID_ISO_SENSITIVITY, config.iso as i64, "iso");
        }
        set_ctrl(
            device,
            CID_AUTO_N_PRESET_WHITE_BALANCE,
            awb_preset(config.awb_mode),
            "awb preset",
        );
        set_ctrl(
            device,
            CID_EXPOSURE_METERING,
            metering_value(config.meter_mode),
            "metering",
        );
        set_ctrl(
            device,
            CID_COLORFX,
            colorfx_value(config.image_effect),
            "image effect",
        );
        if !config.crop.is_full() {
            debug!("crop rectangle not supported by the V4L2 backend, ignoring");
        }
    }

    fn set_ctrl(device: &Device, id: u32, value: i64, name: &str) {
        let ctrl = Control {
            id,
            value: Value::Integer(value),
        };
        if let Err(e) = device.set_control(ctrl) {
            debug!(control = name, error = %e, "control not applied");
        }
    }

    fn awb_preset(mode: AwbMode) -> i64 {
        // V4L2_WHITE_BALANCE_* preset values
        match mode {
            AwbMode::Off => 0,
            AwbMode::Auto => 1,
            AwbMode::Incandescent | AwbMode::Tungsten => 2,
            AwbMode::Fluorescent => 3,
            AwbMode::Horizon => 5,
            AwbMode::Sunlight => 6,
            AwbMode::Flash => 7,
            AwbMode::Cloudy => 8,
            AwbMode::Shade => 9,
        }
    }

    fn metering_value(mode: MeterMode) -> i64 {
        // V4L2_EXPOSURE_METERING_* values
        match mode {
            MeterMode::Average => 0,
            MeterMode::Backlit => 1,
            MeterMode::Spot => 2,
            MeterMode::Matrix => 3,
        }
    }

    fn colorfx_value(effect: ImageEffect) -> i64 {
        // V4L2_COLORFX_* values; effects without a V4L2 counterpart fall
        // back to none
        match effect {
            ImageEffect::None | ImageEffect::Denoise | ImageEffect::Oilpaint => 0,
            ImageEffect::Negative => 3,
            ImageEffect::Emboss => 4,
            ImageEffect::Sketch => 5,
            ImageEffect::Solarize => 13,
        }
    }
}

pub mod testing {
    //! Fake frame sources for tests and benches.

    use super::FrameSource;
    use crate::camera::frame::RawFrame;
    use crate::error::{Error, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Produces copies of one solid-color frame at a fixed interval.
    ///
    /// The `closed` flag flips when the source is dropped, letting tests
    /// observe that the capture thread released its handle.
    pub struct FakeSource {
        frame: RawFrame,
        interval: Duration,
        transient_failures: usize,
        closed: Arc<AtomicBool>,
    }

    impl FakeSource {
        pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> Self {
            Self {
                frame: RawFrame::solid(width, height, bgr),
                interval: Duration::from_millis(1),
                transient_failures: 0,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        /// Delay between frames, emulating the driver's frame-rate bound.
        pub fn with_interval(mut self, interval: Duration) -> Self {
            self.interval = interval;
            self
        }

        /// Fail the first `count` reads with a transient error.
        pub fn with_transient_failures(mut self, count: usize) -> Self {
            self.transient_failures = count;
            self
        }

        /// Flag that flips to `true` when this source is dropped.
        pub fn closed_flag(&self) -> Arc<AtomicBool> {
            self.closed.clone()
        }
    }

    impl FrameSource for FakeSource {
        fn next_frame(&mut self) -> Result<RawFrame> {
            thread::sleep(self.interval);
            if self.transient_failures > 0 {
                self.transient_failures -= 1;
                return Err(Error::camera_read("injected transient failure"));
            }
            Ok(self.frame.clone())
        }
    }

    impl Drop for FakeSource {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Produces `frames` solid frames, then fails fatally on every read.
    pub struct FailingSource {
        frames: usize,
        produced: usize,
        closed: Arc<AtomicBool>,
    }

    impl FailingSource {
        pub fn fatal_after(frames: usize) -> Self {
            Self {
                frames,
                produced: 0,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }

        pub fn closed_flag(&self) -> Arc<AtomicBool> {
            self.closed.clone()
        }
    }

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Result<RawFrame> {
            if self.produced < self.frames {
                self.produced += 1;
                thread::sleep(Duration::from_millis(1));
                Ok(RawFrame::solid(2, 2, [10, 20, 30]))
            } else {
                Err(Error::camera_gone("device disconnected"))
            }
        }
    }

    impl Drop for FailingSource {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
