//! Camera configuration.

use serde::{Deserialize, Serialize};

/// Auto white balance mode, matching the modes the Pi camera stack exposes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AwbMode {
    Off,
    #[default]
    Auto,
    Sunlight,
    Cloudy,
    Shade,
    Tungsten,
    Fluorescent,
    Incandescent,
    Flash,
    Horizon,
}

/// Exposure metering mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MeterMode {
    #[default]
    Average,
    Spot,
    Backlit,
    Matrix,
}

/// Image effect applied by the camera pipeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageEffect {
    #[default]
    None,
    Negative,
    Solarize,
    Sketch,
    Denoise,
    Emboss,
    Oilpaint,
}

/// Normalized crop rectangle (each component in `0.0..=1.0`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl CropRect {
    /// Whether the rectangle covers the full sensor.
    pub fn is_full(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.width == 1.0 && self.height == 1.0
    }
}

/// Camera settings, fixed once the capture loop starts.
///
/// Construct with [`CameraConfig::new`] and the `with_*` builders; the
/// capture loop takes the config by value and never mutates it afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Video device path (e.g. `/dev/video0`)
    pub device: String,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Capture frame rate in frames per second
    pub framerate: u32,
    /// Sharpness adjustment (-100..=100, 0 = default)
    pub sharpness: i32,
    /// Contrast adjustment (-100..=100, 0 = default)
    pub contrast: i32,
    /// Brightness (0..=100, 50 = default)
    pub brightness: i32,
    /// Saturation adjustment (-100..=100, 0 = default)
    pub saturation: i32,
    /// ISO setting, 0 = auto
    pub iso: u32,
    /// Video stabilization flag
    pub video_stabilization: bool,
    /// Exposure compensation (-25..=25, 0 = default)
    pub exposure_compensation: i32,
    /// Auto white balance mode
    pub awb_mode: AwbMode,
    /// Exposure metering mode
    pub meter_mode: MeterMode,
    /// Image effect
    pub image_effect: ImageEffect,
    /// Rotation in degrees (0, 90, 180, 270)
    pub rotation: u16,
    /// Horizontal flip
    pub hflip: bool,
    /// Vertical flip
    pub vflip: bool,
    /// Normalized crop rectangle
    pub crop: CropRect,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: crate::DEFAULT_FRAME_WIDTH,
            height: crate::DEFAULT_FRAME_HEIGHT,
            framerate: crate::DEFAULT_FRAMERATE,
            sharpness: 0,
            contrast: 0,
            brightness: 50,
            saturation: 0,
            iso: 0,
            video_stabilization: false,
            exposure_compensation: 0,
            awb_mode: AwbMode::default(),
            meter_mode: MeterMode::default(),
            image_effect: ImageEffect::default(),
            rotation: 0,
            hflip: false,
            vflip: false,
            crop: CropRect::default(),
        }
    }
}

impl CameraConfig {
    /// Create a configuration with custom resolution and frame rate.
    pub fn new(width: u32, height: u32, framerate: u32) -> Self {
        Self {
            width,
            height,
            framerate,
            ..Default::default()
        }
    }

    /// Set the video device path.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    /// Set horizontal and vertical flip.
    pub fn with_flip(mut self, hflip: bool, vflip: bool) -> Self {
        self.hflip = hflip;
        self.vflip = vflip;
        self
    }

    /// Set rotation in degrees.
    pub fn with_rotation(mut self, rotation: u16) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the auto white balance mode.
    pub fn with_awb_mode(mut self, mode: AwbMode) -> Self {
        self.awb_mode = mode;
        self
    }

    /// Set the metering mode.
    pub fn with_meter_mode(mut self, mode: MeterMode) -> Self {
        self.meter_mode = mode;
        self
    }

    /// Set the crop rectangle.
    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }

    /// Validate resolution, frame rate and ranges.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(crate::error::Error::config_error(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(crate::error::Error::config_error(
                "framerate must be at least 1",
            ));
        }
        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(crate::error::Error::config_error(format!(
                "rotation must be one of 0/90/180/270, got {}",
                self.rotation
            )));
        }
        Ok(())
    }

    /// Expected byte length of one packed BGR frame at this resolution.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CameraConfig::default();
        assert_eq!(config.width, crate::DEFAULT_FRAME_WIDTH);
        assert_eq!(config.height, crate::DEFAULT_FRAME_HEIGHT);
        assert_eq!(config.brightness, 50);
        assert!(config.crop.is_full());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = CameraConfig::new(320, 240, 32)
            .with_device("/dev/video1")
            .with_flip(true, true)
            .with_rotation(180)
            .with_awb_mode(AwbMode::Flash);
        assert_eq!(config.device, "/dev/video1");
        assert!(config.hflip);
        assert!(config.vflip);
        assert_eq!(config.rotation, 180);
        assert_eq!(config.awb_mode, AwbMode::Flash);
        assert_eq!(config.frame_len(), 320 * 240 * 3);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(CameraConfig::new(0, 240, 10).validate().is_err());
        assert!(CameraConfig::new(320, 240, 0).validate().is_err());
        assert!(CameraConfig::new(320, 240, 10)
            .with_rotation(45)
            .validate()
            .is_err());
    }
}
