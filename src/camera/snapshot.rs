//! On-demand JPEG snapshots of the latest captured frame.

use std::io::Cursor;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::debug;

use crate::camera::frame::{FrameBuffer, RawFrame};
use crate::error::{Error, Result};

/// Pull-based JPEG encoder over a [`FrameBuffer`].
///
/// Each call reads the buffer once and encodes against its own reference to
/// that frame, so concurrent calls never contend beyond the buffer's
/// pointer swap. Output is a pure function of the current frame: two calls
/// with no publish in between return byte-identical buffers.
pub struct Snapshotter {
    buffer: FrameBuffer,
    quality: u8,
    debug_path: Option<PathBuf>,
}

impl Snapshotter {
    pub fn new(buffer: FrameBuffer, quality: u8) -> Self {
        Self {
            buffer,
            quality,
            debug_path: None,
        }
    }

    /// Also write each encoded snapshot to `path`, overwriting the previous
    /// one. Best-effort: write failures are logged, never surfaced.
    pub fn with_debug_path(mut self, path: Option<PathBuf>) -> Self {
        self.debug_path = path;
        self
    }

    /// Encode the latest frame as JPEG.
    ///
    /// Returns [`Error::NoFrame`] when no capture has completed yet; the
    /// HTTP layer maps that to a "not ready" response.
    pub fn encode_jpeg(&self) -> Result<Vec<u8>> {
        let frame = self.buffer.latest().ok_or(Error::NoFrame)?;
        let jpeg = encode_frame(&frame, self.quality)?;

        if let Some(path) = &self.debug_path {
            if let Err(e) = std::fs::write(path, &jpeg) {
                debug!(path = %path.display(), error = %e, "debug snapshot write failed");
            }
        }

        Ok(jpeg)
    }
}

/// Encode one BGR frame to JPEG at the given quality.
fn encode_frame(frame: &RawFrame, quality: u8) -> Result<Vec<u8>> {
    let rgb = bgr_to_rgb(frame.data());
    let img = RgbImage::from_raw(frame.width, frame.height, rgb)
        .ok_or_else(|| Error::encode_error("pixel buffer does not match frame dimensions"))?;

    let mut out = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(
        &mut Cursor::new(&mut out),
        quality,
    ))
    .map_err(|e| Error::encode_error(e.to_string()))?;
    Ok(out)
}

/// The driver hands us BGR; the encoder wants RGB.
fn bgr_to_rgb(bgr: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(bgr.len());
    for px in bgr.chunks_exact(3) {
        rgb.extend_from_slice(&[px[2], px[1], px[0]]);
    }
    rgb
}
