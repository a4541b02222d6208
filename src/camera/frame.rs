//! Raw frames and the single-slot latest-frame buffer.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// One decoded image captured from the video source.
///
/// Pixels are tightly packed BGR24 (`data.len() == width * height * 3`).
/// A frame is immutable once published; readers share it by `Arc` and must
/// not hold it past a single encode, since the slot is replaced every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl RawFrame {
    /// Build a frame from packed BGR bytes, validating the buffer length.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::camera_read(format!(
                "frame buffer length {} does not match {}x{} BGR ({} expected)",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a solid-color frame. Used by the fake source and benches.
    pub fn solid(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&bgr);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Packed BGR pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Thread-safe holder for the most recently captured frame.
///
/// The capture thread calls [`publish`](FrameBuffer::publish) once per cycle;
/// any number of concurrent readers call [`latest`](FrameBuffer::latest).
/// The lock guards only the `Arc` swap, never decoding or encoding, so
/// neither side can block the other for longer than a pointer exchange.
/// Readers see either no frame or a whole frame: frames are immutable once
/// stored, so a torn read is not possible.
#[derive(Clone, Default)]
pub struct FrameBuffer {
    slot: Arc<Mutex<Option<Arc<RawFrame>>>>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a frame, replacing any previous one.
    pub fn publish(&self, frame: RawFrame) {
        let frame = Arc::new(frame);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(frame);
    }

    /// The current frame, or `None` before the first capture completes.
    pub fn latest(&self) -> Option<Arc<RawFrame>> {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Empty the slot. Called on clean shutdown.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    /// Whether at least one frame has been published and not cleared.
    pub fn has_frame(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn test_latest_before_publish_is_none() {
        let buffer = FrameBuffer::new();
        assert!(buffer.latest().is_none());
        assert!(!buffer.has_frame());
    }

    #[test]
    fn test_publish_replaces_previous() {
        let buffer = FrameBuffer::new();
        buffer.publish(RawFrame::solid(2, 2, [1, 2, 3]));
        buffer.publish(RawFrame::solid(2, 2, [9, 9, 9]));
        let frame = buffer.latest().unwrap();
        assert_eq!(frame.data()[0], 9);
    }

    #[test]
    fn test_clear_empties_slot() {
        let buffer = FrameBuffer::new();
        buffer.publish(RawFrame::solid(2, 2, [1, 2, 3]));
        buffer.clear();
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_frame_length_validation() {
        assert!(RawFrame::new(2, 2, vec![0; 12]).is_ok());
        assert!(RawFrame::new(2, 2, vec![0; 11]).is_err());
    }

    /// Concurrent publishes never produce a torn read: every frame a reader
    /// observes is filled with a single byte value.
    #[test]
    fn test_no_torn_reads_under_contention() {
        let buffer = FrameBuffer::new();
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let buffer = buffer.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut value = 0u8;
                while !stop.load(Ordering::Relaxed) {
                    buffer.publish(RawFrame::solid(16, 16, [value, value, value]));
                    value = value.wrapping_add(1);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        if let Some(frame) = buffer.latest() {
                            let first = frame.data()[0];
                            assert!(
                                frame.data().iter().all(|&b| b == first),
                                "observed a partially written frame"
                            );
                        }
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
    }
}
