//! The background capture loop.
//!
//! One dedicated thread owns the [`FrameSource`] for its entire life and
//! runs acquire → publish → check-stop until told to stop or the device is
//! lost. HTTP handlers never touch the hardware; they only read the
//! [`FrameBuffer`] this loop feeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::camera::driver::FrameSource;
use crate::camera::frame::FrameBuffer;
use crate::error::Result;

/// Handle to the running capture loop.
///
/// `stop` is the only cancellation primitive: an idempotent flag observed
/// cooperatively at each cycle boundary. There is no preemption of an
/// in-flight hardware read, so one extra frame may be published after
/// `stop()` before the loop unwinds.
pub struct VideoStream {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    buffer: FrameBuffer,
}

impl VideoStream {
    /// Spawn the capture thread over an already-opened source.
    ///
    /// Device open/configure failures belong to the source constructor and
    /// surface before any thread exists; the only failure here is thread
    /// spawning itself.
    pub fn start<S>(source: S, buffer: FrameBuffer) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            let buffer = buffer.clone();
            thread::Builder::new()
                .name("capture".to_string())
                .spawn(move || run_capture_loop(source, buffer, stop))?
        };

        Ok(Self {
            stop,
            handle: Some(handle),
            buffer,
        })
    }

    /// Request the loop to stop. Fire-and-forget and idempotent; the loop
    /// observes the flag at its next cycle boundary, releases the camera
    /// and exits.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// A handle onto the frame buffer this loop publishes into.
    pub fn buffer(&self) -> FrameBuffer {
        self.buffer.clone()
    }

    /// Whether the capture thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and wait for the thread to exit, bounded by `timeout`.
    ///
    /// Returns `true` when the thread exited within the bound. Teardown is
    /// best-effort: a `false` return means the process is exiting before
    /// the release step ran and the OS reclaims the handle.
    pub fn shutdown(mut self, timeout: Duration) -> bool {
        self.stop();
        let Some(handle) = self.handle.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("capture thread did not exit within {:?}", timeout);
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        handle.join().is_ok()
    }
}

fn run_capture_loop<S: FrameSource>(mut source: S, buffer: FrameBuffer, stop: Arc<AtomicBool>) {
    info!("capture loop started");
    let mut clean_exit = false;

    loop {
        match source.next_frame() {
            Ok(frame) => buffer.publish(frame),
            Err(e) if !e.is_fatal_capture() => {
                // Transient: keep the stale frame and try the next cycle
                warn!(error = %e, "frame read failed, continuing");
            }
            Err(e) => {
                // Fatal: leave the last frame in place so readers degrade
                // to stale data instead of errors
                error!(error = %e, "capture loop terminating");
                break;
            }
        }

        if stop.load(Ordering::Acquire) {
            clean_exit = true;
            break;
        }
    }

    if clean_exit {
        buffer.clear();
    }
    // The source is dropped here, on the thread that owned it, releasing
    // the hardware handle exactly once.
    drop(source);
    debug!("capture loop exited, camera released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::driver::testing::{FailingSource, FakeSource};

    #[test]
    fn test_frames_flow_into_buffer() {
        let buffer = FrameBuffer::new();
        let source = FakeSource::solid(2, 2, [20, 40, 200]);
        let stream = VideoStream::start(source, buffer.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !buffer.has_frame() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        let frame = buffer.latest().expect("a frame should arrive");
        assert_eq!(frame.data()[0], 20);

        assert!(stream.shutdown(Duration::from_secs(2)));
    }

    #[test]
    fn test_stop_is_idempotent_and_releases_source() {
        let buffer = FrameBuffer::new();
        let source = FakeSource::solid(2, 2, [0, 0, 0]);
        let closed = source.closed_flag();
        let stream = VideoStream::start(source, buffer).unwrap();

        stream.stop();
        stream.stop();
        assert!(stream.shutdown(Duration::from_secs(2)));
        assert!(closed.load(Ordering::SeqCst), "source must be dropped");
    }

    #[test]
    fn test_no_publish_after_stop_observed() {
        let buffer = FrameBuffer::new();
        let source = FakeSource::solid(2, 2, [1, 1, 1]);
        let stream = VideoStream::start(source, buffer.clone()).unwrap();

        assert!(stream.shutdown(Duration::from_secs(2)));
        // Clean shutdown clears the slot; nothing may repopulate it
        assert!(buffer.latest().is_none());
        thread::sleep(Duration::from_millis(20));
        assert!(buffer.latest().is_none());
    }

    #[test]
    fn test_transient_failures_keep_loop_alive() {
        let buffer = FrameBuffer::new();
        let source = FakeSource::solid(2, 2, [5, 6, 7]).with_transient_failures(3);
        let stream = VideoStream::start(source, buffer.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while !buffer.has_frame() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(buffer.has_frame(), "loop must survive transient errors");
        assert!(stream.shutdown(Duration::from_secs(2)));
    }

    #[test]
    fn test_fatal_error_freezes_last_frame() {
        let buffer = FrameBuffer::new();
        let source = FailingSource::fatal_after(3);
        let closed = source.closed_flag();
        let stream = VideoStream::start(source, buffer.clone()).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while stream.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!stream.is_running(), "fatal error must end the loop");
        assert!(closed.load(Ordering::SeqCst));
        // Buffer keeps the last good frame: stale beats missing
        let frame = buffer.latest().expect("last frame must stay readable");
        assert_eq!(frame.data()[0], 10);
    }
}
