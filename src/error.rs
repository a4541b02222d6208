//! Error handling for the picam server crate.

/// A specialized `Result` type for picam server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for camera and server operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The camera device could not be opened or configured
    #[error("camera init failed: {0}")]
    CameraInit(String),

    /// A single frame read failed; the capture loop continues
    #[error("camera read failed: {0}")]
    CameraRead(String),

    /// The camera device is gone; the capture loop terminates
    #[error("camera lost: {0}")]
    CameraGone(String),

    /// No frame has been captured yet
    #[error("no frame captured yet")]
    NoFrame,

    /// JPEG encoding failed
    #[error("snapshot encode failed: {0}")]
    Encode(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("web server error: {0}")]
    WebServer(String),
}

impl Error {
    /// Create a new camera init error
    pub fn camera_init(msg: impl Into<String>) -> Self {
        Self::CameraInit(msg.into())
    }

    /// Create a new transient camera read error
    pub fn camera_read(msg: impl Into<String>) -> Self {
        Self::CameraRead(msg.into())
    }

    /// Create a new fatal camera loss error
    pub fn camera_gone(msg: impl Into<String>) -> Self {
        Self::CameraGone(msg.into())
    }

    /// Create a new encode error
    pub fn encode_error(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error ends the capture loop rather than skipping a cycle.
    pub fn is_fatal_capture(&self) -> bool {
        !matches!(self, Self::CameraRead(_))
    }
}
