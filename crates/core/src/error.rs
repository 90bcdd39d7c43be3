/// Result alias that carries the custom [`LightSyncError`] type.
pub type Result<T> = std::result::Result<T, LightSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LightSyncError {
    /// Invalid startup configuration. Fatal: the real-time loop must not be
    /// entered with a pipeline built from such a configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A block delivered by the capture layer does not match the configured
    /// geometry. The block is rejected before any analysis state is touched.
    #[error("malformed block: expected {expected} samples, got {actual}")]
    MalformedBlock { expected: usize, actual: usize },
    /// Failure to open or write to the lighting transport.
    #[error("transport fault: {0}")]
    Transport(String),
    /// Failure reported by the FFT backend.
    #[error("fft failure: {0}")]
    Fft(#[from] realfft::FftError),
    /// Wrapper around configuration files that fail to parse.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Free-form error surfaced by the outer application layers.
    #[error("{0}")]
    Message(String),
}

impl LightSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a configuration fault.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }
}

impl From<serialport::Error> for LightSyncError {
    fn from(value: serialport::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<&str> for LightSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LightSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
