use std::path::PathBuf;

/// Result alias that carries the custom [`VizError`] type.
pub type Result<T> = std::result::Result<T, VizError>;

/// Common error type for the core crate.
///
/// Every failure that is not handled locally ends the session: the binary
/// reports the message on stderr and exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum VizError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The configuration file could not be parsed.
    #[error("failed to parse config `{path}`: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// The configuration parsed but holds values the pipeline cannot use.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// The capture source failed or was closed.
    #[error("capture failed: {0}")]
    Capture(String),
    /// The window system refused an operation.
    #[error("surface error: {0}")]
    Surface(String),
    /// Forward FFT failed, which only happens on buffer length mismatches.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl VizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn capture<T: Into<String>>(msg: T) -> Self {
        Self::Capture(msg.into())
    }
}

impl From<&str> for VizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
