//! Error types for the anchor daemon

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Anchor error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (sockets, config files, process spawning)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration could not be rendered to TOML
    #[error("Config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Configuration is structurally valid but semantically wrong
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown radio device type in configuration
    #[error("Unknown radio device: {0}")]
    UnknownDevice(String),

    /// Radio driver reported a failure
    #[error("Radio error: {0}")]
    Radio(String),

    /// Multi-chip or phase synchronization returned a non-zero status
    #[error("Synchronization failed ({stage}): status {status}")]
    SynchronizationFailed {
        /// Which calibration step failed
        stage: &'static str,
        /// Status code returned by the driver
        status: i32,
    },

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
