use thiserror::Error;

/// Failures talking to the controller over the serial link.
///
/// A missing or malformed reply is *not* a `LinkError`; it is reported as a
/// failed [`crate::serial::Outcome`] and the link stays usable.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The serial device could not be opened or configured.
    #[error("failed to open serial device {device}: {reason}")]
    Open { device: String, reason: String },

    /// Writing a command (or the resync carriage return) failed.
    #[error("serial write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading failed for a reason other than the read timeout.
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The blocking worker running the exchange panicked or was cancelled.
    #[error("command worker failed: {0}")]
    Worker(String),
}

/// Fatal errors raised before the daemon starts serving requests.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Device(#[from] LinkError),

    #[error("unable to listen on {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("unable to load TLS material: {0}")]
    Tls(String),

    #[error("unable to acquire lock on {path}: {source}")]
    PidLock {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StartupError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Config(_) => 2,
            StartupError::Device(_) => 3,
            StartupError::Bind { .. } | StartupError::Tls(_) => 4,
            StartupError::PidLock { .. } => 99,
        }
    }
}
