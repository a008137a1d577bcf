use thiserror::Error;

/// Error taxonomy shared by every `gapi-helper` crate.
///
/// Remote failures keep the HTTP status (when there is one) so that the retry helper can
/// decide whether another attempt makes sense, and so callers can tell a permission
/// problem from a transient outage.
#[derive(Error, Debug)]
pub enum GapiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote read failed{}: {message}", status_suffix(.status))]
    RemoteRead {
        status: Option<u16>,
        message: String,
    },

    #[error("Remote write failed{}: {message}", status_suffix(.status))]
    RemoteWrite {
        status: Option<u16>,
        message: String,
    },

    #[error("{0}")]
    Addressing(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GapiError {
    /// The HTTP status attached to a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GapiError::RemoteRead { status, .. } | GapiError::RemoteWrite { status, .. } => {
                *status
            }
            _ => None,
        }
    }

    /// Whether another attempt could succeed.
    ///
    /// Bad requests (400) and permission errors (403) fail the same way every time, and
    /// local errors never depend on the remote side.
    pub fn is_retryable(&self) -> bool {
        match self {
            GapiError::RemoteRead { status, .. } | GapiError::RemoteWrite { status, .. } => {
                !matches!(status, Some(400) | Some(403))
            }
            _ => false,
        }
    }

    /// Whether the failure means the access token should be dropped.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<config::ConfigError> for GapiError {
    fn from(err: config::ConfigError) -> Self {
        GapiError::Configuration(err.to_string())
    }
}

pub type GapiResult<T> = Result<T, GapiError>;
