use std::path::PathBuf;

/// Errors surfaced while configuring or starting a run.
///
/// Outcomes observed while the load is running are never errors: they are
/// classified by the [`crate::Recorder`] and end up in the report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid threshold `{expression}` on `{metric}`: {reason}")]
    InvalidThreshold {
        metric: String,
        expression: String,
        reason: String,
    },

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to signal shutdown to workers")]
    Shutdown,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
