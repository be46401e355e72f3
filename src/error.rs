use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Model source unavailable: {path}: {reason}")]
    ModelUnavailable { path: String, reason: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Calibration unavailable: {0}")]
    Calibration(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Video decode error: {0}")]
    Video(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML Error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Missing or unreadable inputs; the job fails and is not retried.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::ModelUnavailable { .. } | Error::InvalidArgument(_)
        )
    }
}

impl From<y4m::Error> for Error {
    fn from(err: y4m::Error) -> Self {
        Error::Video(format!("{:?}", err))
    }
}
