use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Dataset not found: {dataset_id}")]
    DatasetNotFound { dataset_id: String },

    #[error("Unable to decode {path} with any supported encoding (tried {attempted})")]
    DecodeFailure { path: String, attempted: String },

    #[error("Chart execution failed: {message}")]
    ChartExecution { message: String },

    #[error("Agent invocation failed: {message}")]
    AgentFailure { message: String },

    #[error("Catalog store error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("IO error: {message}")]
    IoError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl From<std::io::Error> for AnalysisError {
    fn from(err: std::io::Error) -> Self {
        AnalysisError::IoError {
            message: err.to_string(),
        }
    }
}
