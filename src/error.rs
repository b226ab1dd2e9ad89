use thiserror::Error;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(String),

    /// The store answered but holds no factor rows for the requested source.
    #[error("No emission factors found for source '{0}'")]
    EmptyReference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<sqlx::Error> for MatchError {
    fn from(err: sqlx::Error) -> Self {
        MatchError::Database(err.to_string())
    }
}

impl From<csv::Error> for MatchError {
    fn from(err: csv::Error) -> Self {
        MatchError::Csv(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MatchError>;
