use thiserror::Error;

pub type RecoResult<T> = Result<T, RecoError>;

#[derive(Error, Debug)]
pub enum RecoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("User {user_id} is out of range: model was trained on {trained_users} users")]
    UnknownUser { user_id: i64, trained_users: usize },

    #[error("Invalid cutoff k={0}: k must be a positive integer")]
    InvalidCutoff(usize),

    #[error("Recall is undefined for an empty ground-truth set")]
    EmptyGroundTruth,

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
