
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeletionError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Couldn't find {model} with id={id}")]
    NotFound { model: String, id: i64 },
    #[error("Can't modify immutable {model} record (id={id:?})")]
    Immutable { model: String, id: Option<i64> },
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Unknown association '{association}' on {model}")]
    UnknownAssociation { model: String, association: String },
    #[error("Unknown column '{column}' on {model}")]
    UnknownColumn { model: String, column: String },
    #[error("{0} record has no primary key value")]
    MissingKey(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Callback halted the operation: {0}")]
    Callback(String),
}

pub type Result<T> = std::result::Result<T, DeletionError>;

// Helper conversions
impl From<rusqlite::Error> for DeletionError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}

impl From<config::ConfigError> for DeletionError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
