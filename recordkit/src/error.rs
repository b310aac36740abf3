use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordKitError {
    #[error("Record values are missing for fields: {fields:?}")]
    MissingValues { fields: Vec<String> },

    #[error("Invalid input type: {0}")]
    InvalidInputType(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Options error: {0}")]
    Options(String),

    #[error("No records found in recordset")]
    NoRecords,

    #[error("Record index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecordKitError>;
