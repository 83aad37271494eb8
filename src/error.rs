use thiserror::Error;

#[derive(Error, Debug)]
pub enum NominalError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown workspace: {0}")]
    UnknownWorkspace(String),

    #[error("Workspace already exists: {0}")]
    WorkspaceExists(String),

    #[error("No workspace selected. Pass --workspace or run `nominal workspace use <name>`")]
    NoWorkspace,

    #[error("No record with ID {0}")]
    UnknownRecord(i64),

    #[error("No rule with ID {0}")]
    UnknownRule(i64),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, NominalError>;
