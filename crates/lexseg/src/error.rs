#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("Invalid config file {path}: {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Not a PDF file or folder: {0}")]
    NotAPdf(String),
}
