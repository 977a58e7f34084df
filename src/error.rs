//! Custom error types for lemmasearch

use thiserror::Error;

/// Main error type for lemmasearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Morphology error: {0}")]
    Morphology(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// The inverted index no longer agrees with itself. Never expected at runtime.
    #[error("Index invariant violated: {0}")]
    Invariant(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for lemmasearch
pub type Result<T> = std::result::Result<T, Error>;
