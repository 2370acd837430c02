//! Domain-specific error types for the barrage load generator
//!
//! Structured error types using `thiserror` for precise and ergonomic
//! error handling throughout the application.

use thiserror::Error;

/// Main error type for the barrage application
#[derive(Error, Debug)]
pub enum BarrageError {
    /// Configuration-related errors (CLI parsing, validation, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors (connection, protocol, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// URL/body template parsing or rendering errors
    #[error("Template error: {0}")]
    Template(String),

    /// Peer communication errors in coordinator mode
    #[error("Peer error: {0}")]
    Peer(String),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization errors
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// File input errors (url-file, body-file, script)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type using BarrageError
pub type Result<T> = std::result::Result<T, BarrageError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    fn with_config_context(self, msg: &str) -> Result<T>;
    fn with_transport_context(self, msg: &str) -> Result<T>;
    fn with_template_context(self, msg: &str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| BarrageError::Config(format!("{}: {}", msg, e)))
    }

    fn with_transport_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| BarrageError::Transport(format!("{}: {}", msg, e)))
    }

    fn with_template_context(self, msg: &str) -> Result<T> {
        self.map_err(|e| BarrageError::Template(format!("{}: {}", msg, e)))
    }
}

impl<T> ErrorContext<T> for Option<T> {
    fn with_config_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BarrageError::Config(msg.to_string()))
    }

    fn with_transport_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BarrageError::Transport(msg.to_string()))
    }

    fn with_template_context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| BarrageError::Template(msg.to_string()))
    }
}

// Convenience constructors
impl BarrageError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        BarrageError::Config(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        BarrageError::Transport(msg.into())
    }

    pub fn peer<S: Into<String>>(msg: S) -> Self {
        BarrageError::Peer(msg.into())
    }
}

// Custom From implementation for boxed WebSocket errors
impl From<tokio_tungstenite::tungstenite::Error> for BarrageError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        BarrageError::WebSocket(Box::new(err))
    }
}
