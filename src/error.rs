//! Error types for layer compilation
//!
//! ## Table of Contents
//! - **CompileError**: Main error enum covering all failure modes
//! - **Result**: Type alias for `Result<T, CompileError>`

use thiserror::Error;

/// Result type alias for layer compilation operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Main error type for layer compilation
#[derive(Error, Debug)]
pub enum CompileError {
    /// A required collaborator was never set on the compiler
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Named resource is not in the library
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// Script installation or execution failure
    #[error("script error: {0}")]
    Script(String),

    /// Compilation task failure
    #[error("task error: {0}")]
    Task(String),

    /// Archive read/write failure
    #[error("archive error: {0}")]
    Archive(String),

    /// Generic IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse error
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl CompileError {
    /// Create a not-configured error
    pub fn not_configured(what: impl Into<String>) -> Self {
        Self::NotConfigured(what.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resource-not-found error
    pub fn resource_not_found(name: impl Into<String>) -> Self {
        Self::ResourceNotFound(name.into())
    }

    /// Create a script error
    pub fn script(msg: impl Into<String>) -> Self {
        Self::Script(msg.into())
    }

    /// Create a task error
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }

    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CompileError::not_configured("session");
        assert_eq!(err.to_string(), "not configured: session");

        let err = CompileError::resource_not_found("tree.osg");
        assert_eq!(err.to_string(), "resource not found: tree.osg");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CompileError = io.into();
        assert!(matches!(err, CompileError::Io(_)));
    }
}
