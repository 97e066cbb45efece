//! Error types for codescape
//!
//! This module provides structured error handling using thiserror.
//!
//! Errors fall in two groups. Structural failures (unreadable root, broken
//! config file) abort the operation they belong to. Data-shape and per-entry
//! failures are isolated: the offending property, region or mapping entry is
//! skipped and counted, and the rest of the pass continues. See
//! [`MappingError::is_skippable`].

use codescape_ir::{IrError, PropertyKey};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for codescape operations
pub type Result<T> = std::result::Result<T, MappingError>;

/// Errors that can occur while building, loading or mapping a project
#[derive(Error, Debug)]
pub enum MappingError {
    /// IO error during scanning or loading
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Project root missing or not a directory
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// Malformed property or region payload
    #[error("Invalid property: {0}")]
    InvalidProperty(#[from] IrError),

    /// No usable values for a key within a scope
    #[error("No data for {key} in scope '{scope}'")]
    NoData { key: PropertyKey, scope: String },

    /// Mapping entry references a method nobody registered
    #[error("Unknown mapping method: {name}")]
    UnknownMethod { name: String },

    /// Known method with unusable parameters
    #[error("Invalid configuration for method '{method}': {message}")]
    InvalidMethodConfig { method: String, message: String },

    /// Renderer has no target for a region
    #[error("No visual target for region '{region}'")]
    MissingVisualTarget { region: String },

    /// Region id not present in the tree
    #[error("Unknown region: {id}")]
    UnknownRegion { id: String },

    /// Registry has no entry for a key
    #[error("No mapping entry for {key}")]
    EntryNotFound { key: PropertyKey },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Glob or regex pattern that does not compile
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<MappingError>,
    },
}

impl MappingError {
    /// Wrap an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        MappingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        MappingError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid method config error
    pub fn invalid_method(method: impl Into<String>, message: impl Into<String>) -> Self {
        MappingError::InvalidMethodConfig {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Innermost error below any context wrappers
    pub fn root_cause(&self) -> &MappingError {
        match self {
            MappingError::WithContext { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Per-item failures that must be skipped and counted, not propagated
    pub fn is_skippable(&self) -> bool {
        match self {
            MappingError::NoData { .. }
            | MappingError::UnknownMethod { .. }
            | MappingError::InvalidMethodConfig { .. }
            | MappingError::MissingVisualTarget { .. }
            | MappingError::InvalidProperty(_) => true,
            MappingError::WithContext { source, .. } => source.is_skippable(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MappingError::DirectoryNotFound {
            path: PathBuf::from("/tmp/missing"),
        };
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn test_error_with_context() {
        let err = MappingError::invalid_config("bad value");
        let wrapped = err.with_context("loading config");
        assert!(wrapped.to_string().contains("loading config"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MappingError = io_err.into();
        assert!(matches!(err, MappingError::Io(_)));
        assert!(!err.is_skippable());
    }

    #[test]
    fn test_no_data_mentions_key() {
        let err = MappingError::NoData {
            key: PropertyKey::nfp("complexity"),
            scope: "src".to_string(),
        };
        assert!(err.to_string().contains("NFP:complexity"));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_ir_error_conversion() {
        let ir = IrError::invalid_property("nfp", "x", "not numeric");
        let err: MappingError = ir.into();
        assert!(matches!(err, MappingError::InvalidProperty(_)));
        assert!(err.is_skippable());
    }

    #[test]
    fn test_skippable_through_context() {
        let err = MappingError::UnknownMethod {
            name: "rainbow".to_string(),
        }
        .with_context("entry NFP:complexity");
        assert!(err.is_skippable());
        assert!(matches!(err.root_cause(), MappingError::UnknownMethod { .. }));
        assert!(!MappingError::invalid_config("x").with_context("y").is_skippable());
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<()> = Err(MappingError::invalid_config("test"));
        let err = result.context("during loading").unwrap_err();
        assert!(err.to_string().contains("during loading"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: MappingError = json_err.into();
        assert!(matches!(err, MappingError::Json(_)));
    }
}
