//! Error types for codescape-ir
//!
//! Model errors are local: a malformed property or region is rejected on its
//! own and never invalidates the rest of the tree.

use thiserror::Error;

/// Errors raised while building or populating the structure model
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    /// Property type unknown or raw value not coercible to the variant's shape
    #[error("Invalid property '{name}' ({kind}): {reason}")]
    InvalidProperty {
        kind: String,
        name: String,
        reason: String,
    },

    /// Region span with start after end
    #[error("Invalid span for region '{region}': start {start} > end {end}")]
    InvalidSpan { region: String, start: u32, end: u32 },

    /// Children can only be attached to folders
    #[error("Node '{path}' is not a folder")]
    NotAFolder { path: String },

    /// Node id outside the arena, or a file operation on a folder
    #[error("Unknown node: {0}")]
    UnknownNode(String),
}

impl IrError {
    /// Create an invalid property error
    pub fn invalid_property(
        kind: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        IrError::InvalidProperty {
            kind: kind.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, IrError>;
