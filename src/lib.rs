//! codescape - map code metrics of a software structure onto visuals
//!
//! This library scans a project into a structure tree, attaches per-region
//! properties (numeric code metrics and feature membership) loaded from JSON
//! data files, and turns those properties into colors and sizes through
//! configurable mapping methods. It is designed to be consumed by:
//! - The CLI binary (src/bin/codescape.rs)
//! - Rendering hosts implementing [`RenderSink`]
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **codescape-ir**: the data model (tree arena, regions, properties)
//! - **core**: scanning, loading, range resolution, methods and the engine
//! - **bin/codescape.rs**: thin CLI wrapper
//!
//! # Example
//!
//! ```no_run
//! use codescape::{CollectingSink, Project, StructureOptions};
//! use std::path::Path;
//!
//! let mut project = Project::open(Path::new("my_project"), &StructureOptions::default())?;
//! project.load_data_dir(Path::new("my_project_data"))?;
//!
//! let mut sink = CollectingSink::new();
//! let report = project.apply(project.tree().root(), &mut sink);
//! println!("{} regions colored", report.totals.applied);
//! # Ok::<(), codescape::MappingError>(())
//! ```

pub mod core;

pub use crate::core::*;
pub use codescape_ir::{
    create_property, is_unset_value, IrError, Node, NodeId, NodeKind, Property, PropertyKey, PropertyType, Region,
    StructureTree,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the version of the codescape library
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), "1.0.0");
    }
}
