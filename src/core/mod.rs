//! Core module for the codescape mapping engine
//!
//! # Architecture
//!
//! - `error`: Error types using thiserror
//! - `config`: Software-system config and structure options
//! - `scanner`: Directory traversal into a StructureTree (StructureScanner trait + FsScanner)
//! - `loader`: Region, edge and data-file loading
//! - `range`: Memoised min/max resolution per scope
//! - `methods`: Mapping method variants and their factory
//! - `registry`: Mapping entries and named methods
//! - `engine`: ApplicationEngine orchestration and the RenderSink seam
//! - `project`: Facade over one loaded project

pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod methods;
pub mod project;
pub mod range;
pub mod registry;
pub mod scanner;

// Re-export commonly used types
pub use config::{SoftwareSystemConfig, StructureOptions};
pub use engine::{
    ApplicationEngine, ApplyCounts, ApplyReport, Assignment, CollectingSink, EntryOutcome, EntryReport,
    RangeMode, RenderSink,
};
pub use error::{MappingError, Result, ResultExt};
pub use loader::{
    discover_data_files, DataFiles, EdgeRecord, LoadStats, PropertyIndex, RegionLoader, RegionRecord,
};
pub use methods::{MappingMethod, MethodKind, Rgba, TargetHandle, VisualUpdate, VisualValue};
pub use project::Project;
pub use range::{RangeResolver, RangeResult, Scope};
pub use registry::{MappingConfig, MappingEntry, MappingEntryRegistry, MethodDefinition, MethodLibrary};
pub use scanner::{build_structure, FsScanner, IgnoreMatcher, StructureScanner};
