//! Configuration loaded from JSON
//!
//! The software-system config describes where the project lives and how its
//! structure is scanned:
//!
//! ```json
//! {
//!   "path": "/data/systems",
//!   "root_folder": "my_project",
//!   "max_folder_depth": 6,
//!   "ignore_files": [".git", "*.class", "re:^build/"],
//!   "remove_extensions": [".rt"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{MappingError, Result, ResultExt};

/// Options for building the structure tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructureOptions {
    /// Folders at this depth (root = 0) are listed but not descended; 0 = unlimited
    pub max_depth: usize,
    /// Glob patterns (or `re:`-prefixed regexes) of entries to omit
    pub ignore_patterns: Vec<String>,
    /// Suffixes removed from displayed file names
    pub extensions_to_strip: Vec<String>,
    /// Sort siblings by name instead of keeping file-system enumeration order
    pub sorted: bool,
}

impl StructureOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_extensions_to_strip<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions_to_strip = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }
}

/// Software-system configuration (`software_system` JSON)
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SoftwareSystemConfig {
    /// Base directory of the system
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Project folder, relative to `path` when both are given
    #[serde(default)]
    pub root_folder: Option<String>,
    /// Maximum folder depth; zero or negative disables the limit
    #[serde(default)]
    pub max_folder_depth: i64,
    /// Ignore patterns
    #[serde(default)]
    pub ignore_files: Vec<String>,
    /// Extensions stripped from file names
    #[serde(default)]
    pub remove_extensions: Vec<String>,
}

impl SoftwareSystemConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(MappingError::from)
            .context(format!("reading {}", path.display()))?;
        Self::from_json(&content).context(format!("parsing {}", path.display()))
    }

    /// Project root described by `path` and `root_folder`
    pub fn root_dir(&self) -> Option<PathBuf> {
        match (&self.path, &self.root_folder) {
            (Some(base), Some(folder)) => Some(base.join(folder)),
            (Some(base), None) => Some(base.clone()),
            (None, Some(folder)) => Some(PathBuf::from(folder)),
            (None, None) => None,
        }
    }

    /// Structure options for the scanner
    pub fn to_options(&self) -> StructureOptions {
        StructureOptions {
            max_depth: self.max_folder_depth.max(0) as usize,
            ignore_patterns: self.ignore_files.clone(),
            extensions_to_strip: self.remove_extensions.clone(),
            sorted: false,
        }
    }
}
