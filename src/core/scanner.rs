//! Structure scanning
//!
//! Builds a [`StructureTree`] from a directory. Siblings appear in file-system
//! enumeration order unless [`StructureOptions::sorted`] is set. Folders
//! reaching `max_depth` are kept as empty folder nodes; entries matching an
//! ignore pattern are omitted together with everything below them.

use codescape_ir::{strip_extension, StructureTree};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::config::StructureOptions;
use crate::core::error::{MappingError, Result};

#[cfg(test)]
use mockall::automock;

/// Prefix marking an ignore pattern as a regular expression
pub const REGEX_PATTERN_PREFIX: &str = "re:";

/// Normalize path separators for cross-platform compatibility.
/// - Converts Windows backslashes to forward slashes
/// - Strips Windows UNC prefix `\\?\` if present
pub fn normalize_path_separators(path: &str) -> String {
    let mut normalized = path.to_string();

    // Strip Windows UNC prefix (\\?\ or \\.\)
    if normalized.starts_with(r"\\?\") || normalized.starts_with(r"\\.\") {
        normalized = normalized[4..].to_string();
    }

    normalized.replace('\\', "/")
}

/// Trait for building a structure tree
///
/// Allows hosts and tests to substitute the file system with another source.
#[cfg_attr(test, automock)]
pub trait StructureScanner: Send + Sync {
    /// Scan `root` and return the project tree
    fn scan(&self, root: &Path, options: &StructureOptions) -> Result<StructureTree>;
}

// ============================================================================
// Ignore Matching
// ============================================================================

/// Compiled ignore patterns.
///
/// Globs are matched against the entry name and its root-relative path;
/// `re:` patterns are matched against the root-relative path.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    globs: GlobSet,
    regexes: Vec<Regex>,
}

impl IgnoreMatcher {
    /// Compile patterns, failing on the first invalid one
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut regexes = Vec::new();

        for pattern in patterns {
            if let Some(expr) = pattern.strip_prefix(REGEX_PATTERN_PREFIX) {
                let regex = Regex::new(expr).map_err(|e| MappingError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                regexes.push(regex);
            } else {
                let glob = Glob::new(pattern).map_err(|e| MappingError::Pattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                builder.add(glob);
            }
        }

        let globs = builder.build().map_err(|e| MappingError::Pattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self { globs, regexes })
    }

    /// Check if an entry should be omitted
    pub fn is_ignored(&self, name: &str, relative_path: &str) -> bool {
        self.globs.is_match(name)
            || self.globs.is_match(relative_path)
            || self.regexes.iter().any(|r| r.is_match(relative_path))
    }
}

// ============================================================================
// File System Scanner
// ============================================================================

/// Scanner walking the local file system with walkdir
#[derive(Debug, Default, Clone, Copy)]
pub struct FsScanner;

impl FsScanner {
    pub fn new() -> Self {
        Self
    }
}

impl StructureScanner for FsScanner {
    fn scan(&self, root: &Path, options: &StructureOptions) -> Result<StructureTree> {
        if !root.is_dir() {
            return Err(MappingError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }
        // surface an unreadable root as IO error instead of an empty tree
        fs::read_dir(root)?;

        let matcher = IgnoreMatcher::new(&options.ignore_patterns)?;
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        let mut tree = StructureTree::new(root_name, root);
        tree.set_stripped_extensions(options.extensions_to_strip.clone());

        let mut folders: HashMap<PathBuf, codescape_ir::NodeId> = HashMap::new();
        folders.insert(root.to_path_buf(), tree.root());

        let mut walker = WalkDir::new(root).follow_links(false).min_depth(1);
        if options.max_depth > 0 {
            walker = walker.max_depth(options.max_depth);
        }
        if options.sorted {
            walker = walker.sort_by_file_name();
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            let relative = relative_path_of(root, entry.path());
            let ignored = matcher.is_ignored(&name, &relative);
            if ignored {
                debug!(path = %relative, "ignoring entry");
            }
            !ignored
        });

        for result in entries {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walk error: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let Some(parent) = path.parent().and_then(|p| folders.get(p)).copied() else {
                warn!(path = %path.display(), "parent folder missing from tree, skipping");
                continue;
            };

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let relative = relative_path_of(root, path);

            if entry.file_type().is_dir() {
                let id = tree.add_folder(parent, file_name, relative, path)?;
                folders.insert(path.to_path_buf(), id);
            } else {
                let name = strip_extension(&file_name, &options.extensions_to_strip).to_string();
                let relative = strip_extension(&relative, &options.extensions_to_strip).to_string();
                tree.add_file(parent, name, relative, path)?;
            }
        }

        info!(
            root = %root.display(),
            files = tree.file_count(),
            folders = tree.folder_count(),
            "structure scan finished"
        );
        Ok(tree)
    }
}

/// Build the structure tree of `root` from the local file system
pub fn build_structure(root: &Path, options: &StructureOptions) -> Result<StructureTree> {
    FsScanner::new().scan(root, options)
}

fn relative_path_of(root: &Path, path: &Path) -> String {
    normalize_path_separators(&path.strip_prefix(root).unwrap_or(path).to_string_lossy())
}
