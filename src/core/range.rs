//! Range resolution
//!
//! Computes the `{min, max}` of one property over a subtree of the
//! [`StructureTree`]. NFP values below zero are the "not computed" sentinel
//! and never take part in a range. Results are memoised per
//! `(property key, scope node)` until [`RangeResolver::invalidate`] is called.

use codescape_ir::{NodeId, PropertyKey, StructureTree};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

use crate::core::error::{MappingError, Result};

/// Subtree a range is computed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Smallest subtree holding all the listed regions
    Regions(Vec<String>),
    /// One file's regions
    File(NodeId),
    /// All regions below a folder
    Folder(NodeId),
    /// The whole tree
    Global,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Regions(ids) => write!(f, "regions[{}]", ids.join(",")),
            Scope::File(id) => write!(f, "file#{}", id.index()),
            Scope::Folder(id) => write!(f, "folder#{}", id.index()),
            Scope::Global => f.write_str("global"),
        }
    }
}

/// Resolved bounds of a property
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub min: f64,
    pub max: f64,
}

impl RangeResult {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Replace either bound
    pub fn with_bounds(self, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min: min.unwrap_or(self.min),
            max: max.unwrap_or(self.max),
        }
    }

    /// True when `min == max` (or the bounds are inverted)
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Normalise `value` into `[0, 1]`.
    ///
    /// A degenerate range yields `0`.
    pub fn percentage(&self, value: f64) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        let p = (value - self.min) / (self.max - self.min);
        if p.is_nan() {
            0.0
        } else {
            p.clamp(0.0, 1.0) as f32
        }
    }
}

impl fmt::Display for RangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

// ============================================================================
// Resolver
// ============================================================================

type CacheKey = (PropertyKey, NodeId);

/// Memoising range calculator for one loaded project
#[derive(Debug, Default)]
pub struct RangeResolver {
    cache: Mutex<HashMap<CacheKey, RangeResult>>,
}

impl RangeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the range of `key` over `scope`
    pub fn resolve(&self, tree: &StructureTree, key: &PropertyKey, scope: &Scope) -> Result<RangeResult> {
        let node = Self::scope_node(tree, scope)?;
        self.resolve_node(tree, key, node)
    }

    /// Resolve the range of `key` over the subtree rooted at `node`
    pub fn resolve_node(&self, tree: &StructureTree, key: &PropertyKey, node: NodeId) -> Result<RangeResult> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let cache_key = (key.clone(), node);

        if let Some(hit) = cache.get(&cache_key) {
            debug!(%key, node = node.index(), "range cache hit");
            return Ok(*hit);
        }

        debug!(%key, node = node.index(), "range cache miss");
        let range = compute_range(tree, key, node).ok_or_else(|| MappingError::NoData {
            key: key.clone(),
            scope: scope_label(tree, node),
        })?;
        cache.insert(cache_key, range);
        Ok(range)
    }

    /// Map a scope onto the node whose subtree it covers
    pub fn scope_node(tree: &StructureTree, scope: &Scope) -> Result<NodeId> {
        let node = match scope {
            Scope::Global => tree.root(),
            Scope::File(id) | Scope::Folder(id) => *id,
            Scope::Regions(ids) => {
                let mut files = Vec::with_capacity(ids.len());
                for id in ids {
                    let file = tree
                        .region_file(id)
                        .ok_or_else(|| MappingError::UnknownRegion { id: id.clone() })?;
                    files.push(file);
                }
                tree.lowest_common_ancestor(&files)
                    .ok_or_else(|| MappingError::invalid_config("empty region scope"))?
            }
        };

        let Some(target) = tree.node(node) else {
            return Err(MappingError::invalid_config(format!(
                "scope {} does not address a node",
                scope
            )));
        };
        let kind_matches = match scope {
            Scope::File(_) => target.is_file(),
            Scope::Folder(_) => target.is_folder(),
            Scope::Regions(_) | Scope::Global => true,
        };
        if !kind_matches {
            return Err(MappingError::invalid_config(format!(
                "scope {} addresses '{}', which is a {}",
                scope,
                target.relative_path,
                if target.is_file() { "file" } else { "folder" }
            )));
        }
        Ok(node)
    }

    /// Drop every cached range
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if !cache.is_empty() {
            debug!(entries = cache.len(), "range cache cleared");
        }
        cache.clear();
    }

    /// Number of cached ranges
    pub fn cached_len(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

fn compute_range(tree: &StructureTree, key: &PropertyKey, node: NodeId) -> Option<RangeResult> {
    tree.regions_under(node)
        .filter_map(|(_, region)| region.property(key))
        .filter(|p| !p.is_unset())
        .map(|p| p.numeric_value())
        .fold(None, |acc: Option<RangeResult>, v| match acc {
            None => Some(RangeResult::new(v, v)),
            Some(r) => Some(RangeResult::new(r.min.min(v), r.max.max(v))),
        })
}

fn scope_label(tree: &StructureTree, node: NodeId) -> String {
    match tree.node(node) {
        Some(n) if n.relative_path.is_empty() => "/".to_string(),
        Some(n) => n.relative_path.clone(),
        None => format!("#{}", node.index()),
    }
}
