//! Region and edge loading
//!
//! Data files are JSON documents with optional `regions` and `edges` arrays:
//!
//! ```json
//! {
//!   "regions": [
//!     { "id": "r1", "location": "src/Main.java", "start": 3, "end": 12,
//!       "properties": [
//!         { "type": "NFP", "name": "complexity", "value": 7, "unit": "cc" },
//!         { "type": "Feature", "name": "logging" }
//!       ] }
//!   ],
//!   "edges": [
//!     { "type": "calls", "label": "run",
//!       "from": { "file": "src/Main.java", "lines": { "from": 4, "to": 4 } },
//!       "to":   { "file": "src/Engine.java", "lines": { "from": 9, "to": 20 } },
//!       "value": 3.5 }
//!   ]
//! }
//! ```
//!
//! Every record is decoded on its own: a malformed region is rejected, a
//! malformed property is dropped, and the rest of the file still loads.

use codescape_ir::{create_property, PropertyType, Region, StructureTree};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::error::{MappingError, Result, ResultExt};

/// File name pattern of region data files
pub const REGION_FILE_PATTERN: &str = "regions_*.json";
/// File name pattern of edge data files
pub const EDGE_FILE_PATTERN: &str = "edges_*.json";
/// File name pattern of mapping files
pub const MAPPING_FILE_PATTERN: &str = "mappings_*.json";

// ============================================================================
// Records
// ============================================================================

/// One property of a region record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
}

/// One region record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub id: String,
    pub location: String,
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub properties: Vec<PropertyRecord>,
}

/// Line or column span of an edge endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub from: u32,
    pub to: u32,
}

/// Edge endpoint, addressed like a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeEndpoint {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Span>,
}

/// Connection between two code locations. Retained, not mapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub label: Option<String>,
    pub from: EdgeEndpoint,
    pub to: EdgeEndpoint,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Raw contents of a data file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataFile {
    #[serde(default)]
    pub regions: Vec<Value>,
    #[serde(default)]
    pub edges: Vec<Value>,
}

impl DataFile {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(MappingError::from)
            .context(format!("reading {}", path.display()))?;
        Self::from_json(&content).context(format!("parsing {}", path.display()))
    }
}

// ============================================================================
// Statistics & Property Index
// ============================================================================

/// Counters of one or more load passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub regions_loaded: usize,
    /// Loaded regions that replaced one with the same id
    pub regions_replaced: usize,
    /// Malformed records or spans with `start > end`
    pub regions_rejected: usize,
    /// Records whose location is not a file of the tree
    pub regions_unresolved: usize,
    pub properties_loaded: usize,
    pub properties_dropped: usize,
    pub edges_loaded: usize,
    pub edges_rejected: usize,
    pub edges_unresolved: usize,
}

impl AddAssign for LoadStats {
    fn add_assign(&mut self, other: Self) {
        self.regions_loaded += other.regions_loaded;
        self.regions_replaced += other.regions_replaced;
        self.regions_rejected += other.regions_rejected;
        self.regions_unresolved += other.regions_unresolved;
        self.properties_loaded += other.properties_loaded;
        self.properties_dropped += other.properties_dropped;
        self.edges_loaded += other.edges_loaded;
        self.edges_rejected += other.edges_rejected;
        self.edges_unresolved += other.edges_unresolved;
    }
}

/// Property names seen per type, lower-case
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropertyIndex {
    names: BTreeMap<PropertyType, BTreeSet<String>>,
}

impl PropertyIndex {
    pub fn insert(&mut self, kind: PropertyType, name: &str) {
        self.names.entry(kind).or_default().insert(name.to_lowercase());
    }

    pub fn contains(&self, kind: PropertyType, name: &str) -> bool {
        self.names
            .get(&kind)
            .map_or(false, |set| set.contains(&name.to_lowercase()))
    }

    /// Names of one type in sorted order
    pub fn names(&self, kind: PropertyType) -> impl Iterator<Item = &str> {
        self.names.get(&kind).into_iter().flatten().map(String::as_str)
    }

    pub fn types(&self) -> impl Iterator<Item = PropertyType> + '_ {
        self.names.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

// ============================================================================
// Region Loader
// ============================================================================

/// Loads region and edge records into a [`StructureTree`]
#[derive(Debug, Clone, Default)]
pub struct RegionLoader {
    edges: Vec<EdgeRecord>,
    index: PropertyIndex,
    stats: LoadStats,
}

impl RegionLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load one data file
    pub fn load_file(&mut self, tree: &mut StructureTree, path: &Path) -> Result<LoadStats> {
        let data = DataFile::from_file(path)?;
        let stats = self.load_data(tree, data);
        info!(
            file = %path.display(),
            regions = stats.regions_loaded,
            rejected = stats.regions_rejected,
            unresolved = stats.regions_unresolved,
            edges = stats.edges_loaded,
            "data file loaded"
        );
        Ok(stats)
    }

    /// Load a data document from a JSON string
    pub fn load_json(&mut self, tree: &mut StructureTree, json: &str) -> Result<LoadStats> {
        let data = DataFile::from_json(json)?;
        Ok(self.load_data(tree, data))
    }

    pub fn load_data(&mut self, tree: &mut StructureTree, data: DataFile) -> LoadStats {
        let mut stats = self.load_records(tree, data.regions);
        stats += self.load_edges(tree, data.edges);
        stats
    }

    /// Insert region records; a record with a known id replaces the old region
    pub fn load_records<I>(&mut self, tree: &mut StructureTree, records: I) -> LoadStats
    where
        I: IntoIterator<Item = Value>,
    {
        let mut stats = LoadStats::default();

        for raw in records {
            let record: RegionRecord = match serde_json::from_value(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Rejected region record: {}", e);
                    stats.regions_rejected += 1;
                    continue;
                }
            };
            self.load_record(tree, record, &mut stats);
        }

        self.stats += stats;
        stats
    }

    fn load_record(&mut self, tree: &mut StructureTree, record: RegionRecord, stats: &mut LoadStats) {
        let mut region = match Region::new(&record.id, &record.location, record.start, record.end) {
            Ok(region) => region,
            Err(e) => {
                warn!(region = %record.id, "Rejected region: {}", e);
                stats.regions_rejected += 1;
                return;
            }
        };

        let Some(file) = tree.find_file(&record.location) else {
            debug!(region = %record.id, location = %record.location, "region location not in tree");
            stats.regions_unresolved += 1;
            return;
        };

        for prop in &record.properties {
            match create_property(&prop.kind, &prop.name, &prop.value, prop.unit.as_deref()) {
                Ok(property) => {
                    self.index.insert(property.kind(), property.name());
                    region.set_property(property);
                    stats.properties_loaded += 1;
                }
                Err(e) => {
                    warn!(region = %record.id, "Dropped property: {}", e);
                    stats.properties_dropped += 1;
                }
            }
        }

        match tree.insert_region(file, region) {
            Ok(Some(_)) => {
                stats.regions_loaded += 1;
                stats.regions_replaced += 1;
            }
            Ok(None) => stats.regions_loaded += 1,
            Err(e) => {
                warn!(region = %record.id, "Rejected region: {}", e);
                stats.regions_rejected += 1;
            }
        }
    }

    /// Retain edge records whose source file exists in the tree
    pub fn load_edges<I>(&mut self, tree: &StructureTree, records: I) -> LoadStats
    where
        I: IntoIterator<Item = Value>,
    {
        let mut stats = LoadStats::default();

        for raw in records {
            let edge: EdgeRecord = match serde_json::from_value(raw) {
                Ok(edge) => edge,
                Err(e) => {
                    warn!("Rejected edge record: {}", e);
                    stats.edges_rejected += 1;
                    continue;
                }
            };
            if tree.find_file(&edge.from.file).is_none() {
                debug!(file = %edge.from.file, "edge source not in tree");
                stats.edges_unresolved += 1;
                continue;
            }
            self.edges.push(edge);
            stats.edges_loaded += 1;
        }

        self.stats += stats;
        stats
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn property_index(&self) -> &PropertyIndex {
        &self.index
    }

    /// Totals over every load since the last [`RegionLoader::clear`]
    pub fn stats(&self) -> LoadStats {
        self.stats
    }

    /// Forget edges, index and counters (regions live in the tree)
    pub fn clear(&mut self) {
        self.edges.clear();
        self.index.clear();
        self.stats = LoadStats::default();
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Data files found in a directory, each list sorted by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataFiles {
    pub regions: Vec<PathBuf>,
    pub edges: Vec<PathBuf>,
    pub mappings: Vec<PathBuf>,
}

impl DataFiles {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.edges.is_empty() && self.mappings.is_empty()
    }
}

fn file_matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| MappingError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// Find data files directly inside `dir` (not recursive)
pub fn discover_data_files(dir: &Path) -> Result<DataFiles> {
    if !dir.is_dir() {
        return Err(MappingError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let regions = file_matcher(REGION_FILE_PATTERN)?;
    let edges = file_matcher(EDGE_FILE_PATTERN)?;
    let mappings = file_matcher(MAPPING_FILE_PATTERN)?;

    let mut found = DataFiles::default();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if regions.is_match(&*name) {
            found.regions.push(entry.path());
        } else if edges.is_match(&*name) {
            found.edges.push(entry.path());
        } else if mappings.is_match(&*name) {
            found.mappings.push(entry.path());
        }
    }

    found.regions.sort();
    found.edges.sort();
    found.mappings.sort();
    debug!(
        dir = %dir.display(),
        regions = found.regions.len(),
        edges = found.edges.len(),
        mappings = found.mappings.len(),
        "data files discovered"
    );
    Ok(found)
}
