//! Project facade
//!
//! Owns everything belonging to one loaded project: the structure tree with
//! its regions, the range cache, the mapping registry and the load
//! bookkeeping. Region changes made through the facade clear the range cache.

use codescape_ir::{NodeId, Property, PropertyKey, StructureTree};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::config::StructureOptions;
use crate::core::engine::{ApplicationEngine, ApplyReport, RenderSink};
use crate::core::error::{MappingError, Result};
use crate::core::loader::{discover_data_files, DataFiles, EdgeRecord, LoadStats, PropertyIndex, RegionLoader};
use crate::core::range::{RangeResolver, RangeResult, Scope};
use crate::core::registry::{MappingConfig, MappingEntryRegistry};
use crate::core::scanner::{FsScanner, StructureScanner};

/// One loaded project
#[derive(Debug)]
pub struct Project {
    tree: StructureTree,
    resolver: RangeResolver,
    registry: MappingEntryRegistry,
    loader: RegionLoader,
}

impl Project {
    /// Scan `root` from the file system
    pub fn open(root: &Path, options: &StructureOptions) -> Result<Self> {
        Self::open_with(&FsScanner::new(), root, options)
    }

    /// Scan `root` with a custom scanner
    pub fn open_with(scanner: &dyn StructureScanner, root: &Path, options: &StructureOptions) -> Result<Self> {
        Ok(Self::from_tree(scanner.scan(root, options)?))
    }

    /// Wrap an already built tree
    pub fn from_tree(tree: StructureTree) -> Self {
        Self {
            tree,
            resolver: RangeResolver::new(),
            registry: MappingEntryRegistry::new(),
            loader: RegionLoader::new(),
        }
    }

    pub fn tree(&self) -> &StructureTree {
        &self.tree
    }

    pub fn registry(&self) -> &MappingEntryRegistry {
        &self.registry
    }

    /// Mapping entries survive region reloads
    pub fn registry_mut(&mut self) -> &mut MappingEntryRegistry {
        &mut self.registry
    }

    pub fn resolver(&self) -> &RangeResolver {
        &self.resolver
    }

    pub fn property_index(&self) -> &PropertyIndex {
        self.loader.property_index()
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        self.loader.edges()
    }

    pub fn load_stats(&self) -> LoadStats {
        self.loader.stats()
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load region/edge data files; the first unreadable file aborts.
    ///
    /// Files read before the failing one stay loaded, so the range cache is
    /// cleared on every exit path.
    pub fn load_region_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadStats> {
        let mut stats = LoadStats::default();
        let result: Result<()> = paths.iter().try_for_each(|path| {
            stats += self.loader.load_file(&mut self.tree, path.as_ref())?;
            Ok(())
        });
        self.resolver.invalidate();
        result.map(|()| stats)
    }

    /// Load region records already in memory
    pub fn load_records<I>(&mut self, records: I) -> LoadStats
    where
        I: IntoIterator<Item = Value>,
    {
        let stats = self.loader.load_records(&mut self.tree, records);
        self.resolver.invalidate();
        stats
    }

    /// Drop every region and edge, then load `paths`
    pub fn reload_region_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadStats> {
        self.tree.clear_regions();
        self.loader.clear();
        self.resolver.invalidate();
        self.load_region_files(paths)
    }

    /// Merge mapping files into the registry, in order
    pub fn load_mapping_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        for path in paths {
            let config = MappingConfig::from_file(path.as_ref())?;
            self.registry.load_config(config);
        }
        Ok(())
    }

    /// Discover and load every data and mapping file of `dir`
    pub fn load_data_dir(&mut self, dir: &Path) -> Result<DataFiles> {
        let files = discover_data_files(dir)?;
        let data: Vec<&PathBuf> = files.regions.iter().chain(files.edges.iter()).collect();
        let stats = self.load_region_files(data.as_slice())?;
        self.load_mapping_files(files.mappings.as_slice())?;
        info!(
            dir = %dir.display(),
            regions = stats.regions_loaded,
            mappings = self.registry.len(),
            "data directory loaded"
        );
        Ok(files)
    }

    /// Replace one property of a region
    pub fn set_property(&mut self, region_id: &str, property: Property) -> Result<Option<Property>> {
        let region = self
            .tree
            .region_mut(region_id)
            .ok_or_else(|| MappingError::UnknownRegion {
                id: region_id.to_string(),
            })?;
        let previous = region.set_property(property);
        self.resolver.invalidate();
        Ok(previous)
    }

    // ------------------------------------------------------------------------
    // Mapping
    // ------------------------------------------------------------------------

    pub fn resolve_range(&self, key: &PropertyKey, scope: &Scope) -> Result<RangeResult> {
        self.resolver.resolve(&self.tree, key, scope)
    }

    /// Node addressed by a root-relative path (`""` is the root)
    pub fn scope_node(&self, relative_path: &str) -> Result<NodeId> {
        self.tree
            .find_path(relative_path)
            .ok_or_else(|| MappingError::invalid_config(format!("no node at '{}'", relative_path)))
    }

    /// Apply the registry's entries to the subtree rooted at `scope`
    pub fn apply<S>(&self, scope: NodeId, sink: &mut S) -> ApplyReport
    where
        S: RenderSink + ?Sized,
    {
        ApplicationEngine::new(&self.tree, &self.resolver, self.registry.library())
            .apply_all(self.registry.iter(), scope, sink)
    }
}
