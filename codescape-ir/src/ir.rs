//! Structure tree IR
//!
//! The project hierarchy is held in an arena: every [`Node`] lives in one
//! `Vec` owned by [`StructureTree`] and is addressed by a [`NodeId`]. Children
//! are kept in discovery order. File nodes own a [`CodeFile`], which owns the
//! file's [`Region`]s; regions own their properties.
//!
//! Regions are additionally indexed by id so a host can address them without
//! knowing which file they live in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{IrError, Result};
use crate::property::{Property, PropertyKey};

// ============================================================================
// Nodes
// ============================================================================

/// Index of a node inside its [`StructureTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of a structure node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// A folder or file of the scanned project
#[derive(Debug, Clone)]
pub struct Node {
    /// Path relative to the project root (`/`-separated, extension stripped for files)
    pub relative_path: String,
    /// Path on disk, untouched
    pub absolute_path: PathBuf,
    /// Display name
    pub name: String,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    code_file: Option<CodeFile>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in discovery order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    /// Code file of a file node (always present for files, never for folders)
    pub fn code_file(&self) -> Option<&CodeFile> {
        self.code_file.as_ref()
    }
}

// ============================================================================
// Regions
// ============================================================================

/// A contiguous span of a source file carrying properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    id: String,
    location: String,
    start: u32,
    end: u32,
    properties: BTreeMap<PropertyKey, Property>,
}

impl Region {
    /// Create a region. Zero-length spans are fine; `start > end` is not.
    pub fn new(id: impl Into<String>, location: impl Into<String>, start: u32, end: u32) -> Result<Self> {
        let id = id.into();
        if start > end {
            return Err(IrError::InvalidSpan { region: id, start, end });
        }
        Ok(Self {
            id,
            location: location.into(),
            start,
            end,
            properties: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// File location as given by the data source
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    /// Span length (`end - start`)
    pub fn span_len(&self) -> u32 {
        self.end - self.start
    }

    /// Attach a property, replacing any previous one with the same key.
    ///
    /// Returns the replaced property.
    pub fn set_property(&mut self, property: Property) -> Option<Property> {
        self.properties.insert(property.key(), property)
    }

    pub fn property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    pub fn remove_property(&mut self, key: &PropertyKey) -> Option<Property> {
        self.properties.remove(key)
    }

    /// Properties ordered by key
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }
}

/// Regions of one source file, in load order
#[derive(Debug, Clone, Default)]
pub struct CodeFile {
    regions: Vec<Region>,
}

impl CodeFile {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// ============================================================================
// Structure Tree
// ============================================================================

/// Normalise a location for file lookup: `/` separators, no leading `./` or
/// `/`, lower case.
pub fn normalize_location(location: &str) -> String {
    let mut normalized = location.trim().replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized.trim_start_matches('/').to_lowercase()
}

/// Strip the first matching suffix (ASCII case-insensitive) from `name`.
///
/// The name must keep at least one byte.
pub fn strip_extension<'a>(name: &'a str, extensions: &[String]) -> &'a str {
    for ext in extensions {
        if ext.is_empty() || ext.len() >= name.len() {
            continue;
        }
        let cut = name.len() - ext.len();
        if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(ext) {
            return &name[..cut];
        }
    }
    name
}

/// Arena-backed project hierarchy
#[derive(Debug, Clone)]
pub struct StructureTree {
    nodes: Vec<Node>,
    file_index: HashMap<String, NodeId>,
    region_index: HashMap<String, NodeId>,
    stripped_extensions: Vec<String>,
}

impl StructureTree {
    /// Create a tree holding only the root folder
    pub fn new(root_name: impl Into<String>, absolute_path: impl AsRef<Path>) -> Self {
        let root = Node {
            relative_path: String::new(),
            absolute_path: absolute_path.as_ref().to_path_buf(),
            name: root_name.into(),
            kind: NodeKind::Folder,
            parent: None,
            children: Vec::new(),
            code_file: None,
        };
        Self {
            nodes: vec![root],
            file_index: HashMap::new(),
            region_index: HashMap::new(),
            stripped_extensions: Vec::new(),
        }
    }

    /// Extensions that were stripped from file names during the build.
    ///
    /// Used by [`StructureTree::find_file`] to match locations that still
    /// carry the extension.
    pub fn set_stripped_extensions(&mut self, extensions: Vec<String>) {
        self.stripped_extensions = extensions;
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_or_err(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| IrError::UnknownNode(format!("#{}", id.0)))
    }

    /// Total number of nodes (root included)
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn file_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_file()).count()
    }

    /// Folder count, root excluded
    pub fn folder_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_folder()).count() - 1
    }

    /// Attach a folder below `parent`
    pub fn add_folder(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        relative_path: impl Into<String>,
        absolute_path: impl AsRef<Path>,
    ) -> Result<NodeId> {
        self.attach(parent, name.into(), relative_path.into(), absolute_path.as_ref(), NodeKind::Folder)
    }

    /// Attach a file (with an empty code file) below `parent`
    pub fn add_file(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        relative_path: impl Into<String>,
        absolute_path: impl AsRef<Path>,
    ) -> Result<NodeId> {
        let relative_path = relative_path.into();
        let key = normalize_location(&relative_path);
        let id = self.attach(parent, name.into(), relative_path, absolute_path.as_ref(), NodeKind::File)?;
        self.file_index.entry(key).or_insert(id);
        Ok(id)
    }

    fn attach(
        &mut self,
        parent: NodeId,
        name: String,
        relative_path: String,
        absolute_path: &Path,
        kind: NodeKind,
    ) -> Result<NodeId> {
        let parent_node = self.node_or_err(parent)?;
        if !parent_node.is_folder() {
            return Err(IrError::NotAFolder {
                path: parent_node.relative_path.clone(),
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            relative_path,
            absolute_path: absolute_path.to_path_buf(),
            name,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            code_file: (kind == NodeKind::File).then(CodeFile::default),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// `id` and all nodes below it, pre-order, children in discovery order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(id).is_none() {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    /// File nodes in the subtree of `id` (`id` itself if it is a file)
    pub fn files_under(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.nodes[n.0].is_file())
            .collect()
    }

    /// Every region in the subtree of `id`, paired with its file node
    pub fn regions_under(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &Region)> + '_ {
        self.files_under(id).into_iter().flat_map(move |file| {
            self.nodes[file.0]
                .code_file
                .iter()
                .flat_map(|cf| cf.regions.iter())
                .map(move |region| (file, region))
        })
    }

    pub fn code_file(&self, id: NodeId) -> Option<&CodeFile> {
        self.node(id).and_then(|n| n.code_file.as_ref())
    }

    /// Find a file node by location (see [`normalize_location`]); retried with
    /// the build's stripped extensions removed.
    pub fn find_file(&self, location: &str) -> Option<NodeId> {
        let key = normalize_location(location);
        if let Some(id) = self.file_index.get(&key) {
            return Some(*id);
        }
        let stripped = strip_extension(&key, &self.stripped_extensions);
        if stripped.len() != key.len() {
            return self.file_index.get(stripped).copied();
        }
        None
    }

    /// Find any node by its relative path (`""` is the root)
    pub fn find_path(&self, relative_path: &str) -> Option<NodeId> {
        let key = normalize_location(relative_path);
        if key.is_empty() {
            return Some(self.root());
        }
        self.nodes
            .iter()
            .position(|n| normalize_location(&n.relative_path) == key)
            .map(NodeId)
            .or_else(|| self.find_file(relative_path))
    }

    // ------------------------------------------------------------------------
    // Region management
    // ------------------------------------------------------------------------

    /// Insert a region into a file's code file.
    ///
    /// A region with the same id is replaced wherever it lived; the replaced
    /// region is returned.
    pub fn insert_region(&mut self, file: NodeId, region: Region) -> Result<Option<Region>> {
        let node = self.node_or_err(file)?;
        if !node.is_file() {
            return Err(IrError::UnknownNode(format!(
                "'{}' is not a file",
                node.relative_path
            )));
        }

        let previous = self.remove_region(region.id());
        self.region_index.insert(region.id.clone(), file);
        if let Some(cf) = self.nodes[file.0].code_file.as_mut() {
            cf.regions.push(region);
        }
        Ok(previous)
    }

    /// Remove a region by id
    pub fn remove_region(&mut self, region_id: &str) -> Option<Region> {
        let file = self.region_index.remove(region_id)?;
        let cf = self.nodes[file.0].code_file.as_mut()?;
        let pos = cf.regions.iter().position(|r| r.id == region_id)?;
        Some(cf.regions.remove(pos))
    }

    pub fn region(&self, region_id: &str) -> Option<&Region> {
        let file = self.region_index.get(region_id)?;
        self.nodes[file.0]
            .code_file
            .as_ref()?
            .regions
            .iter()
            .find(|r| r.id == region_id)
    }

    /// Mutable access to a region, e.g. to replace one of its properties
    pub fn region_mut(&mut self, region_id: &str) -> Option<&mut Region> {
        let file = *self.region_index.get(region_id)?;
        self.nodes[file.0]
            .code_file
            .as_mut()?
            .regions
            .iter_mut()
            .find(|r| r.id == region_id)
    }

    /// File node holding a region
    pub fn region_file(&self, region_id: &str) -> Option<NodeId> {
        self.region_index.get(region_id).copied()
    }

    pub fn region_count(&self) -> usize {
        self.region_index.len()
    }

    /// Drop all regions, keeping the structure
    pub fn clear_regions(&mut self) {
        for node in &mut self.nodes {
            if let Some(cf) = node.code_file.as_mut() {
                cf.regions.clear();
            }
        }
        self.region_index.clear();
    }

    /// Deepest node that is an ancestor-or-self of every id in `ids`
    pub fn lowest_common_ancestor(&self, ids: &[NodeId]) -> Option<NodeId> {
        let (first, rest) = ids.split_first()?;
        let mut chain = self.ancestry(*first)?;
        for id in rest {
            let other = self.ancestry(*id)?;
            let shared = chain
                .iter()
                .zip(other.iter())
                .take_while(|(a, b)| a == b)
                .count();
            chain.truncate(shared);
        }
        chain.last().copied()
    }

    /// Path from the root down to `id`
    fn ancestry(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.node(id)?;
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Some(chain)
    }
}
