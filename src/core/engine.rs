//! Application Engine - drives mapping entries onto the renderer
//!
//! For every active entry the engine builds the entry's method, resolves the
//! normalisation range, walks the regions of the apply scope that carry the
//! entry's property and hands one [`VisualUpdate`] per region to a
//! [`RenderSink`]. Per-entry failures are recorded in the [`ApplyReport`];
//! a pass never aborts halfway.

use codescape_ir::{NodeId, PropertyKey, StructureTree};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::AddAssign;
use tracing::{debug, info, warn};

use crate::core::error::{MappingError, Result};
use crate::core::methods::{TargetHandle, VisualUpdate, VisualValue};
use crate::core::range::{RangeResolver, RangeResult};
use crate::core::registry::{MappingEntry, MethodLibrary, MAX_VALUE_KEY, MIN_VALUE_KEY};

#[cfg(test)]
use mockall::automock;

/// Config key selecting the range mode of an entry
pub const RANGE_MODE_KEY: &str = "range";

// ============================================================================
// Render Sink
// ============================================================================

/// Renderer-side collaborator receiving visual updates
#[cfg_attr(test, automock)]
pub trait RenderSink {
    /// Handle of the region's visual representation, if it has one
    fn target_for(&self, region_id: &str) -> Option<TargetHandle>;

    /// Receive the value computed for a region
    fn submit(&mut self, region_id: &str, update: VisualUpdate);
}

/// One recorded update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub region_id: String,
    pub target: TargetHandle,
    pub value: VisualValue,
}

/// Sink recording every update in submission order
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    /// `None` accepts every region
    targets: Option<HashMap<String, TargetHandle>>,
    assignments: Vec<Assignment>,
}

impl CollectingSink {
    /// Sink with a target for every region
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink with targets only for the listed regions
    pub fn with_targets<I, S>(region_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let targets = region_ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id.into(), TargetHandle(i as u64)))
            .collect();
        Self {
            targets: Some(targets),
            assignments: Vec::new(),
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn into_assignments(self) -> Vec<Assignment> {
        self.assignments
    }

    /// Latest value submitted for a region
    pub fn value_of(&self, region_id: &str) -> Option<VisualValue> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.region_id == region_id)
            .map(|a| a.value)
    }

    pub fn clear(&mut self) {
        self.assignments.clear();
    }
}

impl RenderSink for CollectingSink {
    fn target_for(&self, region_id: &str) -> Option<TargetHandle> {
        match &self.targets {
            Some(targets) => targets.get(region_id).copied(),
            None => {
                let mut hasher = DefaultHasher::new();
                region_id.hash(&mut hasher);
                Some(TargetHandle(hasher.finish()))
            }
        }
    }

    fn submit(&mut self, region_id: &str, update: VisualUpdate) {
        self.assignments.push(Assignment {
            region_id: region_id.to_string(),
            target: update.target,
            value: update.value,
        });
    }
}

// ============================================================================
// Report
// ============================================================================

/// Counters of one entry or a whole pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyCounts {
    /// Regions that received a value
    pub applied: usize,
    /// Entries whose range could not be resolved
    pub skipped_no_data: usize,
    /// Regions skipped for a negative value
    pub skipped_negative: usize,
    /// Inactive entries
    pub skipped_inactive: usize,
    /// Regions without a renderer target
    pub skipped_missing_target: usize,
    /// Entries naming an unknown method
    pub unknown_method: usize,
    /// Entries with unusable method parameters
    pub invalid_method: usize,
}

impl AddAssign for ApplyCounts {
    fn add_assign(&mut self, other: Self) {
        self.applied += other.applied;
        self.skipped_no_data += other.skipped_no_data;
        self.skipped_negative += other.skipped_negative;
        self.skipped_inactive += other.skipped_inactive;
        self.skipped_missing_target += other.skipped_missing_target;
        self.unknown_method += other.unknown_method;
        self.invalid_method += other.invalid_method;
    }
}

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOutcome {
    Applied,
    Inactive,
    NoData,
    UnknownMethod,
    InvalidMethod,
}

impl EntryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryOutcome::Applied => "applied",
            EntryOutcome::Inactive => "inactive",
            EntryOutcome::NoData => "no_data",
            EntryOutcome::UnknownMethod => "unknown_method",
            EntryOutcome::InvalidMethod => "invalid_method",
        }
    }
}

/// Result of applying one entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    pub key: PropertyKey,
    pub method: String,
    pub outcome: EntryOutcome,
    pub counts: ApplyCounts,
    /// Range used for normalisation (not set for fixed methods or per-file ranges)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EntryReport {
    fn new(entry: &MappingEntry, outcome: EntryOutcome) -> Self {
        Self {
            key: entry.key(),
            method: entry.method_name.clone(),
            outcome,
            counts: ApplyCounts::default(),
            range: None,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Result of one apply pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub entries: Vec<EntryReport>,
    pub totals: ApplyCounts,
}

impl ApplyReport {
    fn push(&mut self, report: EntryReport) {
        self.totals += report.counts;
        self.entries.push(report);
    }

    /// Report of the entry for `key`
    pub fn entry(&self, key: &PropertyKey) -> Option<&EntryReport> {
        self.entries.iter().find(|e| &e.key == key)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// How an entry's normalisation range is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeMode {
    /// Range over the apply scope
    #[default]
    Scope,
    /// Range over the whole tree
    Global,
    /// Each region against its own file
    File,
}

impl RangeMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "scope" => Some(RangeMode::Scope),
            "global" => Some(RangeMode::Global),
            "file" => Some(RangeMode::File),
            _ => None,
        }
    }
}

/// Applies mapping entries to the regions of one tree
pub struct ApplicationEngine<'a> {
    tree: &'a StructureTree,
    resolver: &'a RangeResolver,
    library: &'a MethodLibrary,
}

impl<'a> ApplicationEngine<'a> {
    pub fn new(tree: &'a StructureTree, resolver: &'a RangeResolver, library: &'a MethodLibrary) -> Self {
        Self {
            tree,
            resolver,
            library,
        }
    }

    /// Apply every entry, in order, to the subtree rooted at `scope`
    pub fn apply_all<'e, I, S>(&self, entries: I, scope: NodeId, sink: &mut S) -> ApplyReport
    where
        I: IntoIterator<Item = &'e MappingEntry>,
        S: RenderSink + ?Sized,
    {
        let mut report = ApplyReport::default();
        for entry in entries {
            report.push(self.apply_entry(entry, scope, sink));
        }

        let t = &report.totals;
        info!(
            entries = report.entries.len(),
            applied = t.applied,
            no_data = t.skipped_no_data,
            negative = t.skipped_negative,
            inactive = t.skipped_inactive,
            missing_target = t.skipped_missing_target,
            unknown_method = t.unknown_method,
            invalid_method = t.invalid_method,
            "apply pass finished"
        );
        report
    }

    /// Apply a single entry
    pub fn apply_entry<S>(&self, entry: &MappingEntry, scope: NodeId, sink: &mut S) -> EntryReport
    where
        S: RenderSink + ?Sized,
    {
        let key = entry.key();

        if !entry.active {
            debug!(%key, "entry inactive");
            let mut report = EntryReport::new(entry, EntryOutcome::Inactive);
            report.counts.skipped_inactive = 1;
            return report;
        }

        let method = match self.library.resolve(entry) {
            Ok(method) => method,
            Err(e) => return method_failure(entry, e),
        };

        let mode = match entry.config_str(RANGE_MODE_KEY) {
            None => RangeMode::Scope,
            Some(raw) => match RangeMode::parse(raw) {
                Some(mode) => mode,
                None => {
                    let err = MappingError::invalid_method(
                        &entry.method_name,
                        format!("unknown range mode '{}'", raw),
                    );
                    return method_failure(entry, err);
                }
            },
        };

        let range = if !method.is_scaled() || mode == RangeMode::File {
            None
        } else {
            let node = if mode == RangeMode::Global { self.tree.root() } else { scope };
            match self.entry_range(entry, &key, node) {
                Ok(range) => Some(range),
                Err(e) => {
                    let mut report = no_data(entry, e);
                    report.counts.skipped_negative = self.count_unset(&key, scope);
                    return report;
                }
            }
        };

        let mut report = EntryReport::new(entry, EntryOutcome::Applied);
        report.range = range;
        let mut usable = 0;

        for (file, region) in self.tree.regions_under(scope) {
            let Some(property) = region.property(&key) else {
                continue;
            };
            if property.is_unset() {
                report.counts.skipped_negative += 1;
                continue;
            }
            usable += 1;

            let value = property.numeric_value();
            let percentage = if !method.is_scaled() {
                0.0
            } else if let Some(range) = range {
                range.percentage(value)
            } else {
                match self.entry_range(entry, &key, file) {
                    Ok(file_range) => file_range.percentage(value),
                    Err(e) => {
                        warn!(%key, region = region.id(), "{}", e);
                        continue;
                    }
                }
            };

            let Some(target) = sink.target_for(region.id()) else {
                debug!(
                    "{}",
                    MappingError::MissingVisualTarget {
                        region: region.id().to_string()
                    }
                );
                report.counts.skipped_missing_target += 1;
                continue;
            };

            sink.submit(region.id(), method.apply(target, percentage));
            report.counts.applied += 1;
        }

        if usable == 0 {
            debug!(%key, "no region carries a usable value");
            report.outcome = EntryOutcome::NoData;
            report.counts.skipped_no_data = 1;
        }

        debug!(
            %key,
            method = %entry.method_name,
            applied = report.counts.applied,
            negative = report.counts.skipped_negative,
            "entry applied"
        );
        report
    }

    /// Regions below `scope` whose value for `key` is the unset sentinel
    fn count_unset(&self, key: &PropertyKey, scope: NodeId) -> usize {
        self.tree
            .regions_under(scope)
            .filter_map(|(_, region)| region.property(key))
            .filter(|p| p.is_unset())
            .count()
    }

    /// Resolved range of an entry below `node`, with `minValue`/`maxValue` overrides
    fn entry_range(&self, entry: &MappingEntry, key: &PropertyKey, node: NodeId) -> Result<RangeResult> {
        let min = entry.config_f64(MIN_VALUE_KEY);
        let max = entry.config_f64(MAX_VALUE_KEY);
        if let (Some(min), Some(max)) = (min, max) {
            return Ok(RangeResult::new(min, max));
        }
        Ok(self.resolver.resolve_node(self.tree, key, node)?.with_bounds(min, max))
    }
}

fn method_failure(entry: &MappingEntry, err: MappingError) -> EntryReport {
    warn!(key = %entry.key(), "{}", err);
    let unknown = matches!(err.root_cause(), MappingError::UnknownMethod { .. });
    let mut report = EntryReport::new(
        entry,
        if unknown {
            EntryOutcome::UnknownMethod
        } else {
            EntryOutcome::InvalidMethod
        },
    );
    if unknown {
        report.counts.unknown_method = 1;
    } else {
        report.counts.invalid_method = 1;
    }
    report.with_message(err.to_string())
}

fn no_data(entry: &MappingEntry, err: MappingError) -> EntryReport {
    debug!(key = %entry.key(), "{}", err);
    let mut report = EntryReport::new(entry, EntryOutcome::NoData);
    report.counts.skipped_no_data = 1;
    report.with_message(err.to_string())
}
