//! Mapping entry registry
//!
//! Binds a property key to the method that renders it. At most one entry
//! exists per `(property type, property name)`; a second `upsert` for the same
//! key replaces the first in place, keeping its index position.
//!
//! Mapping files look like:
//!
//! ```json
//! {
//!   "methods": [
//!     { "name": "hot", "base": "Color_Scale", "from": "0,1,0", "to": "1,0,0" }
//!   ],
//!   "mappings": [
//!     { "propertyType": "NFP", "propertyName": "complexity", "methodName": "hot" },
//!     { "propertyType": "NFP", "propertyName": "loc", "methodName": "Size_Scale",
//!       "active": false, "config": { "from": 1, "to": 4 } }
//!   ]
//! }
//! ```

use codescape_ir::{PropertyKey, PropertyType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::core::error::{MappingError, Result, ResultExt};
use crate::core::methods::MappingMethod;

/// Config key overriding the resolved range minimum
pub const MIN_VALUE_KEY: &str = "minValue";
/// Config key overriding the resolved range maximum
pub const MAX_VALUE_KEY: &str = "maxValue";

// ============================================================================
// Mapping Entry
// ============================================================================

fn default_active() -> bool {
    true
}

/// Binding of one property key to a mapping method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub property_type: PropertyType,
    pub property_name: String,
    /// Named method from the library, or a built-in base name
    pub method_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Method parameters plus engine options (`minValue`, `maxValue`, `range`)
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl MappingEntry {
    pub fn new(property_type: PropertyType, property_name: impl AsRef<str>, method_name: impl Into<String>) -> Self {
        Self {
            property_type,
            property_name: property_name.as_ref().trim().to_lowercase(),
            method_name: method_name.into(),
            active: true,
            config: Map::new(),
        }
    }

    /// Set one config value
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.property_type, &self.property_name)
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }

    /// Numeric config value; numeric strings are accepted
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        let value = match self.config_value(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config_value(key).and_then(Value::as_str)
    }

    /// Built-in default used for properties without an explicit entry
    pub fn default_for(key: &PropertyKey) -> Self {
        match key.kind {
            PropertyType::Nfp => MappingEntry::new(key.kind, &key.name, "Color_Scale")
                .with_config("from", json!("0.2,1,0,0.1"))
                .with_config("to", json!("1,0.2,0.2,0.8")),
            PropertyType::Feature => MappingEntry::new(key.kind, &key.name, "Color_Fixed")
                .with_config("color", json!("0.6933,0.9471,1,1")),
        }
    }
}

// ============================================================================
// Method Library
// ============================================================================

/// Named method definition from a mapping file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDefinition {
    pub name: String,
    /// Built-in base name
    pub base: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Named methods, keyed by lower-case name
#[derive(Debug, Clone, Default)]
pub struct MethodLibrary {
    definitions: HashMap<String, MethodDefinition>,
}

impl MethodLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a definition
    pub fn insert(&mut self, definition: MethodDefinition) -> Option<MethodDefinition> {
        self.definitions.insert(definition.name.trim().to_lowercase(), definition)
    }

    pub fn get(&self, name: &str) -> Option<&MethodDefinition> {
        self.definitions.get(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Build the method for an entry.
    ///
    /// A named definition wins over a built-in base name of the same spelling;
    /// base names are configured from the entry's own `config`.
    pub fn resolve(&self, entry: &MappingEntry) -> Result<MappingMethod> {
        match self.get(&entry.method_name) {
            Some(definition) => MappingMethod::from_config(&definition.base, &Value::Object(definition.params.clone()))
                .context(format!("method '{}'", definition.name)),
            None => MappingMethod::from_config(&entry.method_name, &Value::Object(entry.config.clone())),
        }
    }
}

// ============================================================================
// Mapping Config File
// ============================================================================

/// Contents of a mapping file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    #[serde(default)]
    pub methods: Vec<MethodDefinition>,
    #[serde(default)]
    pub mappings: Vec<MappingEntry>,
}

impl MappingConfig {
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
// Registry
// ============================================================================

/// Mapping entries in insertion order, unique per key
#[derive(Debug, Clone, Default)]
pub struct MappingEntryRegistry {
    entries: Vec<MappingEntry>,
    index: HashMap<PropertyKey, usize>,
    library: MethodLibrary,
}

impl MappingEntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing any entry with the same key.
    ///
    /// Returns the replaced entry.
    pub fn upsert(&mut self, mut entry: MappingEntry) -> Option<MappingEntry> {
        entry.property_name = entry.property_name.trim().to_lowercase();
        let key = entry.key();
        match self.index.get(&key) {
            Some(&pos) => {
                debug!(%key, method = %entry.method_name, "replacing mapping entry");
                Some(std::mem::replace(&mut self.entries[pos], entry))
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, property_type: PropertyType, property_name: &str) -> Option<&MappingEntry> {
        self.get_key(&PropertyKey::new(property_type, property_name))
    }

    pub fn get_key(&self, key: &PropertyKey) -> Option<&MappingEntry> {
        self.index.get(key).map(|&pos| &self.entries[pos])
    }

    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut MappingEntry> {
        let pos = *self.index.get(key)?;
        self.entries.get_mut(pos)
    }

    /// Toggle an entry
    pub fn set_active(&mut self, key: &PropertyKey, active: bool) -> Result<()> {
        let entry = self
            .get_mut(key)
            .ok_or_else(|| MappingError::EntryNotFound { key: key.clone() })?;
        entry.active = active;
        Ok(())
    }

    pub fn remove(&mut self, key: &PropertyKey) -> Option<MappingEntry> {
        let pos = self.index.remove(key)?;
        let removed = self.entries.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn active_entries(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.iter().filter(|e| e.active)
    }

    /// Explicit entry for `key`, or the built-in default for its type
    pub fn effective_entry(&self, key: &PropertyKey) -> MappingEntry {
        self.get_key(key)
            .cloned()
            .unwrap_or_else(|| MappingEntry::default_for(key))
    }

    pub fn library(&self) -> &MethodLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut MethodLibrary {
        &mut self.library
    }

    /// Build the method of an entry through the library
    pub fn method_for(&self, entry: &MappingEntry) -> Result<MappingMethod> {
        self.library.resolve(entry)
    }

    /// Merge a mapping file: named methods first, then entries (last key wins)
    pub fn load_config(&mut self, config: MappingConfig) {
        let methods = config.methods.len();
        let mappings = config.mappings.len();
        for definition in config.methods {
            self.library.insert(definition);
        }
        for entry in config.mappings {
            self.upsert(entry);
        }
        info!(methods, mappings, total = self.len(), "mapping config loaded");
    }

    /// Drop all entries and named methods
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.library = MethodLibrary::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::methods::Rgba;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut registry = MappingEntryRegistry::new();
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "complexity", "Color_Scale"));
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "loc", "Size_Scale"));
        let old = registry.upsert(MappingEntry::new(PropertyType::Nfp, "Complexity", "Color_Fixed"));

        assert_eq!(old.unwrap().method_name, "Color_Scale");
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get(PropertyType::Nfp, "complexity").unwrap().method_name,
            "Color_Fixed"
        );
        let order: Vec<&str> = registry.iter().map(|e| e.property_name.as_str()).collect();
        assert_eq!(order, vec!["complexity", "loc"]);
    }

    #[test]
    fn test_same_name_different_type_are_distinct() {
        let mut registry = MappingEntryRegistry::new();
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "logging", "Color_Scale"));
        registry.upsert(MappingEntry::new(PropertyType::Feature, "logging", "Color_Fixed"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_set_active() {
        let mut registry = MappingEntryRegistry::new();
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "complexity", "Color_Scale"));
        registry.set_active(&PropertyKey::nfp("complexity"), false).unwrap();
        assert_eq!(registry.active_entries().count(), 0);

        let err = registry.set_active(&PropertyKey::nfp("missing"), true).unwrap_err();
        assert!(matches!(err, MappingError::EntryNotFound { .. }));
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut registry = MappingEntryRegistry::new();
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "a", "Color"));
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "b", "Color"));
        registry.upsert(MappingEntry::new(PropertyType::Nfp, "c", "Color"));
        assert!(registry.remove(&PropertyKey::nfp("a")).is_some());
        assert_eq!(registry.get(PropertyType::Nfp, "c").unwrap().property_name, "c");
        assert!(registry.remove(&PropertyKey::nfp("a")).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_effective_entry_defaults() {
        let registry = MappingEntryRegistry::new();
        let nfp = registry.effective_entry(&PropertyKey::nfp("complexity"));
        assert_eq!(nfp.method_name, "Color_Scale");
        let method = registry.method_for(&nfp).unwrap();
        assert_eq!(
            method,
            MappingMethod::color_steps(
                Rgba::new(0.2, 1.0, 0.0, 0.1),
                Rgba::new(1.0, 0.2, 0.2, 0.8),
                0
            )
        );

        let feature = registry.effective_entry(&PropertyKey::feature("logging"));
        assert!(!registry.method_for(&feature).unwrap().is_scaled());
    }

    #[test]
    fn test_load_config_with_named_methods() {
        let config = MappingConfig::from_json(
            r#"{
                "methods": [{"name": "Hot", "base": "Color_Scale", "from": "0,1,0,1", "to": "1,0,0,1"}],
                "mappings": [
                    {"propertyType": "NFP", "propertyName": "Complexity", "methodName": "hot"},
                    {"propertyType": "nfp", "propertyName": "loc", "methodName": "Size_Scale",
                     "active": false, "config": {"from": 1, "to": 4, "minValue": "0"}}
                ]
            }"#,
        )
        .unwrap();

        let mut registry = MappingEntryRegistry::new();
        registry.load_config(config);
        assert_eq!(registry.library().len(), 1);

        let hot = registry.get(PropertyType::Nfp, "complexity").unwrap();
        assert!(hot.active);
        assert_eq!(
            registry.method_for(hot).unwrap(),
            MappingMethod::color_scale(Rgba::GREEN, Rgba::RED)
        );

        let loc = registry.get(PropertyType::Nfp, "loc").unwrap();
        assert!(!loc.active);
        assert_eq!(loc.config_f64(MIN_VALUE_KEY), Some(0.0));
        assert_eq!(registry.method_for(loc).unwrap(), MappingMethod::size_scale(1.0, 4.0));
    }

    #[test]
    fn test_unknown_method_name() {
        let registry = MappingEntryRegistry::new();
        let entry = MappingEntry::new(PropertyType::Nfp, "x", "sparkle");
        assert!(matches!(
            registry.method_for(&entry),
            Err(MappingError::UnknownMethod { .. })
        ));
    }
}
