//! codescape-ir: structure and region model
//!
//! This crate holds the in-memory model that the mapping engine works on:
//!
//! - [`StructureTree`]: arena of folder/file [`Node`]s built once per project load
//! - [`CodeFile`] / [`Region`]: line spans of a file with their properties
//! - [`Property`] / [`PropertyKey`]: typed, named values (NFP metrics, features)
//!
//! It performs no I/O; scanning and loading live in the `codescape` crate.
//!
//! # Example
//!
//! ```rust
//! use codescape_ir::{Property, PropertyKey, Region, StructureTree};
//!
//! let mut tree = StructureTree::new("demo", "/tmp/demo");
//! let file = tree.add_file(tree.root(), "main", "main", "/tmp/demo/main.rs").unwrap();
//!
//! let mut region = Region::new("r1", "main", 1, 10).unwrap();
//! region.set_property(Property::nfp("complexity", 4.0));
//! tree.insert_region(file, region).unwrap();
//!
//! let key = PropertyKey::nfp("complexity");
//! assert_eq!(tree.region("r1").unwrap().property(&key).unwrap().numeric_value(), 4.0);
//! ```

pub mod error;
pub mod ir;
pub mod property;

pub use error::{IrError, Result};
pub use ir::{normalize_location, strip_extension, CodeFile, Node, NodeId, NodeKind, Region, StructureTree};
pub use property::{create_property, is_unset_value, Property, PropertyKey, PropertyType, UNSET_VALUE};
