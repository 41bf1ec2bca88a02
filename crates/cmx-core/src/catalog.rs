//! # Compiled Catalogs
//!
//! A [`CompiledCatalog`] is the resolved graph of resources a compiler
//! produces for one (module, parameters, facts) invocation. Nodes are
//! [`Resource`]s identified by [`ResourceRef`] (`Type[title]`); edges are
//! containment and dependency relations between them.
//!
//! ## Naming Rules
//!
//! Catalog compilers capitalize every `::` segment of a type name, and do
//! the same for the titles of `Class` resources. `ResourceRef` applies the
//! same normalization on construction, so lookups written as
//! `Class[tensor]` find `Class[Tensor]`.
//!
//! ## Wire Shape
//!
//! ```json
//! {
//!   "name": "centos-7",
//!   "version": 1700000000,
//!   "resources": [{"type": "Class", "title": "Tensor", "parameters": {}}],
//!   "edges": [{"source": "Class[Tensor]", "target": "Package[tensor]"}]
//! }
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Capitalize every `::` segment the way catalog compilers name types:
/// first character upper-cased, the rest lower-cased.
pub fn normalize_type_name(name: &str) -> String {
    name.trim_start_matches("::")
        .split("::")
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// A resource reference could not be parsed from `Type[title]` form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid resource reference '{0}': expected Type[title]")]
pub struct ResourceRefParseError(pub String);

/// Identity of a resource within a catalog: `(type, title)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceRef {
    type_name: String,
    title: String,
}

impl ResourceRef {
    /// Create a normalized reference.
    pub fn new(type_name: &str, title: &str) -> Self {
        let type_name = normalize_type_name(type_name);
        let title = if type_name == "Class" {
            normalize_type_name(title)
        } else {
            title.to_string()
        };
        Self { type_name, title }
    }

    /// Reference to the class resource declared for a module.
    pub fn class(name: &str) -> Self {
        Self::new("Class", name)
    }

    /// Normalized type name, e.g. `Class` or `Apt::Source`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Resource title (normalized for classes).
    pub fn title(&self) -> &str {
        &self.title
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.type_name, self.title)
    }
}

impl FromStr for ResourceRef {
    type Err = ResourceRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ResourceRefParseError(s.to_string());
        let open = s.find('[').ok_or_else(err)?;
        let inner = s[open + 1..].strip_suffix(']').ok_or_else(err)?;
        let type_name = &s[..open];
        if type_name.is_empty() || inner.is_empty() {
            return Err(err());
        }
        Ok(Self::new(type_name, inner))
    }
}

impl TryFrom<String> for ResourceRef {
    type Error = ResourceRefParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceRef> for String {
    fn from(r: ResourceRef) -> Self {
        r.to_string()
    }
}

/// A typed, titled unit of desired state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type as emitted by the compiler.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Resource title.
    pub title: String,
    /// Resolved parameter values.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Resource {
    /// Create a resource without parameters.
    pub fn new(type_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            title: title.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter value.
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Normalized reference to this resource.
    pub fn reference(&self) -> ResourceRef {
        ResourceRef::new(&self.type_name, &self.title)
    }
}

/// A directed relation between two resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Containing or depended-upon resource.
    pub source: ResourceRef,
    /// Contained or dependent resource.
    pub target: ResourceRef,
}

/// The resolved resource graph for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledCatalog {
    /// Catalog name (typically the node or platform name).
    #[serde(default)]
    pub name: String,
    /// Compiler-provided catalog version, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// Resource nodes.
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Relations between resources.
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl CompiledCatalog {
    /// Create a catalog from its parts.
    pub fn new(name: impl Into<String>, resources: Vec<Resource>, edges: Vec<Edge>) -> Self {
        Self {
            name: name.into(),
            version: None,
            resources,
            edges,
        }
    }

    /// Parse a catalog from compiler JSON output.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Find a resource by reference.
    pub fn resource(&self, reference: &ResourceRef) -> Option<&Resource> {
        self.resources.iter().find(|r| &r.reference() == reference)
    }

    /// Whether a resource is present.
    pub fn contains(&self, reference: &ResourceRef) -> bool {
        self.resource(reference).is_some()
    }

    /// All resources of a type (type name is normalized before matching).
    pub fn resources_of_type<'a>(&'a self, type_name: &str) -> impl Iterator<Item = &'a Resource> {
        let wanted = normalize_type_name(type_name);
        self.resources
            .iter()
            .filter(move |r| normalize_type_name(&r.type_name) == wanted)
    }

    /// Titles of all declared classes, normalized.
    pub fn classes(&self) -> Vec<String> {
        self.resources_of_type("Class")
            .map(|r| r.reference().title)
            .collect()
    }

    /// Whether an edge `source -> target` exists.
    pub fn has_edge(&self, source: &ResourceRef, target: &ResourceRef) -> bool {
        self.edges
            .iter()
            .any(|e| &e.source == source && &e.target == target)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the catalog has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tensor_catalog() -> CompiledCatalog {
        CompiledCatalog::from_json_slice(
            json!({
                "name": "centos-7",
                "version": 1_700_000_000,
                "resources": [
                    {"type": "Class", "title": "Tensor", "parameters": {}},
                    {"type": "Class", "title": "Tensor::Config"},
                    {"type": "Package", "title": "tensor", "parameters": {"ensure": "installed"}},
                    {"type": "File", "title": "/etc/tensor/tensor.yml"},
                    {"type": "Service", "title": "tensor", "parameters": {"ensure": "running"}}
                ],
                "edges": [
                    {"source": "Class[Tensor]", "target": "Package[tensor]"},
                    {"source": "Class[Tensor]", "target": "Service[tensor]"}
                ]
            })
            .to_string()
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn normalizes_type_names_per_segment() {
        assert_eq!(normalize_type_name("file"), "File");
        assert_eq!(normalize_type_name("apt::source"), "Apt::Source");
        assert_eq!(normalize_type_name("CLASS"), "Class");
        assert_eq!(normalize_type_name("::tensor"), "Tensor");
    }

    #[test]
    fn class_titles_are_normalized_other_titles_are_not() {
        assert_eq!(ResourceRef::class("tensor").to_string(), "Class[Tensor]");
        assert_eq!(
            ResourceRef::new("file", "/etc/Tensor.yml").to_string(),
            "File[/etc/Tensor.yml]"
        );
    }

    #[test]
    fn parses_reference_strings() {
        let r: ResourceRef = "package[tensor]".parse().unwrap();
        assert_eq!(r.type_name(), "Package");
        assert_eq!(r.title(), "tensor");

        let nested: ResourceRef = "File[/etc/a[1]]".parse().unwrap();
        assert_eq!(nested.title(), "/etc/a[1]");

        for bad in ["Package", "[tensor]", "Package[]", "Package[tensor"] {
            assert!(bad.parse::<ResourceRef>().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn lookups_use_normalized_references() {
        let catalog = tensor_catalog();
        assert!(catalog.contains(&ResourceRef::class("tensor")));
        assert!(catalog.contains(&ResourceRef::class("tensor::config")));
        assert!(!catalog.contains(&ResourceRef::class("riemann")));
        assert!(catalog.contains(&ResourceRef::new("service", "tensor")));
        assert_eq!(catalog.resources_of_type("package").count(), 1);
        assert_eq!(catalog.classes(), vec!["Tensor", "Tensor::Config"]);
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn edges_decode_from_reference_strings() {
        let catalog = tensor_catalog();
        assert!(catalog.has_edge(
            &ResourceRef::class("tensor"),
            &ResourceRef::new("Package", "tensor")
        ));
        assert!(!catalog.has_edge(
            &ResourceRef::new("Package", "tensor"),
            &ResourceRef::class("tensor")
        ));
    }

    #[test]
    fn minimal_catalog_decodes() {
        let catalog = CompiledCatalog::from_json_slice(b"{}").unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.name.is_empty());
    }

    #[test]
    fn rejects_non_catalog_output() {
        assert!(CompiledCatalog::from_json_slice(b"not json").is_err());
        assert!(CompiledCatalog::from_json_slice(br#"{"resources": 3}"#).is_err());
    }
}
