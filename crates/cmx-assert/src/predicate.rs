//! # Predicate Language
//!
//! Predicates are tagged by `kind` and compose with `all`, `any`, and
//! `not`:
//!
//! ```yaml
//! kind: all
//! predicates:
//!   - kind: contains_class
//!     class: tensor
//!   - kind: has_parameter
//!     type: Service
//!     title: tensor
//!     parameter: ensure
//!     value: running
//!   - kind: not
//!     predicate:
//!       kind: contains_resource
//!       type: Package
//!       title: riemann
//! ```
//!
//! Decoding never fails: anything that does not match the language becomes
//! [`Predicate::Malformed`], carrying the raw input and the reason.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use cmx_core::ResourceRef;

/// A boolean expression over a compiled catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// The catalog contains a resource with this type and title.
    ContainsResource {
        /// Resource type, e.g. `Package`.
        #[serde(rename = "type")]
        type_name: String,
        /// Resource title.
        title: String,
    },

    /// The catalog declares this class.
    ContainsClass {
        /// Class name, e.g. `tensor`.
        class: String,
    },

    /// A resource exists and one of its parameters equals `value`.
    HasParameter {
        /// Resource type.
        #[serde(rename = "type")]
        type_name: String,
        /// Resource title.
        title: String,
        /// Parameter name.
        parameter: String,
        /// Expected value (JSON equality).
        value: Value,
    },

    /// The number of resources of a type lies within bounds (inclusive).
    ResourceCount {
        /// Resource type.
        #[serde(rename = "type")]
        type_name: String,
        /// Lower bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
        /// Upper bound.
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<usize>,
    },

    /// An edge `source -> target` exists.
    HasEdge {
        /// Source resource.
        source: ResourceRef,
        /// Target resource.
        target: ResourceRef,
    },

    /// Every sub-predicate passes. Vacuously true when empty.
    All {
        /// Sub-predicates.
        predicates: Vec<Predicate>,
    },

    /// At least one sub-predicate passes. False when empty.
    Any {
        /// Sub-predicates.
        predicates: Vec<Predicate>,
    },

    /// The sub-predicate fails.
    Not {
        /// Negated predicate.
        predicate: Box<Predicate>,
    },

    /// Input that could not be decoded. Always evaluates to a failure.
    Malformed {
        /// The raw input, as JSON text.
        raw: String,
        /// Why it could not be decoded.
        reason: String,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceFields {
    #[serde(rename = "type")]
    type_name: String,
    title: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassFields {
    class: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterFields {
    #[serde(rename = "type")]
    type_name: String,
    title: String,
    parameter: String,
    value: Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CountFields {
    #[serde(rename = "type")]
    type_name: String,
    min: Option<usize>,
    max: Option<usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EdgeFields {
    source: String,
    target: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MalformedFields {
    raw: String,
    reason: String,
}

impl Predicate {
    /// `contains_class` predicate.
    pub fn contains_class(class: impl Into<String>) -> Self {
        Self::ContainsClass {
            class: class.into(),
        }
    }

    /// `contains_resource` predicate.
    pub fn contains_resource(type_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self::ContainsResource {
            type_name: type_name.into(),
            title: title.into(),
        }
    }

    /// Decode a predicate, mapping undecodable input to `Malformed`.
    pub fn from_value(value: &Value) -> Self {
        match Self::decode(value) {
            Ok(predicate) => predicate,
            Err(reason) => {
                tracing::debug!(%reason, "malformed predicate");
                Self::Malformed {
                    raw: value.to_string(),
                    reason,
                }
            }
        }
    }

    fn decode(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| "predicate must be a mapping".to_string())?;
        let kind = object
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| "predicate has no 'kind'".to_string())?;

        let mut rest = object.clone();
        rest.remove("kind");
        let rest = Value::Object(rest);

        match kind {
            "contains_resource" => {
                let f: ResourceFields = fields(kind, rest)?;
                Ok(Self::ContainsResource {
                    type_name: f.type_name,
                    title: f.title,
                })
            }
            "contains_class" => {
                let f: ClassFields = fields(kind, rest)?;
                Ok(Self::ContainsClass { class: f.class })
            }
            "has_parameter" => {
                let f: ParameterFields = fields(kind, rest)?;
                Ok(Self::HasParameter {
                    type_name: f.type_name,
                    title: f.title,
                    parameter: f.parameter,
                    value: f.value,
                })
            }
            "resource_count" => {
                let f: CountFields = fields(kind, rest)?;
                match (f.min, f.max) {
                    (None, None) => Err("resource_count needs 'min' or 'max'".to_string()),
                    (Some(min), Some(max)) if min > max => {
                        Err(format!("resource_count min {min} exceeds max {max}"))
                    }
                    (min, max) => Ok(Self::ResourceCount {
                        type_name: f.type_name,
                        min,
                        max,
                    }),
                }
            }
            "has_edge" => {
                let f: EdgeFields = fields(kind, rest)?;
                let source = f.source.parse::<ResourceRef>().map_err(|e| e.to_string())?;
                let target = f.target.parse::<ResourceRef>().map_err(|e| e.to_string())?;
                Ok(Self::HasEdge { source, target })
            }
            "all" | "any" => {
                let items = object
                    .get("predicates")
                    .and_then(Value::as_array)
                    .ok_or_else(|| format!("{kind} needs a 'predicates' list"))?;
                let predicates = items.iter().map(Self::from_value).collect();
                Ok(if kind == "all" {
                    Self::All { predicates }
                } else {
                    Self::Any { predicates }
                })
            }
            "not" => {
                let inner = object
                    .get("predicate")
                    .ok_or_else(|| "not needs a 'predicate'".to_string())?;
                Ok(Self::Not {
                    predicate: Box::new(Self::from_value(inner)),
                })
            }
            "malformed" => {
                let f: MalformedFields = fields(kind, rest)?;
                Ok(Self::Malformed {
                    raw: f.raw,
                    reason: f.reason,
                })
            }
            other => Err(format!("unknown predicate kind '{other}'")),
        }
    }

    /// Whether this predicate, or any predicate nested in it, is malformed.
    pub fn is_malformed(&self) -> bool {
        match self {
            Self::Malformed { .. } => true,
            Self::All { predicates } | Self::Any { predicates } => {
                predicates.iter().any(Self::is_malformed)
            }
            Self::Not { predicate } => predicate.is_malformed(),
            _ => false,
        }
    }

    /// Short human-readable form, used as the default assertion name.
    pub fn describe(&self) -> String {
        match self {
            Self::ContainsResource { type_name, title } => {
                format!("contains {}", ResourceRef::new(type_name, title))
            }
            Self::ContainsClass { class } => format!("contains {}", ResourceRef::class(class)),
            Self::HasParameter {
                type_name,
                title,
                parameter,
                value,
            } => format!(
                "{}.{parameter} == {value}",
                ResourceRef::new(type_name, title)
            ),
            Self::ResourceCount {
                type_name,
                min,
                max,
            } => {
                let bound = |b: &Option<usize>| b.map_or_else(|| "*".to_string(), |n| n.to_string());
                format!(
                    "count({}) in [{}, {}]",
                    cmx_core::normalize_type_name(type_name),
                    bound(min),
                    bound(max)
                )
            }
            Self::HasEdge { source, target } => format!("edge {source} -> {target}"),
            Self::All { predicates } => format!("all({})", join_descriptions(predicates)),
            Self::Any { predicates } => format!("any({})", join_descriptions(predicates)),
            Self::Not { predicate } => format!("not({})", predicate.describe()),
            Self::Malformed { .. } => "malformed predicate".to_string(),
        }
    }
}

fn join_descriptions(predicates: &[Predicate]) -> String {
    predicates
        .iter()
        .map(Predicate::describe)
        .collect::<Vec<_>>()
        .join(", ")
}

fn fields<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("{kind}: {e}"))
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}
