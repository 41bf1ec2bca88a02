//! # Module Invocations
//!
//! A [`ModuleInvocation`] is the unit of work handed to a catalog
//! compiler: which module to compile, with which parameters, against which
//! facts. One is constructed per matrix entry and consumed by the compiler
//! adapter; its JSON form is what external toolchains receive on stdin.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CompilationError, CompilationFailure, ConfigurationError};
use crate::facts::{FactSet, OsEntry};
use crate::identity::{ModuleName, OsId};

/// Module parameters: name → value. Empty means "all defaults".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Value>", into = "BTreeMap<String, Value>")]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    /// The default parameter set (no overrides).
    pub fn defaults() -> Self {
        Self::default()
    }

    /// Build a parameter set, validating every name.
    ///
    /// Names must match `[a-z_][a-z0-9_]*`, the identifier form catalog
    /// compilers accept for class parameters.
    pub fn new(values: BTreeMap<String, Value>) -> Result<Self, ConfigurationError> {
        for name in values.keys() {
            validate_parameter_name(name)?;
        }
        Ok(Self(values))
    }

    /// Build a parameter set from a JSON value. `null` means defaults; any
    /// other non-object is rejected.
    pub fn from_json(value: Value) -> Result<Self, ConfigurationError> {
        match value {
            Value::Null => Ok(Self::defaults()),
            Value::Object(map) => Self::new(map.into_iter().collect()),
            other => Err(ConfigurationError::InvalidParameter {
                name: "<root>".to_string(),
                reason: format!("parameters must be a mapping, got {}", json_kind(&other)),
            }),
        }
    }

    /// Whether no parameters are overridden.
    pub fn is_defaults(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of overridden parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn validate_parameter_name(name: &str) -> Result<(), ConfigurationError> {
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name: name.to_string(),
            reason: "names must match [a-z_][a-z0-9_]*".to_string(),
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

impl TryFrom<BTreeMap<String, Value>> for Parameters {
    type Error = ConfigurationError;

    fn try_from(values: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Parameters> for BTreeMap<String, Value> {
    fn from(params: Parameters) -> Self {
        params.0
    }
}

/// Everything a catalog compiler needs to compile one module for one
/// platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInvocation {
    /// The module to compile.
    pub module: ModuleName,
    /// Parameter overrides; empty for defaults.
    pub parameters: Parameters,
    /// The platform this invocation targets.
    pub os: OsId,
    /// Facts of that platform.
    pub facts: FactSet,
}

impl ModuleInvocation {
    /// Build the invocation for one matrix entry.
    pub fn for_entry(module: &ModuleName, parameters: &Parameters, entry: &OsEntry) -> Self {
        Self {
            module: module.clone(),
            parameters: parameters.clone(),
            os: entry.os.clone(),
            facts: entry.facts.clone(),
        }
    }

    /// A compilation error attributed to this invocation.
    pub fn failed(&self, reason: CompilationFailure) -> CompilationError {
        CompilationError::new(
            reason,
            self.module.clone(),
            self.os.clone(),
            self.facts.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_empty() {
        let params = Parameters::defaults();
        assert!(params.is_defaults());
        assert_eq!(Parameters::from_json(Value::Null).unwrap(), params);
    }

    #[test]
    fn accepts_valid_names() {
        let params = Parameters::from_json(json!({
            "package_ensure": "latest",
            "_private": 1,
            "riemann_port2": 5555,
        }))
        .unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get("package_ensure"), Some(&json!("latest")));
    }

    #[test]
    fn rejects_invalid_names() {
        for bad in ["Package", "2port", "riemann-host", ""] {
            let mut map = BTreeMap::new();
            map.insert(bad.to_string(), json!(true));
            assert!(
                matches!(
                    Parameters::new(map),
                    Err(ConfigurationError::InvalidParameter { .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_non_mapping_root() {
        let err = Parameters::from_json(json!(["a"])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn deserialize_validates_names() {
        assert!(serde_json::from_value::<Parameters>(json!({"ok": 1})).is_ok());
        assert!(serde_json::from_value::<Parameters>(json!({"Bad": 1})).is_err());
    }

    #[test]
    fn failed_carries_invocation_context() {
        let entry = OsEntry::new(OsId::new("ubuntu-20.04").unwrap(), FactSet::default());
        let inv = ModuleInvocation::for_entry(
            &ModuleName::new("tensor").unwrap(),
            &Parameters::defaults(),
            &entry,
        );
        let err = inv.failed(CompilationFailure::Cancelled);
        assert_eq!(err.os.as_str(), "ubuntu-20.04");
        assert_eq!(err.module.as_str(), "tensor");
        assert_eq!(err.reason, CompilationFailure::Cancelled);
    }

    #[test]
    fn invocation_json_shape() {
        let entry = OsEntry::new(
            OsId::new("centos-7").unwrap(),
            [("osfamily", "RedHat")].into_iter().collect(),
        );
        let inv = ModuleInvocation::for_entry(
            &ModuleName::new("tensor").unwrap(),
            &Parameters::defaults(),
            &entry,
        );
        let json = serde_json::to_value(&inv).unwrap();
        assert_eq!(
            json,
            json!({
                "module": "tensor",
                "parameters": {},
                "os": "centos-7",
                "facts": {"osfamily": "RedHat"},
            })
        );
    }
}
