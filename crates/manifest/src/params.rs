//! Parameter resolution
//!
//! Each declared parameter is resolved from the first source that has a
//! value:
//! 1. An explicit input (`--param`, parameter file)
//! 2. The host fact named by `default_fact`
//! 3. The `by_os_family` entry for the host's `os_family` fact
//! 4. The static `default`
//! 5. Null, when the parameter is `optional`
//!
//! Anything else is a [`CompileError::MissingParameter`].

use crate::error::{CompileError, Result};
use crate::facts::HostFacts;
use crate::types::{ParamDef, ParamType};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Names the compiler binds itself
pub const RESERVED: [&str; 2] = ["facts", "item"];

/// Resolved parameters, by name
pub type Params = Map<String, Value>;

/// One explicitly supplied parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum ParamInput {
    /// Text from the command line, interpreted against the declared type
    Raw(String),
    /// Already-typed value (parameter files)
    Value(Value),
}

/// Explicit parameter values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamInputs {
    values: BTreeMap<String, ParamInput>,
}

impl ParamInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.values
            .insert(name.to_string(), ParamInput::Value(value.into()));
    }

    pub fn set_raw(&mut self, name: &str, raw: &str) {
        self.values
            .insert(name.to_string(), ParamInput::Raw(raw.to_string()));
    }

    /// Builder variant of [`ParamInputs::set`]
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Apply a `name=value` assignment from the command line
    pub fn set_assignment(&mut self, assignment: &str) -> Result<()> {
        let (name, raw) = assignment.split_once('=').ok_or_else(|| CompileError::Parse {
            origin: "--param".to_string(),
            message: format!("expected name=value, got '{assignment}'"),
        })?;
        self.set_raw(name.trim(), raw);
        Ok(())
    }

    /// Read a TOML file of `name = value` pairs
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, &path.display().to_string())
    }

    pub fn from_toml(text: &str, origin: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).map_err(|e| CompileError::Parse {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        let mut inputs = Self::new();
        for (name, value) in &table {
            inputs.set(name, toml_to_json(value));
        }
        Ok(inputs)
    }

    /// Overlay `other`; its values win
    pub fn merge(&mut self, other: Self) {
        self.values.extend(other.values);
    }

    pub fn get(&self, name: &str) -> Option<&ParamInput> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Convert a TOML value to JSON
pub fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Parse text as a TOML value (`8`, `true`, `["a", "b"]`, `{ a = 1 }`)
pub(crate) fn parse_raw_value(raw: &str) -> Option<Value> {
    let table: toml::Table = toml::from_str(&format!("v = {raw}")).ok()?;
    table.get("v").map(toml_to_json)
}

/// Short description of a JSON value's type for error messages
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string \"{s}\""),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "a map".to_string(),
    }
}

fn matches_type(ty: ParamType, value: &Value) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
        ParamType::Bool => value.is_boolean(),
        ParamType::List => value.is_array(),
        ParamType::Map => value.is_object(),
        ParamType::Any => true,
    }
}

fn from_input(name: &str, def: &ParamDef, input: &ParamInput) -> Result<Value> {
    match input {
        ParamInput::Value(value) => Ok(value.clone()),
        ParamInput::Raw(raw) => match def.ty {
            ParamType::String => Ok(Value::String(raw.clone())),
            ParamType::Any => {
                Ok(parse_raw_value(raw).unwrap_or_else(|| Value::String(raw.clone())))
            }
            ty => parse_raw_value(raw).ok_or_else(|| CompileError::ParameterType {
                name: name.to_string(),
                expected: ty.as_str().to_string(),
                found: format!("'{raw}'"),
            }),
        },
    }
}

fn resolve_one(
    name: &str,
    def: &ParamDef,
    inputs: &ParamInputs,
    facts: &HostFacts,
) -> Result<Value> {
    if let Some(input) = inputs.get(name) {
        return from_input(name, def, input);
    }
    if let Some(fact) = &def.default_fact {
        return facts
            .get(fact)
            .cloned()
            .ok_or_else(|| CompileError::UnknownFact {
                param: name.to_string(),
                fact: fact.clone(),
            });
    }
    if let Some(value) = facts.os_family().and_then(|family| def.by_os_family.get(family)) {
        return Ok(toml_to_json(value));
    }
    if let Some(value) = &def.default {
        return Ok(toml_to_json(value));
    }
    if def.optional {
        return Ok(Value::Null);
    }
    Err(CompileError::MissingParameter(name.to_string()))
}

fn validate(name: &str, def: &ParamDef, value: &Value) -> Result<()> {
    if value.is_null() {
        return if def.optional {
            Ok(())
        } else {
            Err(CompileError::MissingParameter(name.to_string()))
        };
    }
    if !matches_type(def.ty, value) {
        return Err(CompileError::ParameterType {
            name: name.to_string(),
            expected: def.ty.as_str().to_string(),
            found: describe(value),
        });
    }
    if let Some(allowed) = &def.allowed {
        let allowed: Vec<Value> = allowed.iter().map(toml_to_json).collect();
        if !allowed.contains(value) {
            let list: Vec<String> = allowed.iter().map(Value::to_string).collect();
            return Err(CompileError::NotAllowed {
                name: name.to_string(),
                value: value.to_string(),
                allowed: format!("[{}]", list.join(", ")),
            });
        }
    }
    Ok(())
}

/// Resolve every declared parameter
pub fn resolve_params(
    defs: &BTreeMap<String, ParamDef>,
    inputs: &ParamInputs,
    facts: &HostFacts,
) -> Result<Params> {
    if let Some(unknown) = inputs.values.keys().find(|name| !defs.contains_key(*name)) {
        return Err(CompileError::UnknownParameter(unknown.clone()));
    }

    let mut params = Params::new();
    for (name, def) in defs {
        if RESERVED.contains(&name.as_str()) {
            return Err(CompileError::ReservedName(name.clone()));
        }
        let value = resolve_one(name, def, inputs, facts)?;
        validate(name, def, &value)?;
        log::trace!("parameter {name} = {value}");
        params.insert(name.clone(), value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{OS_FAMILY, PROCESSOR_COUNT};
    use serde_json::json;

    fn defs(text: &str) -> BTreeMap<String, ParamDef> {
        toml::from_str(text).unwrap()
    }

    const DEFS: &str = r#"
[worker_processes]
type = "integer"
default_fact = "processor_count"

[daemon_user]
type = "string"
default = "nginx"
[daemon_user.by_os_family]
Debian = "www-data"

[worker_rlimit_nofile]
type = "integer"
optional = true

[package_ensure]
type = "string"
default = "present"
enum = ["present", "absent", "latest"]
"#;

    fn facts() -> HostFacts {
        HostFacts::new()
            .with(PROCESSOR_COUNT, 4)
            .with(OS_FAMILY, "RedHat")
    }

    #[test]
    fn test_resolution_order() {
        let params = resolve_params(&defs(DEFS), &ParamInputs::new(), &facts()).unwrap();
        assert_eq!(params["worker_processes"], json!(4));
        assert_eq!(params["daemon_user"], json!("nginx"));
        assert_eq!(params["worker_rlimit_nofile"], Value::Null);
        assert_eq!(params["package_ensure"], json!("present"));

        let debian = facts().with(OS_FAMILY, "Debian");
        let params = resolve_params(&defs(DEFS), &ParamInputs::new(), &debian).unwrap();
        assert_eq!(params["daemon_user"], json!("www-data"));
    }

    #[test]
    fn test_explicit_wins() {
        let mut inputs = ParamInputs::new();
        inputs.set_assignment("worker_processes=12").unwrap();
        inputs.set_assignment("daemon_user=true").unwrap();
        let params = resolve_params(&defs(DEFS), &inputs, &facts()).unwrap();
        assert_eq!(params["worker_processes"], json!(12));
        // strings are taken verbatim
        assert_eq!(params["daemon_user"], json!("true"));
    }

    #[test]
    fn test_type_and_enum_checks() {
        let mut inputs = ParamInputs::new();
        inputs.set_assignment("worker_processes=many").unwrap();
        let err = resolve_params(&defs(DEFS), &inputs, &facts()).unwrap_err();
        assert!(matches!(err, CompileError::ParameterType { .. }));

        let inputs = ParamInputs::new().with("package_ensure", "purged");
        let err = resolve_params(&defs(DEFS), &inputs, &facts()).unwrap_err();
        assert!(matches!(err, CompileError::NotAllowed { .. }));

        let inputs = ParamInputs::new().with("worker_rlimit_nofile", "lots");
        let err = resolve_params(&defs(DEFS), &inputs, &facts()).unwrap_err();
        assert!(err.to_string().contains("must be an integer"));
    }

    #[test]
    fn test_unknown_and_missing() {
        let inputs = ParamInputs::new().with("nope", 1);
        assert!(matches!(
            resolve_params(&defs(DEFS), &inputs, &facts()),
            Err(CompileError::UnknownParameter(name)) if name == "nope"
        ));

        let err = resolve_params(&defs(DEFS), &ParamInputs::new(), &HostFacts::new()).unwrap_err();
        assert!(matches!(err, CompileError::UnknownFact { .. }));

        let required = defs("[conf_dir]\ntype = \"string\"\n");
        let err = resolve_params(&required, &ParamInputs::new(), &facts()).unwrap_err();
        assert!(matches!(err, CompileError::MissingParameter(_)));
    }

    #[test]
    fn test_reserved_name() {
        let reserved = defs("[item]\ndefault = 1\n");
        assert!(matches!(
            resolve_params(&reserved, &ParamInputs::new(), &facts()),
            Err(CompileError::ReservedName(_))
        ));
    }

    #[test]
    fn test_params_file() {
        let mut inputs = ParamInputs::from_toml(
            "modules = [\"a\", \"b\"]\nworker_processes = 2\n",
            "params.toml",
        )
        .unwrap();
        assert_eq!(inputs.get("modules"), Some(&ParamInput::Value(json!(["a", "b"]))));

        let mut cli = ParamInputs::new();
        cli.set_raw("worker_processes", "6");
        inputs.merge(cli);
        assert_eq!(inputs.get("worker_processes"), Some(&ParamInput::Raw("6".into())));
    }

    #[test]
    fn test_parse_raw_value() {
        assert_eq!(parse_raw_value("8"), Some(json!(8)));
        assert_eq!(parse_raw_value("[\"a\"]"), Some(json!(["a"])));
        assert_eq!(parse_raw_value("{ a = 1 }"), Some(json!({"a": 1})));
        assert_eq!(parse_raw_value("bare words"), None);
    }
}
