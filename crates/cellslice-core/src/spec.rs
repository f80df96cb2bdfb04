//! Library spec tree (spec.md S3 "Library spec tree", S4.C "Loading").
//!
//! A module spec is external data -- JSON shipped alongside the binary
//! (spec.md S6) -- describing which calls into a library mutate their
//! arguments and what type they return, so the extractor (component D) can
//! make those calls legible to dataflow without executing anything.

use indexmap::IndexMap;
use serde::Deserialize;
use std::sync::Arc;

/// Opaque handle to a type spec, used as `Ref::inferred_type`. Two handles
/// for the same fully-qualified type name are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSpecId(pub Arc<str>);

impl TypeSpecId {
    pub fn new(qualified_name: impl Into<Arc<str>>) -> Self {
        Self(qualified_name.into())
    }
}

/// A positional argument or receiver mutated by a call, or a named global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEntry {
    /// Argument position; `0` denotes the receiver of a method call.
    Position(usize),
    /// A global variable name, acknowledged but not modelled further
    /// (spec.md S4.D: "non-numeric string entries... are acknowledged but
    /// not modelled further").
    Global(String),
}

impl<'de> Deserialize<'de> for UpdateEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(i64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) if n >= 0 => UpdateEntry::Position(n as usize),
            Raw::Num(_) => UpdateEntry::Global(String::new()),
            Raw::Str(s) => UpdateEntry::Global(s),
        })
    }
}

/// A function or method spec. `returns_type` is resolved at load time by
/// matching `returns` against the enclosing module's `types` map.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub reads: Vec<String>,
    #[serde(default)]
    pub updates: Vec<UpdateEntry>,
    pub returns: Option<String>,
    #[serde(skip)]
    pub returns_type: Option<TypeSpecId>,
    #[serde(default)]
    pub higherorder: bool,
}

impl FunctionSpec {
    /// Synthetic constructor spec described in spec.md S4.C
    /// `lookupFunction`: `{name:"__init__", updates:[0], returnsType:T}`.
    pub fn synthetic_constructor(type_name: &str) -> Self {
        Self {
            name: "__init__".to_string(),
            reads: Vec::new(),
            updates: vec![UpdateEntry::Position(0)],
            returns: Some(type_name.to_string()),
            returns_type: Some(TypeSpecId::new(type_name.to_string())),
            higherorder: false,
        }
    }
}

/// A function entry as written in JSON: either a bare string (sugar for a
/// spec with empty reads/updates) or a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawFunctionEntry {
    Name(String),
    Full(FunctionSpecRaw),
}

#[derive(Deserialize)]
struct FunctionSpecRaw {
    name: String,
    #[serde(default)]
    reads: Vec<String>,
    #[serde(default)]
    updates: Vec<UpdateEntry>,
    returns: Option<String>,
    #[serde(default)]
    higherorder: bool,
}

impl From<RawFunctionEntry> for FunctionSpec {
    fn from(raw: RawFunctionEntry) -> Self {
        match raw {
            RawFunctionEntry::Name(name) => FunctionSpec { name, reads: vec![], updates: vec![], returns: None, returns_type: None, higherorder: false },
            RawFunctionEntry::Full(f) => FunctionSpec {
                name: f.name,
                reads: f.reads,
                updates: f.updates,
                returns: f.returns,
                returns_type: None,
                higherorder: f.higherorder,
            },
        }
    }
}

/// A type spec: a list of method specs.
#[derive(Debug, Clone, Default)]
pub struct TypeSpec {
    pub methods: Vec<FunctionSpec>,
}

impl TypeSpec {
    pub fn method(&self, name: &str) -> Option<&FunctionSpec> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Deserialize)]
struct TypeSpecRaw {
    #[serde(default)]
    methods: Vec<RawFunctionEntry>,
}

/// A module spec: functions, nested types, and nested modules.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    pub name: String,
    pub functions: Vec<FunctionSpec>,
    pub types: IndexMap<String, TypeSpec>,
    pub modules: IndexMap<String, ModuleSpec>,
}

impl ModuleSpec {
    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Deserialize)]
struct ModuleSpecRaw {
    #[serde(default)]
    functions: Vec<RawFunctionEntry>,
    #[serde(default)]
    types: IndexMap<String, TypeSpecRaw>,
    #[serde(default)]
    modules: IndexMap<String, ModuleSpecRaw>,
}

/// Parses and normalizes a module spec from JSON text (spec.md S4.C
/// "Loading"): bare-string functions are expanded, and every function's
/// `returns` is resolved against the enclosing module's `types` map.
pub fn load_module_spec(name: &str, json_text: &str) -> Result<ModuleSpec, crate::error::SpecError> {
    let raw: ModuleSpecRaw = serde_json::from_str(json_text)?;
    Ok(build_module(name, raw))
}

fn build_module(name: &str, raw: ModuleSpecRaw) -> ModuleSpec {
    let mut types = IndexMap::new();
    for (type_name, type_raw) in raw.types {
        let methods = type_raw.methods.into_iter().map(FunctionSpec::from).collect();
        types.insert(type_name, TypeSpec { methods });
    }

    let functions: Vec<FunctionSpec> = raw
        .functions
        .into_iter()
        .map(FunctionSpec::from)
        .map(|mut f| {
            if let Some(ret) = &f.returns
                && types.contains_key(ret)
            {
                f.returns_type = Some(TypeSpecId::new(format!("{name}.{ret}")));
            }
            f
        })
        .collect();

    let modules = raw.modules.into_iter().map(|(child_name, child_raw)| (child_name.clone(), build_module(&format!("{name}.{child_name}"), child_raw))).collect();

    ModuleSpec { name: name.to_string(), functions, types, modules }
}

/// Embedded default spec bundle (SPEC_FULL.md S3): built-ins plus a handful
/// of popular data-science libraries, matching spec.md S4.C "Default specs".
pub mod bundled {
    pub const BUILTINS: &str = include_str!("specs/builtins.json");
    pub const RANDOM: &str = include_str!("specs/random.json");
    pub const MATPLOTLIB: &str = include_str!("specs/matplotlib.json");
    pub const PANDAS: &str = include_str!("specs/pandas.json");
    pub const SKLEARN: &str = include_str!("specs/sklearn.json");
    pub const NUMPY: &str = include_str!("specs/numpy.json");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_string_function_expands() {
        let json = r#"{"functions": ["print", {"name": "len", "reads": ["0"]}]}"#;
        let m = load_module_spec("m", json).unwrap();
        assert_eq!(m.functions.len(), 2);
        assert!(m.function("print").unwrap().updates.is_empty());
    }

    #[test]
    fn returns_resolves_to_nested_type() {
        let json = r#"{
            "types": {"DataFrame": {"methods": []}},
            "functions": [{"name": "read_csv", "returns": "DataFrame", "updates": []}]
        }"#;
        let m = load_module_spec("pandas", json).unwrap();
        let f = m.function("read_csv").unwrap();
        assert!(f.returns_type.is_some());
    }
}
