//! Symbol table (spec.md S3 "Symbol table", S4.C "Symbol table operations").

use crate::error::Diagnostic;
use crate::spec::{FunctionSpec, ModuleSpec, TypeSpec, TypeSpecId, bundled, load_module_spec};
use indexmap::IndexMap;
use std::sync::Arc;

/// A globally visible type: its qualified name plus the method table.
#[derive(Debug, Clone)]
pub struct GlobalType {
    pub qualified_name: String,
    pub spec: TypeSpec,
}

/// Mutable collection of imports, globally visible functions and types, and
/// parameter side-effect specs learned from `def` statements (spec.md S4.E
/// "Parameter side-effect analysis"). Built-ins are pre-loaded at
/// construction from the `__builtins__` module.
#[derive(Default)]
pub struct SymbolTable {
    /// Root modules known to the table (the "default specs" bundle plus
    /// anything merged in later), keyed by top-level name.
    roots: IndexMap<String, Arc<ModuleSpec>>,
    /// Currently-imported modules, keyed by the dotted path they were
    /// imported under, or by alias.
    imported_modules: IndexMap<String, Arc<ModuleSpec>>,
    /// Globally-visible functions, keyed by bare name. Includes both
    /// built-ins and anything pulled in via `from x import y` or learned
    /// from a local `def` (including its side-effect-derived `updates`).
    functions: IndexMap<String, FunctionSpec>,
    /// Globally-visible types, keyed by bare name.
    types: IndexMap<String, GlobalType>,
    /// Accumulated non-fatal warnings (SPEC_FULL.md S3).
    pub diagnostics: Vec<Diagnostic>,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        table.load_builtin_bundle();
        table
    }

    fn load_builtin_bundle(&mut self) {
        if let Ok(builtins) = load_module_spec("__builtins__", bundled::BUILTINS) {
            for f in &builtins.functions {
                self.functions.insert(f.name.clone(), f.clone());
            }
            for (name, ty) in &builtins.types {
                self.types.insert(name.clone(), GlobalType { qualified_name: format!("__builtins__.{name}"), spec: ty.clone() });
            }
            self.roots.insert("__builtins__".to_string(), Arc::new(builtins));
        }
    }

    /// Registers a root module (e.g. `pandas`, `numpy`) so it becomes
    /// resolvable by `importModule`. Matches spec.md S4.C "Default specs
    /// aggregate built-ins, random, matplotlib, pandas, sklearn, numpy."
    pub fn register_root(&mut self, name: &str, spec: ModuleSpec) {
        self.roots.insert(name.to_string(), Arc::new(spec));
    }

    /// Loads the bundled default spec set (spec.md S4.C "Default specs").
    pub fn with_default_specs() -> Self {
        let mut table = Self::new();
        for (name, json) in [
            ("random", bundled::RANDOM),
            ("matplotlib", bundled::MATPLOTLIB),
            ("pandas", bundled::PANDAS),
            ("sklearn", bundled::SKLEARN),
            ("numpy", bundled::NUMPY),
        ] {
            match load_module_spec(name, json) {
                Ok(spec) => table.register_root(name, spec),
                Err(e) => table.diagnostics.push(Diagnostic::new(format!("failed to load default spec {name}: {e}"))),
            }
        }
        table
    }

    fn resolve_path<'a>(&'a self, path: &str) -> Option<&'a ModuleSpec> {
        let mut parts = path.split('.');
        let root_name = parts.next()?;
        let mut current = self.roots.get(root_name)?.as_ref();
        for part in parts {
            current = current.modules.get(part)?;
        }
        Some(current)
    }

    /// `importModule(path, alias)` (spec.md S4.C): resolves a dotted path
    /// down the nested module map; on failure, records a warning and
    /// no-ops.
    pub fn import_module(&mut self, path: &str, alias: Option<&str>) {
        match self.resolve_path(path) {
            Some(module) => {
                let module = Arc::new(module.clone());
                self.imported_modules.insert(path.to_string(), module.clone());
                if let Some(alias) = alias {
                    self.imported_modules.insert(alias.to_string(), module);
                }
            }
            None => {
                let msg = format!("unknown module in import: {path}");
                log::warn!("{msg}");
                self.diagnostics.push(Diagnostic::new(msg));
            }
        }
    }

    /// `importModuleDefinitions(path, imports)` (spec.md S4.C): `imports` is
    /// a list of `(name)` to pull in from `path`, or a single `"*"` entry to
    /// pull in everything.
    pub fn import_module_definitions(&mut self, path: &str, names: &[String]) {
        let Some(module) = self.resolve_path(path).cloned() else {
            let msg = format!("unknown module in from-import: {path}");
            log::warn!("{msg}");
            self.diagnostics.push(Diagnostic::new(msg));
            return;
        };
        if names.iter().any(|n| n == "*") {
            for f in &module.functions {
                self.functions.insert(f.name.clone(), f.clone());
            }
            for (name, ty) in &module.types {
                self.types.insert(name.clone(), GlobalType { qualified_name: format!("{path}.{name}"), spec: ty.clone() });
            }
            return;
        }
        for name in names {
            if let Some(f) = module.function(name) {
                self.functions.insert(name.clone(), f.clone());
            } else if let Some(ty) = module.types.get(name) {
                self.types.insert(name.clone(), GlobalType { qualified_name: format!("{path}.{name}"), spec: ty.clone() });
            } else {
                let msg = format!("unknown definition `{name}` imported from {path}");
                log::warn!("{msg}");
                self.diagnostics.push(Diagnostic::new(msg));
            }
        }
    }

    /// `lookupFunction(name)` (spec.md S4.C): a known free function, else a
    /// synthetic constructor if `name` is a known type.
    pub fn lookup_function(&self, name: &str) -> Option<FunctionSpec> {
        if let Some(f) = self.functions.get(name) {
            return Some(f.clone());
        }
        if self.types.contains_key(name) {
            return Some(FunctionSpec::synthetic_constructor(name));
        }
        None
    }

    /// `lookupModuleFunction(mod, func)`.
    pub fn lookup_module_function(&self, module_alias: &str, func: &str) -> Option<FunctionSpec> {
        self.imported_modules.get(module_alias).and_then(|m| m.function(func)).cloned()
    }

    pub fn is_known_module(&self, alias: &str) -> bool {
        self.imported_modules.contains_key(alias)
    }

    pub fn lookup_type(&self, name: &str) -> Option<&GlobalType> {
        self.types.get(name)
    }

    /// Resolves a method on an inferred type. Checks the global table first
    /// (populated by `from x import Y`/`*`), then falls back to searching
    /// every currently-imported module's own (and nested) type maps by
    /// qualified name -- the path a plain `import x as y` takes, since that
    /// form never promotes anything into the global maps.
    pub fn lookup_type_method(&self, type_id: &TypeSpecId, method: &str) -> Option<FunctionSpec> {
        let bare = type_id.0.rsplit('.').next().unwrap_or(&type_id.0);
        if let Some(t) = self.types.get(bare) {
            return t.spec.method(method).cloned();
        }
        self.imported_modules.values().find_map(|m| find_type_in_module(m, type_id)).and_then(|t| t.method(method)).cloned()
    }

    /// Registers a function spec derived from a local `def` statement's
    /// parameter side-effect analysis (spec.md S4.E), keyed by name so
    /// later calls to it resolve through `lookup_function`.
    pub fn register_function(&mut self, spec: FunctionSpec) {
        self.functions.insert(spec.name.clone(), spec);
    }

    pub fn register_type(&mut self, name: &str, qualified_name: String, spec: TypeSpec) {
        self.types.insert(name.to_string(), GlobalType { qualified_name, spec });
    }
}

/// Searches a module and its nested modules for the type spec whose
/// fully-qualified name (`{module.name}.{type_name}`) matches `type_id`.
/// `ModuleSpec::name` is already fully qualified (set recursively at load
/// time in `spec.rs`'s `build_module`), so a single string comparison per
/// candidate is enough.
fn find_type_in_module<'a>(module: &'a ModuleSpec, type_id: &TypeSpecId) -> Option<&'a TypeSpec> {
    for (type_name, type_spec) in &module.types {
        if type_id.0.as_ref() == format!("{}.{type_name}", module.name) {
            return Some(type_spec);
        }
    }
    module.modules.values().find_map(|child| find_type_in_module(child, type_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_preloaded() {
        let table = SymbolTable::new();
        assert!(table.lookup_function("print").is_some());
    }

    #[test]
    fn unknown_import_warns_and_noops() {
        let mut table = SymbolTable::new();
        table.import_module("totally.unknown", None);
        assert_eq!(table.diagnostics.len(), 1);
        assert!(!table.is_known_module("totally.unknown"));
    }

    #[test]
    fn from_import_star_pulls_everything() {
        let mut table = SymbolTable::with_default_specs();
        table.import_module_definitions("sklearn.datasets", &["*".to_string()]);
        assert!(table.lookup_function("load_iris").is_some());
    }

    #[test]
    fn plain_import_still_resolves_type_methods_by_qualified_name() {
        let mut table = SymbolTable::with_default_specs();
        table.import_module("pandas", Some("pd"));
        let type_id = TypeSpecId::new("pandas.DataFrame");
        assert!(table.lookup_type_method(&type_id, "pop").is_some());
        assert!(table.lookup_type_method(&type_id, "memory_usage").is_some());
    }

    #[test]
    fn known_type_without_constructor_function_falls_back_to_synthetic() {
        use crate::spec::TypeSpec;
        let mut table = SymbolTable::new();
        table.register_type("Widget", "toolkit.Widget".to_string(), TypeSpec::default());
        let ctor = table.lookup_function("Widget").unwrap();
        assert_eq!(ctor.name, "__init__");
        assert_eq!(ctor.returns_type.as_ref().map(|t| t.0.as_ref()), Some("Widget"));
    }
}
