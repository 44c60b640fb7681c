//! Function registry and built-in functions
//!
//! Functions are looked up by exact name. The process-wide registry starts
//! with the built-ins below; hosts add their own with [`register_function`]
//! during start-up and then call [`seal_registry`] before evaluating
//! expressions concurrently.

pub mod date;
pub mod logical;
pub mod text;

use crate::error::{FunctionError, RegistryError};
use crate::value::Value;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use xcelsql_core::is_safe_identifier;

/// Function implementation signature
///
/// Receives positional arguments with keyword arguments already bound to
/// their declared positions.
pub type FunctionImpl = Arc<dyn Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync>;

/// Function definition
#[derive(Clone)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// One-line description shown by function listings
    pub doc: String,
    /// Parameter names, used to bind keyword arguments
    pub params: Vec<String>,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

impl FunctionDef {
    /// Create a definition with no declared parameter names
    pub fn new<F>(name: impl Into<String>, min_args: usize, max_args: Option<usize>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, FunctionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            doc: String::new(),
            params: Vec::new(),
            min_args,
            max_args,
            implementation: Arc::new(f),
        }
    }

    /// Set the description
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Declare parameter names so the function accepts keyword arguments
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Bind arguments, check arity and invoke
    pub fn call(&self, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Value, FunctionError> {
        let bound = self.bind(args, kwargs)?;

        if bound.len() < self.min_args || self.max_args.map_or(false, |max| bound.len() > max) {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => max.to_string(),
                Some(max) => format!("{} to {}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(FunctionError::Arity {
                expected,
                actual: bound.len(),
            });
        }

        (self.implementation)(&bound)
    }

    /// Place keyword arguments after the positional ones by parameter name
    fn bind(&self, mut args: Vec<Value>, kwargs: Vec<(String, Value)>) -> Result<Vec<Value>, FunctionError> {
        if kwargs.is_empty() {
            return Ok(args);
        }

        let mut slots: Vec<Option<Value>> = Vec::new();
        for (keyword, value) in kwargs {
            let position = self
                .params
                .iter()
                .position(|p| *p == keyword)
                .ok_or_else(|| FunctionError::UnexpectedKeyword(keyword.clone()))?;
            if position < args.len() {
                return Err(FunctionError::DuplicateArgument(keyword));
            }
            let slot = position - args.len();
            if slots.len() <= slot {
                slots.resize(slot + 1, None);
            }
            slots[slot] = Some(value);
        }

        for slot in slots {
            match slot {
                Some(value) => args.push(value),
                None => {
                    let missing = self
                        .params
                        .get(args.len())
                        .cloned()
                        .unwrap_or_else(|| format!("#{}", args.len() + 1));
                    return Err(FunctionError::Argument(format!(
                        "missing required argument '{}'",
                        missing
                    )));
                }
            }
        }

        Ok(args)
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish_non_exhaustive()
    }
}

/// Source of callable functions for an evaluation
pub trait FunctionScope: Send + Sync {
    /// Function registered under `name`
    fn lookup(&self, name: &str) -> Option<Arc<FunctionDef>>;

    /// `(name, doc)` of every function, sorted by name
    fn list(&self) -> Vec<(String, String)>;
}

/// Function registry
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<FunctionDef>>,
    sealed: bool,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_text_functions();
        registry.register_date_functions();
        registry.register_logical_functions();

        registry
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<&Arc<FunctionDef>> {
        self.functions.get(name)
    }

    /// Register a function; a later registration under the same name wins
    pub fn register(&mut self, def: FunctionDef) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed(def.name));
        }
        if !is_safe_identifier(&def.name) {
            return Err(RegistryError::InvalidName(def.name));
        }
        tracing::debug!(function = %def.name, "registered expression function");
        self.functions.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// End the registration phase
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Whether [`FunctionRegistry::seal`] has been called
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no functions are registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn builtin(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), Arc::new(def));
    }

    fn register_text_functions(&mut self) {
        self.builtin(
            FunctionDef::new("clean", 1, Some(1), text::fn_clean)
                .with_params(&["s"])
                .with_doc("Remove leading/trailing whitespace and normalize internal spacing."),
        );

        self.builtin(
            FunctionDef::new("extract_number", 1, Some(1), text::fn_extract_number)
                .with_params(&["s"])
                .with_doc("Extract the first number from a string."),
        );
    }

    fn register_date_functions(&mut self) {
        self.builtin(
            FunctionDef::new("format_date", 1, Some(2), date::fn_format_date)
                .with_params(&["dt", "fmt"])
                .with_doc("Format a date object or string as specified format."),
        );

        self.builtin(
            FunctionDef::new("date_diff_days", 2, Some(2), date::fn_date_diff_days)
                .with_params(&["start", "end"])
                .with_doc("Calculate days between two dates."),
        );

        self.builtin(
            FunctionDef::new("today", 0, Some(0), date::fn_today).with_doc("Return current date."),
        );
    }

    fn register_logical_functions(&mut self) {
        self.builtin(
            FunctionDef::new("coalesce", 0, None, logical::fn_coalesce)
                .with_doc("Return first non-null value (similar to SQL COALESCE)."),
        );

        self.builtin(
            FunctionDef::new("case_when", 3, Some(3), logical::fn_case_when)
                .with_params(&["condition", "true_val", "false_val"])
                .with_doc("Simple IF-THEN-ELSE function."),
        );
    }
}

impl FunctionScope for FunctionRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.get(name).cloned()
    }

    fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = self
            .functions
            .values()
            .map(|def| (def.name.clone(), def.doc.clone()))
            .collect();
        entries.sort();
        entries
    }
}

/// Global function registry (lazily initialized with the built-ins)
static FUNCTION_REGISTRY: Lazy<RwLock<FunctionRegistry>> =
    Lazy::new(|| RwLock::new(FunctionRegistry::new()));

/// Handle to the process-wide registry
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalFunctions;

impl FunctionScope for GlobalFunctions {
    fn lookup(&self, name: &str) -> Option<Arc<FunctionDef>> {
        FUNCTION_REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(name)
    }

    fn list(&self) -> Vec<(String, String)> {
        FUNCTION_REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list()
    }
}

/// Register a function in the process-wide registry
pub fn register_function(def: FunctionDef) -> Result<(), RegistryError> {
    FUNCTION_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(def)
}

/// Function registered under `name` in the process-wide registry
pub fn lookup_function(name: &str) -> Option<Arc<FunctionDef>> {
    GlobalFunctions.lookup(name)
}

/// `(name, doc)` of every function in the process-wide registry, sorted by name
pub fn list_functions() -> Vec<(String, String)> {
    GlobalFunctions.list()
}

/// End the registration phase of the process-wide registry
pub fn seal_registry() {
    FUNCTION_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .seal();
    tracing::info!("expression function registry sealed");
}

/// Extract a required argument
pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo(args: &[Value]) -> Result<Value, FunctionError> {
        Ok(Value::List(args.to_vec()))
    }

    #[test]
    fn test_builtins_listed_sorted() {
        let registry = FunctionRegistry::new();
        let names: Vec<String> = registry.list().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "case_when",
                "clean",
                "coalesce",
                "date_diff_days",
                "extract_number",
                "format_date",
                "today"
            ]
        );
        assert!(registry.list().iter().all(|(_, doc)| !doc.is_empty()));
    }

    #[test]
    fn test_register_and_override() {
        let mut registry = FunctionRegistry::empty();
        registry
            .register(FunctionDef::new("f", 0, None, echo).with_doc("first"))
            .unwrap();
        registry
            .register(FunctionDef::new("f", 0, None, echo).with_doc("second"))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("f").unwrap().doc, "second");
        assert!(registry.get("F").is_none());
    }

    #[test]
    fn test_sealed_registry_rejects_registration() {
        let mut registry = FunctionRegistry::empty();
        registry.seal();
        assert_eq!(
            registry.register(FunctionDef::new("f", 0, None, echo)),
            Err(RegistryError::Sealed("f".into()))
        );
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut registry = FunctionRegistry::empty();
        assert_eq!(
            registry.register(FunctionDef::new("bad name", 0, None, echo)),
            Err(RegistryError::InvalidName("bad name".into()))
        );
    }

    #[test]
    fn test_arity_checked() {
        let def = FunctionDef::new("pair", 2, Some(2), echo);
        assert_eq!(
            def.call(vec![Value::Int(1)], vec![]),
            Err(FunctionError::Arity {
                expected: "2".into(),
                actual: 1
            })
        );
        let def = FunctionDef::new("many", 1, None, echo);
        assert_eq!(
            def.call(vec![], vec![]),
            Err(FunctionError::Arity {
                expected: "at least 1".into(),
                actual: 0
            })
        );
    }

    #[test]
    fn test_keyword_binding() {
        let def = FunctionDef::new("f", 1, Some(3), echo).with_params(&["a", "b", "c"]);
        assert_eq!(
            def.call(vec![Value::Int(1)], vec![("b".into(), Value::Int(2))])
                .unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            def.call(vec![Value::Int(1)], vec![("a".into(), Value::Int(2))]),
            Err(FunctionError::DuplicateArgument("a".into()))
        );
        assert_eq!(
            def.call(vec![], vec![("z".into(), Value::Int(2))]),
            Err(FunctionError::UnexpectedKeyword("z".into()))
        );
        assert!(matches!(
            def.call(vec![Value::Int(1)], vec![("c".into(), Value::Int(3))]),
            Err(FunctionError::Argument(_))
        ));
    }

    #[test]
    fn test_global_registry_has_builtins() {
        assert!(lookup_function("coalesce").is_some());
        assert!(list_functions().iter().any(|(name, _)| name == "today"));
    }
}
