//! Sheet name to SQL identifier mapping
//!
//! Sheet names are free text ("Q1 Sales", "123Sheet", "データ"). The query
//! engine needs bare identifiers, so every sheet gets a lower-case, unique,
//! SQL-safe table name the first time it is referenced.
//!
//! ```rust
//! use xcelsql_core::IdentifierMapper;
//!
//! let mut mapper = IdentifierMapper::new();
//! assert_eq!(mapper.register("Sheet With Spaces"), "sheet_with_spaces");
//! assert_eq!(mapper.register("123Sheet"), "s_123sheet");
//! assert_eq!(mapper.lookup_reverse("s_123sheet"), Some("123Sheet"));
//! ```

use ahash::AHashMap;
use lazy_regex::regex_is_match;

/// Returns true if `name` can be used unquoted in SQL (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn is_safe_identifier(name: &str) -> bool {
    regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", name)
}

/// Bidirectional mapping between original sheet names and safe identifiers
///
/// Entries are created lazily and never change afterwards, so a name resolves
/// to the same identifier for the lifetime of the mapper.
#[derive(Debug, Clone, Default)]
pub struct IdentifierMapper {
    /// original name -> identifier
    forward: AHashMap<String, String>,
    /// lower-cased identifier -> original name
    reverse: AHashMap<String, String>,
    /// originals in registration order
    order: Vec<String>,
    /// counter for names with no usable characters
    counter: usize,
}

impl IdentifierMapper {
    /// Create an empty mapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet name and return its identifier
    ///
    /// Idempotent: registering the same name again returns the identifier
    /// assigned the first time.
    pub fn register(&mut self, original: &str) -> String {
        if let Some(existing) = self.forward.get(original) {
            return existing.clone();
        }

        let base = self.base_identifier(original);

        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.reverse.contains_key(&candidate.to_lowercase()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }

        tracing::debug!(sheet = original, identifier = %candidate, "registered sheet identifier");

        self.forward.insert(original.to_string(), candidate.clone());
        self.reverse
            .insert(candidate.to_lowercase(), original.to_string());
        self.order.push(original.to_string());
        candidate
    }

    /// Identifier for an already registered sheet
    pub fn lookup_forward(&self, original: &str) -> Option<&str> {
        self.forward.get(original).map(String::as_str)
    }

    /// Original sheet name for an identifier (case-insensitive)
    pub fn lookup_reverse(&self, identifier: &str) -> Option<&str> {
        self.reverse
            .get(&identifier.to_lowercase())
            .map(String::as_str)
    }

    /// All `(original, identifier)` pairs in registration order
    pub fn mappings(&self) -> Vec<(&str, &str)> {
        self.order
            .iter()
            .filter_map(|original| {
                self.forward
                    .get(original)
                    .map(|ident| (original.as_str(), ident.as_str()))
            })
            .collect()
    }

    /// Number of registered sheets
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns true if nothing has been registered yet
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Candidate identifier before collision handling
    fn base_identifier(&mut self, original: &str) -> String {
        let lowered = original.to_lowercase();

        // Collapse every run of disallowed characters into one underscore
        let mut safe = String::with_capacity(lowered.len());
        let mut in_run = false;
        for c in lowered.chars() {
            if c.is_ascii_alphanumeric() || c == '_' {
                safe.push(c);
                in_run = false;
            } else if !in_run {
                safe.push('_');
                in_run = true;
            }
        }

        if !safe.chars().any(|c| c.is_ascii_alphanumeric()) {
            let synthesized = format!("sheet_{}", self.counter);
            self.counter += 1;
            return synthesized;
        }

        if !safe.starts_with(|c: char| c.is_ascii_alphabetic()) {
            safe.insert_str(0, "s_");
        }

        safe
    }
}
