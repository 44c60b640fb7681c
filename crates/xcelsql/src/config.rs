//! Runtime settings
//!
//! Settings come from built-in defaults, an optional JSON document and
//! `XCELSQL_*` environment variables, applied in that order.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Output format for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Excel,
    Json,
    Jsonl,
    Parquet,
}

impl OutputFormat {
    /// All formats, in display order
    pub const ALL: [OutputFormat; 6] = [
        OutputFormat::Table,
        OutputFormat::Csv,
        OutputFormat::Excel,
        OutputFormat::Json,
        OutputFormat::Jsonl,
        OutputFormat::Parquet,
    ];

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Csv => "csv",
            OutputFormat::Excel => "excel",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown output format '{}' (expected one of: {})",
                    s,
                    OutputFormat::ALL.map(OutputFormat::as_str).join(", ")
                ))
            })
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Result output format
    pub output_format: OutputFormat,
    /// 1-based header row used when a sheet spec has none
    pub header_row: usize,
    /// Enable the expression eval fallback
    pub allow_eval: bool,
    /// Strict query validation
    pub strict: bool,
    /// Row limit applied to query results
    pub limit: Option<usize>,
    /// Rows shown by table output
    pub display_limit: usize,
    /// Column width cap for table output
    pub max_col_width: usize,
    /// Report query timing
    pub timing: bool,
    /// Colorize table output
    pub color: bool,
    /// Cache loaded sheets
    pub cache_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Table,
            header_row: 1,
            allow_eval: false,
            strict: false,
            limit: None,
            display_limit: 50,
            max_col_width: 50,
            timing: false,
            color: false,
            cache_enabled: true,
        }
    }
}

impl Config {
    /// Parse settings from JSON; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overlay settings from the process environment
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Overlay `XCELSQL_*` settings read through `lookup`
    ///
    /// Numeric values that do not parse are ignored. Flags turn on only for
    /// the value `1`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str| -> Option<usize> {
            let raw = lookup(key)?;
            match raw.trim().parse::<usize>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(key, value = %raw, "ignoring non-numeric environment setting");
                    None
                }
            }
        };
        let flag = |key: &str| lookup(key).map_or(false, |v| v.trim() == "1");

        if let Some(n) = number("XCELSQL_DISPLAY_LIMIT") {
            self.display_limit = n;
        }
        if let Some(n) = number("XCELSQL_MAX_COL_WIDTH") {
            self.max_col_width = n;
        }
        if let Some(n) = number("XCELSQL_HEADER_ROW") {
            self.header_row = n;
        }
        if flag("XCELSQL_TIMING") {
            self.timing = true;
        }
        if flag("XCELSQL_COLOR") {
            self.color = true;
        }
        if flag("XCELSQL_ALLOW_EVAL") {
            self.allow_eval = true;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.header_row == 0 {
            return Err(Error::Config("header_row is 1-based and must be at least 1".into()));
        }
        if self.limit == Some(0) {
            return Err(Error::Config("limit must be positive".into()));
        }
        Ok(())
    }
}
