//! Sheet specifications and header handling
//!
//! A sheet is named on the command line as `Name[:header]` where the header
//! part is a 1-based row number or one of the auto-detection sentinels.

use crate::error::{Result, ValidationError};
use ahash::AHashMap;
use lazy_regex::regex_is_match;
use std::fmt;
use std::str::FromStr;

/// Header suffixes that request header row inference
pub const AUTO_HEADER_SENTINELS: &[&str] = &["auto", "infer", "infer_header"];

/// Rows inspected by [`infer_header_row`]
pub const HEADER_SCAN_ROWS: usize = 10;

/// Where a sheet's column names come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaderRow {
    /// Detect the header row from the first rows of the sheet
    Auto,
    /// Fixed 1-based row
    Row(usize),
}

impl HeaderRow {
    /// Resolve to a concrete row, running `infer` for [`HeaderRow::Auto`]
    pub fn resolve_with(self, infer: impl FnOnce() -> usize) -> usize {
        match self {
            HeaderRow::Auto => infer(),
            HeaderRow::Row(n) => n,
        }
    }
}

impl Default for HeaderRow {
    fn default() -> Self {
        HeaderRow::Row(1)
    }
}

impl fmt::Display for HeaderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderRow::Auto => write!(f, "auto"),
            HeaderRow::Row(n) => write!(f, "{}", n),
        }
    }
}

/// Parsed `Name[:header]` sheet specification
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetSpec {
    /// Sheet name as it appears in the workbook
    pub name: String,
    /// Header row selection
    pub header: HeaderRow,
}

impl SheetSpec {
    /// Create a spec with the default header row
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            header: HeaderRow::default(),
        }
    }

    /// Parse `Name`, `Name:3`, `Name:auto` (also `infer`, `infer_header`, `0`)
    ///
    /// Only the first `:` separates name from header, so sheet names cannot
    /// contain a colon but header text can be anything.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, raw) = match spec.split_once(':') {
            Some((name, raw)) => (name, raw),
            None => return Ok(Self::new(spec)),
        };

        let raw = raw.trim().to_lowercase();
        let header = if raw == "0" || AUTO_HEADER_SENTINELS.contains(&raw.as_str()) {
            HeaderRow::Auto
        } else {
            raw.parse::<usize>()
                .map(HeaderRow::Row)
                .map_err(|_| ValidationError::InvalidSheetSpec(spec.to_string()))?
        };

        Ok(Self {
            name: name.to_string(),
            header,
        })
    }
}

impl FromStr for SheetSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for SheetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.header {
            HeaderRow::Row(1) => write!(f, "{}", self.name),
            header => write!(f, "{}:{}", self.name, header),
        }
    }
}

/// Trim column names and suffix repeats with `_1`, `_2`, ...
pub fn normalize_headers<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    let mut seen: AHashMap<String, usize> = AHashMap::new();
    columns
        .iter()
        .map(|c| {
            let base = c.as_ref().trim().to_string();
            match seen.get_mut(&base) {
                Some(count) => {
                    *count += 1;
                    format!("{}_{}", base, count)
                }
                None => {
                    seen.insert(base.clone(), 0);
                    base
                }
            }
        })
        .collect()
}

/// Guess the 1-based header row from the first rows of a sheet
///
/// Each row is scored by the number of distinct non-empty, non-numeric cell
/// texts; the first row with the best score wins. Returns 1 for an empty
/// sample.
pub fn infer_header_row<R, C>(rows: &[R]) -> usize
where
    R: AsRef<[Option<C>]>,
    C: AsRef<str>,
{
    let mut best_row = 0;
    let mut best_score = None;

    for (idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let mut tokens: Vec<&str> = AsRef::<[Option<C>]>::as_ref(row)
            .iter()
            .flatten()
            .map(|cell| AsRef::<str>::as_ref(cell).trim())
            .filter(|cell| !cell.is_empty() && !regex_is_match!(r"^\d+(\.\d+)?$", cell))
            .collect();
        tokens.sort_unstable();
        tokens.dedup();

        let score = tokens.len();
        if best_score.map_or(true, |best| score > best) {
            best_score = Some(score);
            best_row = idx;
        }
    }

    best_row + 1
}
