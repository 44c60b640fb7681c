//! Template transform
//!
//! A template maps each output column to an expression over the source row.
//! Rows are transformed one at a time; every failing cell is recorded in an
//! [`ErrorReport`] and, unless the transform is set to fail on the first
//! error, the cell gets the value `"[Error: <message>]"`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use xcelsql_expr::{CompiledExpr, EvalError, EvalResult, Interpreter, Row, Value};

/// One record of a mapping sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub template_column: String,
    #[serde(default)]
    pub source_expression: Option<String>,
}

impl MappingRecord {
    pub fn new(template_column: impl Into<String>, source_expression: impl Into<String>) -> Self {
        Self {
            template_column: template_column.into(),
            source_expression: Some(source_expression.into()),
        }
    }
}

/// Output columns and the expression computing each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMapping {
    columns: Vec<(String, String)>,
}

impl TemplateMapping {
    /// Build a mapping from mapping-sheet records
    ///
    /// Records with a blank expression are skipped; a later record for the
    /// same column replaces an earlier one. Output columns follow
    /// `template_columns` when given, else record order. Columns without an
    /// expression are dropped with a warning.
    pub fn from_records(
        records: &[MappingRecord],
        template_columns: Option<&[String]>,
    ) -> Result<Self> {
        let mut expressions: BTreeMap<String, String> = BTreeMap::new();
        let mut record_order: Vec<String> = Vec::new();

        for record in records {
            let column = record.template_column.trim();
            if column.is_empty() {
                return Err(Error::Template(
                    "mapping record has a blank template_column".into(),
                ));
            }
            let expression = match record.source_expression.as_deref().map(str::trim) {
                Some(e) if !e.is_empty() => e,
                _ => continue,
            };
            if expressions
                .insert(column.to_string(), expression.to_string())
                .is_none()
            {
                record_order.push(column.to_string());
            }
        }

        let wanted: Vec<String> = match template_columns {
            Some(cols) => cols.iter().map(|c| c.trim().to_string()).collect(),
            None => record_order,
        };

        let mut columns = Vec::with_capacity(wanted.len());
        for name in &wanted {
            if let Some(expression) = expressions.get(name) {
                columns.push((name.clone(), expression.clone()));
            }
        }

        let dropped = wanted.len() - columns.len();
        if dropped > 0 {
            warn!(dropped, "template columns ignored (no mapping expression)");
        }

        Ok(Self { columns })
    }

    /// Copy each column through unchanged
    pub fn identity<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|c| {
                    let c = c.into();
                    (c.clone(), c)
                })
                .collect(),
        }
    }

    /// Output column names in order
    pub fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(|(c, _)| c.as_str()).collect()
    }

    /// Expression for an output column
    pub fn expression(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, e)| e.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One failed cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingErrorRecord {
    /// 1-based source row
    pub row: usize,
    pub expression: String,
    pub error: String,
}

/// Failed cells grouped by output column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorReport {
    columns: BTreeMap<String, Vec<MappingErrorRecord>>,
}

impl ErrorReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a failure for `column`
    pub fn record(&mut self, column: &str, record: MappingErrorRecord) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .push(record);
    }

    /// Failures for one column
    pub fn get(&self, column: &str) -> &[MappingErrorRecord] {
        self.columns.get(column).map_or(&[], Vec::as_slice)
    }

    /// Columns with at least one failure
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Total number of failed cells
    pub fn total(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Serialize as `{column: [{row, expression, error}]}`
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Column expression parsed once for the whole transform
struct ColumnPlan<'a> {
    name: &'a str,
    source: &'a str,
    compiled: Option<CompiledExpr>,
}

impl ColumnPlan<'_> {
    fn evaluate(&self, interpreter: &Interpreter, row: &Row) -> EvalResult<Value> {
        match &self.compiled {
            Some(expr) => interpreter.evaluate_compiled(expr, row),
            // Does not parse; evaluate from source so the fallback gets a chance
            None => interpreter.evaluate(self.source, row),
        }
    }
}

/// Apply `mapping` to every row
///
/// Returns the transformed rows together with the failures. With
/// `fail_on_error` the first failure aborts the transform with
/// [`Error::Mapping`].
pub fn apply_template(
    rows: &[Row],
    mapping: &TemplateMapping,
    interpreter: &Interpreter,
    fail_on_error: bool,
) -> Result<(Vec<Row>, ErrorReport)> {
    let plans: Vec<ColumnPlan<'_>> = mapping
        .columns
        .iter()
        .map(|(name, source)| ColumnPlan {
            name,
            source,
            compiled: interpreter.compile(source).ok(),
        })
        .collect();

    let mut report = ErrorReport::new();
    let mut output = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;
        let mut target = Row::new();
        for plan in &plans {
            let value = match plan.evaluate(interpreter, row) {
                Ok(value) => value,
                Err(source) => {
                    report.record(
                        plan.name,
                        MappingErrorRecord {
                            row: row_number,
                            expression: plan.source.to_string(),
                            error: source.to_string(),
                        },
                    );
                    if fail_on_error {
                        return Err(mapping_error(plan.name, row_number, source));
                    }
                    Value::Str(format!("[Error: {}]", source))
                }
            };
            target.insert(plan.name.to_string(), value);
        }
        output.push(target);
    }

    info!(
        rows = output.len(),
        columns = plans.len(),
        errors = report.total(),
        "template transform finished"
    );
    Ok((output, report))
}

fn mapping_error(column: &str, row: usize, source: EvalError) -> Error {
    Error::Mapping {
        column: column.to_string(),
        row,
        source,
    }
}
