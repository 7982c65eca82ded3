//! Positional bind-parameter accumulation.
//!
//! Fragments reference values only through `$n` placeholders handed
//! out by [`SqlParams::push`]; the engine later appends its own
//! paging parameters to the same accumulator so numbering stays
//! contiguous across the whole statement.

use serde_json::Value as JsonValue;

/// A value bound to one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    Float(f64),
    Json(JsonValue),
}

/// Ordered bind values with `$n` placeholder allocation.
#[derive(Debug, Clone, Default)]
pub struct SqlParams {
    values: Vec<BindValue>,
}

impl SqlParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its placeholder (`$1`, `$2`, ...).
    pub fn push(&mut self, value: BindValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub fn values(&self) -> &[BindValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A compiled predicate: SQL fragment plus its bind values.
///
/// Invariant: every client-supplied value in the fragment is a
/// placeholder; the fragment text itself only ever contains validated
/// identifiers and compiler-owned SQL.
#[derive(Debug, Clone, Default)]
pub struct CompiledPredicate {
    /// WHERE-clause fragments, joined with AND by the engine
    pub clauses: Vec<String>,
    /// Bind values, placeholder numbering starting at `$1`
    pub params: SqlParams,
}

impl CompiledPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no clause constrains the query.
    pub fn is_unconstrained(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Render the WHERE condition (`TRUE` when unconstrained).
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            "TRUE".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }
}
