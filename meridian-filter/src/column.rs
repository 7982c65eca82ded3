//! Structured column-filter compilation for the internal REST surface.
//!
//! Filters arrive as a JSON array of `{field, op, value}`. Field names
//! that fail identifier validation skip only that entry — clients send
//! imprecise field names and the original surface tolerated them — but
//! a malformed numeric value is the caller's own input and fails the
//! request.

use crate::params::{BindValue, CompiledPredicate};
use crate::FilterError;
use meridian_core::is_valid_identifier;
use serde::Deserialize;

/// Comparison operator for a column filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Startswith,
}

/// One structured filter entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnFilter {
    pub field: String,
    pub op: ColumnOp,
    pub value: String,
}

/// Compile column filters onto an existing predicate.
pub fn compile_column_filters(
    predicate: &mut CompiledPredicate,
    filters: &[ColumnFilter],
) -> Result<(), FilterError> {
    for filter in filters {
        if !is_valid_identifier(&filter.field) {
            tracing::debug!(field = %filter.field, "skipping filter with invalid field name");
            continue;
        }
        let accessor = format!("(properties->>'{}')", filter.field);

        let clause = match filter.op {
            ColumnOp::Eq => {
                let p = predicate.params.push(BindValue::Text(filter.value.clone()));
                format!("{accessor} = {p}")
            }
            ColumnOp::Ne => {
                let p = predicate.params.push(BindValue::Text(filter.value.clone()));
                format!("{accessor} != {p}")
            }
            ColumnOp::Gt | ColumnOp::Gte | ColumnOp::Lt | ColumnOp::Lte => {
                let number: f64 = filter.value.parse().map_err(|_| {
                    FilterError::Validation(format!(
                        "filter on '{}' requires a numeric value, got '{}'",
                        filter.field, filter.value
                    ))
                })?;
                let op = match filter.op {
                    ColumnOp::Gt => ">",
                    ColumnOp::Gte => ">=",
                    ColumnOp::Lt => "<",
                    ColumnOp::Lte => "<=",
                    _ => unreachable!(),
                };
                let p = predicate.params.push(BindValue::Float(number));
                format!("{accessor}::numeric {op} {p}")
            }
            ColumnOp::Contains => {
                let pattern = format!("%{}%", escape_like(&filter.value));
                let p = predicate.params.push(BindValue::Text(pattern));
                format!("{accessor} ILIKE {p}")
            }
            ColumnOp::Startswith => {
                let pattern = format!("{}%", escape_like(&filter.value));
                let p = predicate.params.push(BindValue::Text(pattern));
                format!("{accessor} ILIKE {p}")
            }
        };
        predicate.clauses.push(clause);
    }
    Ok(())
}

/// Escape LIKE metacharacters in a literal substring value.
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '%' || c == '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(field: &str, op: ColumnOp, value: &str) -> ColumnFilter {
        ColumnFilter {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    #[test]
    fn eq_binds_text() {
        let mut pred = CompiledPredicate::new();
        compile_column_filters(&mut pred, &[filter("status", ColumnOp::Eq, "active")]).unwrap();
        assert_eq!(pred.clauses, vec!["(properties->>'status') = $1"]);
        assert_eq!(
            pred.params.values(),
            &[BindValue::Text("active".to_string())]
        );
    }

    #[test]
    fn numeric_ops_cast_and_bind_float() {
        let mut pred = CompiledPredicate::new();
        compile_column_filters(&mut pred, &[filter("pop", ColumnOp::Gte, "1000")]).unwrap();
        assert_eq!(pred.clauses, vec!["(properties->>'pop')::numeric >= $1"]);
        assert_eq!(pred.params.values(), &[BindValue::Float(1000.0)]);
    }

    #[test]
    fn malformed_numeric_value_fails() {
        let mut pred = CompiledPredicate::new();
        let err = compile_column_filters(&mut pred, &[filter("pop", ColumnOp::Lt, "abc")]);
        assert!(err.is_err());
    }

    #[test]
    fn invalid_field_name_is_skipped_not_fatal() {
        let mut pred = CompiledPredicate::new();
        compile_column_filters(
            &mut pred,
            &[
                filter("bad field!", ColumnOp::Eq, "x"),
                filter("good", ColumnOp::Eq, "y"),
            ],
        )
        .unwrap();
        assert_eq!(pred.clauses.len(), 1);
        assert!(pred.clauses[0].contains("'good'"));
    }

    #[test]
    fn contains_escapes_metacharacters() {
        let mut pred = CompiledPredicate::new();
        compile_column_filters(&mut pred, &[filter("name", ColumnOp::Contains, "50%")]).unwrap();
        assert_eq!(
            pred.params.values(),
            &[BindValue::Text("%50\\%%".to_string())]
        );
    }

    #[test]
    fn each_entry_gets_its_own_placeholder() {
        let mut pred = CompiledPredicate::new();
        compile_column_filters(
            &mut pred,
            &[
                filter("a", ColumnOp::Eq, "1"),
                filter("b", ColumnOp::Eq, "2"),
            ],
        )
        .unwrap();
        assert!(pred.clauses[0].ends_with("$1"));
        assert!(pred.clauses[1].ends_with("$2"));
    }
}
