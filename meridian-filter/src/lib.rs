//! Filter compiler: client filter expressions to parameterized SQL.
//!
//! Two input surfaces share one output type:
//!
//! - structured column filters (`[{field, op, value}]`) from the
//!   internal REST surface
//! - OGC Filter Encoding XML from WFS GetFeature and Transaction
//!
//! Compiled predicates are a SQL fragment plus ordered bind values;
//! client-supplied values never appear in the fragment text. The OGC
//! path is deliberately lenient: unparseable nodes contribute no
//! predicate rather than failing the request (see [`ogc`]).

pub mod column;
pub mod ogc;
pub mod params;

pub use column::{compile_column_filters, ColumnFilter, ColumnOp};
pub use ogc::{compile_filter_element, compile_ogc_filter, FilterNode};
pub use params::{BindValue, CompiledPredicate, SqlParams};

use thiserror::Error;

/// Filter compilation failure.
///
/// Only raised for input the caller supplied directly and explicitly
/// (a malformed numeric value, say) — structural problems in OGC XML
/// degrade to "no predicate" instead, per the WFS read-path contract.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("{0}")]
    Validation(String),
}

impl From<FilterError> for meridian_core::GisError {
    fn from(e: FilterError) -> Self {
        match e {
            FilterError::Validation(msg) => meridian_core::GisError::Validation(msg),
        }
    }
}
