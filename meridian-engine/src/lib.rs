//! Feature query engine over the per-dataset feature stores.
//!
//! Every operation is scoped to a [`StoreTable`], a table name that has
//! already passed identifier validation; nothing in this crate puts an
//! unvalidated identifier or a client value into SQL text. Values
//! travel through `$n` placeholders built by `meridian-filter`, and
//! statement construction is split into pure SQL-building functions so
//! the generated SQL is unit-testable without a database.

pub mod introspect;
pub mod query;
pub mod store;
pub mod write;

pub use query::{Page, PageOptions, SortKey, MAX_PAGE_SIZE};
pub use store::{FeatureRow, StoreTable};
