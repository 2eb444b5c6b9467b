//! Finder ORM layer
//!
//! - `traits`: entity metadata, row decoding, column types and operands
//! - `predicate`: typed columns and WHERE conditions
//! - `joins`: one join per related entity type
//! - `builder`: the runtime `Finder` query builder
//! - `scope`: typed scopes used by generated per-entity APIs
//! - `model`: the shared base record

pub mod builder;
pub mod joins;
pub mod model;
pub mod predicate;
pub mod scope;
pub mod traits;

pub use builder::{Finder, Lenient, OrderBy, QueryState};
pub use joins::{JoinHandle, JoinRegistry, JoinSpec, ROOT_ALIAS};
pub use model::Model;
pub use predicate::{Column, FieldPath, Operand, Operator, Predicate};
pub use scope::{FieldClause, FinderScope, Queryable};
pub use traits::{ColumnType, Entity, FromSqlRow, IntoOperand, Ordered, SortDirection, SqlValue};
