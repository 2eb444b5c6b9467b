//! Predicate-based query builder and generated typed finders over SQLite.
//!
//! - [`orm::Finder`]: runtime builder accumulating predicates, ordering, a
//!   result cap and the distinct flag for one entity type
//! - [`orm::JoinRegistry`]: one `LEFT JOIN` per related entity type
//! - `#[derive(Finder)]`: per-entity typed scopes (`Invoice::finder(&pool)
//!   .total().greater_than(100.0)`) delegating to the runtime builder
//! - [`Config`], [`Database`] and [`logging::init_tracing`] for applications

// Generated code names this crate `::finder`, including inside its own tests
extern crate self as finder;

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod orm;

pub use config::{Config, LogFormat};
pub use db::Database;
pub use error::FinderError;
pub use orm::{
    Column, Entity, FieldClause, Finder, FinderScope, JoinSpec, Lenient, Model, Queryable,
    SortDirection,
};

/// Derive and generation marker macros
pub use finder_macros::{Finder, entity};

// Re-exported for generated code
pub use chrono;
pub use sqlx;

/// Everything needed to declare entities and run typed queries
pub mod prelude {
    // Both the `Finder` builder type and the `Finder` derive
    pub use crate::Finder;
    pub use crate::entity;
    pub use crate::error::FinderError;
    pub use crate::orm::{
        Column, Entity, FieldClause, FinderScope, Lenient, Model, Queryable, SortDirection,
    };
}
