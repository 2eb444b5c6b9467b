//! Finder errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinderError {
    /// The finder was requested without an open store session
    #[error("no database session available for the finder")]
    MissingSession,

    /// A single-item lookup matched more than one row
    #[error("query for {entity} matched more than one row")]
    NotUnique { entity: &'static str },

    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}
