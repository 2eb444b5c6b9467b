//! Base record shared by entities that embed it.
//!
//! An entity with a `Model` field gets these columns merged into its own,
//! unless it declares a field with the same column name. `guid` is the default
//! primary key of such entities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;

use super::traits::{ColumnType, FromSqlRow};

/// Identity and audit columns of a base record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub guid: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub created_on: Option<NaiveDateTime>,
    pub updated_on: Option<NaiveDateTime>,
}

impl Model {
    /// Column names of the base record, in declaration order
    pub const COLUMNS: [&'static str; 5] = [
        "guid",
        "created_by",
        "updated_by",
        "created_on",
        "updated_on",
    ];
}

impl FromSqlRow for Model {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            guid: <String as ColumnType>::decode(row, "guid")?,
            created_by: <Option<String> as ColumnType>::decode(row, "created_by")?,
            updated_by: <Option<String> as ColumnType>::decode(row, "updated_by")?,
            created_on: <Option<NaiveDateTime> as ColumnType>::decode(row, "created_on")?,
            updated_on: <Option<NaiveDateTime> as ColumnType>::decode(row, "updated_on")?,
        })
    }
}
