//! Core traits for the finder ORM layer
//!
//! These traits are implemented by the `#[derive(Finder)]` macro from
//! `finder-macros` (or by build-script generated sources) and consumed by the
//! runtime [`Finder`](super::Finder) builder.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, ValueRef};

/// Metadata about a persisted entity (table).
///
/// Implemented by the `#[derive(Finder)]` macro.
pub trait Entity: FromSqlRow + Send + Sync + Unpin + 'static {
    /// Type identity used to deduplicate joins (e.g. "app::models::Customer")
    const ENTITY_NAME: &'static str;

    /// The SQL table name (e.g. "customers")
    const TABLE_NAME: &'static str;

    /// The primary key column name (e.g. "id")
    const PRIMARY_KEY: &'static str;

    /// List of all persisted column names, in declaration order
    fn column_names() -> &'static [&'static str];
}

/// Trait for decoding a database row into an entity.
pub trait FromSqlRow: Sized {
    /// Decode a SQLite row into this type
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Sort direction for ORDER BY clauses.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SortDirection {
    /// Ascending (A-Z, 0-9, oldest-newest)
    #[default]
    Asc,
    /// Descending (Z-A, 9-0, newest-oldest)
    Desc,
}

impl SortDirection {
    /// Convert to SQL order string
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Represents a SQL value that can be bound to a query.
///
/// Used by predicates to collect values for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Null,
}

impl SqlValue {
    /// Bind this value to a sqlx query builder
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Date(d) => query.bind(*d),
            SqlValue::Time(t) => query.bind(*t),
            SqlValue::DateTime(dt) => query.bind(*dt),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

// ============================================================================
// Column types
// ============================================================================

/// A Rust type that can be stored in, and read back from, a single column.
pub trait ColumnType: Sized + Send {
    /// Convert the value into a bindable SQL value
    fn to_sql_value(&self) -> SqlValue;

    /// Decode the named column of a row
    fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error>;
}

/// Marker for column types that support ordering comparisons
/// (`<`, `<=`, `>`, `>=`, `BETWEEN`): numbers, booleans, chars and
/// date/time values.
pub trait Ordered: ColumnType {}

macro_rules! int_column {
    ($($ty:ty),*) => {
        $(
            impl ColumnType for $ty {
                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::Int(i64::from(*self))
                }

                fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error> {
                    row.try_get(column)
                }
            }

            impl Ordered for $ty {}
        )*
    };
}

int_column!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! native_column {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ColumnType for $ty {
                fn to_sql_value(&self) -> SqlValue {
                    SqlValue::$variant(self.clone().into())
                }

                fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error> {
                    row.try_get(column)
                }
            }
        )*
    };
}

native_column!(
    f32 => Float,
    f64 => Float,
    bool => Bool,
    String => String,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => DateTime,
    DateTime<Utc> => Timestamp,
);

impl Ordered for f32 {}
impl Ordered for f64 {}
impl Ordered for bool {}
impl Ordered for NaiveDate {}
impl Ordered for NaiveTime {}
impl Ordered for NaiveDateTime {}
impl Ordered for DateTime<Utc> {}

impl ColumnType for char {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::String(self.to_string())
    }

    fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error> {
        let text: String = row.try_get(column)?;
        text.chars().next().ok_or_else(|| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: "empty text in a char column".into(),
        })
    }
}

impl Ordered for char {}

/// Nullable columns decode SQL NULL as `None`.
impl<T: ColumnType> ColumnType for Option<T> {
    fn to_sql_value(&self) -> SqlValue {
        match self {
            Some(value) => value.to_sql_value(),
            None => SqlValue::Null,
        }
    }

    fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error> {
        if row.try_get_raw(column)?.is_null() {
            return Ok(None);
        }
        T::decode(row, column).map(Some)
    }
}

// ============================================================================
// Collection columns (stored as JSON text in SQLite)
// ============================================================================

/// Serialize a collection operand. A value serde_json rejects (such as a map
/// with non-string keys) binds as NULL, which no comparison matches.
fn json_to_sql<T: Serialize + ?Sized>(value: &T) -> SqlValue {
    match serde_json::to_string(value) {
        Ok(text) => SqlValue::String(text),
        Err(e) => {
            tracing::warn!(error = %e, "Collection value cannot be stored as JSON, binding NULL");
            SqlValue::Null
        }
    }
}

fn json_from_row<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T, sqlx::Error> {
    let text: String = row.try_get(column)?;
    serde_json::from_str(&text).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

macro_rules! json_column {
    () => {
        fn to_sql_value(&self) -> SqlValue {
            json_to_sql(self)
        }

        fn decode(row: &SqliteRow, column: &str) -> Result<Self, sqlx::Error> {
            json_from_row(row, column)
        }
    };
}

impl<T: Serialize + DeserializeOwned + Send> ColumnType for Vec<T> {
    json_column!();
}

impl<T: Serialize + DeserializeOwned + Send> ColumnType for VecDeque<T> {
    json_column!();
}

impl<T: Serialize + DeserializeOwned + Send + Eq + Hash> ColumnType for HashSet<T> {
    json_column!();
}

impl<T: Serialize + DeserializeOwned + Send + Ord> ColumnType for BTreeSet<T> {
    json_column!();
}

impl<K, V> ColumnType for HashMap<K, V>
where
    K: Serialize + DeserializeOwned + Send + Eq + Hash,
    V: Serialize + DeserializeOwned + Send,
{
    json_column!();
}

impl<K, V> ColumnType for BTreeMap<K, V>
where
    K: Serialize + DeserializeOwned + Send + Ord,
    V: Serialize + DeserializeOwned + Send,
{
    json_column!();
}

// ============================================================================
// Operands
// ============================================================================

/// Conversion of a filter argument into an optional bound value.
///
/// `None` means "no operand": the predicate is skipped rather than compared
/// against NULL, so optional filter parameters can be passed straight through.
pub trait IntoOperand<T> {
    fn into_operand(self) -> Option<SqlValue>;
}

impl<T: ColumnType> IntoOperand<T> for T {
    fn into_operand(self) -> Option<SqlValue> {
        Some(self.to_sql_value())
    }
}

impl<T: ColumnType> IntoOperand<T> for Option<T> {
    fn into_operand(self) -> Option<SqlValue> {
        self.map(|value| value.to_sql_value())
    }
}

impl IntoOperand<String> for &str {
    fn into_operand(self) -> Option<SqlValue> {
        Some(SqlValue::String(self.to_string()))
    }
}

impl IntoOperand<String> for &String {
    fn into_operand(self) -> Option<SqlValue> {
        Some(SqlValue::String(self.clone()))
    }
}

impl IntoOperand<String> for Option<&str> {
    fn into_operand(self) -> Option<SqlValue> {
        self.map(|s| SqlValue::String(s.to_string()))
    }
}
