//! Runtime query builder
//!
//! [`Finder`] accumulates predicates, ordering, a result cap and the distinct
//! flag for one entity type, then renders them as one parameterized SQL
//! statement executed through sqlx. Related entities are reached through the
//! query's [`JoinRegistry`], so every related entity type is joined once.

use std::marker::PhantomData;

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::joins::{JoinRegistry, ROOT_ALIAS};
use super::predicate::{Column, FieldPath, Operand, Operator, Predicate};
use super::traits::{Entity, IntoOperand, Ordered, SortDirection, SqlValue};
use crate::error::FinderError;

// ============================================================================
// Query state
// ============================================================================

/// Ordering applied to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub path: FieldPath,
    pub alias: String,
    pub direction: SortDirection,
}

/// Everything a [`Finder`] has accumulated so far.
///
/// Clause methods skip missing operands instead of comparing against NULL.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    predicates: Vec<Predicate>,
    order_by: Option<OrderBy>,
    limit: Option<u32>,
    distinct: bool,
    joins: JoinRegistry,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn joins(&self) -> &JoinRegistry {
        &self.joins
    }

    pub fn ordering(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    fn push(&mut self, path: &FieldPath, operator: Operator, operand: Operand) {
        let alias = self.joins.resolve_chain(&path.joins);
        self.predicates.push(Predicate {
            path: path.clone(),
            alias,
            operator,
            operand,
        });
    }

    /// Add a single-operand comparison. A missing operand adds nothing.
    pub fn compare<T>(&mut self, column: &Column<T>, operator: Operator, value: impl IntoOperand<T>) {
        if let Some(value) = value.into_operand() {
            self.push(column.path(), operator, Operand::Single(value));
        }
    }

    /// Add an inclusive range. With one bound missing only the other bound is
    /// applied; with both missing nothing is added.
    pub fn between<T: Ordered>(
        &mut self,
        column: &Column<T>,
        from: impl IntoOperand<T>,
        to: impl IntoOperand<T>,
    ) {
        match (from.into_operand(), to.into_operand()) {
            (Some(from), Some(to)) => {
                self.push(column.path(), Operator::Between, Operand::Range(from, to))
            }
            (Some(from), None) => {
                self.push(column.path(), Operator::GreaterOrEqual, Operand::Single(from))
            }
            (None, Some(to)) => {
                self.push(column.path(), Operator::LessOrEqual, Operand::Single(to))
            }
            (None, None) => {}
        }
    }

    /// Add a membership test. Missing items are dropped; an empty list matches
    /// no rows.
    pub fn is_in<T, V>(&mut self, column: &Column<T>, values: impl IntoIterator<Item = V>)
    where
        V: IntoOperand<T>,
    {
        let values = values
            .into_iter()
            .filter_map(IntoOperand::into_operand)
            .collect();
        self.push(column.path(), Operator::In, Operand::List(values));
    }

    /// Order by a column, replacing any previous ordering.
    pub fn order_by<T>(&mut self, column: &Column<T>, direction: SortDirection) {
        let alias = self.joins.resolve_chain(&column.path().joins);
        self.order_by = Some(OrderBy {
            path: column.path().clone(),
            alias,
            direction,
        });
    }

    /// Cap the number of returned rows; `None` or `0` removes the cap.
    pub fn set_limit(&mut self, limit: Option<u32>) {
        self.limit = limit.filter(|n| *n > 0);
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    fn from_where_sql<E: Entity>(&self, values: &mut Vec<SqlValue>) -> String {
        let mut sql = format!(" FROM {} AS {}", E::TABLE_NAME, ROOT_ALIAS);

        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.joins.to_sql());
        }

        if !self.predicates.is_empty() {
            let conditions: Vec<String> = self
                .predicates
                .iter()
                .map(|predicate| predicate.to_sql(values))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        sql
    }

    /// Render the SELECT statement for `E`, capped at `cap` rows.
    pub fn select_sql<E: Entity>(&self, cap: Option<u32>) -> (String, Vec<SqlValue>) {
        let mut values = Vec::new();

        let columns = E::column_names()
            .iter()
            .map(|column| format!("{}.{}", ROOT_ALIAS, column))
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "SELECT {}{}",
            if self.distinct { "DISTINCT " } else { "" },
            columns
        );
        sql.push_str(&self.from_where_sql::<E>(&mut values));

        if let Some(order) = &self.order_by {
            sql.push_str(&format!(
                " ORDER BY {}.{} {}",
                order.alias,
                order.path.column,
                order.direction.to_sql()
            ));
        }

        if let Some(cap) = cap {
            sql.push_str(&format!(" LIMIT {}", cap));
        }

        (sql, values)
    }

    /// Render a COUNT over the rows the SELECT would return, ignoring the cap.
    pub fn count_sql<E: Entity>(&self) -> (String, Vec<SqlValue>) {
        let mut values = Vec::new();

        let columns = E::column_names()
            .iter()
            .map(|column| format!("{}.{}", ROOT_ALIAS, column))
            .collect::<Vec<_>>()
            .join(", ");

        let inner = format!(
            "SELECT {}{}{}",
            if self.distinct { "DISTINCT " } else { "" },
            columns,
            self.from_where_sql::<E>(&mut values)
        );

        (format!("SELECT COUNT(*) FROM ({}) AS c", inner), values)
    }
}

// ============================================================================
// Finder
// ============================================================================

/// Predicate-based query builder for one entity type.
///
/// Clause methods consume and return the builder. Terminal methods consume it
/// too, so each accumulated query runs at most once.
///
/// ```ignore
/// let invoices = Finder::<Invoice>::new(&pool)
///     .greater_than(&Invoice::TOTAL, 100.0)
///     .equal_to(&Invoice::TOTAL_CURRENCY, "EUR")
///     .order_by(&Invoice::ISSUED_ON, SortDirection::Desc)
///     .max_items(20)
///     .find_items()
///     .await?;
/// ```
pub struct Finder<E: Entity> {
    pool: SqlitePool,
    state: QueryState,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Finder<E> {
    /// Create a finder over an open store session.
    pub fn new(pool: &SqlitePool) -> Self {
        Self {
            pool: pool.clone(),
            state: QueryState::new(),
            _marker: PhantomData,
        }
    }

    /// Create a finder from a session that may not have been established.
    pub fn from_session(pool: Option<&SqlitePool>) -> Result<Self, FinderError> {
        pool.map(Self::new).ok_or(FinderError::MissingSession)
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    pub fn equal_to<T>(mut self, column: &Column<T>, value: impl IntoOperand<T>) -> Self {
        self.state.compare(column, Operator::Equal, value);
        self
    }

    pub fn not_equal_to<T>(mut self, column: &Column<T>, value: impl IntoOperand<T>) -> Self {
        self.state.compare(column, Operator::NotEqual, value);
        self
    }

    pub fn less_than<T: Ordered>(mut self, column: &Column<T>, value: impl IntoOperand<T>) -> Self {
        self.state.compare(column, Operator::LessThan, value);
        self
    }

    pub fn less_or_equal<T: Ordered>(
        mut self,
        column: &Column<T>,
        value: impl IntoOperand<T>,
    ) -> Self {
        self.state.compare(column, Operator::LessOrEqual, value);
        self
    }

    pub fn greater_than<T: Ordered>(
        mut self,
        column: &Column<T>,
        value: impl IntoOperand<T>,
    ) -> Self {
        self.state.compare(column, Operator::GreaterThan, value);
        self
    }

    pub fn greater_or_equal<T: Ordered>(
        mut self,
        column: &Column<T>,
        value: impl IntoOperand<T>,
    ) -> Self {
        self.state.compare(column, Operator::GreaterOrEqual, value);
        self
    }

    /// Inclusive range on both ends
    pub fn between<T: Ordered>(
        mut self,
        column: &Column<T>,
        from: impl IntoOperand<T>,
        to: impl IntoOperand<T>,
    ) -> Self {
        self.state.between(column, from, to);
        self
    }

    pub fn is_in<T, V: IntoOperand<T>>(
        mut self,
        column: &Column<T>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.state.is_in(column, values);
        self
    }

    pub fn order_by<T>(mut self, column: &Column<T>, direction: SortDirection) -> Self {
        self.state.order_by(column, direction);
        self
    }

    pub fn max_items(mut self, limit: impl Into<Option<u32>>) -> Self {
        self.state.set_limit(limit.into());
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.state.set_distinct(distinct);
        self
    }

    /// The SELECT statement `find_items` would run, with its bound values.
    pub fn to_sql(&self) -> (String, Vec<SqlValue>) {
        self.state.select_sql::<E>(self.state.limit())
    }

    /// Fetch the single matching entity.
    ///
    /// Returns `Ok(None)` when nothing matches and [`FinderError::NotUnique`]
    /// when more than one row does.
    pub async fn find_item(self) -> Result<Option<E>, FinderError> {
        // Two rows are enough to tell "one" from "several"
        let cap = self.state.limit().map_or(2, |limit| limit.min(2));
        let (sql, values) = self.state.select_sql::<E>(Some(cap));
        let rows = self.fetch_rows(&sql, &values).await?;

        match rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(E::from_row(row)?)),
            _ => Err(FinderError::NotUnique {
                entity: E::ENTITY_NAME,
            }),
        }
    }

    /// Fetch every matching entity, honoring `max_items`.
    pub async fn find_items(self) -> Result<Vec<E>, FinderError> {
        let (sql, values) = self.to_sql();
        let rows = self.fetch_rows(&sql, &values).await?;

        let items = rows
            .iter()
            .map(E::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Count matching rows. The `max_items` cap is ignored.
    pub async fn count(self) -> Result<i64, FinderError> {
        let (sql, values) = self.state.count_sql::<E>();
        tracing::debug!(entity = E::ENTITY_NAME, sql = %sql, params = values.len(), "Executing finder count");

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = value.bind_to_query(query);
        }

        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn fetch_rows(&self, sql: &str, values: &[SqlValue]) -> Result<Vec<SqliteRow>, FinderError> {
        tracing::debug!(entity = E::ENTITY_NAME, sql = %sql, params = values.len(), "Executing finder query");

        let mut query = sqlx::query(sql);
        for value in values {
            query = value.bind_to_query(query);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }
}

impl<E: Entity> std::fmt::Debug for Finder<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finder")
            .field("entity", &E::ENTITY_NAME)
            .field("state", &self.state)
            .finish()
    }
}

// ============================================================================
// Lenient results
// ============================================================================

/// Collapse a finder failure into "nothing found".
///
/// For callers that treat lookup failures as absence. The swallowed error is
/// logged at `warn`.
pub trait Lenient {
    type Output;

    fn or_absent(self) -> Self::Output;
}

impl<E> Lenient for Result<Option<E>, FinderError> {
    type Output = Option<E>;

    fn or_absent(self) -> Option<E> {
        self.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Finder lookup failed, treating as not found");
            None
        })
    }
}

impl<E> Lenient for Result<Vec<E>, FinderError> {
    type Output = Vec<E>;

    fn or_absent(self) -> Vec<E> {
        self.unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Finder lookup failed, treating as empty");
            Vec::new()
        })
    }
}
