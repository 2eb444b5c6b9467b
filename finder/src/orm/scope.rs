//! Typed query scopes
//!
//! Generated code exposes one method per entity field. Scalar, textual,
//! temporal and collection fields return a [`FieldClause`]; complex fields
//! return the related entity's scope, whose columns are reached through a join.
//! Every clause hands back the scope it came from, so calls chain:
//!
//! ```ignore
//! let invoices = Invoice::finder(&pool)
//!     .total().greater_than(100.0)
//!     .customer().name().equal_to("Acme")
//!     .get_items()
//!     .await?;
//! ```

use sqlx::sqlite::SqlitePool;

use super::builder::Finder;
use super::joins::JoinSpec;
use super::predicate::{Column, Operator};
use super::traits::{Entity, IntoOperand, Ordered, SortDirection};
use crate::error::FinderError;

/// A position in a typed query: the root finder, or a nested scope reached
/// through one or more joins. All scopes of one query share its root finder.
#[allow(async_fn_in_trait)]
pub trait FinderScope: Sized {
    type Root: Entity;

    fn finder_mut(&mut self) -> &mut Finder<Self::Root>;

    fn into_finder(self) -> Finder<Self::Root>;

    /// Cap the number of returned rows; `None` or `0` removes the cap.
    fn max_items(mut self, limit: impl Into<Option<u32>>) -> Self {
        self.finder_mut().state_mut().set_limit(limit.into());
        self
    }

    fn distinct(mut self, distinct: bool) -> Self {
        self.finder_mut().state_mut().set_distinct(distinct);
        self
    }

    /// See [`Finder::find_item`].
    async fn get_item(self) -> Result<Option<Self::Root>, FinderError> {
        self.into_finder().find_item().await
    }

    /// See [`Finder::find_items`].
    async fn get_items(self) -> Result<Vec<Self::Root>, FinderError> {
        self.into_finder().find_items().await
    }

    async fn count(self) -> Result<i64, FinderError> {
        self.into_finder().count().await
    }
}

/// An entity with a generated typed query API.
pub trait Queryable: Entity + Sized {
    /// Scope for queries rooted at this entity
    type Finder: FinderScope<Root = Self>;

    /// Scope for this entity reached through joins from another query
    type Scope<S: FinderScope>: FinderScope<Root = S::Root>;

    fn finder(pool: &SqlitePool) -> Self::Finder;

    /// Enter this entity's scope from `outer`, where `chain` is the join path
    /// from the query root to this entity.
    fn scope<S: FinderScope>(outer: S, chain: Vec<JoinSpec>) -> Self::Scope<S>;
}

/// One field of a scope, waiting for its condition.
#[must_use = "a field clause adds nothing until a condition is applied"]
pub struct FieldClause<S, T> {
    scope: S,
    column: Column<T>,
}

impl<S: FinderScope, T> FieldClause<S, T> {
    pub fn new(scope: S, column: Column<T>) -> Self {
        Self { scope, column }
    }

    pub fn column(&self) -> &Column<T> {
        &self.column
    }

    fn compare(mut self, operator: Operator, value: impl IntoOperand<T>) -> S {
        self.scope
            .finder_mut()
            .state_mut()
            .compare(&self.column, operator, value);
        self.scope
    }

    pub fn equal_to(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::Equal, value)
    }

    pub fn not_equal_to(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::NotEqual, value)
    }

    pub fn is_in<V: IntoOperand<T>>(mut self, values: impl IntoIterator<Item = V>) -> S {
        self.scope
            .finder_mut()
            .state_mut()
            .is_in(&self.column, values);
        self.scope
    }

    pub fn order_by(mut self, direction: SortDirection) -> S {
        self.scope
            .finder_mut()
            .state_mut()
            .order_by(&self.column, direction);
        self.scope
    }
}

impl<S: FinderScope, T: Ordered> FieldClause<S, T> {
    pub fn less_than(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::LessThan, value)
    }

    pub fn less_or_equal(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::LessOrEqual, value)
    }

    pub fn greater_than(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::GreaterThan, value)
    }

    pub fn greater_or_equal(self, value: impl IntoOperand<T>) -> S {
        self.compare(Operator::GreaterOrEqual, value)
    }

    /// Inclusive range on both ends
    pub fn between(mut self, from: impl IntoOperand<T>, to: impl IntoOperand<T>) -> S {
        self.scope
            .finder_mut()
            .state_mut()
            .between(&self.column, from, to);
        self.scope
    }
}
