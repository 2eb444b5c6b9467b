//! Typed columns and predicates

use std::marker::PhantomData;

use super::joins::JoinSpec;
use super::traits::SqlValue;

/// Comparison and membership operators supported in WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// Inclusive on both bounds
    Between,
    In,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Between => "BETWEEN",
            Operator::In => "IN",
        }
    }
}

/// Location of a column: a root column, or one reached through joins.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    /// Joins from the root entity to the column's owner (empty for root columns)
    pub joins: Vec<JoinSpec>,
    pub column: &'static str,
}

impl FieldPath {
    pub const fn root(column: &'static str) -> Self {
        Self {
            joins: Vec::new(),
            column,
        }
    }

    pub fn is_root(&self) -> bool {
        self.joins.is_empty()
    }

    /// The related entity owning this column, if it is not a root column
    pub fn related_entity(&self) -> Option<&'static str> {
        self.joins.last().map(|join| join.entity)
    }
}

/// A column of type `T`.
///
/// The type parameter carries the column's Rust type so that operands are
/// checked at compile time and ordering operators are only offered for
/// [`Ordered`](super::Ordered) types.
#[derive(Debug)]
pub struct Column<T> {
    path: FieldPath,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Column<T> {
    /// A column of the root entity
    pub const fn new(column: &'static str) -> Self {
        Self {
            path: FieldPath::root(column),
            _marker: PhantomData,
        }
    }

    /// The same column, reached through the given joins
    pub fn through(mut self, chain: &[JoinSpec]) -> Self {
        self.path.joins = chain.to_vec();
        self
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn name(&self) -> &'static str {
        self.path.column
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _marker: PhantomData,
        }
    }
}

/// Bound value(s) of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Single(SqlValue),
    Range(SqlValue, SqlValue),
    List(Vec<SqlValue>),
}

impl Operand {
    /// Number of placeholders this operand binds
    pub fn arity(&self) -> usize {
        match self {
            Operand::Single(_) => 1,
            Operand::Range(_, _) => 2,
            Operand::List(values) => values.len(),
        }
    }
}

/// One condition of a query's conjunction.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: FieldPath,
    /// Table alias the column is qualified with (root or join alias)
    pub alias: String,
    pub operator: Operator,
    pub operand: Operand,
}

impl Predicate {
    /// Render the condition, appending its bound values to `values`.
    ///
    /// Placeholders are numbered (`?1`, `?2`, ...) by position in `values`, so
    /// predicates rendered in sequence share one parameter list.
    pub fn to_sql(&self, values: &mut Vec<SqlValue>) -> String {
        let column = format!("{}.{}", self.alias, self.path.column);

        match &self.operand {
            Operand::Single(value) => {
                let placeholder = push_value(values, value);
                format!("{} {} {}", column, self.operator.as_sql(), placeholder)
            }
            Operand::Range(from, to) => {
                let low = push_value(values, from);
                let high = push_value(values, to);
                format!("{} BETWEEN {} AND {}", column, low, high)
            }
            // Membership in an empty set never holds
            Operand::List(items) if items.is_empty() => "1 = 0".to_string(),
            Operand::List(items) => {
                let placeholders: Vec<String> =
                    items.iter().map(|item| push_value(values, item)).collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
        }
    }
}

fn push_value(values: &mut Vec<SqlValue>, value: &SqlValue) -> String {
    values.push(value.clone());
    format!("?{}", values.len())
}
