//! Join registry
//!
//! A query holds at most one join per related entity *type*. Predicates and
//! orderings that reach into a related entity ask the registry for a join; the
//! first request creates a `LEFT JOIN` with a fresh alias, later requests for the
//! same entity type reuse it, even when they come from a different field.

/// Alias of the root entity's table in generated SQL.
pub const ROOT_ALIAS: &str = "t";

/// Static description of how a related entity is reached from its parent.
///
/// Emitted by the finder generator for every complex field, e.g. for
/// `Invoice.customer` the spec is
/// `customers ON customers.id = invoices.customer_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinSpec {
    /// Identity of the related entity type (`Entity::ENTITY_NAME`)
    pub entity: &'static str,
    /// Table of the related entity
    pub table: &'static str,
    /// Column on the parent side of the join
    pub local_column: &'static str,
    /// Column on the related side of the join
    pub foreign_column: &'static str,
}

impl JoinSpec {
    pub const fn new(
        entity: &'static str,
        table: &'static str,
        local_column: &'static str,
        foreign_column: &'static str,
    ) -> Self {
        Self {
            entity,
            table,
            local_column,
            foreign_column,
        }
    }
}

/// A join materialized for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinHandle {
    /// SQL alias of the joined table (`j1`, `j2`, ...)
    pub alias: String,
    /// Alias of the table the join hangs off
    pub parent_alias: String,
    pub spec: JoinSpec,
}

impl JoinHandle {
    /// Generate the join clause SQL
    pub fn to_sql(&self) -> String {
        format!(
            "LEFT JOIN {} AS {} ON {}.{} = {}.{}",
            self.spec.table,
            self.alias,
            self.alias,
            self.spec.foreign_column,
            self.parent_alias,
            self.spec.local_column
        )
    }
}

/// The set of joins already created for a query, keyed by related entity type.
#[derive(Debug, Clone, Default)]
pub struct JoinRegistry {
    joins: Vec<JoinHandle>,
}

impl JoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a chain of joins starting at the root entity and return the
    /// alias that columns at the end of the chain must be qualified with.
    ///
    /// An empty chain addresses the root entity itself.
    pub fn resolve_chain(&mut self, chain: &[JoinSpec]) -> String {
        let mut alias = ROOT_ALIAS.to_string();
        for spec in chain {
            alias = self.resolve(spec, &alias).alias.clone();
        }
        alias
    }

    /// Return the join for `spec.entity`, creating it if this query has none yet.
    pub fn resolve(&mut self, spec: &JoinSpec, parent_alias: &str) -> &JoinHandle {
        if let Some(index) = self.position(spec.entity) {
            tracing::trace!(entity = spec.entity, alias = %self.joins[index].alias, "Reusing existing join");
            return &self.joins[index];
        }

        let index = self.joins.len();
        let alias = format!("j{}", index + 1);
        tracing::trace!(entity = spec.entity, alias = %alias, table = spec.table, "Creating join");

        self.joins.push(JoinHandle {
            alias,
            parent_alias: parent_alias.to_string(),
            spec: *spec,
        });
        &self.joins[index]
    }

    /// Look up the join created for an entity type.
    pub fn get(&self, entity: &str) -> Option<&JoinHandle> {
        self.position(entity).map(|index| &self.joins[index])
    }

    fn position(&self, entity: &str) -> Option<usize> {
        self.joins.iter().position(|join| join.spec.entity == entity)
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinHandle> {
        self.joins.iter()
    }

    /// Generate all join clauses, in creation order
    pub fn to_sql(&self) -> String {
        self.joins
            .iter()
            .map(JoinHandle::to_sql)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CUSTOMER: JoinSpec = JoinSpec::new("shop::Customer", "customers", "customer_id", "id");
    const BILLING: JoinSpec = JoinSpec::new("shop::Customer", "customers", "billing_customer_id", "id");
    const WAREHOUSE: JoinSpec = JoinSpec::new("shop::Warehouse", "warehouses", "warehouse_id", "id");
    const REGION: JoinSpec = JoinSpec::new("shop::Region", "regions", "region_id", "id");

    #[test]
    fn test_same_entity_type_shares_one_join() {
        let mut joins = JoinRegistry::new();

        let first = joins.resolve_chain(&[CUSTOMER]);
        let second = joins.resolve_chain(&[BILLING]);

        assert_eq!(first, "j1");
        assert_eq!(second, "j1");
        assert_eq!(joins.len(), 1);
        // The first field to reach the entity decides the join condition
        assert_eq!(
            joins.to_sql(),
            "LEFT JOIN customers AS j1 ON j1.id = t.customer_id"
        );
    }

    #[test]
    fn test_distinct_entity_types_get_distinct_joins() {
        let mut joins = JoinRegistry::new();

        assert_eq!(joins.resolve_chain(&[CUSTOMER]), "j1");
        assert_eq!(joins.resolve_chain(&[WAREHOUSE]), "j2");
        assert_eq!(joins.len(), 2);
    }

    #[test]
    fn test_chained_join_hangs_off_parent_alias() {
        let mut joins = JoinRegistry::new();

        let alias = joins.resolve_chain(&[WAREHOUSE, REGION]);

        assert_eq!(alias, "j2");
        assert_eq!(joins.get("shop::Region").unwrap().parent_alias, "j1");
        assert_eq!(
            joins.to_sql(),
            "LEFT JOIN warehouses AS j1 ON j1.id = t.warehouse_id \
             LEFT JOIN regions AS j2 ON j2.id = j1.region_id"
        );
    }

    #[test]
    fn test_empty_chain_is_root() {
        let mut joins = JoinRegistry::new();
        assert_eq!(joins.resolve_chain(&[]), ROOT_ALIAS);
        assert!(joins.is_empty());
    }
}
