//! Integration tests for generated finders
//!
//! These tests run derived entities against an in-memory SQLite database:
//! - Unfiltered, capped and distinct queries
//! - Join sharing between fields of the same related type
//! - Single-item outcomes and error collapse
//! - Base record columns

mod common;

use assert_matches::assert_matches;
use finder::orm::{Column, Finder, JoinSpec};
use finder::prelude::*;
use finder::FinderError;
use pretty_assertions::assert_eq;

use common::{date, empty_pool, ids, seeded_database, Customer, Document, Invoice, InvoiceLine};

// ============================================================================
// Query shape
// ============================================================================

#[tokio::test]
async fn test_no_predicates_returns_every_row() {
    let db = seeded_database().await;

    let invoices = Invoice::finder(db.pool()).get_items().await.unwrap();
    assert_eq!(invoices.len(), 5);

    let customers = db.query::<Customer>().get_items().await.unwrap();
    assert_eq!(customers.len(), 3);
}

#[tokio::test]
async fn test_invoice_scenario_uses_one_join() {
    let db = seeded_database().await;

    let finder = Invoice::finder(db.pool())
        .total()
        .greater_than(100.0)
        .customer()
        .name()
        .equal_to("Acme")
        .into_finder();

    assert_eq!(finder.state().joins().len(), 1);
    let (sql, values) = finder.to_sql();
    assert_eq!(
        sql,
        "SELECT t.id, t.total, t.issued_on, t.notes, t.tags FROM invoices AS t \
         LEFT JOIN customers AS j1 ON j1.id = t.customer_id \
         WHERE t.total > ?1 AND j1.name = ?2"
    );
    assert_eq!(values.len(), 2);

    let invoices = finder.find_items().await.unwrap();
    assert_eq!(ids(&invoices), vec![1]);
    assert_eq!(invoices[0].tags, vec!["urgent".to_string()]);
    assert_eq!(invoices[0].customer, None);
    assert_eq!(invoices[0].rendered, None);
}

#[tokio::test]
async fn test_same_related_type_shares_a_join() {
    let db = seeded_database().await;

    let shared = Invoice::finder(db.pool())
        .customer()
        .name()
        .equal_to("Acme")
        .end()
        .billing()
        .name()
        .not_equal_to("Initech")
        .into_finder();
    assert_eq!(shared.state().joins().len(), 1);

    let distinct_types = Invoice::finder(db.pool())
        .customer()
        .name()
        .equal_to("Acme")
        .end()
        .lines()
        .sku()
        .equal_to("A-1")
        .into_finder();
    assert_eq!(distinct_types.state().joins().len(), 2);
}

#[tokio::test]
async fn test_nested_scopes_chain_joins() {
    let db = seeded_database().await;

    let finder = Invoice::finder(db.pool())
        .customer()
        .region()
        .name()
        .equal_to("North")
        .into_finder();

    let (sql, _) = finder.to_sql();
    assert!(
        sql.contains(
            "LEFT JOIN customers AS j1 ON j1.id = t.customer_id \
             LEFT JOIN regions AS j2 ON j2.id = j1.region_id"
        ),
        "{sql}"
    );

    let mut found = ids(&finder.find_items().await.unwrap());
    found.sort();
    assert_eq!(found, vec![1, 2, 4]);
}

#[tokio::test]
async fn test_max_items_caps_results() {
    let db = seeded_database().await;

    let invoices = Invoice::finder(db.pool())
        .total()
        .greater_than(90.0)
        .max_items(2)
        .get_items()
        .await
        .unwrap();
    assert_eq!(invoices.len(), 2);

    let unbounded = Invoice::finder(db.pool())
        .max_items(0)
        .get_items()
        .await
        .unwrap();
    assert_eq!(unbounded.len(), 5);
}

#[tokio::test]
async fn test_distinct_removes_join_duplicates() {
    let db = seeded_database().await;

    let duplicated = Invoice::finder(db.pool())
        .lines()
        .quantity()
        .greater_than(0)
        .get_items()
        .await
        .unwrap();
    assert_eq!(duplicated.len(), 6);

    let mut distinct = ids(
        &Invoice::finder(db.pool())
            .distinct(true)
            .lines()
            .quantity()
            .greater_than(0)
            .get_items()
            .await
            .unwrap(),
    );
    distinct.sort();
    assert_eq!(distinct, vec![1, 3, 4]);
}

// ============================================================================
// Clauses
// ============================================================================

#[tokio::test]
async fn test_between_dates_is_inclusive() {
    let db = seeded_database().await;

    let invoices = Invoice::finder(db.pool())
        .issued_on()
        .between(date(2024, 2, 1), date(2024, 3, 1))
        .id()
        .order_by(SortDirection::Asc)
        .get_items()
        .await
        .unwrap();

    assert_eq!(ids(&invoices), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_missing_operands_are_ignored() {
    let db = seeded_database().await;

    let no_filter: Option<&str> = None;
    let invoices = Invoice::finder(db.pool())
        .notes()
        .equal_to(no_filter)
        .total()
        .less_than(None::<f64>)
        .issued_on()
        .between(Some(date(2024, 3, 1)), None::<chrono::NaiveDate>)
        .get_items()
        .await
        .unwrap();

    let mut found = ids(&invoices);
    found.sort();
    assert_eq!(found, vec![4, 5]);
}

#[tokio::test]
async fn test_membership_and_ordering() {
    let db = seeded_database().await;

    let invoices = Invoice::finder(db.pool())
        .id()
        .is_in([Some(1), None, Some(3), Some(5)])
        .total()
        .order_by(SortDirection::Desc)
        .get_items()
        .await
        .unwrap();
    assert_eq!(ids(&invoices), vec![1, 3, 5]);

    let none = Invoice::finder(db.pool())
        .id()
        .is_in(Vec::<i64>::new())
        .get_items()
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_raw_finder_with_generated_constants() {
    let db = seeded_database().await;
    let customer_name: Column<String> = Column::new("name").through(&[Invoice::CUSTOMER]);

    let invoices = Finder::<Invoice>::new(db.pool())
        .greater_or_equal(&Invoice::TOTAL, 100.0)
        .equal_to(&customer_name, "Globex")
        .find_items()
        .await
        .unwrap();

    assert_eq!(ids(&invoices), vec![3]);

    let join: JoinSpec = Invoice::LINES;
    assert_eq!(join.table, "invoice_lines");
    assert_eq!(join.local_column, "id");
    assert_eq!(join.foreign_column, "invoice_id");
}

// ============================================================================
// Terminal outcomes
// ============================================================================

#[tokio::test]
async fn test_get_item_outcomes() {
    let db = seeded_database().await;

    let found = Invoice::finder(db.pool())
        .total()
        .equal_to(400.0)
        .get_item()
        .await
        .unwrap();
    assert_eq!(found.map(|invoice| invoice.id), Some(4));

    let missing = Invoice::finder(db.pool())
        .total()
        .greater_than(1000.0)
        .get_item()
        .await
        .unwrap();
    assert_eq!(missing, None);

    let ambiguous = Invoice::finder(db.pool())
        .customer()
        .name()
        .equal_to("Acme")
        .get_item()
        .await;
    assert_matches!(ambiguous, Err(FinderError::NotUnique { .. }));
}

#[tokio::test]
async fn test_count_ignores_cap() {
    let db = seeded_database().await;

    let count = Invoice::finder(db.pool())
        .customer()
        .region()
        .name()
        .equal_to("North")
        .max_items(1)
        .count()
        .await
        .unwrap();

    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_store_errors_and_lenient_collapse() {
    let pool = empty_pool().await;

    let result = Invoice::finder(&pool).get_items().await;
    assert_matches!(result, Err(FinderError::Store(_)));

    let items = InvoiceLine::finder(&pool).get_items().await.or_absent();
    assert!(items.is_empty());

    let item = Customer::finder(&pool).id().equal_to(1).get_item().await.or_absent();
    assert_eq!(item, None);
}

// ============================================================================
// Base record
// ============================================================================

#[tokio::test]
async fn test_base_record_columns() {
    let db = seeded_database().await;

    let document = Document::finder(db.pool())
        .guid()
        .equal_to("doc-2")
        .get_item()
        .await
        .unwrap()
        .unwrap();

    assert_eq!(document.title, "Privacy");
    assert_eq!(document.record.guid, "doc-2");
    assert_eq!(document.record.updated_by.as_deref(), Some("ana"));
    assert_eq!(
        document.record.created_on,
        Some(date(2024, 2, 1).and_hms_opt(9, 30, 0).unwrap())
    );

    let by_author = Document::finder(db.pool())
        .created_by()
        .equal_to("ana")
        .get_items()
        .await
        .unwrap();
    assert_eq!(by_author.len(), 1);
    assert_eq!(<Document as Entity>::PRIMARY_KEY, "guid");
}
