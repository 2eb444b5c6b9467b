//! Shared entities and fixtures for finder integration tests
//!
//! Schema: regions <- customers <- invoices -> invoice_lines, plus a
//! documents table carrying the base record columns.

#![allow(dead_code)]

use chrono::NaiveDate;
use finder::prelude::*;
use finder::{Config, Database};
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Finder)]
#[finder(table = "regions")]
pub struct Region {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Finder)]
#[finder(table = "customers")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub region: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Finder)]
#[finder(table = "invoices")]
pub struct Invoice {
    pub id: i64,
    pub total: f64,
    pub issued_on: NaiveDate,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub customer: Option<Customer>,
    #[finder(foreign_key = "billing_customer_id")]
    pub billing: Option<Customer>,
    #[finder(mapped_by = "invoice_id")]
    pub lines: Vec<InvoiceLine>,
    #[finder(skip)]
    pub rendered: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Finder)]
#[finder(table = "invoice_lines")]
pub struct InvoiceLine {
    pub id: i64,
    pub sku: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Finder)]
#[finder(table = "documents")]
pub struct Document {
    pub title: String,
    pub record: Model,
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE regions (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
    "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, region_id INTEGER REFERENCES regions(id))",
    "CREATE TABLE invoices (
        id INTEGER PRIMARY KEY,
        total REAL NOT NULL,
        issued_on TEXT NOT NULL,
        notes TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        customer_id INTEGER REFERENCES customers(id),
        billing_customer_id INTEGER REFERENCES customers(id)
    )",
    "CREATE TABLE invoice_lines (
        id INTEGER PRIMARY KEY,
        invoice_id INTEGER NOT NULL REFERENCES invoices(id),
        sku TEXT NOT NULL,
        quantity INTEGER NOT NULL
    )",
    "CREATE TABLE documents (
        guid TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_by TEXT,
        updated_by TEXT,
        created_on TEXT,
        updated_on TEXT
    )",
];

const SEED: &[&str] = &[
    "INSERT INTO regions (id, name) VALUES (1, 'North'), (2, 'South')",
    "INSERT INTO customers (id, name, region_id) VALUES (1, 'Acme', 1), (2, 'Globex', 2), (3, 'Initech', 1)",
    "INSERT INTO invoices (id, total, issued_on, notes, tags, customer_id, billing_customer_id) VALUES
        (1, 250.0, '2024-01-10', NULL, '[\"urgent\"]', 1, 2),
        (2, 80.0, '2024-02-01', NULL, '[]', 1, 1),
        (3, 120.0, '2024-02-15', NULL, '[]', 2, 1),
        (4, 400.0, '2024-03-01', NULL, '[\"urgent\",\"export\"]', 3, 3),
        (5, 99.5, '2024-03-20', 'paid late', '[]', 2, 2)",
    "INSERT INTO invoice_lines (id, invoice_id, sku, quantity) VALUES
        (1, 1, 'A-1', 2),
        (2, 1, 'B-7', 1),
        (3, 1, 'C-3', 5),
        (4, 3, 'A-1', 1),
        (5, 4, 'D-9', 10),
        (6, 4, 'B-7', 3)",
    "INSERT INTO documents (guid, title, created_by, updated_by, created_on, updated_on) VALUES
        ('doc-1', 'Terms', 'ana', NULL, '2024-01-01 10:00:00', NULL),
        ('doc-2', 'Privacy', 'bob', 'ana', '2024-02-01 09:30:00', '2024-02-03 12:00:00')",
];

/// An in-memory database with the test schema and seed data
pub async fn seeded_database() -> Database {
    let db = Database::connect(&Config::default())
        .await
        .expect("in-memory database");
    for statement in SCHEMA.iter().chain(SEED) {
        sqlx::query(statement)
            .execute(db.pool())
            .await
            .expect("fixture statement");
    }
    db
}

/// A connected in-memory database with no tables
pub async fn empty_pool() -> SqlitePool {
    Database::connect(&Config::default())
        .await
        .expect("in-memory database")
        .pool()
        .clone()
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn ids(invoices: &[Invoice]) -> Vec<i64> {
    invoices.iter().map(|invoice| invoice.id).collect()
}
