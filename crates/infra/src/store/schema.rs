//! SQLite schema and its migrations.
//!
//! Migrations are applied in version order and recorded in `schema_migrations`, so
//! running [`migrate`] against an already-current database is a no-op.

use chrono::Utc;
use sqlx::SqlitePool;

use super::{StoreResult, sqlite::map_sqlx_error};

struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "workshop_records",
    statements: &[
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            national_id TEXT UNIQUE,
            phone TEXT,
            email TEXT,
            address TEXT,
            postal_code TEXT,
            town TEXT,
            province TEXT,
            registered_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plate TEXT NOT NULL UNIQUE,
            make TEXT,
            model TEXT,
            kind TEXT,
            year INTEGER,
            color TEXT,
            owner_id INTEGER REFERENCES customers(id),
            registered_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id),
            number TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            base REAL NOT NULL DEFAULT 0,
            discount_pct REAL NOT NULL DEFAULT 0,
            discount_amount REAL NOT NULL DEFAULT 0,
            tax_pct REAL NOT NULL DEFAULT 21,
            tax_amount REAL NOT NULL DEFAULT 0,
            total REAL NOT NULL DEFAULT 0,
            submitted INTEGER NOT NULL DEFAULT 0,
            submitted_at TEXT
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS interventions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            vehicle_id INTEGER NOT NULL REFERENCES vehicles(id),
            customer_id INTEGER REFERENCES customers(id),
            date TEXT NOT NULL,
            odometer_km INTEGER,
            description TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,
            labor_hours REAL NOT NULL DEFAULT 0,
            invoice_id INTEGER REFERENCES invoices(id)
        )
        "#,
        "CREATE INDEX IF NOT EXISTS idx_interventions_vehicle ON interventions(vehicle_id)",
        "CREATE INDEX IF NOT EXISTS idx_interventions_invoice ON interventions(invoice_id)",
        "CREATE INDEX IF NOT EXISTS idx_invoices_customer ON invoices(customer_id)",
    ],
}];

/// Applies every pending migration. Returns how many were applied.
pub async fn migrate(pool: &SqlitePool) -> StoreResult<usize> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create schema_migrations", e))?;

    let mut applied = 0;
    for migration in MIGRATIONS {
        let done: Option<i64> =
            sqlx::query_scalar("SELECT version FROM schema_migrations WHERE version = ?1")
                .bind(migration.version)
                .fetch_optional(pool)
                .await
                .map_err(|e| map_sqlx_error("read schema_migrations", e))?;
        if done.is_some() {
            continue;
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin migration", e))?;
        for statement in migration.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(migration.name, e))?;
        }
        sqlx::query(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
        )
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record migration", e))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit migration", e))?;

        tracing::info!(version = migration.version, name = migration.name, "applied migration");
        applied += 1;
    }

    Ok(applied)
}
