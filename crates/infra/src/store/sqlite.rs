use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use garagebook_core::{CustomerId, InterventionId, InvoiceId, VehicleId};
use garagebook_fleet::{
    Customer, CustomerDetails, Intervention, InterventionDetails, Plate, Vehicle, VehicleDetails,
};
use garagebook_invoicing::{Invoice, InvoiceAmounts, NewInvoice};

use super::{Store, StoreError, StoreResult, UnitOfWork, schema};

/// SQLite-backed store.
///
/// Every unit of work is one SQLite transaction. Foreign keys are enforced on every
/// pooled connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connects to `url` (for example `sqlite://garagebook.db` or `sqlite::memory:`),
    /// creating the database file when missing.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("parse database url", e))?
            .create_if_missing(true)
            .foreign_keys(true);

        // Each connection to an in-memory database is its own database.
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn migrate(&self) -> StoreResult<usize> {
        schema::migrate(&self.pool).await
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(SqliteUnitOfWork { tx }))
    }
}

/// A unit of work against a [`SqliteStore`].
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

const CUSTOMER_COLUMNS: &str = "id, name, national_id, phone, email, address, postal_code, \
                                town, province, registered_at";
const VEHICLE_COLUMNS: &str =
    "id, plate, make, model, kind, year, color, owner_id, registered_at";
const INTERVENTION_COLUMNS: &str = "id, vehicle_id, customer_id, date, odometer_km, \
                                    description, price, labor_hours, invoice_id";
const INVOICE_COLUMNS: &str = "id, customer_id, number, issued_at, base, discount_pct, \
                               discount_amount, tax_pct, tax_amount, total, submitted, \
                               submitted_at";

fn customer_from_row(row: &SqliteRow) -> Result<Customer, sqlx::Error> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("id")?),
        details: CustomerDetails {
            name: row.try_get("name")?,
            national_id: row.try_get("national_id")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            address: row.try_get("address")?,
            postal_code: row.try_get("postal_code")?,
            town: row.try_get("town")?,
            province: row.try_get("province")?,
        },
        registered_at: row.try_get("registered_at")?,
    })
}

fn vehicle_from_row(row: &SqliteRow) -> Result<Vehicle, sqlx::Error> {
    let plate: String = row.try_get("plate")?;
    let plate = Plate::parse(&plate).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let owner_id: Option<i64> = row.try_get("owner_id")?;

    Ok(Vehicle {
        id: VehicleId::new(row.try_get("id")?),
        details: VehicleDetails {
            plate,
            make: row.try_get("make")?,
            model: row.try_get("model")?,
            kind: row.try_get("kind")?,
            year: row.try_get("year")?,
            color: row.try_get("color")?,
            owner_id: owner_id.map(CustomerId::new),
        },
        registered_at: row.try_get("registered_at")?,
    })
}

fn intervention_from_row(row: &SqliteRow) -> Result<Intervention, sqlx::Error> {
    let customer_id: Option<i64> = row.try_get("customer_id")?;
    let invoice_id: Option<i64> = row.try_get("invoice_id")?;

    Ok(Intervention {
        id: InterventionId::new(row.try_get("id")?),
        vehicle_id: VehicleId::new(row.try_get("vehicle_id")?),
        details: InterventionDetails {
            date: row.try_get("date")?,
            odometer_km: row.try_get("odometer_km")?,
            customer_id: customer_id.map(CustomerId::new),
            description: row.try_get("description")?,
            price: row.try_get("price")?,
            labor_hours: row.try_get("labor_hours")?,
        },
        invoice_id: invoice_id.map(InvoiceId::new),
    })
}

fn invoice_from_row(row: &SqliteRow) -> Result<Invoice, sqlx::Error> {
    Ok(Invoice {
        id: InvoiceId::new(row.try_get("id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        number: row.try_get("number")?,
        issued_at: row.try_get("issued_at")?,
        amounts: InvoiceAmounts {
            base: row.try_get("base")?,
            discount_pct: row.try_get("discount_pct")?,
            discount_amount: row.try_get("discount_amount")?,
            tax_pct: row.try_get("tax_pct")?,
            tax_amount: row.try_get("tax_amount")?,
            total: row.try_get("total")?,
        },
        submitted: row.try_get("submitted")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

pub(super) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            if db_err.is_unique_violation() {
                StoreError::UniqueViolation(msg)
            } else if db_err.is_foreign_key_violation() {
                StoreError::ForeignKeyViolation(msg)
            } else {
                StoreError::Backend(msg)
            }
        }
        sqlx::Error::RowNotFound => StoreError::RowNotFound(operation.to_string()),
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

impl SqliteUnitOfWork {
    async fn fetch_rows<'q, T>(
        &mut self,
        operation: &str,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        decode: fn(&SqliteRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Vec<T>> {
        let rows = query
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter()
            .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
            .collect()
    }

    async fn fetch_row<'q, T>(
        &mut self,
        operation: &str,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        decode: fn(&SqliteRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<Option<T>> {
        let row = query
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref()
            .map(|row| decode(row).map_err(|e| map_sqlx_error(operation, e)))
            .transpose()
    }

    async fn require<'q, T>(
        &mut self,
        what: String,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        decode: fn(&SqliteRow) -> Result<T, sqlx::Error>,
    ) -> StoreResult<T> {
        let row = self.fetch_row(&what, query, decode).await?;
        row.ok_or(StoreError::RowNotFound(what))
    }

    async fn execute<'q>(
        &mut self,
        operation: &str,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> StoreResult<sqlx::sqlite::SqliteQueryResult> {
        query
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    /// Executes a write that must touch exactly one row.
    async fn execute_one<'q>(
        &mut self,
        what: String,
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> StoreResult<()> {
        let result = self.execute(&what, query).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(what));
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        self.fetch_row("load customer", sqlx::query(&sql).bind(id.get()), customer_from_row)
            .await
    }

    async fn customers(&mut self) -> StoreResult<Vec<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name, id");
        self.fetch_rows("list customers", sqlx::query(&sql), customer_from_row)
            .await
    }

    async fn insert_customer(
        &mut self,
        details: CustomerDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Customer> {
        let query = sqlx::query(
            r#"
            INSERT INTO customers
                (name, national_id, phone, email, address, postal_code, town, province, registered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&details.name)
        .bind(&details.national_id)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.address)
        .bind(&details.postal_code)
        .bind(&details.town)
        .bind(&details.province)
        .bind(registered_at);
        let result = self.execute("insert customer", query).await?;

        Ok(Customer {
            id: CustomerId::new(result.last_insert_rowid()),
            details,
            registered_at,
        })
    }

    async fn update_customer(
        &mut self,
        id: CustomerId,
        details: CustomerDetails,
    ) -> StoreResult<Customer> {
        let query = sqlx::query(
            r#"
            UPDATE customers
            SET name = ?1, national_id = ?2, phone = ?3, email = ?4, address = ?5,
                postal_code = ?6, town = ?7, province = ?8
            WHERE id = ?9
            "#,
        )
        .bind(&details.name)
        .bind(&details.national_id)
        .bind(&details.phone)
        .bind(&details.email)
        .bind(&details.address)
        .bind(&details.postal_code)
        .bind(&details.town)
        .bind(&details.province)
        .bind(id.get());
        self.execute_one(format!("customer {id}"), query).await?;

        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");
        self.require(format!("customer {id}"), sqlx::query(&sql).bind(id.get()), customer_from_row)
            .await
    }

    async fn delete_customer(&mut self, id: CustomerId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM customers WHERE id = ?1").bind(id.get());
        self.execute_one(format!("customer {id}"), query).await
    }

    async fn vehicle(&mut self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1");
        self.fetch_row("load vehicle", sqlx::query(&sql).bind(id.get()), vehicle_from_row)
            .await
    }

    async fn vehicles(&mut self) -> StoreResult<Vec<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY plate, id");
        self.fetch_rows("list vehicles", sqlx::query(&sql), vehicle_from_row)
            .await
    }

    async fn insert_vehicle(
        &mut self,
        details: VehicleDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Vehicle> {
        let query = sqlx::query(
            r#"
            INSERT INTO vehicles (plate, make, model, kind, year, color, owner_id, registered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(details.plate.as_str())
        .bind(&details.make)
        .bind(&details.model)
        .bind(&details.kind)
        .bind(details.year)
        .bind(&details.color)
        .bind(details.owner_id.map(CustomerId::get))
        .bind(registered_at);
        let result = self.execute("insert vehicle", query).await?;

        Ok(Vehicle {
            id: VehicleId::new(result.last_insert_rowid()),
            details,
            registered_at,
        })
    }

    async fn update_vehicle(
        &mut self,
        id: VehicleId,
        details: VehicleDetails,
    ) -> StoreResult<Vehicle> {
        let query = sqlx::query(
            r#"
            UPDATE vehicles
            SET plate = ?1, make = ?2, model = ?3, kind = ?4, year = ?5, color = ?6, owner_id = ?7
            WHERE id = ?8
            "#,
        )
        .bind(details.plate.as_str())
        .bind(&details.make)
        .bind(&details.model)
        .bind(&details.kind)
        .bind(details.year)
        .bind(&details.color)
        .bind(details.owner_id.map(CustomerId::get))
        .bind(id.get());
        self.execute_one(format!("vehicle {id}"), query).await?;

        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?1");
        self.require(format!("vehicle {id}"), sqlx::query(&sql).bind(id.get()), vehicle_from_row)
            .await
    }

    async fn delete_vehicle(&mut self, id: VehicleId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM vehicles WHERE id = ?1").bind(id.get());
        self.execute_one(format!("vehicle {id}"), query).await
    }

    async fn detach_vehicles(&mut self, owner: CustomerId) -> StoreResult<u64> {
        let query =
            sqlx::query("UPDATE vehicles SET owner_id = NULL WHERE owner_id = ?1").bind(owner.get());
        Ok(self.execute("detach vehicles", query).await?.rows_affected())
    }

    async fn intervention(&mut self, id: InterventionId) -> StoreResult<Option<Intervention>> {
        let sql = format!("SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE id = ?1");
        self.fetch_row(
            "load intervention",
            sqlx::query(&sql).bind(id.get()),
            intervention_from_row,
        )
        .await
    }

    async fn interventions_for_vehicle(
        &mut self,
        id: VehicleId,
    ) -> StoreResult<Vec<Intervention>> {
        let sql = format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE vehicle_id = ?1 \
             ORDER BY date DESC, id DESC"
        );
        self.fetch_rows(
            "list vehicle interventions",
            sqlx::query(&sql).bind(id.get()),
            intervention_from_row,
        )
        .await
    }

    async fn interventions_for_invoice(
        &mut self,
        id: InvoiceId,
    ) -> StoreResult<Vec<Intervention>> {
        let sql = format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE invoice_id = ?1 ORDER BY id"
        );
        self.fetch_rows(
            "list invoice lines",
            sqlx::query(&sql).bind(id.get()),
            intervention_from_row,
        )
        .await
    }

    async fn unbilled_interventions(&mut self) -> StoreResult<Vec<Intervention>> {
        let sql = format!(
            "SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE invoice_id IS NULL \
             ORDER BY date DESC, id DESC"
        );
        self.fetch_rows("list unbilled interventions", sqlx::query(&sql), intervention_from_row)
            .await
    }

    async fn insert_intervention(
        &mut self,
        vehicle_id: VehicleId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention> {
        let query = sqlx::query(
            r#"
            INSERT INTO interventions
                (vehicle_id, customer_id, date, odometer_km, description, price, labor_hours)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(vehicle_id.get())
        .bind(details.customer_id.map(CustomerId::get))
        .bind(details.date)
        .bind(details.odometer_km)
        .bind(&details.description)
        .bind(details.price)
        .bind(details.labor_hours);
        let result = self.execute("insert intervention", query).await?;

        Ok(Intervention {
            id: InterventionId::new(result.last_insert_rowid()),
            vehicle_id,
            details,
            invoice_id: None,
        })
    }

    async fn update_intervention(
        &mut self,
        id: InterventionId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention> {
        let query = sqlx::query(
            r#"
            UPDATE interventions
            SET customer_id = ?1, date = ?2, odometer_km = ?3, description = ?4,
                price = ?5, labor_hours = ?6
            WHERE id = ?7
            "#,
        )
        .bind(details.customer_id.map(CustomerId::get))
        .bind(details.date)
        .bind(details.odometer_km)
        .bind(&details.description)
        .bind(details.price)
        .bind(details.labor_hours)
        .bind(id.get());
        self.execute_one(format!("intervention {id}"), query).await?;

        let sql = format!("SELECT {INTERVENTION_COLUMNS} FROM interventions WHERE id = ?1");
        self.require(
            format!("intervention {id}"),
            sqlx::query(&sql).bind(id.get()),
            intervention_from_row,
        )
        .await
    }

    async fn delete_intervention(&mut self, id: InterventionId) -> StoreResult<()> {
        let query = sqlx::query("DELETE FROM interventions WHERE id = ?1").bind(id.get());
        self.execute_one(format!("intervention {id}"), query).await
    }

    async fn delete_interventions_for_vehicle(&mut self, id: VehicleId) -> StoreResult<u64> {
        let query = sqlx::query("DELETE FROM interventions WHERE vehicle_id = ?1").bind(id.get());
        Ok(self
            .execute("delete vehicle interventions", query)
            .await?
            .rows_affected())
    }

    async fn clear_billing_customer(&mut self, customer: CustomerId) -> StoreResult<u64> {
        let query = sqlx::query("UPDATE interventions SET customer_id = NULL WHERE customer_id = ?1")
            .bind(customer.get());
        Ok(self
            .execute("clear billing customer", query)
            .await?
            .rows_affected())
    }

    async fn bind_intervention(
        &mut self,
        id: InterventionId,
        invoice: InvoiceId,
    ) -> StoreResult<()> {
        let query = sqlx::query(
            "UPDATE interventions SET invoice_id = ?1 WHERE id = ?2 AND invoice_id IS NULL",
        )
        .bind(invoice.get())
        .bind(id.get());
        let result = self.execute("bind intervention", query).await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing matched: either the row is gone or it is already billed.
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM interventions WHERE id = ?1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("bind intervention", e))?;
        match exists {
            Some(_) => Err(StoreError::AlreadyBound(id)),
            None => Err(StoreError::RowNotFound(format!("intervention {id}"))),
        }
    }

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1");
        self.fetch_row("load invoice", sqlx::query(&sql).bind(id.get()), invoice_from_row)
            .await
    }

    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY issued_at DESC, id DESC");
        self.fetch_rows("list invoices", sqlx::query(&sql), invoice_from_row)
            .await
    }

    async fn count_invoices_for_customer(&mut self, id: CustomerId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE customer_id = ?1")
            .bind(id.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count customer invoices", e))?;
        Ok(count.max(0) as u64)
    }

    async fn highest_invoice_id(&mut self) -> StoreResult<Option<InvoiceId>> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM invoices")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("highest invoice id", e))?;
        Ok(max.map(InvoiceId::new))
    }

    async fn insert_invoice(&mut self, invoice: NewInvoice) -> StoreResult<Invoice> {
        let amounts = &invoice.amounts;
        let query = sqlx::query(
            r#"
            INSERT INTO invoices
                (customer_id, number, issued_at, base, discount_pct, discount_amount,
                 tax_pct, tax_amount, total, submitted, submitted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, NULL)
            "#,
        )
        .bind(invoice.customer_id.get())
        .bind(&invoice.number)
        .bind(invoice.issued_at)
        .bind(amounts.base)
        .bind(amounts.discount_pct)
        .bind(amounts.discount_amount)
        .bind(amounts.tax_pct)
        .bind(amounts.tax_amount)
        .bind(amounts.total);
        let result = self.execute("insert invoice", query).await?;

        Ok(Invoice::from_new(
            InvoiceId::new(result.last_insert_rowid()),
            invoice,
        ))
    }

    async fn mark_invoice_submitted(
        &mut self,
        id: InvoiceId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = sqlx::query(
            "UPDATE invoices SET submitted = 1, submitted_at = ?1 WHERE id = ?2 AND submitted = 0",
        )
        .bind(at)
        .bind(id.get());
        let result = self.execute("mark invoice submitted", query).await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let query = sqlx::query("SELECT id FROM invoices WHERE id = ?1").bind(id.get());
        self.require(format!("invoice {id}"), query, |row| row.try_get::<i64, _>("id"))
            .await
            .map(|_| false)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}
