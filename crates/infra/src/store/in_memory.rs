use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use garagebook_core::{CustomerId, Entity, InterventionId, InvoiceId, VehicleId};
use garagebook_fleet::{
    Customer, CustomerDetails, Intervention, InterventionDetails, Vehicle, VehicleDetails,
};
use garagebook_invoicing::{Invoice, NewInvoice};

use super::{Store, StoreError, StoreResult, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: BTreeMap<CustomerId, Customer>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    interventions: BTreeMap<InterventionId, Intervention>,
    invoices: BTreeMap<InvoiceId, Invoice>,
}

/// One recorded write. A transaction applies its writes to a private snapshot as it
/// goes, then replays them onto the live tables at commit time.
#[derive(Debug, Clone)]
enum Write {
    InsertCustomer(Customer),
    UpdateCustomer(Customer),
    DeleteCustomer(CustomerId),
    InsertVehicle(Vehicle),
    UpdateVehicle(Vehicle),
    DeleteVehicle(VehicleId),
    DetachVehicles(CustomerId),
    InsertIntervention(Intervention),
    UpdateIntervention(Intervention),
    DeleteIntervention(InterventionId),
    DeleteInterventionsForVehicle(VehicleId),
    ClearBillingCustomer(CustomerId),
    BindIntervention(InterventionId, InvoiceId),
    InsertInvoice(Invoice),
    MarkInvoiceSubmitted(InvoiceId, DateTime<Utc>),
}

fn put<E: Entity + Clone>(table: &mut BTreeMap<E::Id, E>, row: &E) -> u64 {
    table.insert(row.id(), row.clone());
    1
}

fn require_row<E: Entity>(table: &BTreeMap<E::Id, E>, row: &E, what: &str) -> StoreResult<()> {
    if table.contains_key(&row.id()) {
        Ok(())
    } else {
        Err(StoreError::RowNotFound(format!("{what} {}", row.id())))
    }
}

impl Tables {
    fn check_customer_unique(&self, customer: &Customer) -> StoreResult<()> {
        let Some(national_id) = customer.details.national_id.as_deref() else {
            return Ok(());
        };
        let taken = self.customers.values().any(|other| {
            other.id != customer.id && other.details.national_id.as_deref() == Some(national_id)
        });
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "customers.national_id: {national_id}"
            )));
        }
        Ok(())
    }

    fn check_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let plate = vehicle.plate();
        if self
            .vehicles
            .values()
            .any(|other| other.id != vehicle.id && other.plate() == plate)
        {
            return Err(StoreError::UniqueViolation(format!("vehicles.plate: {plate}")));
        }
        if let Some(owner) = vehicle.owner_id() {
            self.require_customer(owner, "vehicles.owner_id")?;
        }
        Ok(())
    }

    fn check_intervention(&self, intervention: &Intervention) -> StoreResult<()> {
        if !self.vehicles.contains_key(&intervention.vehicle_id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "interventions.vehicle_id: {}",
                intervention.vehicle_id
            )));
        }
        if let Some(customer) = intervention.details.customer_id {
            self.require_customer(customer, "interventions.customer_id")?;
        }
        if let Some(invoice) = intervention.invoice_id {
            if !self.invoices.contains_key(&invoice) {
                return Err(StoreError::ForeignKeyViolation(format!(
                    "interventions.invoice_id: {invoice}"
                )));
            }
        }
        Ok(())
    }

    fn require_customer(&self, id: CustomerId, column: &str) -> StoreResult<()> {
        if self.customers.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!("{column}: {id}")))
        }
    }

    fn apply(&mut self, write: &Write) -> StoreResult<u64> {
        match write {
            Write::InsertCustomer(customer) => {
                self.check_customer_unique(customer)?;
                Ok(put(&mut self.customers, customer))
            }
            Write::UpdateCustomer(customer) => {
                require_row(&self.customers, customer, "customer")?;
                self.check_customer_unique(customer)?;
                Ok(put(&mut self.customers, customer))
            }
            Write::DeleteCustomer(id) => {
                if !self.customers.contains_key(id) {
                    return Err(StoreError::RowNotFound(format!("customer {id}")));
                }
                let referenced = self.vehicles.values().any(|v| v.owner_id() == Some(*id))
                    || self
                        .interventions
                        .values()
                        .any(|i| i.details.customer_id == Some(*id))
                    || self.invoices.values().any(|inv| inv.customer_id == *id);
                if referenced {
                    return Err(StoreError::ForeignKeyViolation(format!(
                        "customer {id} is still referenced"
                    )));
                }
                self.customers.remove(id);
                Ok(1)
            }
            Write::InsertVehicle(vehicle) => {
                self.check_vehicle(vehicle)?;
                Ok(put(&mut self.vehicles, vehicle))
            }
            Write::UpdateVehicle(vehicle) => {
                require_row(&self.vehicles, vehicle, "vehicle")?;
                self.check_vehicle(vehicle)?;
                Ok(put(&mut self.vehicles, vehicle))
            }
            Write::DeleteVehicle(id) => {
                if !self.vehicles.contains_key(id) {
                    return Err(StoreError::RowNotFound(format!("vehicle {id}")));
                }
                if self.interventions.values().any(|i| i.vehicle_id == *id) {
                    return Err(StoreError::ForeignKeyViolation(format!(
                        "vehicle {id} still has interventions"
                    )));
                }
                self.vehicles.remove(id);
                Ok(1)
            }
            Write::DetachVehicles(owner) => {
                let mut touched = 0;
                for vehicle in self.vehicles.values_mut() {
                    if vehicle.details.owner_id == Some(*owner) {
                        vehicle.details.owner_id = None;
                        touched += 1;
                    }
                }
                Ok(touched)
            }
            Write::InsertIntervention(intervention) => {
                self.check_intervention(intervention)?;
                Ok(put(&mut self.interventions, intervention))
            }
            Write::UpdateIntervention(intervention) => {
                require_row(&self.interventions, intervention, "intervention")?;
                self.check_intervention(intervention)?;
                Ok(put(&mut self.interventions, intervention))
            }
            Write::DeleteIntervention(id) => match self.interventions.remove(id) {
                Some(_) => Ok(1),
                None => Err(StoreError::RowNotFound(format!("intervention {id}"))),
            },
            Write::DeleteInterventionsForVehicle(vehicle) => {
                let before = self.interventions.len();
                self.interventions.retain(|_, i| i.vehicle_id != *vehicle);
                Ok((before - self.interventions.len()) as u64)
            }
            Write::ClearBillingCustomer(customer) => {
                let mut touched = 0;
                for intervention in self.interventions.values_mut() {
                    if intervention.details.customer_id == Some(*customer) {
                        intervention.details.customer_id = None;
                        touched += 1;
                    }
                }
                Ok(touched)
            }
            Write::BindIntervention(id, invoice) => {
                if !self.invoices.contains_key(invoice) {
                    return Err(StoreError::ForeignKeyViolation(format!(
                        "interventions.invoice_id: {invoice}"
                    )));
                }
                let intervention = self
                    .interventions
                    .get_mut(id)
                    .ok_or_else(|| StoreError::RowNotFound(format!("intervention {id}")))?;
                if intervention.invoice_id.is_some() {
                    return Err(StoreError::AlreadyBound(*id));
                }
                intervention.invoice_id = Some(*invoice);
                Ok(1)
            }
            Write::InsertInvoice(invoice) => {
                if self.invoices.values().any(|other| other.number == invoice.number) {
                    return Err(StoreError::UniqueViolation(format!(
                        "invoices.number: {}",
                        invoice.number
                    )));
                }
                self.require_customer(invoice.customer_id, "invoices.customer_id")?;
                Ok(put(&mut self.invoices, invoice))
            }
            Write::MarkInvoiceSubmitted(id, at) => {
                let invoice = self
                    .invoices
                    .get_mut(id)
                    .ok_or_else(|| StoreError::RowNotFound(format!("invoice {id}")))?;
                if invoice.submitted {
                    return Ok(0);
                }
                invoice.mark_submitted(*at);
                Ok(1)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Sequences {
    customers: AtomicI64,
    vehicles: AtomicI64,
    interventions: AtomicI64,
    invoices: AtomicI64,
}

fn next(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::SeqCst) + 1
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    // Id sequences are not transactional: ids consumed by a rolled-back unit of work are
    // never handed out again.
    sequences: Sequences,
    injected_failure: Mutex<Option<usize>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

/// In-memory store with snapshot transactions.
///
/// A unit of work reads from a snapshot taken at `begin` and sees its own writes.
/// Commit re-applies those writes to the current live tables, re-checking every
/// constraint, so two concurrent units of work that both claim the same invoice number
/// end with the later commit failing on the unique number.
///
/// Intended for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next unit of work fail on its write number `after_writes + 1`.
    ///
    /// Used to simulate a storage failure in the middle of a multi-step command.
    pub fn fail_next_unit_of_work_after(&self, after_writes: usize) {
        if let Ok(mut slot) = self.shared.injected_failure.lock() {
            *slot = Some(after_writes);
        }
    }

    fn snapshot(&self) -> StoreResult<Tables> {
        Ok(self.shared.tables.lock().map_err(poisoned)?.clone())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let fail_after = self.shared.injected_failure.lock().map_err(poisoned)?.take();
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            snapshot: self.snapshot()?,
            writes: Vec::new(),
            fail_after,
        }))
    }
}

/// A unit of work against an [`InMemoryStore`].
#[derive(Debug)]
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    snapshot: Tables,
    writes: Vec<Write>,
    fail_after: Option<usize>,
}

impl InMemoryUnitOfWork {
    fn write(&mut self, write: Write) -> StoreResult<u64> {
        if let Some(limit) = self.fail_after {
            if self.writes.len() >= limit {
                return Err(StoreError::Backend(format!(
                    "injected failure after {limit} writes"
                )));
            }
        }
        let touched = self.snapshot.apply(&write)?;
        self.writes.push(write);
        Ok(touched)
    }

    fn sorted<T>(
        rows: impl Iterator<Item = T>,
        cmp: impl FnMut(&T, &T) -> std::cmp::Ordering,
    ) -> Vec<T> {
        let mut rows: Vec<T> = rows.collect();
        rows.sort_by(cmp);
        rows
    }
}

fn newest_first(a: &Intervention, b: &Intervention) -> std::cmp::Ordering {
    b.details.date.cmp(&a.details.date).then(b.id.cmp(&a.id))
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(self.snapshot.customers.get(&id).cloned())
    }

    async fn customers(&mut self) -> StoreResult<Vec<Customer>> {
        Ok(Self::sorted(self.snapshot.customers.values().cloned(), |a, b| {
            a.name().cmp(b.name()).then(a.id.cmp(&b.id))
        }))
    }

    async fn insert_customer(
        &mut self,
        details: CustomerDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Customer> {
        let customer = Customer {
            id: CustomerId::new(next(&self.shared.sequences.customers)),
            details,
            registered_at,
        };
        self.write(Write::InsertCustomer(customer.clone()))?;
        Ok(customer)
    }

    async fn update_customer(
        &mut self,
        id: CustomerId,
        details: CustomerDetails,
    ) -> StoreResult<Customer> {
        let mut customer = self
            .snapshot
            .customers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::RowNotFound(format!("customer {id}")))?;
        customer.details = details;
        self.write(Write::UpdateCustomer(customer.clone()))?;
        Ok(customer)
    }

    async fn delete_customer(&mut self, id: CustomerId) -> StoreResult<()> {
        self.write(Write::DeleteCustomer(id)).map(drop)
    }

    async fn vehicle(&mut self, id: VehicleId) -> StoreResult<Option<Vehicle>> {
        Ok(self.snapshot.vehicles.get(&id).cloned())
    }

    async fn vehicles(&mut self) -> StoreResult<Vec<Vehicle>> {
        Ok(Self::sorted(self.snapshot.vehicles.values().cloned(), |a, b| {
            a.plate().as_str().cmp(b.plate().as_str()).then(a.id.cmp(&b.id))
        }))
    }

    async fn insert_vehicle(
        &mut self,
        details: VehicleDetails,
        registered_at: DateTime<Utc>,
    ) -> StoreResult<Vehicle> {
        let vehicle = Vehicle {
            id: VehicleId::new(next(&self.shared.sequences.vehicles)),
            details,
            registered_at,
        };
        self.write(Write::InsertVehicle(vehicle.clone()))?;
        Ok(vehicle)
    }

    async fn update_vehicle(
        &mut self,
        id: VehicleId,
        details: VehicleDetails,
    ) -> StoreResult<Vehicle> {
        let mut vehicle = self
            .snapshot
            .vehicles
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::RowNotFound(format!("vehicle {id}")))?;
        vehicle.details = details;
        self.write(Write::UpdateVehicle(vehicle.clone()))?;
        Ok(vehicle)
    }

    async fn delete_vehicle(&mut self, id: VehicleId) -> StoreResult<()> {
        self.write(Write::DeleteVehicle(id)).map(drop)
    }

    async fn detach_vehicles(&mut self, owner: CustomerId) -> StoreResult<u64> {
        self.write(Write::DetachVehicles(owner))
    }

    async fn intervention(&mut self, id: InterventionId) -> StoreResult<Option<Intervention>> {
        Ok(self.snapshot.interventions.get(&id).cloned())
    }

    async fn interventions_for_vehicle(
        &mut self,
        id: VehicleId,
    ) -> StoreResult<Vec<Intervention>> {
        Ok(Self::sorted(
            self.snapshot
                .interventions
                .values()
                .filter(|i| i.vehicle_id == id)
                .cloned(),
            newest_first,
        ))
    }

    async fn interventions_for_invoice(
        &mut self,
        id: InvoiceId,
    ) -> StoreResult<Vec<Intervention>> {
        // BTreeMap iteration is already id order.
        Ok(self
            .snapshot
            .interventions
            .values()
            .filter(|i| i.invoice_id == Some(id))
            .cloned()
            .collect())
    }

    async fn unbilled_interventions(&mut self) -> StoreResult<Vec<Intervention>> {
        Ok(Self::sorted(
            self.snapshot
                .interventions
                .values()
                .filter(|i| !i.is_billed())
                .cloned(),
            newest_first,
        ))
    }

    async fn insert_intervention(
        &mut self,
        vehicle_id: VehicleId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention> {
        let intervention = Intervention {
            id: InterventionId::new(next(&self.shared.sequences.interventions)),
            vehicle_id,
            details,
            invoice_id: None,
        };
        self.write(Write::InsertIntervention(intervention.clone()))?;
        Ok(intervention)
    }

    async fn update_intervention(
        &mut self,
        id: InterventionId,
        details: InterventionDetails,
    ) -> StoreResult<Intervention> {
        let mut intervention = self
            .snapshot
            .interventions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::RowNotFound(format!("intervention {id}")))?;
        intervention.details = details;
        self.write(Write::UpdateIntervention(intervention.clone()))?;
        Ok(intervention)
    }

    async fn delete_intervention(&mut self, id: InterventionId) -> StoreResult<()> {
        self.write(Write::DeleteIntervention(id)).map(drop)
    }

    async fn delete_interventions_for_vehicle(&mut self, id: VehicleId) -> StoreResult<u64> {
        self.write(Write::DeleteInterventionsForVehicle(id))
    }

    async fn clear_billing_customer(&mut self, customer: CustomerId) -> StoreResult<u64> {
        self.write(Write::ClearBillingCustomer(customer))
    }

    async fn bind_intervention(
        &mut self,
        id: InterventionId,
        invoice: InvoiceId,
    ) -> StoreResult<()> {
        self.write(Write::BindIntervention(id, invoice)).map(drop)
    }

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.snapshot.invoices.get(&id).cloned())
    }

    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>> {
        Ok(Self::sorted(self.snapshot.invoices.values().cloned(), |a, b| {
            b.issued_at.cmp(&a.issued_at).then(b.id.cmp(&a.id))
        }))
    }

    async fn count_invoices_for_customer(&mut self, id: CustomerId) -> StoreResult<u64> {
        Ok(self
            .snapshot
            .invoices
            .values()
            .filter(|inv| inv.customer_id == id)
            .count() as u64)
    }

    async fn highest_invoice_id(&mut self) -> StoreResult<Option<InvoiceId>> {
        Ok(self.snapshot.invoices.keys().next_back().copied())
    }

    async fn insert_invoice(&mut self, invoice: NewInvoice) -> StoreResult<Invoice> {
        let invoice = Invoice::from_new(
            InvoiceId::new(next(&self.shared.sequences.invoices)),
            invoice,
        );
        self.write(Write::InsertInvoice(invoice.clone()))?;
        Ok(invoice)
    }

    async fn mark_invoice_submitted(
        &mut self,
        id: InvoiceId,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.write(Write::MarkInvoiceSubmitted(id, at))
            .map(|touched| touched == 1)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut live = self.shared.tables.lock().map_err(poisoned)?;
        let mut next_state = live.clone();
        for write in &self.writes {
            next_state.apply(write)?;
        }
        *live = next_state;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
