//! Newly specified invoice lines and the lenient line filter.
//!
//! A line entered while building an invoice becomes an intervention only if
//! it names a vehicle, a date (`YYYY-MM-DD`), a non-blank description and a
//! numeric price. Anything short of that is dropped without error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, VehicleId};
use garagebook_fleet::InterventionDetails;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A form value that may arrive as a JSON number or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormValue {
    Number(f64),
    Text(String),
}

impl FormValue {
    fn as_f64(&self) -> Option<f64> {
        let value = match self {
            FormValue::Number(n) => *n,
            FormValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            FormValue::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            FormValue::Number(_) => None,
            FormValue::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

impl From<f64> for FormValue {
    fn from(value: f64) -> Self {
        FormValue::Number(value)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

/// Raw line data entered while creating an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLineItem {
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub odometer_km: Option<FormValue>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<FormValue>,
    #[serde(default)]
    pub labor_hours: Option<FormValue>,
}

/// A line that passed the filter, ready to become an intervention.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedLine {
    pub vehicle_id: VehicleId,
    pub details: InterventionDetails,
}

impl NewLineItem {
    /// Apply the lenient filter.
    ///
    /// Unparseable optional fields degrade (odometer to absent, hours to 0.0);
    /// a missing billing customer falls back to `default_customer`.
    pub fn accept(&self, default_customer: CustomerId) -> Option<AcceptedLine> {
        let vehicle_id = self.vehicle_id?;
        let date = NaiveDate::parse_from_str(self.date.as_deref()?.trim(), DATE_FORMAT).ok()?;
        let description = self.description.as_deref()?.trim();
        if description.is_empty() {
            return None;
        }
        let price = self.price.as_ref()?.as_f64()?;

        Some(AcceptedLine {
            vehicle_id,
            details: InterventionDetails {
                date,
                odometer_km: self
                    .odometer_km
                    .as_ref()
                    .and_then(FormValue::as_i64)
                    .filter(|km| *km >= 0),
                customer_id: Some(self.customer_id.unwrap_or(default_customer)),
                description: description.to_string(),
                price,
                labor_hours: self
                    .labor_hours
                    .as_ref()
                    .and_then(FormValue::as_f64)
                    .unwrap_or(0.0),
            },
        })
    }
}

/// Filter a batch of raw lines, keeping the accepted ones in order.
pub fn accept_lines(items: &[NewLineItem], default_customer: CustomerId) -> Vec<AcceptedLine> {
    items
        .iter()
        .filter_map(|item| item.accept(default_customer))
        .collect()
}
