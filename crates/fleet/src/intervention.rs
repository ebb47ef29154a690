use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use garagebook_core::{
    CustomerId, DomainError, DomainResult, Entity, InterventionId, InvoiceId, VehicleId,
};

/// Editable intervention fields: one priced line of work on a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionDetails {
    pub date: NaiveDate,
    #[serde(default)]
    pub odometer_km: Option<i64>,
    /// Billing customer; may differ from the vehicle owner (e.g. a company car).
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub labor_hours: f64,
}

impl InterventionDetails {
    pub fn new(date: NaiveDate, description: impl Into<String>, price: f64) -> Self {
        Self {
            date,
            odometer_km: None,
            customer_id: None,
            description: description.into(),
            price,
            labor_hours: 0.0,
        }
    }

    /// Validate and normalize: the description must be non-blank after trimming.
    pub fn validate(self) -> DomainResult<Self> {
        let description = self.description.trim().to_string();
        if description.is_empty() {
            return Err(DomainError::validation("intervention description is required"));
        }
        if !self.price.is_finite() {
            return Err(DomainError::validation("intervention price must be a finite number"));
        }
        if !self.labor_hours.is_finite() {
            return Err(DomainError::validation("labor hours must be a finite number"));
        }
        if matches!(self.odometer_km, Some(km) if km < 0) {
            return Err(DomainError::validation("odometer reading cannot be negative"));
        }

        Ok(Self {
            description,
            ..self
        })
    }
}

/// A recorded intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub vehicle_id: VehicleId,
    #[serde(flatten)]
    pub details: InterventionDetails,
    /// Invoice this line is billed on, if any.
    pub invoice_id: Option<InvoiceId>,
}

impl Intervention {
    pub fn price(&self) -> f64 {
        self.details.price
    }

    pub fn is_billed(&self) -> bool {
        self.invoice_id.is_some()
    }
}

impl Entity for Intervention {
    type Id = InterventionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// One line of an [`InterventionBatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchLine {
    pub description: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub labor_hours: Option<f64>,
}

/// Several lines of work recorded together for one vehicle visit.
///
/// All lines share the visit date, odometer reading and billing customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionBatch {
    pub date: NaiveDate,
    #[serde(default)]
    pub odometer_km: Option<i64>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub lines: Vec<BatchLine>,
}

impl InterventionBatch {
    /// Expand into validated per-line details.
    ///
    /// Lines with a blank description are skipped; a batch with no described
    /// line at all is rejected. Missing price/hours default to 0.0.
    pub fn into_details(self) -> DomainResult<Vec<InterventionDetails>> {
        let mut details = Vec::with_capacity(self.lines.len());
        for line in self.lines {
            if line.description.trim().is_empty() {
                continue;
            }
            let item = InterventionDetails {
                date: self.date,
                odometer_km: self.odometer_km,
                customer_id: self.customer_id,
                description: line.description,
                price: line.price.unwrap_or(0.0),
                labor_hours: line.labor_hours.unwrap_or(0.0),
            };
            details.push(item.validate()?);
        }

        if details.is_empty() {
            return Err(DomainError::validation(
                "at least one intervention line with a description is required",
            ));
        }
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    #[test]
    fn blank_description_is_rejected() {
        let err = InterventionDetails::new(date(), "  \t ", 10.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn description_is_trimmed() {
        let details = InterventionDetails::new(date(), "  Oil change ", 45.0)
            .validate()
            .unwrap();
        assert_eq!(details.description, "Oil change");
    }

    #[test]
    fn non_finite_price_is_rejected() {
        let err = InterventionDetails::new(date(), "Brakes", f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn price_and_hours_default_to_zero_when_deserialized() {
        let details: InterventionDetails =
            serde_json::from_str(r#"{"date":"2026-03-14","description":"Check-up"}"#).unwrap();
        assert_eq!(details.price, 0.0);
        assert_eq!(details.labor_hours, 0.0);
        assert_eq!(details.odometer_km, None);
    }

    #[test]
    fn batch_skips_blank_lines_and_shares_visit_fields() {
        let batch = InterventionBatch {
            date: date(),
            odometer_km: Some(120_500),
            customer_id: None,
            lines: vec![
                BatchLine {
                    description: "Oil change".to_string(),
                    price: Some(45.0),
                    labor_hours: Some(0.5),
                },
                BatchLine {
                    description: "   ".to_string(),
                    price: Some(99.0),
                    labor_hours: None,
                },
                BatchLine {
                    description: "Air filter".to_string(),
                    price: None,
                    labor_hours: None,
                },
            ],
        };

        let details = batch.into_details().unwrap();
        assert_eq!(details.len(), 2);
        assert!(details.iter().all(|d| d.odometer_km == Some(120_500)));
        assert_eq!(details[1].price, 0.0);
    }

    #[test]
    fn batch_without_any_description_is_rejected() {
        let batch = InterventionBatch {
            date: date(),
            odometer_km: None,
            customer_id: None,
            lines: vec![BatchLine {
                description: String::new(),
                price: Some(10.0),
                labor_hours: None,
            }],
        };
        assert!(matches!(batch.into_details(), Err(DomainError::Validation(_))));
    }
}
