use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, DomainError, DomainResult, Entity, ValueObject, VehicleId};

use crate::non_blank;

/// Registration plate, trimmed and upper-cased.
///
/// Plates are compared in normalized form, so `"1234abc"` and `"1234ABC"`
/// are the same vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Plate(String);

impl Plate {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("plate is required"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Plate {}

impl TryFrom<String> for Plate {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Plate> for String {
    fn from(value: Plate) -> Self {
        value.0
    }
}

impl core::fmt::Display for Plate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

const EARLIEST_MODEL_YEAR: i32 = 1886;
const LATEST_MODEL_YEAR: i32 = 2100;

/// Editable vehicle fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub plate: Plate,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Body type (saloon, van, ...).
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
    /// Owning customer; a vehicle may be unassigned.
    #[serde(default)]
    pub owner_id: Option<CustomerId>,
}

impl VehicleDetails {
    pub fn new(plate: Plate) -> Self {
        Self {
            plate,
            make: None,
            model: None,
            kind: None,
            year: None,
            color: None,
            owner_id: None,
        }
    }

    pub fn validate(self) -> DomainResult<Self> {
        if let Some(year) = self.year {
            if !(EARLIEST_MODEL_YEAR..=LATEST_MODEL_YEAR).contains(&year) {
                return Err(DomainError::validation(format!(
                    "vehicle year {year} is out of range"
                )));
            }
        }

        Ok(Self {
            plate: self.plate,
            make: non_blank(self.make),
            model: non_blank(self.model),
            kind: non_blank(self.kind),
            year: self.year,
            color: non_blank(self.color),
            owner_id: self.owner_id,
        })
    }
}

/// A registered vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    #[serde(flatten)]
    pub details: VehicleDetails,
    pub registered_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn plate(&self) -> &Plate {
        &self.details.plate
    }

    pub fn owner_id(&self) -> Option<CustomerId> {
        self.details.owner_id
    }
}

impl Entity for Vehicle {
    type Id = VehicleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plate_is_upper_cased() {
        assert_eq!(Plate::parse("1234abc").unwrap().as_str(), "1234ABC");
        assert_eq!(Plate::parse("  m-5678-zx ").unwrap().as_str(), "M-5678-ZX");
    }

    #[test]
    fn blank_plate_is_rejected() {
        assert!(matches!(Plate::parse("  "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn plate_is_normalized_when_deserialized() {
        let details: VehicleDetails =
            serde_json::from_str(r#"{"plate":"1234abc","make":" Seat ","model":""}"#).unwrap();
        assert_eq!(details.plate.as_str(), "1234ABC");

        let details = details.validate().unwrap();
        assert_eq!(details.make.as_deref(), Some("Seat"));
        assert_eq!(details.model, None);
    }

    #[test]
    fn implausible_year_is_rejected() {
        let mut details = VehicleDetails::new(Plate::parse("1234ABC").unwrap());
        details.year = Some(1700);
        assert!(matches!(details.validate(), Err(DomainError::Validation(_))));
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in "[a-zA-Z0-9 -]{0,12}[a-zA-Z0-9][a-zA-Z0-9 -]{0,12}") {
            let once = Plate::parse(&raw).unwrap();
            let twice = Plate::parse(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.as_str().chars().any(|c| c.is_lowercase()));
        }
    }
}
