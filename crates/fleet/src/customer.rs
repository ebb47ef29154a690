use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use garagebook_core::{CustomerId, DomainError, DomainResult, Entity};

use crate::non_blank;

/// Editable customer fields (what a registration or edit form submits).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    /// National ID (DNI/NIF). Unique across customers when present.
    #[serde(default)]
    pub national_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub town: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
}

impl CustomerDetails {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate and normalize: the name is required, blank optionals become `None`.
    pub fn validate(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("customer name is required"));
        }

        Ok(Self {
            name,
            national_id: non_blank(self.national_id),
            phone: non_blank(self.phone),
            email: non_blank(self.email),
            address: non_blank(self.address),
            postal_code: non_blank(self.postal_code),
            town: non_blank(self.town),
            province: non_blank(self.province),
        })
    }
}

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    #[serde(flatten)]
    pub details: CustomerDetails,
    pub registered_at: DateTime<Utc>,
}

impl Customer {
    pub fn name(&self) -> &str {
        &self.details.name
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
