//! Vehicle — fleet unit assigned to a provider for a limited period.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, ValidationError};
use crate::id::{ProviderId, VehicleId};
use crate::time::Date;

/// Registry status of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    #[default]
    Active,
    Reserve,
    Decommissioned,
    TemporarilyDecommissioned,
    Reregistered,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Active => "ACTIVE",
            Self::Reserve => "RESERVE",
            Self::Decommissioned => "DECOMMISSIONED",
            Self::TemporarilyDecommissioned => "TEMPORARILY_DECOMMISSIONED",
            Self::Reregistered => "REREGISTERED",
        };
        f.write_str(text)
    }
}

impl FromStr for VehicleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "RESERVE" => Ok(Self::Reserve),
            "DECOMMISSIONED" => Ok(Self::Decommissioned),
            "TEMPORARILY_DECOMMISSIONED" => Ok(Self::TemporarilyDecommissioned),
            "REREGISTERED" => Ok(Self::Reregistered),
            other => Err(format!("unknown vehicle status {other:?}")),
        }
    }
}

/// A vehicle counted towards its provider's fleet while active and assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub license_plate: String,
    pub vin: String,
    pub brand: String,
    pub model: String,
    pub status: VehicleStatus,
    pub provider_id: Option<ProviderId>,
    pub assignment_start: Option<Date>,
    pub assignment_end: Option<Date>,
    pub archived: bool,
}

impl Vehicle {
    /// Create a builder for constructing a [`Vehicle`].
    #[must_use]
    pub fn builder() -> VehicleBuilder {
        VehicleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when the license plate is empty.
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.license_plate.trim().is_empty() {
            return Err(ValidationError::MissingField("license plate").into());
        }
        Ok(())
    }

    /// Detach from the provider and mark archived.
    pub fn archive(&mut self) {
        self.provider_id = None;
        self.archived = true;
    }
}

/// Step-by-step builder for [`Vehicle`].
#[derive(Debug, Default)]
pub struct VehicleBuilder {
    id: Option<VehicleId>,
    license_plate: Option<String>,
    vin: Option<String>,
    brand: Option<String>,
    model: Option<String>,
    status: Option<VehicleStatus>,
    provider_id: Option<ProviderId>,
    assignment_end: Option<Date>,
}

impl VehicleBuilder {
    #[must_use]
    pub fn id(mut self, id: VehicleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn license_plate(mut self, plate: impl Into<String>) -> Self {
        self.license_plate = Some(plate.into());
        self
    }

    #[must_use]
    pub fn vin(mut self, vin: impl Into<String>) -> Self {
        self.vin = Some(vin.into());
        self
    }

    #[must_use]
    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: VehicleStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn provider_id(mut self, provider_id: ProviderId) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    #[must_use]
    pub fn assignment_end(mut self, end: Date) -> Self {
        self.assignment_end = Some(end);
        self
    }

    /// Consume the builder, validate, and return a [`Vehicle`].
    ///
    /// The assignment start is left unset; registration stamps it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] if the license plate is missing.
    pub fn build(self) -> Result<Vehicle, AllocationError> {
        let vehicle = Vehicle {
            id: self.id.unwrap_or_default(),
            license_plate: self.license_plate.unwrap_or_default(),
            vin: self.vin.unwrap_or_default(),
            brand: self.brand.unwrap_or_default(),
            model: self.model.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            provider_id: self.provider_id,
            assignment_start: None,
            assignment_end: self.assignment_end,
            archived: false,
        };
        vehicle.validate()?;
        Ok(vehicle)
    }
}
