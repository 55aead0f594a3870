//! Provider — an operator that runs network points with its vehicle fleet.
//!
//! A provider's [`ProviderState`] is never edited directly: it is derived
//! from the number of active vehicles and owned network points through the
//! [`CapacityPolicy`], and archived providers are always
//! [`ProviderState::Disabled`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, CapacityError, ValidationError};
use crate::id::ProviderId;

/// Operational state derived from the capacity ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    /// The fleet covers every owned network point.
    Active,
    /// The provider owns points but its fleet is below the required ratio.
    Unbalanced,
    /// No vehicles and no points, or archived.
    Disabled,
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Active => "ACTIVE",
            Self::Unbalanced => "UNBALANCED",
            Self::Disabled => "DISABLED",
        };
        f.write_str(text)
    }
}

impl FromStr for ProviderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(Self::Active),
            "UNBALANCED" => Ok(Self::Unbalanced),
            "DISABLED" => Ok(Self::Disabled),
            other => Err(format!("unknown provider state {other:?}")),
        }
    }
}

/// The vehicle-to-point ratio a provider must satisfy.
///
/// The ratio is kept in percent so the rounding stays in integer math:
/// the default of 130 means a provider needs `ceil(1.3 * points)` vehicles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    pub ratio_percent: u32,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self { ratio_percent: 130 }
    }
}

impl CapacityPolicy {
    /// Minimum number of vehicles needed to operate `points` network points.
    #[must_use]
    pub fn required_vehicles(self, points: u64) -> u64 {
        (points * u64::from(self.ratio_percent)).div_ceil(100)
    }

    /// Derive the operational state from live counts.
    #[must_use]
    pub fn derive_state(self, vehicles: u64, owned_points: u64) -> ProviderState {
        if vehicles == 0 && owned_points == 0 {
            ProviderState::Disabled
        } else if owned_points > 0 && vehicles < self.required_vehicles(owned_points) {
            ProviderState::Unbalanced
        } else {
            ProviderState::Active
        }
    }

    /// Check whether a provider may take one more network point.
    ///
    /// `owned_points` is the count *before* the assignment; the point being
    /// assigned is added here.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] when `vehicles < ceil(ratio * (owned_points + 1))`.
    pub fn check_assignment(
        self,
        provider_id: ProviderId,
        vehicles: u64,
        owned_points: u64,
    ) -> Result<(), CapacityError> {
        let required = self.required_vehicles(owned_points + 1);
        if vehicles < required {
            return Err(CapacityError {
                provider_id,
                vehicles,
                required,
            });
        }
        Ok(())
    }
}

/// A provider (operator) competing for network points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    /// External registry code of the provider.
    pub code: String,
    pub name: String,
    pub address: Option<String>,
    /// Cached derived state; `None` until first computed.
    pub state: Option<ProviderState>,
    pub archived: bool,
}

impl Provider {
    /// Create a builder for constructing a [`Provider`].
    #[must_use]
    pub fn builder() -> ProviderBuilder {
        ProviderBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when `name` or `code` is empty.
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyCode.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Provider`].
#[derive(Debug, Default)]
pub struct ProviderBuilder {
    id: Option<ProviderId>,
    code: Option<String>,
    name: Option<String>,
    address: Option<String>,
}

impl ProviderBuilder {
    #[must_use]
    pub fn id(mut self, id: ProviderId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Consume the builder, validate, and return a [`Provider`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] if `name` or `code` is missing.
    pub fn build(self) -> Result<Provider, AllocationError> {
        let provider = Provider {
            id: self.id.unwrap_or_default(),
            code: self.code.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            address: self.address,
            state: None,
            archived: false,
        };
        provider.validate()?;
        Ok(provider)
    }
}
