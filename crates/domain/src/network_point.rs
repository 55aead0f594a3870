//! Network point — a fixed service location operated by one provider at a time.
//!
//! The `owner` field is a cache of the provider registered at position 0 of
//! the point's queue. Only the queue allocator writes it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, ValidationError};
use crate::id::{NetworkPointId, ProviderId};
use crate::time::Date;

/// Kind of service location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkPointType {
    Station,
    Substation,
    Hospital,
}

impl fmt::Display for NetworkPointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Station => "STATION",
            Self::Substation => "SUBSTATION",
            Self::Hospital => "HOSPITAL",
        };
        f.write_str(text)
    }
}

impl FromStr for NetworkPointType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATION" => Ok(Self::Station),
            "SUBSTATION" => Ok(Self::Substation),
            "HOSPITAL" => Ok(Self::Hospital),
            other => Err(format!("unknown network point type {other:?}")),
        }
    }
}

/// A fixed service location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPoint {
    pub id: NetworkPointId,
    /// Stable registry code, unique across all points.
    pub code: String,
    pub name: String,
    pub point_type: NetworkPointType,
    pub valid_from: Date,
    pub valid_to: Date,
    /// Provider at the head of the queue, `None` iff the queue is empty.
    pub owner: Option<ProviderId>,
    pub archived: bool,
}

impl NetworkPoint {
    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when `code` or `name` is empty.
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyCode.into());
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// Whether the validity window ended before `today`.
    #[must_use]
    pub fn is_expired(&self, today: Date) -> bool {
        self.valid_to < today
    }
}

/// Input for creating a network point together with its seed registration.
///
/// `valid_to`, `provider_id`, and `provider_end_date` are optional here so a
/// missing value surfaces as a [`ValidationError::MissingField`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNetworkPoint {
    pub code: String,
    pub name: String,
    pub point_type: NetworkPointType,
    pub valid_to: Option<Date>,
    pub provider_id: Option<ProviderId>,
    pub provider_end_date: Option<Date>,
}

/// Scalar fields rewritten by an update. The queue is never touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPointUpdate {
    pub code: String,
    pub name: String,
    pub point_type: NetworkPointType,
    pub valid_from: Date,
    pub valid_to: Date,
}

impl NetworkPointUpdate {
    /// Copy the updatable fields onto `point`.
    pub fn apply_to(self, point: &mut NetworkPoint) {
        point.code = self.code;
        point.name = self.name;
        point.point_type = self.point_type;
        point.valid_from = self.valid_from;
        point.valid_to = self.valid_to;
    }
}

/// Input for bringing an archived point back into service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnarchivePoint {
    pub provider_id: Option<ProviderId>,
    pub provider_end_date: Option<Date>,
    pub valid_to: Option<Date>,
    pub bypass_capacity: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn point() -> NetworkPoint {
        NetworkPoint {
            id: NetworkPointId::new(),
            code: "NP-001".to_string(),
            name: "North Station".to_string(),
            point_type: NetworkPointType::Station,
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            owner: None,
            archived: false,
        }
    }

    #[test]
    fn should_validate_when_code_and_name_present() {
        assert!(point().validate().is_ok());
    }

    #[test]
    fn should_reject_empty_code() {
        let mut np = point();
        np.code = "  ".to_string();
        assert!(matches!(
            np.validate(),
            Err(AllocationError::Validation(ValidationError::EmptyCode))
        ));
    }

    #[test]
    fn should_be_expired_only_after_valid_to() {
        let np = point();
        assert!(!np.is_expired(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(np.is_expired(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
    }

    #[test]
    fn should_apply_update_without_touching_owner() {
        let mut np = point();
        let owner = ProviderId::new();
        np.owner = Some(owner);

        NetworkPointUpdate {
            code: "NP-002".to_string(),
            name: "South".to_string(),
            point_type: NetworkPointType::Hospital,
            valid_from: np.valid_from,
            valid_to: np.valid_to,
        }
        .apply_to(&mut np);

        assert_eq!(np.code, "NP-002");
        assert_eq!(np.point_type, NetworkPointType::Hospital);
        assert_eq!(np.owner, Some(owner));
    }

    #[test]
    fn should_parse_point_type_names() {
        assert_eq!(
            "SUBSTATION".parse::<NetworkPointType>().unwrap(),
            NetworkPointType::Substation
        );
        assert!("garage".parse::<NetworkPointType>().is_err());
    }
}
