//! Reports produced by batch sweeps.
//!
//! Every sweep commits per item: one failing item is recorded in `errors`
//! and the batch carries on.

use serde::{Deserialize, Serialize};

use crate::id::VehicleId;

/// Result of archiving network points whose validity window has ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointExpiryReport {
    pub checked: usize,
    pub archived: usize,
    pub skipped_archived: usize,
    pub errors: Vec<String>,
}

/// Result of resolving expired head registrations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationExpiryReport {
    pub expired: usize,
    pub promoted: usize,
    pub archived: usize,
    pub errors: Vec<String>,
}

/// Result of archiving providers that no longer own any active point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSweepReport {
    pub checked: usize,
    pub archived: usize,
    pub errors: Vec<String>,
}

/// Result of archiving vehicles whose provider assignment ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleExpiryReport {
    pub found: usize,
    pub archived: usize,
    pub archived_ids: Vec<VehicleId>,
    pub errors: Vec<String>,
}

/// Outcome of a full expiration run: registrations first, then points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationReport {
    pub registrations: RegistrationExpiryReport,
    pub points: PointExpiryReport,
}

/// Result of pulling one provider out of every queue it appears in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRemovalReport {
    /// Points whose queue lost at least one registration.
    pub points: usize,
    /// Points archived because their queue ended up empty.
    pub archived: usize,
    pub errors: Vec<String>,
}
