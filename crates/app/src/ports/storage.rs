//! Storage port — repository traits for persistence.
//!
//! Lookups by id return records in any archive state; list and count
//! methods only see non-archived records unless they say otherwise.

use std::future::Future;

use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{NetworkPointId, ProviderId, RegistrationId, VehicleId};
use netalloc_domain::network_point::NetworkPoint;
use netalloc_domain::provider::Provider;
use netalloc_domain::registration::Registration;
use netalloc_domain::time::Date;
use netalloc_domain::vehicle::Vehicle;

/// Persistence for network points.
///
/// A point and its queue are written together: the owner column is derived
/// from the queue head and must never be stored apart from it.
pub trait NetworkPointRepository {
    /// Write `point` and replace its whole queue with `entries` in one
    /// transaction.
    ///
    /// The point row is inserted when it does not exist yet and overwritten
    /// otherwise. On failure neither the point nor the queue changes.
    fn save_with_queue(
        &self,
        point: NetworkPoint,
        entries: Vec<Registration>,
    ) -> impl Future<Output = Result<NetworkPoint, AllocationError>> + Send;

    fn get_by_id(
        &self,
        id: NetworkPointId,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send;

    /// Find a point by code, archived or not.
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send;

    /// Points with the given archive flag, ordered by code.
    fn list(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send;

    /// Number of non-archived points whose owner is `provider_id`.
    fn count_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send;

    /// Non-archived points whose owner is `provider_id`.
    fn find_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send;

    /// Non-archived points with `valid_to < today`.
    fn find_expired(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send;
}

/// Persistence for queue registrations.
pub trait RegistrationRepository {
    fn get_by_id(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, AllocationError>> + Send;

    /// Registrations of a point ordered by queue position.
    fn find_by_point(
        &self,
        point_id: NetworkPointId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send;

    /// Every registration held by a provider, across all points.
    fn find_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send;

    /// Current head registrations whose end date is before `today`.
    fn find_expired_heads(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send;

    /// Persist changed dates of a single registration.
    fn update(
        &self,
        registration: Registration,
    ) -> impl Future<Output = Result<Registration, AllocationError>> + Send;
}

/// Persistence for providers.
pub trait ProviderRepository {
    fn create(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send;

    fn get_by_id(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send;

    /// Find a provider by code, archived or not.
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send;

    /// Providers with the given archive flag, ordered by name.
    fn list(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Provider>, AllocationError>> + Send;

    fn update(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send;

    fn delete(&self, id: ProviderId) -> impl Future<Output = Result<(), AllocationError>> + Send;

    /// Clear the archived flag, but only if it is currently set.
    fn unarchive(&self, id: ProviderId)
    -> impl Future<Output = Result<bool, AllocationError>> + Send;
}

/// Persistence for vehicles.
pub trait VehicleRepository {
    fn create(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send;

    fn get_by_id(
        &self,
        id: VehicleId,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send;

    /// Find a vehicle by plate, archived or not.
    fn find_by_license_plate(
        &self,
        plate: &str,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send;

    fn update(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send;

    fn delete(&self, id: VehicleId) -> impl Future<Output = Result<(), AllocationError>> + Send;

    /// Number of non-archived vehicles assigned to `provider_id`.
    fn count_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send;

    /// Non-archived vehicles assigned to `provider_id`.
    fn find_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send;

    /// Non-archived, assigned vehicles whose assignment ended before `today`.
    fn find_expired_assignments(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send;
}
