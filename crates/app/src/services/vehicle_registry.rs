//! Vehicle registry — the fleet counted against the capacity ratio.

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use netalloc_domain::audit::{Actor, AuditOperation, AuditRecord, AuditSubject};
use netalloc_domain::error::{AllocationError, ConflictError, ValidationError};
use netalloc_domain::id::{ProviderId, VehicleId};
use netalloc_domain::sweep::VehicleExpiryReport;
use netalloc_domain::time::Date;
use netalloc_domain::vehicle::Vehicle;

use super::provider_state::StateRefresher;
use super::{Shared, not_found};
use crate::ports::{Ports, VehicleRepository};

/// Reason recorded by [`VehicleRegistry::expired_assignment_sweep`].
pub const ASSIGNMENT_EXPIRED: &str = "assignment expired";

/// Reason recorded when an edit drops the provider of a vehicle.
pub const PROVIDER_REMOVED: &str = "provider removed";

/// Use-cases on vehicles.
pub struct VehicleRegistry<P> {
    shared: Arc<Shared<P>>,
    states: StateRefresher<P>,
}

impl<P> Clone for VehicleRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            states: self.states.clone(),
        }
    }
}

impl<P: Ports> VehicleRegistry<P> {
    pub(crate) fn new(shared: Arc<Shared<P>>, states: StateRefresher<P>) -> Self {
        Self { shared, states }
    }

    /// Register a vehicle assigned to a provider from today on.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when the provider or the
    /// assignment end is missing, [`AllocationError::Conflict`] when the
    /// license plate is taken, and [`AllocationError::NotFound`] for an
    /// unknown provider.
    #[tracing::instrument(skip(self, vehicle, actor), fields(plate = %vehicle.license_plate, actor = %actor))]
    pub async fn register_vehicle(
        &self,
        mut vehicle: Vehicle,
        actor: &Actor,
    ) -> Result<Vehicle, AllocationError> {
        vehicle.validate()?;
        let provider_id = vehicle
            .provider_id
            .ok_or(ValidationError::MissingField("provider"))?;
        if vehicle.assignment_end.is_none() {
            return Err(ValidationError::MissingField("assignment end").into());
        }
        self.ensure_plate_free(&vehicle).await?;
        self.shared.active_provider(provider_id).await?;

        vehicle.assignment_start = Some(self.shared.today());
        vehicle.archived = false;
        let vehicle = self.shared.ports.vehicles().create(vehicle).await?;
        self.audit(&vehicle, AuditOperation::Create, actor, vehicle.provider_id, None)
            .await?;
        self.states.refresh_all(&[Some(provider_id)]).await?;
        Ok(vehicle)
    }

    /// Apply an edited vehicle.
    ///
    /// Dropping the provider archives the vehicle; a (new) provider needs an
    /// assignment end that is not in the past.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or archived
    /// vehicle, [`AllocationError::Validation`] for a missing or past end
    /// date, and [`AllocationError::Conflict`] when the plate is taken.
    #[tracing::instrument(skip(self, edited, actor), fields(vehicle_id = %edited.id, actor = %actor))]
    pub async fn edit_vehicle(
        &self,
        edited: Vehicle,
        actor: &Actor,
    ) -> Result<Vehicle, AllocationError> {
        edited.validate()?;
        let (mut vehicle, _provider) = self.lock_assignment(edited.id).await?;
        if vehicle.archived {
            return Err(not_found("active vehicle", edited.id));
        }
        self.ensure_plate_free(&edited).await?;
        let previous = vehicle.provider_id;

        vehicle.license_plate = edited.license_plate;
        vehicle.vin = edited.vin;
        vehicle.brand = edited.brand;
        vehicle.model = edited.model;
        vehicle.status = edited.status;

        let Some(provider_id) = edited.provider_id else {
            if previous.is_some() {
                return self.archive_locked(vehicle, PROVIDER_REMOVED, actor).await;
            }
            let vehicle = self.shared.ports.vehicles().update(vehicle).await?;
            self.audit(&vehicle, AuditOperation::Update, actor, None, None)
                .await?;
            return Ok(vehicle);
        };

        let end = edited
            .assignment_end
            .ok_or(ValidationError::MissingField("assignment end"))?;
        if end < self.shared.today() {
            return Err(ValidationError::DateInPast("assignment end").into());
        }
        if previous != Some(provider_id) {
            self.shared.active_provider(provider_id).await?;
            vehicle.assignment_start = Some(self.shared.today());
        }
        vehicle.provider_id = Some(provider_id);
        vehicle.assignment_end = Some(end);

        let vehicle = self.shared.ports.vehicles().update(vehicle).await?;
        self.audit(&vehicle, AuditOperation::Update, actor, vehicle.provider_id, None)
            .await?;
        self.states
            .refresh_all(&[previous, Some(provider_id)])
            .await?;
        Ok(vehicle)
    }

    /// Detach a vehicle from its provider and archive it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or already
    /// archived vehicle.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn archive_vehicle(
        &self,
        vehicle_id: VehicleId,
        reason: &str,
        actor: &Actor,
    ) -> Result<Vehicle, AllocationError> {
        let (vehicle, _provider) = self.lock_assignment(vehicle_id).await?;
        if vehicle.archived {
            return Err(not_found("active vehicle", vehicle_id));
        }
        self.archive_locked(vehicle, reason, actor).await
    }

    /// Archive a vehicle that was read under the lock of its provider.
    pub(crate) async fn archive_locked(
        &self,
        mut vehicle: Vehicle,
        reason: &str,
        actor: &Actor,
    ) -> Result<Vehicle, AllocationError> {
        let previous = vehicle.provider_id;
        vehicle.archive();
        let vehicle = self.shared.ports.vehicles().update(vehicle).await?;
        self.audit(&vehicle, AuditOperation::Archive, actor, previous, Some(reason))
            .await?;
        self.states.refresh_all(&[previous]).await?;
        tracing::info!(vehicle_id = %vehicle.id, reason, "vehicle archived");
        Ok(vehicle)
    }

    /// Bring an archived vehicle back under a provider.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] unless `end_date` is after
    /// today, and [`AllocationError::NotFound`] unless both the archived
    /// vehicle and the provider exist.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn unarchive_vehicle(
        &self,
        vehicle_id: VehicleId,
        provider_id: ProviderId,
        end_date: Date,
        actor: &Actor,
    ) -> Result<Vehicle, AllocationError> {
        let today = self.shared.today();
        if end_date <= today {
            return Err(ValidationError::DateNotInFuture("assignment end").into());
        }
        let mut vehicle = self.get_vehicle(vehicle_id).await?;
        if !vehicle.archived {
            return Err(not_found("archived vehicle", vehicle_id));
        }
        self.shared.active_provider(provider_id).await?;

        vehicle.archived = false;
        vehicle.provider_id = Some(provider_id);
        vehicle.assignment_start = Some(today);
        vehicle.assignment_end = Some(end_date);
        let vehicle = self.shared.ports.vehicles().update(vehicle).await?;
        self.audit(&vehicle, AuditOperation::Unarchive, actor, Some(provider_id), None)
            .await?;
        self.states.refresh_all(&[Some(provider_id)]).await?;
        Ok(vehicle)
    }

    /// Remove a vehicle for good.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the vehicle does not exist.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn delete_vehicle(
        &self,
        vehicle_id: VehicleId,
        actor: &Actor,
    ) -> Result<(), AllocationError> {
        let (vehicle, _provider) = self.lock_assignment(vehicle_id).await?;
        self.shared.ports.vehicles().delete(vehicle_id).await?;
        self.audit(&vehicle, AuditOperation::Delete, actor, vehicle.provider_id, None)
            .await?;
        self.states.refresh_all(&[vehicle.provider_id]).await
    }

    /// Look up a vehicle in any archive state.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when no vehicle with `id` exists.
    pub async fn get_vehicle(&self, vehicle_id: VehicleId) -> Result<Vehicle, AllocationError> {
        self.shared
            .ports
            .vehicles()
            .get_by_id(vehicle_id)
            .await?
            .ok_or_else(|| not_found("vehicle", vehicle_id))
    }

    /// Archive every active vehicle whose assignment ended before today.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the candidates cannot be listed;
    /// per-vehicle failures land in the report.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn expired_assignment_sweep(
        &self,
        actor: &Actor,
    ) -> Result<VehicleExpiryReport, AllocationError> {
        let today = self.shared.today();
        let expired = self
            .shared
            .ports
            .vehicles()
            .find_expired_assignments(today)
            .await?;

        let mut report = VehicleExpiryReport {
            found: expired.len(),
            ..VehicleExpiryReport::default()
        };
        for vehicle in expired {
            let vehicle_id = vehicle.id;
            match self.archive_expired(vehicle_id, today, actor).await {
                Ok(true) => {
                    report.archived += 1;
                    report.archived_ids.push(vehicle_id);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%vehicle_id, error = %err, "failed to archive vehicle");
                    report.errors.push(format!("{vehicle_id}: {err}"));
                }
            }
        }
        tracing::info!(
            found = report.found,
            archived = report.archived,
            errors = report.errors.len(),
            "vehicle assignment sweep finished"
        );
        Ok(report)
    }

    /// Returns `false` when the assignment changed since it was listed.
    async fn archive_expired(
        &self,
        vehicle_id: VehicleId,
        today: Date,
        actor: &Actor,
    ) -> Result<bool, AllocationError> {
        let (vehicle, _provider) = self.lock_assignment(vehicle_id).await?;
        let expired = vehicle.assignment_end.is_some_and(|end| end < today);
        if vehicle.archived || vehicle.provider_id.is_none() || !expired {
            return Ok(false);
        }
        self.archive_locked(vehicle, ASSIGNMENT_EXPIRED, actor)
            .await?;
        Ok(true)
    }

    /// Read a vehicle while holding the lock of the provider it is assigned
    /// to, so its fleet cannot shrink under a running capacity check.
    async fn lock_assignment(
        &self,
        vehicle_id: VehicleId,
    ) -> Result<(Vehicle, Option<OwnedMutexGuard<()>>), AllocationError> {
        loop {
            let vehicle = self.get_vehicle(vehicle_id).await?;
            let Some(provider_id) = vehicle.provider_id else {
                return Ok((vehicle, None));
            };
            let guard = self.shared.provider_locks.lock(provider_id).await;
            let vehicle = self.get_vehicle(vehicle_id).await?;
            if vehicle.provider_id == Some(provider_id) {
                return Ok((vehicle, Some(guard)));
            }
        }
    }

    async fn ensure_plate_free(&self, vehicle: &Vehicle) -> Result<(), AllocationError> {
        let taken = self
            .shared
            .ports
            .vehicles()
            .find_by_license_plate(&vehicle.license_plate)
            .await?
            .is_some_and(|other| other.id != vehicle.id);
        if taken {
            return Err(ConflictError::DuplicateLicensePlate(vehicle.license_plate.clone()).into());
        }
        Ok(())
    }

    async fn audit(
        &self,
        vehicle: &Vehicle,
        operation: AuditOperation,
        actor: &Actor,
        provider_id: Option<ProviderId>,
        reason: Option<&str>,
    ) -> Result<(), AllocationError> {
        let mut record = AuditRecord::new(
            AuditSubject::Vehicle,
            vehicle.id.as_uuid(),
            operation,
            actor,
            self.shared.now(),
            vehicle,
        )
        .with_provider(provider_id);
        if let Some(reason) = reason {
            record = record.with_reason(reason);
        }
        self.shared.audit(record).await
    }
}
