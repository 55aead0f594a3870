//! Provider state — the derived ACTIVE/UNBALANCED/DISABLED status and the
//! provider lifecycle around it.
//!
//! [`StateRefresher`] is the only writer of `Provider::state`. Every service
//! that changes a vehicle or owned-point count calls it afterwards.

use std::collections::BTreeSet;
use std::sync::Arc;

use netalloc_domain::audit::{Actor, AuditOperation, AuditRecord, AuditSubject};
use netalloc_domain::error::{AllocationError, ConflictError};
use netalloc_domain::id::ProviderId;
use netalloc_domain::provider::{Provider, ProviderState};
use netalloc_domain::sweep::ProviderSweepReport;

use super::network_point_lifecycle::NetworkPointLifecycle;
use super::queue_allocator::{OwnerChange, QueueAllocator};
use super::vehicle_registry::VehicleRegistry;
use super::{Shared, not_found};
use crate::ports::{
    NetworkPointRepository, Ports, ProviderRepository, RegistrationRepository, VehicleRepository,
};

/// Reason recorded by [`ProviderStateEngine::batch_sweep`].
pub const NO_NETWORK_POINTS: &str = "no network points";

/// Outcome of the batch sweep for one provider.
enum Swept {
    /// Still owns at least one active point.
    Busy,
    Archived,
}

/// Recomputes and caches provider state from live counts.
pub struct StateRefresher<P> {
    shared: Arc<Shared<P>>,
}

impl<P> Clone for StateRefresher<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Ports> StateRefresher<P> {
    pub(crate) fn new(shared: Arc<Shared<P>>) -> Self {
        Self { shared }
    }

    /// Active vehicles and owned non-archived points of a provider.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repositories.
    pub async fn counts(&self, provider_id: ProviderId) -> Result<(u64, u64), AllocationError> {
        let vehicles = self
            .shared
            .ports
            .vehicles()
            .count_active_by_provider(provider_id)
            .await?;
        let points = self.shared.ports.points().count_owned_by(provider_id).await?;
        Ok((vehicles, points))
    }

    /// Check that the provider can take one more point.
    ///
    /// With `bypass` set a violation is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Capacity`] when the ratio would be violated
    /// and `bypass` is not set.
    pub async fn ensure_capacity(
        &self,
        provider_id: ProviderId,
        bypass: bool,
    ) -> Result<(), AllocationError> {
        let (vehicles, points) = self.counts(provider_id).await?;
        match self
            .shared
            .policy
            .check_assignment(provider_id, vehicles, points)
        {
            Ok(()) => Ok(()),
            Err(err) if bypass => {
                tracing::warn!(
                    %provider_id,
                    vehicles = err.vehicles,
                    required = err.required,
                    "capacity check bypassed"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Recompute the state of one provider and persist it when it changed.
    ///
    /// Archived providers always resolve to [`ProviderState::Disabled`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the provider does not exist.
    pub async fn refresh(&self, provider_id: ProviderId) -> Result<Provider, AllocationError> {
        let mut provider = self
            .shared
            .ports
            .providers()
            .get_by_id(provider_id)
            .await?
            .ok_or_else(|| not_found("provider", provider_id))?;

        let state = if provider.archived {
            ProviderState::Disabled
        } else {
            let (vehicles, points) = self.counts(provider_id).await?;
            self.shared.policy.derive_state(vehicles, points)
        };

        if provider.state == Some(state) {
            return Ok(provider);
        }
        tracing::debug!(%provider_id, previous = ?provider.state, %state, "provider state changed");
        provider.state = Some(state);
        self.shared.ports.providers().update(provider).await
    }

    /// Refresh every distinct provider in `ids`, skipping `None`.
    ///
    /// # Errors
    ///
    /// Stops at the first failing refresh.
    pub async fn refresh_all(&self, ids: &[Option<ProviderId>]) -> Result<(), AllocationError> {
        let distinct: BTreeSet<ProviderId> = ids.iter().flatten().copied().collect();
        for provider_id in distinct {
            self.refresh(provider_id).await?;
        }
        Ok(())
    }
}

/// Use-cases on providers: registry, archiving, and the batch sweep.
pub struct ProviderStateEngine<P> {
    shared: Arc<Shared<P>>,
    states: StateRefresher<P>,
    queue: QueueAllocator<P>,
    points: NetworkPointLifecycle<P>,
    vehicles: VehicleRegistry<P>,
}

impl<P> Clone for ProviderStateEngine<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            states: self.states.clone(),
            queue: self.queue.clone(),
            points: self.points.clone(),
            vehicles: self.vehicles.clone(),
        }
    }
}

impl<P: Ports> ProviderStateEngine<P> {
    pub(crate) fn new(
        shared: Arc<Shared<P>>,
        states: StateRefresher<P>,
        queue: QueueAllocator<P>,
        points: NetworkPointLifecycle<P>,
        vehicles: VehicleRegistry<P>,
    ) -> Self {
        Self {
            shared,
            states,
            queue,
            points,
            vehicles,
        }
    }

    /// Register a new provider. Its state starts out as computed from
    /// zero vehicles and zero points.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] if invariants fail and
    /// [`AllocationError::Conflict`] when the code is taken.
    #[tracing::instrument(skip(self, provider, actor), fields(code = %provider.code, actor = %actor))]
    pub async fn create_provider(
        &self,
        provider: Provider,
        actor: &Actor,
    ) -> Result<Provider, AllocationError> {
        provider.validate()?;
        if self
            .shared
            .ports
            .providers()
            .find_by_code(&provider.code)
            .await?
            .is_some()
        {
            return Err(ConflictError::DuplicateProviderCode(provider.code).into());
        }
        let created = self.shared.ports.providers().create(provider).await?;
        let created = self.states.refresh(created.id).await?;
        self.audit(&created, AuditOperation::Create, actor, None)
            .await?;
        Ok(created)
    }

    /// Rewrite name and address. Code, state, and archive flag are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown provider and
    /// [`AllocationError::Validation`] when the name is empty.
    #[tracing::instrument(skip(self, name, address, actor), fields(actor = %actor))]
    pub async fn update_provider(
        &self,
        provider_id: ProviderId,
        name: String,
        address: Option<String>,
        actor: &Actor,
    ) -> Result<Provider, AllocationError> {
        let mut provider = self.get_provider(provider_id).await?;
        provider.name = name;
        provider.address = address;
        provider.validate()?;
        let updated = self.shared.ports.providers().update(provider).await?;
        self.audit(&updated, AuditOperation::Update, actor, None)
            .await?;
        Ok(updated)
    }

    /// Delete a provider nothing refers to any more.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Conflict`] while the provider still has
    /// active vehicles or appears in any queue.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn delete_provider(
        &self,
        provider_id: ProviderId,
        actor: &Actor,
    ) -> Result<(), AllocationError> {
        let _provider = self.shared.provider_locks.lock(provider_id).await;
        let provider = self.get_provider(provider_id).await?;
        let (vehicles, _) = self.states.counts(provider_id).await?;
        let queued: BTreeSet<_> = self
            .shared
            .ports
            .registrations()
            .find_by_provider(provider_id)
            .await?
            .into_iter()
            .map(|reg| reg.network_point_id)
            .collect();
        let points = u64::try_from(queued.len()).unwrap_or(u64::MAX);
        if vehicles > 0 || points > 0 {
            return Err(ConflictError::ProviderInUse { vehicles, points }.into());
        }
        self.shared.ports.providers().delete(provider_id).await?;
        self.audit(&provider, AuditOperation::Delete, actor, None)
            .await
    }

    /// Look up a provider in any archive state.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when no provider with `id` exists.
    pub async fn get_provider(&self, provider_id: ProviderId) -> Result<Provider, AllocationError> {
        self.shared
            .ports
            .providers()
            .get_by_id(provider_id)
            .await?
            .ok_or_else(|| not_found("provider", provider_id))
    }

    /// Non-archived providers.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_providers(&self) -> Result<Vec<Provider>, AllocationError> {
        self.shared.ports.providers().list(false).await
    }

    /// Archived providers.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_archived_providers(&self) -> Result<Vec<Provider>, AllocationError> {
        self.shared.ports.providers().list(true).await
    }

    /// Number of active vehicles assigned to the provider.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn count_vehicles(&self, provider_id: ProviderId) -> Result<u64, AllocationError> {
        Ok(self.states.counts(provider_id).await?.0)
    }

    /// Number of non-archived points the provider currently owns.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn count_owned_points(&self, provider_id: ProviderId) -> Result<u64, AllocationError> {
        Ok(self.states.counts(provider_id).await?.1)
    }

    /// Recompute and persist the state of a provider.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown provider.
    #[tracing::instrument(skip(self))]
    pub async fn refresh_state(&self, provider_id: ProviderId) -> Result<Provider, AllocationError> {
        self.states.refresh(provider_id).await
    }

    /// Retire a provider together with its fleet and queue places.
    ///
    /// Vehicles are archived first, then the provider leaves every queue
    /// (points left without anyone are archived), remaining owned points are
    /// re-derived from their queues, and the provider ends up archived and
    /// [`ProviderState::Disabled`] under the provider lock.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or already
    /// archived provider. Failures on individual queues are only logged.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn archive_provider(
        &self,
        provider_id: ProviderId,
        reason: &str,
        actor: &Actor,
    ) -> Result<Provider, AllocationError> {
        let _provider = self.shared.provider_locks.lock(provider_id).await;
        let provider = self.get_provider(provider_id).await?;
        if provider.archived {
            return Err(not_found("active provider", provider_id));
        }

        let vehicle_reason = format!("provider archived: {reason}");
        for vehicle in self
            .shared
            .ports
            .vehicles()
            .find_active_by_provider(provider_id)
            .await?
        {
            self.vehicles
                .archive_locked(vehicle, &vehicle_reason, actor)
                .await?;
        }

        let removal = self
            .queue
            .remove_provider_from_all_queues(provider_id, actor, &self.points)
            .await?;
        if !removal.errors.is_empty() {
            tracing::warn!(%provider_id, errors = removal.errors.len(), "provider left in some queues");
        }

        for point in self.shared.ports.points().find_owned_by(provider_id).await? {
            let _guard = self.shared.locks.lock(point.id).await;
            let point = self.shared.point(point.id).await?;
            self.queue
                .sync_owner_locked(point, OwnerChange::Audited, actor)
                .await?;
        }

        let mut provider = self.get_provider(provider_id).await?;
        provider.archived = true;
        provider.state = Some(ProviderState::Disabled);
        let provider = self.shared.ports.providers().update(provider).await?;
        self.audit(&provider, AuditOperation::Archive, actor, Some(reason))
            .await?;
        tracing::info!(%provider_id, reason, "provider archived");
        Ok(provider)
    }

    /// Bring an archived provider back; its state is recomputed, not forced.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] unless an archived provider with
    /// `id` exists.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn unarchive_provider(
        &self,
        provider_id: ProviderId,
        actor: &Actor,
    ) -> Result<Provider, AllocationError> {
        if !self.shared.ports.providers().unarchive(provider_id).await? {
            return Err(not_found("archived provider", provider_id));
        }
        let provider = self.states.refresh(provider_id).await?;
        self.audit(&provider, AuditOperation::Unarchive, actor, None)
            .await?;
        Ok(provider)
    }

    /// Archive every active provider that owns no active point.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the candidates cannot be listed;
    /// per-provider failures land in the report.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn batch_sweep(&self, actor: &Actor) -> Result<ProviderSweepReport, AllocationError> {
        let mut report = ProviderSweepReport::default();
        for provider in self.list_providers().await? {
            match self.sweep_one(provider.id, actor).await {
                Ok(Swept::Busy) => {}
                Ok(Swept::Archived) => {
                    report.checked += 1;
                    report.archived += 1;
                }
                Err(err) => {
                    report.checked += 1;
                    tracing::warn!(provider_id = %provider.id, error = %err, "failed to archive provider");
                    report.errors.push(format!("{}: {err}", provider.id));
                }
            }
        }
        tracing::info!(
            checked = report.checked,
            archived = report.archived,
            errors = report.errors.len(),
            "provider sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(
        &self,
        provider_id: ProviderId,
        actor: &Actor,
    ) -> Result<Swept, AllocationError> {
        let owned = self
            .shared
            .ports
            .points()
            .count_owned_by(provider_id)
            .await?;
        if owned > 0 {
            return Ok(Swept::Busy);
        }
        self.archive_provider(provider_id, NO_NETWORK_POINTS, actor)
            .await?;
        Ok(Swept::Archived)
    }

    async fn audit(
        &self,
        provider: &Provider,
        operation: AuditOperation,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<(), AllocationError> {
        let mut record = AuditRecord::new(
            AuditSubject::Provider,
            provider.id.as_uuid(),
            operation,
            actor,
            self.shared.now(),
            provider,
        )
        .with_provider(Some(provider.id));
        if let Some(reason) = reason {
            record = record.with_reason(reason);
        }
        self.shared.audit(record).await
    }
}
