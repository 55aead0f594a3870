//! Queue allocator — ordered registrations per network point.
//!
//! Every queue mutation runs under the point lock and ends in
//! [`QueueAllocator::commit`], which derives the point's owner from the
//! queue head and stores both in one write. That is the only place an owner
//! is written, so the owner cannot drift from the queue, even when the
//! write fails.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use netalloc_domain::audit::{Actor, AuditOperation, AuditRecord, AuditSubject};
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{NetworkPointId, ProviderId, RegistrationId};
use netalloc_domain::network_point::NetworkPoint;
use netalloc_domain::registration::{Queue, Registration};
use netalloc_domain::sweep::QueueRemovalReport;
use netalloc_domain::time::Date;

use super::provider_state::StateRefresher;
use super::{Shared, not_found};
use crate::ports::{NetworkPointRepository, Ports, RegistrationRepository};

/// Reason recorded when a point is archived after losing its last provider.
pub const EMPTY_AFTER_PROVIDER_REMOVAL: &str = "empty queue after provider removal";

/// Whether [`QueueAllocator::commit`] records an owner change on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OwnerChange {
    /// Emit a point UPDATE audit record when the owner changes.
    Audited,
    /// The caller writes its own audit record covering the change.
    Silent,
}

/// Decides what happens to a point whose queue was emptied by a bulk removal.
pub trait EmptyQueueHandler {
    /// Returns whether the point was archived.
    fn queue_emptied(
        &self,
        point_id: NetworkPointId,
        reason: &str,
        actor: &Actor,
    ) -> impl Future<Output = Result<bool, AllocationError>> + Send;
}

/// Use-cases on the queue of a single network point.
pub struct QueueAllocator<P> {
    shared: Arc<Shared<P>>,
    states: StateRefresher<P>,
}

impl<P> Clone for QueueAllocator<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            states: self.states.clone(),
        }
    }
}

impl<P: Ports> QueueAllocator<P> {
    pub(crate) fn new(shared: Arc<Shared<P>>, states: StateRefresher<P>) -> Self {
        Self { shared, states }
    }

    /// Registrations of a point, head first.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the point does not exist.
    pub async fn get_queue(
        &self,
        point_id: NetworkPointId,
    ) -> Result<Vec<Registration>, AllocationError> {
        self.shared.point(point_id).await?;
        Ok(self.shared.queue(point_id).await?.into_entries())
    }

    /// Whether the point has no registration at all.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn has_empty_queue(&self, point_id: NetworkPointId) -> Result<bool, AllocationError> {
        Ok(self.shared.queue(point_id).await?.is_empty())
    }

    /// Append a provider at the tail of a point's queue.
    ///
    /// The new registration starts today and becomes current only when the
    /// queue was empty, in which case the provider becomes the owner.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or archived point
    /// or an unknown provider, [`AllocationError::Conflict`] for an archived
    /// provider, and [`AllocationError::Capacity`] when the provider lacks
    /// vehicles and `bypass_capacity` is not set.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn add_to_queue(
        &self,
        point_id: NetworkPointId,
        provider_id: ProviderId,
        end_date: Date,
        bypass_capacity: bool,
        actor: &Actor,
    ) -> Result<Registration, AllocationError> {
        let _provider = self.shared.provider_locks.lock(provider_id).await;
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.active_point(point_id).await?;
        self.shared.active_provider(provider_id).await?;
        self.states
            .ensure_capacity(provider_id, bypass_capacity)
            .await?;
        let (_, registration) = self
            .add_locked(point, provider_id, end_date, OwnerChange::Audited, actor)
            .await?;
        Ok(registration)
    }

    /// Append without checks and store `point` along with the queue, so a
    /// point that does not exist yet is inserted together with its first
    /// registration.
    ///
    /// The caller holds the point lock, and the provider lock when the
    /// assignment was checked against capacity.
    pub(crate) async fn add_locked(
        &self,
        point: NetworkPoint,
        provider_id: ProviderId,
        end_date: Date,
        change: OwnerChange,
        actor: &Actor,
    ) -> Result<(NetworkPoint, Registration), AllocationError> {
        let mut queue = self.shared.queue(point.id).await?;
        let registration = queue
            .push(provider_id, self.shared.today(), end_date)
            .clone();
        let point = self.commit(point, &queue, change, actor).await?;
        tracing::info!(
            point_id = %registration.network_point_id,
            provider_id = %provider_id,
            position = registration.queue_position,
            "registration queued"
        );
        Ok((point, registration))
    }

    /// Remove a registration; the next in line is promoted when the head leaves.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the registration does not exist.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn remove_from_queue(
        &self,
        registration_id: RegistrationId,
        actor: &Actor,
    ) -> Result<Vec<Registration>, AllocationError> {
        let point_id = self.registration(registration_id).await?.network_point_id;

        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.point(point_id).await?;
        let queue = self
            .remove_locked(point, registration_id, actor)
            .await?
            .ok_or_else(|| not_found("registration", registration_id))?;
        Ok(queue.into_entries())
    }

    /// Remove a registration from the stored queue of `point`.
    ///
    /// Returns `None` when the registration is no longer part of the queue.
    /// The caller holds the point lock.
    pub(crate) async fn remove_locked(
        &self,
        point: NetworkPoint,
        registration_id: RegistrationId,
        actor: &Actor,
    ) -> Result<Option<Queue>, AllocationError> {
        let mut queue = self.shared.queue(point.id).await?;
        let Some(removed) = queue.remove(registration_id) else {
            return Ok(None);
        };
        if removed.is_head() {
            queue.promote_head();
        }
        self.commit(point, &queue, OwnerChange::Audited, actor)
            .await?;
        Ok(Some(queue))
    }

    /// Make the first registration of the queue current.
    ///
    /// A no-op on an empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or archived point.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn promote_next(
        &self,
        point_id: NetworkPointId,
        actor: &Actor,
    ) -> Result<Vec<Registration>, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.active_point(point_id).await?;
        let mut queue = self.shared.queue(point_id).await?;
        queue.promote_head();
        self.commit(point, &queue, OwnerChange::Audited, actor)
            .await?;
        Ok(queue.into_entries())
    }

    /// Rearrange the queue to follow `ordered`; the first one becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] unless `ordered` names every
    /// registration of the queue exactly once.
    #[tracing::instrument(skip(self, ordered, actor), fields(actor = %actor, count = ordered.len()))]
    pub async fn reorder_queue(
        &self,
        point_id: NetworkPointId,
        ordered: &[RegistrationId],
        actor: &Actor,
    ) -> Result<Vec<Registration>, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.active_point(point_id).await?;
        let mut queue = self.shared.queue(point_id).await?;
        queue.reorder(ordered)?;
        self.commit(point, &queue, OwnerChange::Audited, actor)
            .await?;
        Ok(queue.into_entries())
    }

    /// Delete every registration of a point and drop its owner.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the point does not exist.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn clear_queue(
        &self,
        point_id: NetworkPointId,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.point(point_id).await?;
        let queue = Queue::new(point_id, Vec::new());
        self.commit(point, &queue, OwnerChange::Audited, actor)
            .await
    }

    /// Overwrite the supplied dates of one registration.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown registration and
    /// [`AllocationError::Validation`] when neither date is given.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn update_registration_dates(
        &self,
        registration_id: RegistrationId,
        start: Option<Date>,
        end: Option<Date>,
        actor: &Actor,
    ) -> Result<Registration, AllocationError> {
        let point_id = self.registration(registration_id).await?.network_point_id;

        let _guard = self.shared.locks.lock(point_id).await;
        let mut registration = self.registration(registration_id).await?;
        registration.apply_dates(start, end)?;
        self.shared
            .ports
            .registrations()
            .update(registration)
            .await
    }

    /// Pull `provider_id` out of every queue it appears in.
    ///
    /// Each point is handled under its own lock; a failure on one point is
    /// logged and recorded and the others are still processed. Points left
    /// with an empty queue are handed to `on_empty`.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the provider's registrations cannot
    /// be listed.
    #[tracing::instrument(skip(self, actor, on_empty), fields(actor = %actor))]
    pub async fn remove_provider_from_all_queues<H>(
        &self,
        provider_id: ProviderId,
        actor: &Actor,
        on_empty: &H,
    ) -> Result<QueueRemovalReport, AllocationError>
    where
        H: EmptyQueueHandler + Sync,
    {
        let point_ids: BTreeSet<NetworkPointId> = self
            .shared
            .ports
            .registrations()
            .find_by_provider(provider_id)
            .await?
            .into_iter()
            .map(|reg| reg.network_point_id)
            .collect();

        let mut report = QueueRemovalReport::default();
        for point_id in point_ids {
            let emptied = match self.remove_provider_from_point(point_id, provider_id, actor).await {
                Ok(emptied) => {
                    report.points += 1;
                    emptied
                }
                Err(err) => {
                    tracing::warn!(%point_id, %provider_id, error = %err, "failed to remove provider from queue");
                    report.errors.push(format!("{point_id}: {err}"));
                    continue;
                }
            };
            if !emptied {
                continue;
            }
            match on_empty
                .queue_emptied(point_id, EMPTY_AFTER_PROVIDER_REMOVAL, actor)
                .await
            {
                Ok(true) => report.archived += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(%point_id, error = %err, "failed to handle emptied queue");
                    report.errors.push(format!("{point_id}: {err}"));
                }
            }
        }
        Ok(report)
    }

    async fn registration(&self, id: RegistrationId) -> Result<Registration, AllocationError> {
        self.shared
            .ports
            .registrations()
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("registration", id))
    }

    /// Returns whether the queue is empty afterwards.
    async fn remove_provider_from_point(
        &self,
        point_id: NetworkPointId,
        provider_id: ProviderId,
        actor: &Actor,
    ) -> Result<bool, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.point(point_id).await?;
        let mut queue = self.shared.queue(point_id).await?;

        let held: Vec<&Registration> = queue
            .entries()
            .iter()
            .filter(|reg| reg.provider_id == provider_id)
            .collect();
        let head_removed = held.iter().any(|reg| reg.is_head());
        let ids: Vec<RegistrationId> = held.iter().map(|reg| reg.id).collect();

        for id in ids {
            queue.remove(id);
        }
        if head_removed {
            queue.promote_head();
        }
        self.commit(point, &queue, OwnerChange::Audited, actor)
            .await?;
        Ok(queue.is_empty())
    }

    /// Re-derive the owner of `point` from its stored queue.
    ///
    /// The caller holds the point lock.
    pub(crate) async fn sync_owner_locked(
        &self,
        point: NetworkPoint,
        change: OwnerChange,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let queue = self.shared.queue(point.id).await?;
        self.commit(point, &queue, change, actor).await
    }

    /// Store `point` and `queue` in one write, with the owner taken from
    /// the queue head, then refresh the state of the old and new owner.
    ///
    /// The caller holds the point lock.
    pub(crate) async fn commit(
        &self,
        mut point: NetworkPoint,
        queue: &Queue,
        change: OwnerChange,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let previous = point.owner;
        let next = queue.head_provider();
        point.owner = next;
        let point = self
            .shared
            .ports
            .points()
            .save_with_queue(point, queue.entries().to_vec())
            .await?;

        if previous != next {
            if change == OwnerChange::Audited {
                self.shared
                    .audit(
                        AuditRecord::new(
                            AuditSubject::NetworkPoint,
                            point.id.as_uuid(),
                            AuditOperation::Update,
                            actor,
                            self.shared.now(),
                            &point,
                        )
                        .with_provider(next),
                    )
                    .await?;
            }
            tracing::info!(
                point_id = %point.id,
                previous = ?previous,
                owner = ?next,
                "network point owner changed"
            );
        }
        self.states.refresh_all(&[previous, next]).await?;
        Ok(point)
    }
}
