//! Network point lifecycle — create, update, archive, unarchive, and the
//! validity sweep.

use std::future::Future;
use std::sync::Arc;

use netalloc_domain::audit::{Actor, AuditOperation, AuditRecord, AuditSubject};
use netalloc_domain::error::{AllocationError, ConflictError, ValidationError};
use netalloc_domain::id::{NetworkPointId, ProviderId};
use netalloc_domain::network_point::{
    NetworkPoint, NetworkPointUpdate, NewNetworkPoint, UnarchivePoint,
};
use netalloc_domain::registration::Queue;
use netalloc_domain::sweep::PointExpiryReport;

use super::provider_state::StateRefresher;
use super::queue_allocator::{EmptyQueueHandler, OwnerChange, QueueAllocator};
use super::{Shared, not_found};
use crate::ports::{NetworkPointRepository, Ports};

/// Reason recorded by [`NetworkPointLifecycle::expired_sweep`].
pub const EXPIRED: &str = "expired";

/// Use-cases on network points as a whole.
pub struct NetworkPointLifecycle<P> {
    shared: Arc<Shared<P>>,
    queue: QueueAllocator<P>,
    states: StateRefresher<P>,
}

impl<P> Clone for NetworkPointLifecycle<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
            states: self.states.clone(),
        }
    }
}

impl<P: Ports> NetworkPointLifecycle<P> {
    pub(crate) fn new(
        shared: Arc<Shared<P>>,
        queue: QueueAllocator<P>,
        states: StateRefresher<P>,
    ) -> Self {
        Self {
            shared,
            queue,
            states,
        }
    }

    /// Create a point valid from today and seed its queue with one provider.
    ///
    /// The provider must be able to take one more point unless
    /// `bypass_capacity` is set.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when `valid_to`, the provider,
    /// or its end date is missing, [`AllocationError::Conflict`] when the code
    /// is taken, [`AllocationError::NotFound`] for an unknown provider, and
    /// [`AllocationError::Capacity`] when the ratio would be violated.
    #[tracing::instrument(skip(self, new, actor), fields(code = %new.code, actor = %actor))]
    pub async fn create_point(
        &self,
        new: NewNetworkPoint,
        bypass_capacity: bool,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let valid_to = new.valid_to.ok_or(ValidationError::MissingField("valid_to"))?;
        let provider_id = new
            .provider_id
            .ok_or(ValidationError::MissingField("provider"))?;
        let end_date = new
            .provider_end_date
            .ok_or(ValidationError::MissingField("provider end date"))?;

        let point = NetworkPoint {
            id: NetworkPointId::new(),
            code: new.code,
            name: new.name,
            point_type: new.point_type,
            valid_from: self.shared.today(),
            valid_to,
            owner: None,
            archived: false,
        };
        point.validate()?;

        let _provider = self.shared.provider_locks.lock(provider_id).await;
        let _guard = self.shared.locks.lock(point.id).await;
        self.ensure_code_free(&point).await?;
        self.shared.active_provider(provider_id).await?;
        self.states
            .ensure_capacity(provider_id, bypass_capacity)
            .await?;

        let (point, _) = self
            .queue
            .add_locked(point, provider_id, end_date, OwnerChange::Silent, actor)
            .await?;
        self.audit(&point, AuditOperation::Create, actor, point.owner, None)
            .await?;
        tracing::info!(point_id = %point.id, code = %point.code, %provider_id, "network point created");
        Ok(point)
    }

    /// Rewrite the scalar fields of a point. The queue is left alone and the
    /// owner is re-derived from it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or archived point,
    /// [`AllocationError::Validation`] if invariants fail, and
    /// [`AllocationError::Conflict`] when the new code is taken.
    #[tracing::instrument(skip(self, changes, actor), fields(actor = %actor))]
    pub async fn update_point(
        &self,
        point_id: NetworkPointId,
        changes: NetworkPointUpdate,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let mut point = self.shared.active_point(point_id).await?;
        changes.apply_to(&mut point);
        point.validate()?;
        self.ensure_code_free(&point).await?;

        let point = self
            .queue
            .sync_owner_locked(point, OwnerChange::Silent, actor)
            .await?;
        self.audit(&point, AuditOperation::Update, actor, point.owner, None)
            .await?;
        Ok(point)
    }

    /// Clear the queue of a point and archive it in one write.
    ///
    /// The audit record carries the owner the point had before archiving;
    /// no separate owner-change record is written.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] for an unknown or already
    /// archived point.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn archive_point(
        &self,
        point_id: NetworkPointId,
        reason: &str,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.active_point(point_id).await?;
        self.archive_locked(point, reason, actor).await
    }

    async fn archive_locked(
        &self,
        mut point: NetworkPoint,
        reason: &str,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let previous_owner = point.owner;
        let snapshot = point.clone();

        point.archived = true;
        let empty = Queue::new(point.id, Vec::new());
        let point = self
            .queue
            .commit(point, &empty, OwnerChange::Silent, actor)
            .await?;

        self.audit(
            &snapshot,
            AuditOperation::Archive,
            actor,
            previous_owner,
            Some(reason),
        )
        .await?;
        tracing::info!(point_id = %point.id, reason, "network point archived");
        Ok(point)
    }

    /// Archive the point only if its queue is (still) empty.
    ///
    /// Returns whether the point was archived.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when the point does not exist.
    pub async fn archive_if_queue_empty(
        &self,
        point_id: NetworkPointId,
        reason: &str,
        actor: &Actor,
    ) -> Result<bool, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.point(point_id).await?;
        if point.archived || !self.shared.queue(point_id).await?.is_empty() {
            return Ok(false);
        }
        self.archive_locked(point, reason, actor).await?;
        Ok(true)
    }

    /// Bring an archived point back with a fresh validity window and a
    /// single queued provider.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Validation`] when an input is missing or
    /// a date is not strictly after today, [`AllocationError::NotFound`]
    /// unless an archived point with `id` exists, and
    /// [`AllocationError::Capacity`] when the ratio would be violated.
    #[tracing::instrument(skip(self, request, actor), fields(actor = %actor))]
    pub async fn unarchive_point(
        &self,
        point_id: NetworkPointId,
        request: UnarchivePoint,
        actor: &Actor,
    ) -> Result<NetworkPoint, AllocationError> {
        let provider_id = request
            .provider_id
            .ok_or(ValidationError::MissingField("provider"))?;
        let end_date = request
            .provider_end_date
            .ok_or(ValidationError::MissingField("provider end date"))?;
        let valid_to = request
            .valid_to
            .ok_or(ValidationError::MissingField("valid_to"))?;
        let today = self.shared.today();
        if end_date <= today {
            return Err(ValidationError::DateNotInFuture("provider end date").into());
        }
        if valid_to <= today {
            return Err(ValidationError::DateNotInFuture("valid_to").into());
        }

        let _provider = self.shared.provider_locks.lock(provider_id).await;
        let _guard = self.shared.locks.lock(point_id).await;
        let mut point = self.shared.point(point_id).await?;
        if !point.archived {
            return Err(not_found("archived network point", point_id));
        }
        self.shared.active_provider(provider_id).await?;
        self.states
            .ensure_capacity(provider_id, request.bypass_capacity)
            .await?;

        point.archived = false;
        point.valid_from = today;
        point.valid_to = valid_to;
        let (point, _) = self
            .queue
            .add_locked(point, provider_id, end_date, OwnerChange::Silent, actor)
            .await?;

        self.audit(
            &point,
            AuditOperation::Unarchive,
            actor,
            Some(provider_id),
            None,
        )
        .await?;
        tracing::info!(%point_id, %provider_id, "network point unarchived");
        Ok(point)
    }

    /// Look up a point in any archive state.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::NotFound`] when no point with `id` exists.
    pub async fn get_point(&self, point_id: NetworkPointId) -> Result<NetworkPoint, AllocationError> {
        self.shared.point(point_id).await
    }

    /// Non-archived points.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_points(&self) -> Result<Vec<NetworkPoint>, AllocationError> {
        self.shared.ports.points().list(false).await
    }

    /// Archived points.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_archived_points(&self) -> Result<Vec<NetworkPoint>, AllocationError> {
        self.shared.ports.points().list(true).await
    }

    /// Archive every active point whose validity ended before today.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the candidates cannot be listed;
    /// per-point failures land in the report.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn expired_sweep(&self, actor: &Actor) -> Result<PointExpiryReport, AllocationError> {
        let today = self.shared.today();
        let candidates = self.shared.ports.points().find_expired(today).await?;

        let mut report = PointExpiryReport {
            checked: candidates.len(),
            ..PointExpiryReport::default()
        };
        for candidate in candidates {
            match self.archive_expired(candidate.id, actor).await {
                Ok(true) => report.archived += 1,
                Ok(false) => report.skipped_archived += 1,
                Err(err) => {
                    tracing::warn!(point_id = %candidate.id, error = %err, "failed to archive expired point");
                    report.errors.push(format!("{}: {err}", candidate.id));
                }
            }
        }
        tracing::info!(
            checked = report.checked,
            archived = report.archived,
            errors = report.errors.len(),
            "point expiry sweep finished"
        );
        Ok(report)
    }

    /// Returns `false` when the point was archived in the meantime.
    async fn archive_expired(
        &self,
        point_id: NetworkPointId,
        actor: &Actor,
    ) -> Result<bool, AllocationError> {
        let _guard = self.shared.locks.lock(point_id).await;
        let point = self.shared.point(point_id).await?;
        if point.archived {
            return Ok(false);
        }
        self.archive_locked(point, EXPIRED, actor).await?;
        Ok(true)
    }

    async fn ensure_code_free(&self, point: &NetworkPoint) -> Result<(), AllocationError> {
        let taken = self
            .shared
            .ports
            .points()
            .find_by_code(&point.code)
            .await?
            .is_some_and(|other| other.id != point.id);
        if taken {
            return Err(ConflictError::DuplicatePointCode(point.code.clone()).into());
        }
        Ok(())
    }

    async fn audit(
        &self,
        point: &NetworkPoint,
        operation: AuditOperation,
        actor: &Actor,
        provider_id: Option<ProviderId>,
        reason: Option<&str>,
    ) -> Result<(), AllocationError> {
        let mut record = AuditRecord::new(
            AuditSubject::NetworkPoint,
            point.id.as_uuid(),
            operation,
            actor,
            self.shared.now(),
            point,
        )
        .with_provider(provider_id);
        if let Some(reason) = reason {
            record = record.with_reason(reason);
        }
        self.shared.audit(record).await
    }
}

impl<P: Ports> EmptyQueueHandler for NetworkPointLifecycle<P> {
    fn queue_emptied(
        &self,
        point_id: NetworkPointId,
        reason: &str,
        actor: &Actor,
    ) -> impl Future<Output = Result<bool, AllocationError>> + Send {
        self.archive_if_queue_empty(point_id, reason, actor)
    }
}

#[cfg(test)]
mod tests {
    use netalloc_domain::network_point::NetworkPointType;
    use netalloc_domain::provider::ProviderState;

    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn should_create_point_with_seeded_queue_when_capacity_allows() {
        let h = harness();
        let a = h.provider("A", 2).await;

        let point = h
            .allocation
            .points
            .create_point(h.new_point("NP-1", a.id), false, &h.actor)
            .await
            .unwrap();

        assert_eq!(point.valid_from, h.today());
        assert_eq!(point.owner, Some(a.id));
        let queue = h.allocation.queue.get_queue(point.id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert!(queue[0].is_head());
        assert_eq!(queue[0].end_date, h.in_days(30));
        assert!(
            h.audit()
                .iter()
                .any(|r| r.subject_id == point.id.as_uuid() && r.operation == AuditOperation::Create)
        );
    }

    #[tokio::test]
    async fn should_reject_create_when_capacity_exceeded() {
        let h = harness();
        let a = h.provider("A", 2).await;
        h.point("NP-1", a.id).await;

        let result = h
            .allocation
            .points
            .create_point(h.new_point("NP-2", a.id), false, &h.actor)
            .await;

        assert!(matches!(result, Err(AllocationError::Capacity(err)) if err.vehicles == 2 && err.required == 3));
        assert!(h.allocation.points.list_points().await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn should_create_unbalanced_provider_when_capacity_bypassed() {
        let h = harness();
        let a = h.provider("A", 2).await;
        h.point("NP-1", a.id).await;

        h.allocation
            .points
            .create_point(h.new_point("NP-2", a.id), true, &h.actor)
            .await
            .unwrap();

        assert_eq!(h.stored_provider(a.id).state, Some(ProviderState::Unbalanced));
    }

    #[tokio::test]
    async fn should_reject_create_when_mandatory_input_missing() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let mut new = h.new_point("NP-1", a.id);
        new.provider_end_date = None;

        let result = h.allocation.points.create_point(new, false, &h.actor).await;

        assert!(matches!(
            result,
            Err(AllocationError::Validation(ValidationError::MissingField(
                "provider end date"
            )))
        ));
    }

    #[tokio::test]
    async fn should_reject_create_when_code_taken() {
        let h = harness();
        let a = h.provider("A", 4).await;
        h.point("NP-1", a.id).await;

        let result = h
            .allocation
            .points
            .create_point(h.new_point("NP-1", a.id), false, &h.actor)
            .await;

        assert!(matches!(
            result,
            Err(AllocationError::Conflict(ConflictError::DuplicatePointCode(_)))
        ));
    }

    #[tokio::test]
    async fn should_keep_queue_when_updated() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;

        let updated = h
            .allocation
            .points
            .update_point(
                point.id,
                NetworkPointUpdate {
                    code: "NP-1".to_string(),
                    name: "Renamed".to_string(),
                    point_type: NetworkPointType::Hospital,
                    valid_from: point.valid_from,
                    valid_to: h.in_days(60),
                },
                &h.actor,
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.point_type, NetworkPointType::Hospital);
        assert_eq!(updated.owner, Some(a.id));
        assert_eq!(h.allocation.queue.get_queue(point.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_clear_queue_and_attribute_previous_owner_when_archived() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;

        let archived = h
            .allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();

        assert!(archived.archived);
        assert_eq!(archived.owner, None);
        assert!(h.allocation.queue.has_empty_queue(point.id).await.unwrap());
        assert_eq!(h.allocation.providers.count_owned_points(a.id).await.unwrap(), 0);

        let record = h
            .audit()
            .into_iter()
            .find(|r| r.subject_id == point.id.as_uuid() && r.operation == AuditOperation::Archive)
            .unwrap();
        assert_eq!(record.provider_id, Some(a.id));
        assert_eq!(record.reason.as_deref(), Some("closed"));
        assert_eq!(record.snapshot["archived"], false);
    }

    #[tokio::test]
    async fn should_return_not_found_when_archiving_twice() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;
        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();

        let again = h
            .allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await;

        assert!(matches!(again, Err(AllocationError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_reseed_queue_when_unarchived() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let b = h.provider("B", 2).await;
        let point = h.point("NP-1", a.id).await;
        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();
        h.clock.advance(5);

        let restored = h
            .allocation
            .points
            .unarchive_point(
                point.id,
                UnarchivePoint {
                    provider_id: Some(b.id),
                    provider_end_date: Some(h.in_days(10)),
                    valid_to: Some(h.in_days(100)),
                    bypass_capacity: false,
                },
                &h.actor,
            )
            .await
            .unwrap();

        assert!(!restored.archived);
        assert_eq!(restored.valid_from, h.today());
        assert_eq!(restored.valid_to, h.in_days(100));
        assert_eq!(restored.owner, Some(b.id));
        let queue = h.allocation.queue.get_queue(point.id).await.unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].provider_id, b.id);
        assert!(
            h.audit()
                .iter()
                .any(|r| r.operation == AuditOperation::Unarchive && r.provider_id == Some(b.id))
        );
    }

    #[tokio::test]
    async fn should_reject_unarchive_when_date_not_in_future() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;
        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();

        let result = h
            .allocation
            .points
            .unarchive_point(
                point.id,
                UnarchivePoint {
                    provider_id: Some(a.id),
                    provider_end_date: Some(h.today()),
                    valid_to: Some(h.in_days(100)),
                    bypass_capacity: false,
                },
                &h.actor,
            )
            .await;

        assert!(matches!(
            result,
            Err(AllocationError::Validation(ValidationError::DateNotInFuture(_)))
        ));
        assert!(h.stored_point(point.id).archived);
    }

    #[tokio::test]
    async fn should_reject_unarchive_when_point_is_active() {
        let h = harness();
        let a = h.provider("A", 4).await;
        let point = h.point("NP-1", a.id).await;

        let result = h
            .allocation
            .points
            .unarchive_point(
                point.id,
                UnarchivePoint {
                    provider_id: Some(a.id),
                    provider_end_date: Some(h.in_days(10)),
                    valid_to: Some(h.in_days(100)),
                    bypass_capacity: false,
                },
                &h.actor,
            )
            .await;

        assert!(matches!(result, Err(AllocationError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_archive_expired_points_once_when_swept_twice() {
        let h = harness();
        let a = h.provider("A", 4).await;
        let expiring = h.point("NP-1", a.id).await;
        let lasting = h.point("NP-2", a.id).await;
        h.allocation
            .points
            .update_point(
                expiring.id,
                NetworkPointUpdate {
                    code: expiring.code.clone(),
                    name: expiring.name.clone(),
                    point_type: expiring.point_type,
                    valid_from: expiring.valid_from,
                    valid_to: h.in_days(3),
                },
                &h.actor,
            )
            .await
            .unwrap();
        h.clock.advance(4);

        let first = h.allocation.points.expired_sweep(&Actor::system()).await.unwrap();
        let second = h.allocation.points.expired_sweep(&Actor::system()).await.unwrap();

        assert_eq!(first.checked, 1);
        assert_eq!(first.archived, 1);
        assert!(first.errors.is_empty());
        assert_eq!(second, PointExpiryReport::default());
        assert!(h.stored_point(expiring.id).archived);
        assert!(!h.stored_point(lasting.id).archived);
        let record = h
            .audit()
            .into_iter()
            .find(|r| r.subject_id == expiring.id.as_uuid() && r.operation == AuditOperation::Archive)
            .unwrap();
        assert_eq!(record.reason.as_deref(), Some(EXPIRED));
        assert_eq!(record.author, "system");
    }

    #[tokio::test]
    async fn should_skip_archive_when_queue_not_empty() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;

        let archived = h
            .allocation
            .points
            .queue_emptied(point.id, "empty", &h.actor)
            .await
            .unwrap();

        assert!(!archived);
        assert!(!h.stored_point(point.id).archived);
    }

    #[tokio::test]
    async fn should_admit_only_one_point_when_creates_race_for_last_slot() {
        let h = harness();
        let a = h.provider("A", 2).await;

        let (first, second) = tokio::join!(
            h.allocation
                .points
                .create_point(h.new_point("NP-1", a.id), false, &h.actor),
            h.allocation
                .points
                .create_point(h.new_point("NP-2", a.id), false, &h.actor),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(AllocationError::Capacity(_))))
        );
        assert_eq!(h.allocation.providers.count_owned_points(a.id).await.unwrap(), 1);
        assert_eq!(h.stored_provider(a.id).state, Some(ProviderState::Active));
    }

    #[tokio::test]
    async fn should_write_only_archive_record_when_archived() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;
        let before = h.audit().len();

        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();

        let operations: Vec<AuditOperation> = h.audit()[before..]
            .iter()
            .filter(|r| r.subject_id == point.id.as_uuid())
            .map(|r| r.operation)
            .collect();
        assert_eq!(operations, vec![AuditOperation::Archive]);
    }

    #[tokio::test]
    async fn should_reject_unarchive_when_provider_lacks_vehicles() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;
        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();
        h.point("NP-2", a.id).await;

        let result = h
            .allocation
            .points
            .unarchive_point(
                point.id,
                UnarchivePoint {
                    provider_id: Some(a.id),
                    provider_end_date: Some(h.in_days(10)),
                    valid_to: Some(h.in_days(100)),
                    bypass_capacity: false,
                },
                &h.actor,
            )
            .await;

        assert!(matches!(result, Err(AllocationError::Capacity(_))));
        assert!(h.stored_point(point.id).archived);
        assert!(h.allocation.queue.has_empty_queue(point.id).await.unwrap());
        assert_eq!(h.allocation.providers.count_owned_points(a.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn should_unarchive_and_unbalance_provider_when_capacity_bypassed() {
        let h = harness();
        let a = h.provider("A", 2).await;
        let point = h.point("NP-1", a.id).await;
        h.allocation
            .points
            .archive_point(point.id, "closed", &h.actor)
            .await
            .unwrap();
        h.point("NP-2", a.id).await;

        let restored = h
            .allocation
            .points
            .unarchive_point(
                point.id,
                UnarchivePoint {
                    provider_id: Some(a.id),
                    provider_end_date: Some(h.in_days(10)),
                    valid_to: Some(h.in_days(100)),
                    bypass_capacity: true,
                },
                &h.actor,
            )
            .await
            .unwrap();

        assert!(!restored.archived);
        assert_eq!(restored.owner, Some(a.id));
        assert_eq!(h.allocation.providers.count_owned_points(a.id).await.unwrap(), 2);
        assert_eq!(h.stored_provider(a.id).state, Some(ProviderState::Unbalanced));
    }

    #[tokio::test]
    async fn should_archive_next_expired_point_when_one_fails() {
        let h = harness();
        let a = h.provider("A", 4).await;
        let broken = h.point("NP-1", a.id).await;
        let healthy = h.point("NP-2", a.id).await;
        h.clock.advance(366);
        h.store.fail_on(broken.id);

        let report = h.allocation.points.expired_sweep(&Actor::system()).await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.archived, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with(&broken.id.to_string()));
        assert!(!h.stored_point(broken.id).archived);
        assert!(h.stored_point(healthy.id).archived);
    }
}
