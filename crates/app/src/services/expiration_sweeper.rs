//! Expiration sweeper — the daily two-pass expiry run.
//!
//! Pass 1 resolves head registrations whose end date has passed; pass 2
//! archives points whose validity window has ended. Both passes commit per
//! item, so running them twice without a clock change does nothing the
//! second time.

use std::sync::Arc;

use netalloc_domain::audit::Actor;
use netalloc_domain::error::AllocationError;
use netalloc_domain::registration::Registration;
use netalloc_domain::sweep::{ExpirationReport, PointExpiryReport, RegistrationExpiryReport};

use super::network_point_lifecycle::NetworkPointLifecycle;
use super::queue_allocator::QueueAllocator;
use super::Shared;
use crate::ports::{Ports, RegistrationRepository};

/// Reason recorded when a point loses its last registration to expiry.
pub const EMPTY_AFTER_REGISTRATION_EXPIRY: &str = "empty queue after registration expiration";

/// What happened to one expired head registration.
enum Resolution {
    Promoted,
    Archived,
    /// The registration was no longer an expired head once locked.
    Stale,
}

/// Runs the registration and point expiry passes.
pub struct ExpirationSweeper<P> {
    shared: Arc<Shared<P>>,
    queue: QueueAllocator<P>,
    points: NetworkPointLifecycle<P>,
}

impl<P> Clone for ExpirationSweeper<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            queue: self.queue.clone(),
            points: self.points.clone(),
        }
    }
}

impl<P: Ports> ExpirationSweeper<P> {
    pub(crate) fn new(
        shared: Arc<Shared<P>>,
        queue: QueueAllocator<P>,
        points: NetworkPointLifecycle<P>,
    ) -> Self {
        Self {
            shared,
            queue,
            points,
        }
    }

    /// Run pass 1 then pass 2.
    ///
    /// Pass 2 always runs. A pass that cannot list its candidates reports
    /// the failure in its own `errors`.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn run(&self, actor: &Actor) -> ExpirationReport {
        let registrations = self
            .expire_registrations(actor)
            .await
            .unwrap_or_else(|err| {
                tracing::error!(error = %err, "registration expiry pass failed");
                RegistrationExpiryReport {
                    errors: vec![err.to_string()],
                    ..RegistrationExpiryReport::default()
                }
            });
        let points = self.expire_points(actor).await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "point expiry pass failed");
            PointExpiryReport {
                errors: vec![err.to_string()],
                ..PointExpiryReport::default()
            }
        });
        ExpirationReport {
            registrations,
            points,
        }
    }

    /// Pass 1: drop every expired current registration, promoting the next
    /// in line or archiving the point when nobody is left.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the candidates cannot be listed.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor))]
    pub async fn expire_registrations(
        &self,
        actor: &Actor,
    ) -> Result<RegistrationExpiryReport, AllocationError> {
        let today = self.shared.today();
        let expired = self
            .shared
            .ports
            .registrations()
            .find_expired_heads(today)
            .await?;

        let mut report = RegistrationExpiryReport {
            expired: expired.len(),
            ..RegistrationExpiryReport::default()
        };
        for registration in expired {
            let registration_id = registration.id;
            match self.resolve(registration, actor).await {
                Ok(Resolution::Promoted) => report.promoted += 1,
                Ok(Resolution::Archived) => report.archived += 1,
                Ok(Resolution::Stale) => {}
                Err(err) => {
                    tracing::warn!(%registration_id, error = %err, "failed to expire registration");
                    report.errors.push(format!("{registration_id}: {err}"));
                }
            }
        }
        tracing::info!(
            expired = report.expired,
            promoted = report.promoted,
            archived = report.archived,
            errors = report.errors.len(),
            "registration expiry pass finished"
        );
        Ok(report)
    }

    /// Pass 2: archive points whose validity ended.
    ///
    /// # Errors
    ///
    /// Returns a storage error only when the candidates cannot be listed.
    pub async fn expire_points(&self, actor: &Actor) -> Result<PointExpiryReport, AllocationError> {
        self.points.expired_sweep(actor).await
    }

    async fn resolve(
        &self,
        registration: Registration,
        actor: &Actor,
    ) -> Result<Resolution, AllocationError> {
        let point_id = registration.network_point_id;
        let today = self.shared.today();
        let emptied = {
            let _guard = self.shared.locks.lock(point_id).await;
            let queue = self.shared.queue(point_id).await?;
            let still_expired_head = queue
                .current()
                .is_some_and(|head| head.id == registration.id && head.is_expired(today));
            if !still_expired_head {
                return Ok(Resolution::Stale);
            }
            let point = self.shared.point(point_id).await?;
            self.queue
                .remove_locked(point, registration.id, actor)
                .await?
                .is_some_and(|queue| queue.is_empty())
        };

        if !emptied {
            return Ok(Resolution::Promoted);
        }
        if self
            .points
            .archive_if_queue_empty(point_id, EMPTY_AFTER_REGISTRATION_EXPIRY, actor)
            .await?
        {
            Ok(Resolution::Archived)
        } else {
            Ok(Resolution::Promoted)
        }
    }
}
