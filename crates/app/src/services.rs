//! Application services — use-case implementations.
//!
//! Each service accepts the bundled [`Ports`] via a generic parameter
//! (constructor injection), keeping this layer decoupled from concrete adapters.
//! Services share one context holding the ports, the per-point and
//! per-provider locks, and the capacity policy.
//!
//! Dependencies between services point one way:
//! `StateRefresher` ← `QueueAllocator` ← `NetworkPointLifecycle` ←
//! `ProviderStateEngine`, with `VehicleRegistry` and `ExpirationSweeper`
//! reusing the lower layers.

pub mod expiration_sweeper;
pub mod network_point_lifecycle;
pub mod provider_state;
pub mod queue_allocator;
pub mod vehicle_registry;

use std::sync::Arc;

use netalloc_domain::audit::AuditRecord;
use netalloc_domain::error::{AllocationError, ConflictError, NotFoundError};
use netalloc_domain::id::{NetworkPointId, ProviderId};
use netalloc_domain::network_point::NetworkPoint;
use netalloc_domain::provider::{CapacityPolicy, Provider};
use netalloc_domain::registration::Queue;
use netalloc_domain::time::{Date, Timestamp};

use crate::locks::{PointLocks, ProviderLocks};
use crate::ports::{
    AuditSink, Clock, NetworkPointRepository, Ports, ProviderRepository, RegistrationRepository,
};

pub use expiration_sweeper::ExpirationSweeper;
pub use network_point_lifecycle::NetworkPointLifecycle;
pub use provider_state::{ProviderStateEngine, StateRefresher};
pub use queue_allocator::{EmptyQueueHandler, QueueAllocator};
pub use vehicle_registry::VehicleRegistry;

/// State shared by every service of one [`Allocation`].
///
/// Lock order: a provider lock is always taken before any point lock.
pub(crate) struct Shared<P> {
    pub(crate) ports: P,
    pub(crate) locks: PointLocks,
    pub(crate) provider_locks: ProviderLocks,
    pub(crate) policy: CapacityPolicy,
}

impl<P: Ports> Shared<P> {
    pub(crate) fn today(&self) -> Date {
        self.ports.clock().today()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.ports.clock().now()
    }

    /// Load a point in any archive state.
    pub(crate) async fn point(&self, id: NetworkPointId) -> Result<NetworkPoint, AllocationError> {
        self.ports
            .points()
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("network point", id))
    }

    /// Load a point that has not been archived.
    pub(crate) async fn active_point(
        &self,
        id: NetworkPointId,
    ) -> Result<NetworkPoint, AllocationError> {
        let point = self.point(id).await?;
        if point.archived {
            return Err(not_found("network point", id));
        }
        Ok(point)
    }

    /// Load a provider that may receive new assignments.
    pub(crate) async fn active_provider(
        &self,
        id: ProviderId,
    ) -> Result<Provider, AllocationError> {
        let provider = self
            .ports
            .providers()
            .get_by_id(id)
            .await?
            .ok_or_else(|| not_found("provider", id))?;
        if provider.archived {
            return Err(ConflictError::Archived("provider").into());
        }
        Ok(provider)
    }

    pub(crate) async fn queue(&self, point_id: NetworkPointId) -> Result<Queue, AllocationError> {
        let entries = self.ports.registrations().find_by_point(point_id).await?;
        Ok(Queue::new(point_id, entries))
    }

    pub(crate) async fn audit(&self, record: AuditRecord) -> Result<(), AllocationError> {
        self.ports.audit().record(record).await
    }
}

pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> AllocationError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

/// All allocation services wired over one set of ports.
pub struct Allocation<P> {
    pub queue: QueueAllocator<P>,
    pub points: NetworkPointLifecycle<P>,
    pub providers: ProviderStateEngine<P>,
    pub vehicles: VehicleRegistry<P>,
    pub sweeper: ExpirationSweeper<P>,
    shared: Arc<Shared<P>>,
}

impl<P: Ports> Allocation<P> {
    /// Wire the services over `ports`, enforcing `policy` on assignments.
    pub fn new(ports: P, policy: CapacityPolicy) -> Self {
        let shared = Arc::new(Shared {
            ports,
            locks: PointLocks::new(),
            provider_locks: ProviderLocks::new(),
            policy,
        });
        let states = StateRefresher::new(Arc::clone(&shared));
        let queue = QueueAllocator::new(Arc::clone(&shared), states.clone());
        let points = NetworkPointLifecycle::new(Arc::clone(&shared), queue.clone(), states.clone());
        let vehicles = VehicleRegistry::new(Arc::clone(&shared), states.clone());
        let providers = ProviderStateEngine::new(
            Arc::clone(&shared),
            states,
            queue.clone(),
            points.clone(),
            vehicles.clone(),
        );
        let sweeper = ExpirationSweeper::new(Arc::clone(&shared), queue.clone(), points.clone());
        Self {
            queue,
            points,
            providers,
            vehicles,
            sweeper,
            shared,
        }
    }

    /// The ports the services run against.
    #[must_use]
    pub fn ports(&self) -> &P {
        &self.shared.ports
    }

    #[must_use]
    pub fn policy(&self) -> CapacityPolicy {
        self.shared.policy
    }
}

impl<P> Clone for Allocation<P> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            points: self.points.clone(),
            providers: self.providers.clone(),
            vehicles: self.vehicles.clone(),
            sweeper: self.sweeper.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}
