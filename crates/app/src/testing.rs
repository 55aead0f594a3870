//! In-memory ports shared by the service tests.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Days, NaiveDate};

use netalloc_domain::audit::{Actor, AuditRecord};
use netalloc_domain::error::AllocationError;
use netalloc_domain::id::{NetworkPointId, ProviderId, RegistrationId, VehicleId};
use netalloc_domain::network_point::{NetworkPoint, NetworkPointType, NewNetworkPoint};
use netalloc_domain::provider::{CapacityPolicy, Provider};
use netalloc_domain::registration::Registration;
use netalloc_domain::time::Date;
use netalloc_domain::vehicle::Vehicle;

use crate::ports::{
    AuditSink, Clock, ManualClock, NetworkPointRepository, PortSet, ProviderRepository,
    RegistrationRepository, VehicleRepository,
};
use crate::services::Allocation;

#[derive(Default)]
pub(crate) struct Tables {
    pub points: HashMap<NetworkPointId, NetworkPoint>,
    pub registrations: HashMap<RegistrationId, Registration>,
    pub providers: HashMap<ProviderId, Provider>,
    pub vehicles: HashMap<VehicleId, Vehicle>,
    pub audit: Vec<AuditRecord>,
    /// Ids whose writes and counts fail, see [`Store::fail_on`].
    pub failing: HashSet<String>,
}

#[derive(Clone, Default)]
pub(crate) struct Store(Arc<Mutex<Tables>>);

impl Store {
    pub fn tables(&self) -> MutexGuard<'_, Tables> {
        self.0.lock().unwrap()
    }

    /// Make every point write keyed by `id` and every owned-point count for
    /// `id` fail with a storage error. [`EXPIRED_HEADS`] fails the expired
    /// head listing.
    pub fn fail_on(&self, id: impl ToString) {
        self.tables().failing.insert(id.to_string());
    }

    pub fn recover(&self, id: impl ToString) {
        self.tables().failing.remove(&id.to_string());
    }
}

pub(crate) const EXPIRED_HEADS: &str = "expired-heads";

fn injected(tables: &Tables, id: impl ToString) -> Result<(), AllocationError> {
    let id = id.to_string();
    if tables.failing.contains(&id) {
        return Err(AllocationError::storage(std::io::Error::other(format!(
            "injected failure for {id}"
        ))));
    }
    Ok(())
}

#[derive(Clone)]
pub(crate) struct MemPoints(Store);
#[derive(Clone)]
pub(crate) struct MemRegistrations(Store);
#[derive(Clone)]
pub(crate) struct MemProviders(Store);
#[derive(Clone)]
pub(crate) struct MemVehicles(Store);
#[derive(Clone)]
pub(crate) struct MemAudit(Store);

impl NetworkPointRepository for MemPoints {
    fn save_with_queue(
        &self,
        point: NetworkPoint,
        entries: Vec<Registration>,
    ) -> impl Future<Output = Result<NetworkPoint, AllocationError>> + Send {
        let mut tables = self.0.tables();
        let positions: HashSet<u32> = entries.iter().map(|r| r.queue_position).collect();
        let result = injected(&tables, point.id).and_then(|()| {
            if positions.len() == entries.len() {
                Ok(())
            } else {
                Err(AllocationError::storage(std::io::Error::other(
                    "duplicate queue position",
                )))
            }
        });
        let result = result.map(|()| {
            tables
                .registrations
                .retain(|_, r| r.network_point_id != point.id);
            for entry in entries {
                tables.registrations.insert(entry.id, entry);
            }
            tables.points.insert(point.id, point.clone());
            point
        });
        async { result }
    }

    fn get_by_id(
        &self,
        id: NetworkPointId,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send {
        let result = self.0.tables().points.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<NetworkPoint>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .points
            .values()
            .find(|p| p.code == code)
            .cloned();
        async { Ok(result) }
    }

    fn list(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let mut result: Vec<NetworkPoint> = self
            .0
            .tables()
            .points
            .values()
            .filter(|p| p.archived == archived)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.code.cmp(&b.code));
        async { Ok(result) }
    }

    fn count_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send {
        let tables = self.0.tables();
        let result = injected(&tables, provider_id).map(|()| {
            tables
                .points
                .values()
                .filter(|p| !p.archived && p.owner == Some(provider_id))
                .count() as u64
        });
        async move { result }
    }

    fn find_owned_by(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .points
            .values()
            .filter(|p| !p.archived && p.owner == Some(provider_id))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_expired(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<NetworkPoint>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .points
            .values()
            .filter(|p| !p.archived && p.valid_to < today)
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

impl RegistrationRepository for MemRegistrations {
    fn get_by_id(
        &self,
        id: RegistrationId,
    ) -> impl Future<Output = Result<Option<Registration>, AllocationError>> + Send {
        let result = self.0.tables().registrations.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_point(
        &self,
        point_id: NetworkPointId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let mut result: Vec<Registration> = self
            .0
            .tables()
            .registrations
            .values()
            .filter(|r| r.network_point_id == point_id)
            .cloned()
            .collect();
        result.sort_by_key(|r| r.queue_position);
        async { Ok(result) }
    }

    fn find_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .registrations
            .values()
            .filter(|r| r.provider_id == provider_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_expired_heads(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Registration>, AllocationError>> + Send {
        let tables = self.0.tables();
        let result = injected(&tables, EXPIRED_HEADS).map(|()| {
            tables
                .registrations
                .values()
                .filter(|r| r.is_head() && r.end_date < today)
                .cloned()
                .collect()
        });
        async move { result }
    }

    fn update(
        &self,
        registration: Registration,
    ) -> impl Future<Output = Result<Registration, AllocationError>> + Send {
        self.0
            .tables()
            .registrations
            .insert(registration.id, registration.clone());
        async { Ok(registration) }
    }
}

impl ProviderRepository for MemProviders {
    fn create(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send {
        self.0.tables().providers.insert(provider.id, provider.clone());
        async { Ok(provider) }
    }

    fn get_by_id(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send {
        let result = self.0.tables().providers.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Provider>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .providers
            .values()
            .find(|p| p.code == code)
            .cloned();
        async { Ok(result) }
    }

    fn list(
        &self,
        archived: bool,
    ) -> impl Future<Output = Result<Vec<Provider>, AllocationError>> + Send {
        let mut result: Vec<Provider> = self
            .0
            .tables()
            .providers
            .values()
            .filter(|p| p.archived == archived)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        async { Ok(result) }
    }

    fn update(
        &self,
        provider: Provider,
    ) -> impl Future<Output = Result<Provider, AllocationError>> + Send {
        self.0.tables().providers.insert(provider.id, provider.clone());
        async { Ok(provider) }
    }

    fn delete(&self, id: ProviderId) -> impl Future<Output = Result<(), AllocationError>> + Send {
        self.0.tables().providers.remove(&id);
        async { Ok(()) }
    }

    fn unarchive(
        &self,
        id: ProviderId,
    ) -> impl Future<Output = Result<bool, AllocationError>> + Send {
        let mut tables = self.0.tables();
        let flipped = match tables.providers.get_mut(&id) {
            Some(provider) if provider.archived => {
                provider.archived = false;
                true
            }
            _ => false,
        };
        async move { Ok(flipped) }
    }
}

impl VehicleRepository for MemVehicles {
    fn create(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send {
        self.0.tables().vehicles.insert(vehicle.id, vehicle.clone());
        async { Ok(vehicle) }
    }

    fn get_by_id(
        &self,
        id: VehicleId,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send {
        let result = self.0.tables().vehicles.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_license_plate(
        &self,
        plate: &str,
    ) -> impl Future<Output = Result<Option<Vehicle>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .vehicles
            .values()
            .find(|v| v.license_plate == plate)
            .cloned();
        async { Ok(result) }
    }

    fn update(
        &self,
        vehicle: Vehicle,
    ) -> impl Future<Output = Result<Vehicle, AllocationError>> + Send {
        self.0.tables().vehicles.insert(vehicle.id, vehicle.clone());
        async { Ok(vehicle) }
    }

    fn delete(&self, id: VehicleId) -> impl Future<Output = Result<(), AllocationError>> + Send {
        self.0.tables().vehicles.remove(&id);
        async { Ok(()) }
    }

    fn count_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<u64, AllocationError>> + Send {
        let count = self
            .0
            .tables()
            .vehicles
            .values()
            .filter(|v| !v.archived && v.provider_id == Some(provider_id))
            .count() as u64;
        async move { Ok(count) }
    }

    fn find_active_by_provider(
        &self,
        provider_id: ProviderId,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .vehicles
            .values()
            .filter(|v| !v.archived && v.provider_id == Some(provider_id))
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_expired_assignments(
        &self,
        today: Date,
    ) -> impl Future<Output = Result<Vec<Vehicle>, AllocationError>> + Send {
        let result = self
            .0
            .tables()
            .vehicles
            .values()
            .filter(|v| {
                !v.archived
                    && v.provider_id.is_some()
                    && v.assignment_end.is_some_and(|end| end < today)
            })
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

impl AuditSink for MemAudit {
    fn record(
        &self,
        record: AuditRecord,
    ) -> impl Future<Output = Result<(), AllocationError>> + Send {
        self.0.tables().audit.push(record);
        async { Ok(()) }
    }
}

pub(crate) type TestPorts =
    PortSet<MemPoints, MemRegistrations, MemProviders, MemVehicles, MemAudit, ManualClock>;

/// Services over in-memory ports, plus handles to inspect and steer them.
pub(crate) struct Harness {
    pub allocation: Allocation<TestPorts>,
    pub store: Store,
    pub clock: ManualClock,
    pub actor: Actor,
}

pub(crate) fn date(year: i32, month: u32, day: u32) -> Date {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub(crate) fn harness() -> Harness {
    let store = Store::default();
    let clock = ManualClock::new(date(2025, 1, 30));
    let ports = PortSet {
        points: MemPoints(store.clone()),
        registrations: MemRegistrations(store.clone()),
        providers: MemProviders(store.clone()),
        vehicles: MemVehicles(store.clone()),
        audit: MemAudit(store.clone()),
        clock: clock.clone(),
    };
    Harness {
        allocation: Allocation::new(ports, CapacityPolicy::default()),
        store,
        clock,
        actor: Actor::new("tester"),
    }
}

impl Harness {
    pub fn today(&self) -> Date {
        self.clock.today()
    }

    pub fn in_days(&self, days: u64) -> Date {
        self.today().checked_add_days(Days::new(days)).unwrap()
    }

    pub fn days_ago(&self, days: u64) -> Date {
        self.today().checked_sub_days(Days::new(days)).unwrap()
    }

    /// A provider with `vehicles` active vehicles.
    pub async fn provider(&self, code: &str, vehicles: usize) -> Provider {
        let provider = Provider::builder()
            .code(code)
            .name(format!("Provider {code}"))
            .build()
            .unwrap();
        let provider = self
            .allocation
            .providers
            .create_provider(provider, &self.actor)
            .await
            .unwrap();
        self.add_vehicles(provider.id, vehicles).await;
        self.stored_provider(provider.id)
    }

    pub async fn add_vehicles(&self, provider_id: ProviderId, count: usize) {
        for _ in 0..count {
            let vehicle = Vehicle::builder()
                .license_plate(format!("PL-{}", VehicleId::new()))
                .provider_id(provider_id)
                .assignment_end(self.in_days(365))
                .build()
                .unwrap();
            self.allocation
                .vehicles
                .register_vehicle(vehicle, &self.actor)
                .await
                .unwrap();
        }
    }

    pub fn new_point(&self, code: &str, provider_id: ProviderId) -> NewNetworkPoint {
        NewNetworkPoint {
            code: code.to_string(),
            name: format!("Point {code}"),
            point_type: NetworkPointType::Station,
            valid_to: Some(self.in_days(365)),
            provider_id: Some(provider_id),
            provider_end_date: Some(self.in_days(30)),
        }
    }

    /// A point seeded with `provider_id`, bypassing the capacity check.
    pub async fn point(&self, code: &str, provider_id: ProviderId) -> NetworkPoint {
        self.allocation
            .points
            .create_point(self.new_point(code, provider_id), true, &self.actor)
            .await
            .unwrap()
    }

    pub fn stored_point(&self, id: NetworkPointId) -> NetworkPoint {
        self.store.tables().points[&id].clone()
    }

    pub fn stored_provider(&self, id: ProviderId) -> Provider {
        self.store.tables().providers[&id].clone()
    }

    pub fn audit(&self) -> Vec<AuditRecord> {
        self.store.tables().audit.clone()
    }
}
