//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod audit;
pub mod clock;
pub mod storage;

pub use audit::AuditSink;
pub use clock::{Clock, ManualClock, SystemClock};
pub use storage::{
    NetworkPointRepository, ProviderRepository, RegistrationRepository, VehicleRepository,
};

/// Every outbound port the allocation services need, bundled so services
/// carry a single type parameter.
pub trait Ports: Send + Sync + 'static {
    type Points: NetworkPointRepository + Send + Sync;
    type Registrations: RegistrationRepository + Send + Sync;
    type Providers: ProviderRepository + Send + Sync;
    type Vehicles: VehicleRepository + Send + Sync;
    type Audit: AuditSink + Send + Sync;
    type Clock: Clock + Send + Sync;

    fn points(&self) -> &Self::Points;
    fn registrations(&self) -> &Self::Registrations;
    fn providers(&self) -> &Self::Providers;
    fn vehicles(&self) -> &Self::Vehicles;
    fn audit(&self) -> &Self::Audit;
    fn clock(&self) -> &Self::Clock;
}

/// Plain struct implementation of [`Ports`], filled in by the composition root.
pub struct PortSet<NP, RG, PR, VH, AU, CL> {
    pub points: NP,
    pub registrations: RG,
    pub providers: PR,
    pub vehicles: VH,
    pub audit: AU,
    pub clock: CL,
}

impl<NP, RG, PR, VH, AU, CL> Ports for PortSet<NP, RG, PR, VH, AU, CL>
where
    NP: NetworkPointRepository + Send + Sync + 'static,
    RG: RegistrationRepository + Send + Sync + 'static,
    PR: ProviderRepository + Send + Sync + 'static,
    VH: VehicleRepository + Send + Sync + 'static,
    AU: AuditSink + Send + Sync + 'static,
    CL: Clock + Send + Sync + 'static,
{
    type Points = NP;
    type Registrations = RG;
    type Providers = PR;
    type Vehicles = VH;
    type Audit = AU;
    type Clock = CL;

    fn points(&self) -> &NP {
        &self.points
    }

    fn registrations(&self) -> &RG {
        &self.registrations
    }

    fn providers(&self) -> &PR {
        &self.providers
    }

    fn vehicles(&self) -> &VH {
        &self.vehicles
    }

    fn audit(&self) -> &AU {
        &self.audit
    }

    fn clock(&self) -> &CL {
        &self.clock
    }
}
