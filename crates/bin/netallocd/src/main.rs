//! # netallocd — network point allocation daemon
//!
//! Composition root that wires the storage adapter into the allocation
//! services and runs the daily sweeps.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct application services, injecting repositories via port traits
//! - Schedule the expiration, provider and vehicle sweeps
//! - `netallocd sweep` runs every sweep once, prints the reports and exits
//! - Handle graceful shutdown (Ctrl-C)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use netalloc_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteAuditLog, SqliteNetworkPointRepository,
    SqliteProviderRepository, SqliteRegistrationRepository, SqliteVehicleRepository,
};
use netalloc_app::ports::{PortSet, Ports, SystemClock};
use netalloc_app::scheduler::spawn_daily;
use netalloc_app::services::Allocation;
use netalloc_domain::audit::Actor;
use netalloc_domain::error::AllocationError;
use netalloc_domain::sweep::{ExpirationReport, ProviderSweepReport, VehicleExpiryReport};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Schedules};

/// Reports of a one-shot `sweep` run, in execution order.
#[derive(Debug, Serialize)]
struct SweepSummary {
    vehicles: VehicleExpiryReport,
    expiration: ExpirationReport,
    providers: ProviderSweepReport,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Ports
    let ports = PortSet {
        points: SqliteNetworkPointRepository::new(pool.clone()),
        registrations: SqliteRegistrationRepository::new(pool.clone()),
        providers: SqliteProviderRepository::new(pool.clone()),
        vehicles: SqliteVehicleRepository::new(pool.clone()),
        audit: SqliteAuditLog::new(pool),
        clock: SystemClock,
    };

    // Services
    let allocation = Allocation::new(ports, config.capacity_policy());

    match std::env::args().nth(1).as_deref() {
        None => {}
        Some("sweep") => {
            let summary = sweep_once(&allocation).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }
        Some(other) => {
            return Err(format!("unknown command {other:?}, expected `sweep`").into());
        }
    }

    let jobs = if config.sweeps.enabled {
        spawn_sweeps(&allocation, config.schedules()?)
    } else {
        tracing::info!("scheduled sweeps disabled");
        Vec::new()
    };

    tracing::info!(
        database = config.database_url(),
        ratio_percent = allocation.policy().ratio_percent,
        "netallocd started"
    );
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    for job in jobs {
        job.abort();
    }
    Ok(())
}

/// Run every sweep once, as the system actor.
async fn sweep_once<P: Ports>(allocation: &Allocation<P>) -> Result<SweepSummary, AllocationError> {
    let actor = Actor::system();
    let vehicles = allocation.vehicles.expired_assignment_sweep(&actor).await?;
    let expiration = allocation.sweeper.run(&actor).await;
    let providers = allocation.providers.batch_sweep(&actor).await?;
    Ok(SweepSummary {
        vehicles,
        expiration,
        providers,
    })
}

fn spawn_sweeps<P: Ports>(allocation: &Allocation<P>, schedules: Schedules) -> Vec<JoinHandle<()>> {
    let sweeper = allocation.sweeper.clone();
    let expiration = spawn_daily("expiration", schedules.expiration, move || {
        let sweeper = sweeper.clone();
        async move {
            let actor = Actor::system();
            let report = sweeper.run(&actor).await;
            tracing::debug!(?report, "expiration sweep finished");
        }
    });

    let providers = allocation.providers.clone();
    let provider_sweep = spawn_daily("provider-sweep", schedules.provider_sweep, move || {
        let providers = providers.clone();
        async move {
            let actor = Actor::system();
            if let Err(err) = providers.batch_sweep(&actor).await {
                tracing::error!(error = %err, "provider sweep failed");
            }
        }
    });

    let vehicles = allocation.vehicles.clone();
    let vehicle_expiry = spawn_daily("vehicle-expiry", schedules.vehicle_expiry, move || {
        let vehicles = vehicles.clone();
        async move {
            let actor = Actor::system();
            if let Err(err) = vehicles.expired_assignment_sweep(&actor).await {
                tracing::error!(error = %err, "vehicle expiry sweep failed");
            }
        }
    });

    vec![expiration, provider_sweep, vehicle_expiry]
}
