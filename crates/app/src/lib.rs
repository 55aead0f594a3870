//! # netalloc-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `NetworkPointRepository`, `RegistrationRepository`,
//!     `ProviderRepository`, `VehicleRepository` — persistence
//!   - `AuditSink` — append-only audit records
//!   - `Clock` — the source of "today"
//! - Define **driving/inbound ports** as use-case structs:
//!   - `QueueAllocator` — add, remove, promote, reorder, clear
//!   - `NetworkPointLifecycle` — create, update, archive, unarchive, expiry sweep
//!   - `ProviderStateEngine` — state refresh, provider archive cascade, batch sweep
//!   - `VehicleRegistry` — the fleet behind the capacity ratio
//!   - `ExpirationSweeper` — the daily two-pass expiry run
//! - Provide **in-process infrastructure** that doesn't need IO: per-point
//!   locks and the single-flight daily scheduler
//!
//! ## Dependency rule
//! Depends on `netalloc-domain` only (plus `tokio` for locks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod locks;
pub mod ports;
pub mod scheduler;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
