//! # netalloc-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `netalloc-app::ports::storage`
//! - Implement the append-only `AuditSink` over the `audit_log` table
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Ids are stored as TEXT UUIDs and dates as ISO `YYYY-MM-DD` TEXT, so
//! `<` on the column compares chronologically.
//!
//! ## Dependency rule
//! Depends on `netalloc-app` (for port traits) and `netalloc-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod codec;

pub mod audit_log;
pub mod error;
pub mod point_repo;
pub mod pool;
pub mod provider_repo;
pub mod registration_repo;
pub mod vehicle_repo;

pub use audit_log::SqliteAuditLog;
pub use error::StorageError;
pub use point_repo::SqliteNetworkPointRepository;
pub use pool::{Config, Database};
pub use provider_repo::SqliteProviderRepository;
pub use registration_repo::SqliteRegistrationRepository;
pub use vehicle_repo::SqliteVehicleRepository;
