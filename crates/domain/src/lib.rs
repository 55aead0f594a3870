//! # netalloc-domain
//!
//! Pure domain model for allocating network points among providers.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error taxonomy, dates
//! - Define **Network points** (service locations with a cached owner)
//! - Define **Registrations** and the **Queue** algebra (append, remove,
//!   promote, reorder) with its positional invariants
//! - Define **Providers**, the **capacity policy**, and state derivation
//! - Define **Vehicles** (the fleet counted against the capacity ratio)
//! - Define **Audit records** and the explicit **Actor**
//! - Define sweep **reports**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod audit;
pub mod network_point;
pub mod provider;
pub mod registration;
pub mod sweep;
pub mod vehicle;
