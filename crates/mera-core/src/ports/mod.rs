//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces the domain core depends on,
//! but whose implementations live in adapter crates (or, for tests, in an
//! in-memory double kept alongside the tests that use it).
//!
//! ## Ports Overview
//!
//! - [`StorageBridge`] - durable key/value storage on the Local and Pod sinks
//! - [`CurriculumRegistry`] - read-only curriculum lookups
//! - [`Clock`] - current time, abstracted for deterministic tests

pub mod clock;
pub mod curriculum_registry;
pub mod storage_bridge;

pub use clock::{Clock, FixedClock, SystemClock};
pub use curriculum_registry::{ComponentProgressValidator, CurriculumRegistry};
pub use storage_bridge::{StorageBridge, StorageError};
