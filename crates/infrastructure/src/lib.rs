//! In-memory adapters, configuration loading and expiry policies.

#![forbid(unsafe_code)]

mod expiry;
mod group_config;
mod in_memory_access_projection_repository;
mod in_memory_event_store;

pub use expiry::{FixedTermExpiry, NoExpiry};
pub use group_config::GroupConfig;
pub use in_memory_access_projection_repository::InMemoryAccessProjectionRepository;
pub use in_memory_event_store::{
    InMemoryCaseAssignmentEventStore, InMemoryDefenceAssociationEventStore,
    InMemoryGrantAccessEventStore,
};
