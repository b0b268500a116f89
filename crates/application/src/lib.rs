//! Application services and ports: command handling over the
//! event-sourced aggregates and the access projection.

#![forbid(unsafe_code)]

mod access_projection_service;
mod case_assignment_service;
mod defence_association_service;
mod grant_access_service;
mod stream_locks;

pub use access_projection_service::{
    AccessProjectionRepository, AccessProjectionService, AccessRecordKey, AdvocateAccess,
    CaseAccessRecord, ExpiryPolicy, UpsertAccessInput,
};
pub use case_assignment_service::{
    CaseAssignmentEventStore, CaseAssignmentService, CaseAssignmentStream,
};
pub use defence_association_service::{DefenceAssociationEventStore, DefenceAssociationService};
pub use grant_access_service::{DefenceClientDirectory, GrantAccessEventStore, GrantAccessService};
pub use stream_locks::StreamLocks;
