//! Event-sourced domain core: aggregates decide, events are the only way
//! state changes.

#![forbid(unsafe_code)]

mod assignment;
mod association;
mod grant;
mod ids;
mod party;
mod permission;

pub use assignment::{
    ActiveAssignment, AssignCaseCommand, AssignCaseHearingCommand, AssignmentTarget,
    CaseAssignmentEvent, CaseAssignmentState, CaseHearingAssignmentDetail, HearingAssignmentEntry,
    HearingAssignmentError, RemoveCaseAssignmentCommand, USER_NOT_ASSIGNED, USER_NOT_FOUND,
};
pub use association::{
    AssociateOrganisationCommand, Association, DefenceAssociationEvent, DefenceAssociationState,
    DisassociateOrganisationCommand, LockAssociationCommand, OrphanedAssociationCommand,
    RepresentationType,
};
pub use grant::{
    GrantAccessCommand, GrantAccessEvent, GrantAccessState, RemoveGrantAccessCommand,
    UNAUTHORIZED_REMOVE_GRANTING,
};
pub use ids::{CaseId, DefendantId, HearingId, OrganisationId, PermissionId, UserId};
pub use party::{AllowedGroups, Organisation, PersonDetails, RepresentingOrganisation, RoleMembership};
pub use permission::{Permission, PermissionCatalog, PermissionKind};
