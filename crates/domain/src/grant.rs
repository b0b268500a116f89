//! Grant access aggregate, scoped to one defence client.
//!
//! Tracks the active permission set per grantee. A grantee from the
//! associated organisation is never tracked: their access is implicit,
//! and `is_already_granted` deliberately folds "implicit" and "already
//! tracked" into one predicate because grant and revoke authorization
//! both need exactly that merged meaning.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{DefendantId, OrganisationId, UserId};
use crate::party::{AllowedGroups, Organisation, PersonDetails, RoleMembership};
use crate::permission::{Permission, PermissionCatalog};

/// Error code carried by [`GrantAccessEvent::GrantAccessFailed`] when the
/// acting user may not revoke the grantee's access.
pub const UNAUTHORIZED_REMOVE_GRANTING: &str = "UNAUTHORIZED_REMOVE_GRANTING";

/// Events produced by the grant access aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GrantAccessEvent {
    /// The grantee lookup failed upstream; terminal for the command.
    UserNotFound {
        /// Email the lookup ran against.
        email: String,
    },
    /// The referenced defence client is unknown; terminal.
    DefenceClientDoesNotExist {
        /// Defence client the command referred to.
        defence_client_id: DefendantId,
    },
    /// A defence grant was attempted for someone prosecuting the case.
    AssigneeForDefenceIsProsecutingCase {
        /// Grantee email.
        email: String,
    },
    /// The grantee has no organisation or holds no allowed group.
    GranteeUserNotInAllowedGroups {
        /// Grantee email.
        email: String,
    },
    /// The grantee already has access, tracked or implicit.
    UserAlreadyGranted {
        /// Grantee email.
        email: String,
    },
    /// Material-access permissions granted to the grantee.
    AccessGranted {
        /// Grantee identity.
        grantee_details: PersonDetails,
        /// Granting user identity.
        granter_details: PersonDetails,
        /// Organisation the grantee belongs to.
        grantee_organisation: Organisation,
        /// Permissions granted together as one group.
        permissions: Vec<Permission>,
    },
    /// A revocation was rejected by the authorization rules.
    GrantAccessFailed {
        /// Stable error code ([`UNAUTHORIZED_REMOVE_GRANTING`]).
        error_code: String,
        /// Acting user whose revocation was rejected.
        user_id: UserId,
    },
    /// The grantee's whole permission group was revoked atomically.
    AccessGrantRemoved {
        /// The full permission list that was active for the grantee.
        permissions: Vec<Permission>,
    },
}

/// Command to grant material-access permissions to a user.
#[derive(Debug, Clone)]
pub struct GrantAccessCommand {
    /// Defence client the grant applies to.
    pub defence_client_id: DefendantId,
    /// Email the grantee lookup ran against.
    pub grantee_email: String,
    /// Resolved grantee identity; `None` when the lookup failed.
    pub grantee: Option<PersonDetails>,
    /// Group names the grantee holds at command time.
    pub grantee_groups: RoleMembership,
    /// Organisation the grantee belongs to, when known.
    pub grantee_organisation: Option<Organisation>,
    /// Granting user identity.
    pub granter: PersonDetails,
    /// Organisation currently associated with the case, when any.
    pub associated_organisation_id: Option<OrganisationId>,
    /// Whether the grantee is prosecuting this case.
    pub grantee_is_prosecuting_case: bool,
}

/// Command to revoke a grantee's material-access permissions.
#[derive(Debug, Clone)]
pub struct RemoveGrantAccessCommand {
    /// Grantee whose access is revoked.
    pub grantee_user_id: UserId,
    /// Acting (logged-in) user.
    pub acting_user_id: UserId,
    /// Organisation currently associated with the case, when any.
    pub associated_organisation_id: Option<OrganisationId>,
    /// Organisation the acting user belongs to, when known.
    pub acting_user_organisation_id: Option<OrganisationId>,
    /// Organisation the grantee belongs to, when known.
    pub grantee_organisation_id: Option<OrganisationId>,
    /// Group names the acting user holds at command time.
    pub acting_user_groups: RoleMembership,
}

/// Folded state of one defence client's grant stream: the active
/// permission set per grantee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantAccessState {
    permissions: BTreeMap<UserId, Vec<Permission>>,
}

impl GrantAccessState {
    /// Rebuilds state by folding previously emitted events.
    #[must_use]
    pub fn fold(events: &[GrantAccessEvent]) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }

        state
    }

    /// Applies one event to the folded state.
    pub fn apply(&mut self, event: &GrantAccessEvent) {
        match event {
            GrantAccessEvent::AccessGranted {
                grantee_details,
                permissions,
                ..
            } => {
                self.permissions
                    .insert(grantee_details.user_id, permissions.clone());
            }
            GrantAccessEvent::AccessGrantRemoved { permissions } => {
                // The grantee is the source of every permission in the
                // removed group.
                if let Some(permission) = permissions.first() {
                    self.permissions.remove(&permission.source);
                }
            }
            GrantAccessEvent::UserNotFound { .. }
            | GrantAccessEvent::DefenceClientDoesNotExist { .. }
            | GrantAccessEvent::AssigneeForDefenceIsProsecutingCase { .. }
            | GrantAccessEvent::GranteeUserNotInAllowedGroups { .. }
            | GrantAccessEvent::UserAlreadyGranted { .. }
            | GrantAccessEvent::GrantAccessFailed { .. } => {}
        }
    }

    /// Returns the active permissions tracked for a grantee.
    #[must_use]
    pub fn active_permissions(&self, grantee_user_id: UserId) -> Option<&[Permission]> {
        self.permissions.get(&grantee_user_id).map(Vec::as_slice)
    }

    /// Returns whether the aggregate tracks any grantee.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Returns whether the user already has access to the defence client.
    ///
    /// True when the grantee's organisation IS the associated organisation
    /// (implicit access, nothing to track) or when an active permission
    /// set already exists for the user. False only for a member of a
    /// different organisation holding no active permissions.
    #[must_use]
    pub fn is_already_granted(
        &self,
        user_id: UserId,
        associated_organisation_id: Option<OrganisationId>,
        grantee_organisation_id: Option<OrganisationId>,
    ) -> bool {
        let is_associated_member = match (associated_organisation_id, grantee_organisation_id) {
            (Some(associated), Some(grantee)) => associated == grantee,
            _ => false,
        };

        is_associated_member || self.permissions.contains_key(&user_id)
    }

    /// Decides the events for a grant command.
    ///
    /// Checks run in a fixed order: identity, the prosecuting conflict,
    /// organisation presence, allowed groups, then the already-granted
    /// predicate.
    #[must_use]
    pub fn grant_access(
        &self,
        command: GrantAccessCommand,
        allowed_groups: &AllowedGroups,
    ) -> Vec<GrantAccessEvent> {
        let Some(grantee) = command.grantee else {
            return vec![GrantAccessEvent::UserNotFound {
                email: command.grantee_email,
            }];
        };

        if command.grantee_is_prosecuting_case {
            return vec![GrantAccessEvent::AssigneeForDefenceIsProsecutingCase {
                email: command.grantee_email,
            }];
        }

        // An organisation is a prerequisite for group evaluation.
        let Some(grantee_organisation) = command.grantee_organisation else {
            return vec![GrantAccessEvent::GranteeUserNotInAllowedGroups {
                email: command.grantee_email,
            }];
        };

        if !allowed_groups.is_in_allowed_groups(&command.grantee_groups) {
            return vec![GrantAccessEvent::GranteeUserNotInAllowedGroups {
                email: command.grantee_email,
            }];
        }

        if self.is_already_granted(
            grantee.user_id,
            command.associated_organisation_id,
            Some(grantee_organisation.organisation_id()),
        ) {
            return vec![GrantAccessEvent::UserAlreadyGranted {
                email: command.grantee_email,
            }];
        }

        let grantee_is_in_associated_organisation = command
            .associated_organisation_id
            .is_some_and(|associated| associated == grantee_organisation.organisation_id());
        let kinds = PermissionCatalog::kinds_for_grant(grantee_is_in_associated_organisation);
        let permissions =
            PermissionCatalog::build_grant(kinds, grantee.user_id, command.defence_client_id);

        vec![GrantAccessEvent::AccessGranted {
            grantee_details: grantee,
            granter_details: command.granter,
            grantee_organisation,
            permissions,
        }]
    }

    /// Decides the events for a revocation command.
    ///
    /// The acting user may revoke iff they belong to the associated
    /// organisation, they self-revoke as an advocate, or they administer
    /// the grantee's chambers. Revoking an untracked grantee is a no-op.
    #[must_use]
    pub fn remove_grant_access(
        &self,
        command: RemoveGrantAccessCommand,
        allowed_groups: &AllowedGroups,
    ) -> Vec<GrantAccessEvent> {
        if !self.may_remove_grant(&command, allowed_groups) {
            return vec![GrantAccessEvent::GrantAccessFailed {
                error_code: UNAUTHORIZED_REMOVE_GRANTING.to_owned(),
                user_id: command.acting_user_id,
            }];
        }

        match self.permissions.get(&command.grantee_user_id) {
            Some(permissions) => vec![GrantAccessEvent::AccessGrantRemoved {
                permissions: permissions.clone(),
            }],
            None => Vec::new(),
        }
    }

    /// Decides the events for a bulk revocation sweep: one removal per
    /// tracked grantee. Order across distinct grantees is unspecified.
    #[must_use]
    pub fn remove_all_grantees(&self) -> Vec<GrantAccessEvent> {
        self.permissions
            .values()
            .map(|permissions| GrantAccessEvent::AccessGrantRemoved {
                permissions: permissions.clone(),
            })
            .collect()
    }

    fn may_remove_grant(
        &self,
        command: &RemoveGrantAccessCommand,
        allowed_groups: &AllowedGroups,
    ) -> bool {
        let acting_from_associated_organisation = match (
            command.acting_user_organisation_id,
            command.associated_organisation_id,
        ) {
            (Some(acting), Some(associated)) => acting == associated,
            _ => false,
        };
        if acting_from_associated_organisation {
            return true;
        }

        let is_self_revoke = command.acting_user_id == command.grantee_user_id;
        if is_self_revoke && allowed_groups.is_advocate(&command.acting_user_groups) {
            return true;
        }

        let shares_grantee_organisation = match (
            command.acting_user_organisation_id,
            command.grantee_organisation_id,
        ) {
            (Some(acting), Some(grantee)) => acting == grantee,
            _ => false,
        };

        shares_grantee_organisation && allowed_groups.is_chambers_admin(&command.acting_user_groups)
    }
}
