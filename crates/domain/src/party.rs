//! Actors and organisations as captured on commands and events.

use std::collections::BTreeSet;

use advocase_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::ids::{OrganisationId, UserId};

/// Identity of a human actor, immutable once captured on an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDetails {
    /// Stable user identifier.
    pub user_id: UserId,
    /// Given name at command time.
    pub first_name: String,
    /// Family name at command time.
    pub last_name: String,
}

/// An organisation participating in a case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    organisation_id: OrganisationId,
    organisation_name: NonEmptyString,
}

impl Organisation {
    /// Creates an organisation with a validated display name.
    pub fn new(organisation_id: OrganisationId, organisation_name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            organisation_id,
            organisation_name: NonEmptyString::new(organisation_name)?,
        })
    }

    /// Returns the organisation identifier.
    #[must_use]
    pub fn organisation_id(&self) -> OrganisationId {
        self.organisation_id
    }

    /// Returns the organisation display name.
    #[must_use]
    pub fn organisation_name(&self) -> &NonEmptyString {
        &self.organisation_name
    }
}

/// Prosecuting-authority classification code attached to a case, e.g.
/// `CPS`, `DVLA` or `TFL`.
///
/// Only the literal value `CPS` is distinguished; every other code is
/// treated identically and carried verbatim in event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentingOrganisation(String);

impl RepresentingOrganisation {
    /// Canonical code for the Crown Prosecution Service.
    pub const CPS: &'static str = "CPS";

    /// Creates a representing-organisation code.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the raw classification code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.0.as_str()
    }

    /// Returns whether this is the Crown Prosecution Service code.
    #[must_use]
    pub fn is_cps(&self) -> bool {
        self.0 == Self::CPS
    }

    /// Returns the payload value for assignment events: non-CPS codes are
    /// carried through, the CPS code is normalized out.
    #[must_use]
    pub fn into_event_payload(self) -> Option<Self> {
        if self.is_cps() { None } else { Some(self) }
    }
}

/// Group names held by a user at command time, supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMembership {
    groups: BTreeSet<String>,
}

impl RoleMembership {
    /// Creates a membership from the caller-supplied group names.
    #[must_use]
    pub fn new(groups: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns whether any held group appears in the given allow-list.
    #[must_use]
    pub fn intersects(&self, allow_list: &BTreeSet<String>) -> bool {
        self.groups.iter().any(|group| allow_list.contains(group))
    }
}

/// Configured allow-lists naming the groups that carry each role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedGroups {
    advocate_groups: BTreeSet<String>,
    defence_lawyer_groups: BTreeSet<String>,
    chambers_admin_groups: BTreeSet<String>,
}

impl AllowedGroups {
    /// Creates allow-lists from configured group names.
    #[must_use]
    pub fn new(
        advocate_groups: impl IntoIterator<Item = impl Into<String>>,
        defence_lawyer_groups: impl IntoIterator<Item = impl Into<String>>,
        chambers_admin_groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            advocate_groups: advocate_groups.into_iter().map(Into::into).collect(),
            defence_lawyer_groups: defence_lawyer_groups.into_iter().map(Into::into).collect(),
            chambers_admin_groups: chambers_admin_groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns whether the membership carries the individual advocate role.
    #[must_use]
    pub fn is_advocate(&self, membership: &RoleMembership) -> bool {
        membership.intersects(&self.advocate_groups)
    }

    /// Returns whether the membership carries the defence lawyer role.
    #[must_use]
    pub fn is_defence_lawyer(&self, membership: &RoleMembership) -> bool {
        membership.intersects(&self.defence_lawyer_groups)
    }

    /// Returns whether the membership carries the chambers admin role.
    #[must_use]
    pub fn is_chambers_admin(&self, membership: &RoleMembership) -> bool {
        membership.intersects(&self.chambers_admin_groups)
    }

    /// Returns whether the membership carries any role allowed to hold
    /// case access (advocate or defence lawyer).
    #[must_use]
    pub fn is_in_allowed_groups(&self, membership: &RoleMembership) -> bool {
        self.is_advocate(membership) || self.is_defence_lawyer(membership)
    }
}

impl Default for AllowedGroups {
    fn default() -> Self {
        Self::new(["Advocates"], ["Defence Lawyers"], ["Chambers Admin"])
    }
}

#[cfg(test)]
mod tests {
    use super::{AllowedGroups, Organisation, RepresentingOrganisation, RoleMembership};
    use crate::ids::OrganisationId;

    #[test]
    fn organisation_rejects_blank_name() {
        let organisation = Organisation::new(OrganisationId::new(), "  ");
        assert!(organisation.is_err());
    }

    #[test]
    fn cps_code_is_normalized_out_of_event_payloads() {
        assert!(RepresentingOrganisation::new("CPS").into_event_payload().is_none());

        let payload = RepresentingOrganisation::new("TFL").into_event_payload();
        assert!(payload.is_some_and(|code| code.code() == "TFL"));
    }

    #[test]
    fn organisation_exposes_validated_name() {
        let organisation = Organisation::new(OrganisationId::new(), "Fletcher Chambers");
        assert!(organisation.is_ok_and(|org| org.organisation_name().as_str() == "Fletcher Chambers"));
    }

    #[test]
    fn membership_checks_use_configured_group_names() {
        let allowed = AllowedGroups::default();
        let advocate = RoleMembership::new(["Advocates"]);
        let clerk = RoleMembership::new(["Listing Officers"]);

        assert!(allowed.is_advocate(&advocate));
        assert!(allowed.is_in_allowed_groups(&advocate));
        assert!(!allowed.is_in_allowed_groups(&clerk));
    }

    #[test]
    fn defence_lawyer_and_advocate_roles_are_distinct() {
        let allowed = AllowedGroups::default();
        let lawyer = RoleMembership::new(["Defence Lawyers"]);

        assert!(allowed.is_defence_lawyer(&lawyer));
        assert!(!allowed.is_advocate(&lawyer));
    }
}
