//! Case assignment aggregate.
//!
//! Commands are pure functions of the folded state: they validate the
//! candidate, resolve the role, detect conflicts and return the events to
//! append. Only assignment and removal events mutate state; error and
//! no-op signals leave it untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CaseId, HearingId, OrganisationId, UserId};
use crate::party::{AllowedGroups, Organisation, PersonDetails, RepresentingOrganisation, RoleMembership};

/// Error code carried by [`CaseAssignmentEvent::UserNotAssigned`].
pub const USER_NOT_ASSIGNED: &str = "USER_NOT_ASSIGNED";

/// Error code synthesized into hearing-batch failures when the assignee
/// lookup failed upstream.
pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

/// Target of an active assignment: a whole organisation (defence lawyer
/// route) or an individual advocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentTarget {
    /// Organisation-level access.
    Organisation {
        /// Assigned organisation.
        organisation_id: OrganisationId,
    },
    /// Individual advocate access.
    Advocate {
        /// Assigned advocate.
        user_id: UserId,
    },
}

/// The currently active assignment tuple for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAssignment {
    /// Assigned user.
    pub assignee_user_id: UserId,
    /// Organisation the assignee belongs to.
    pub assignee_organisation_id: OrganisationId,
    /// User who made the assignment.
    pub assignor_user_id: UserId,
    /// Organisation the assignor belongs to.
    pub assignor_organisation_id: OrganisationId,
}

/// One per-case entry of a hearing-listing batch assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingAssignmentEntry {
    /// Case covered by the hearing.
    pub case_id: CaseId,
    /// Hearing the assignment is bounded to.
    pub hearing_id: HearingId,
    /// When the assignment was made.
    pub assignment_timestamp: DateTime<Utc>,
}

/// One per-element validation failure of a hearing-listing batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HearingAssignmentError {
    /// Case the failed element referred to.
    pub case_id: CaseId,
    /// Hearing the failed element referred to.
    pub hearing_id: HearingId,
    /// Stable error code.
    pub error_code: String,
    /// Human-readable failure detail.
    pub failure_reason: String,
}

/// Events produced by the case assignment aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseAssignmentEvent {
    /// The assignee lookup failed upstream; terminal for the command.
    UserNotFound {
        /// Email the lookup ran against.
        email: String,
    },
    /// The assignee holds neither the advocate nor the defence lawyer role.
    AssigneeNotInAllowedGroups {
        /// Assignee email.
        email: String,
    },
    /// A prosecuting body attempted to assign someone defending the case.
    AssigneeForProsecutionIsDefendingCase {
        /// Assignee email.
        email: String,
    },
    /// The exact assignment tuple is already active; idempotent no-op signal.
    UserAlreadyAssigned {
        /// Assignee email.
        email: String,
    },
    /// Organisation-level access granted to the assignee's firm.
    CaseAssignedToOrganisation {
        /// Assigned case.
        case_id: CaseId,
        /// Organisation receiving access.
        assignee_organisation: Organisation,
        /// Organisation that made the assignment.
        assignor_organisation: Organisation,
        /// Assigned defence lawyer.
        assignee_details: PersonDetails,
        /// Assigning user.
        assignor_details: PersonDetails,
        /// Non-CPS prosecuting-authority code, when present.
        representing_organisation: Option<RepresentingOrganisation>,
        /// When the assignment was made.
        assignment_timestamp: DateTime<Utc>,
    },
    /// Individual access granted to an advocate.
    CaseAssignedToAdvocate {
        /// Assigned case.
        case_id: CaseId,
        /// Organisation the advocate belongs to.
        assignee_organisation: Organisation,
        /// Organisation that made the assignment.
        assignor_organisation: Organisation,
        /// Assigned advocate.
        assignee_details: PersonDetails,
        /// Assigning user.
        assignor_details: PersonDetails,
        /// Non-CPS prosecuting-authority code, when present.
        representing_organisation: Option<RepresentingOrganisation>,
        /// When the assignment was made.
        assignment_timestamp: DateTime<Utc>,
    },
    /// Removal was requested for a user with no active assignment.
    UserNotAssigned {
        /// User the removal referred to.
        assignee_user_id: UserId,
        /// Stable error code ([`USER_NOT_ASSIGNED`]).
        error_code: String,
    },
    /// Individual advocate access removed.
    CaseAssignmentToAdvocateRemoved {
        /// Case the access was removed from.
        case_id: CaseId,
        /// Advocate whose access was removed.
        assignee_user_id: UserId,
        /// Organisation the advocate belonged to.
        assignee_organisation_id: OrganisationId,
        /// User who removed the assignment.
        removed_by_user_id: UserId,
        /// When the removal happened.
        removed_timestamp: DateTime<Utc>,
        /// Whether a system sweep triggered the removal.
        is_automatic_unassignment: bool,
    },
    /// Organisation-level access removed. The historical storage value
    /// keeps the original misspelling; it is a stable wire value.
    #[serde(rename = "case_assigment_to_organisation_removed")]
    CaseAssignmentToOrganisationRemoved {
        /// Case the access was removed from.
        case_id: CaseId,
        /// Organisation whose access was removed.
        assignee_organisation_id: OrganisationId,
        /// User who removed the assignment.
        removed_by_user_id: UserId,
        /// When the removal happened.
        removed_timestamp: DateTime<Utc>,
        /// Whether a system sweep triggered the removal.
        is_automatic_unassignment: bool,
    },
    /// The whole hearing-listing batch was rejected; batches never
    /// partially succeed.
    CaseAssignmentsByHearingListingFailed {
        /// Assignee email.
        email: String,
        /// Per-element failures.
        assignment_errors: Vec<HearingAssignmentError>,
    },
    /// Organisation-level access granted across a hearing listing.
    CasesAssignedToOrganisation {
        /// Organisation receiving access.
        assignee_organisation: Organisation,
        /// Organisation that made the assignments.
        assignor_organisation: Organisation,
        /// Assigned defence lawyer.
        assignee_details: PersonDetails,
        /// Assigning user.
        assignor_details: PersonDetails,
        /// Non-CPS prosecuting-authority code, when present.
        representing_organisation: Option<RepresentingOrganisation>,
        /// Per-case/hearing assignment entries.
        assignments: Vec<HearingAssignmentEntry>,
    },
    /// Individual advocate access granted across a hearing listing.
    CasesAssignedToAdvocate {
        /// Organisation the advocate belongs to.
        assignee_organisation: Organisation,
        /// Organisation that made the assignments.
        assignor_organisation: Organisation,
        /// Assigned advocate.
        assignee_details: PersonDetails,
        /// Assigning user.
        assignor_details: PersonDetails,
        /// Non-CPS prosecuting-authority code, when present.
        representing_organisation: Option<RepresentingOrganisation>,
        /// Per-case/hearing assignment entries.
        assignments: Vec<HearingAssignmentEntry>,
    },
}

/// Command to assign a case to an advocate or a defence organisation.
#[derive(Debug, Clone)]
pub struct AssignCaseCommand {
    /// Assigned case.
    pub case_id: CaseId,
    /// Email the assignee lookup ran against.
    pub assignee_email: String,
    /// Resolved assignee identity; `None` when the lookup failed.
    pub assignee: Option<PersonDetails>,
    /// Organisation the assignee belongs to.
    pub assignee_organisation: Organisation,
    /// Assigning user.
    pub assignor: PersonDetails,
    /// Organisation the assignor belongs to.
    pub assignor_organisation: Organisation,
    /// Group names the assignee holds at command time.
    pub assignee_groups: RoleMembership,
    /// Whether the assignee is already defending this case.
    pub assignee_is_defending_case: bool,
    /// Whether the command was issued by a police organisation.
    pub is_police: bool,
    /// Whether the command was issued by the Crown Prosecution Service.
    pub is_cps: bool,
    /// Prosecuting-authority classification of the case.
    pub representing_organisation: RepresentingOrganisation,
    /// When the assignment was made.
    pub assignment_timestamp: DateTime<Utc>,
}

/// Command to remove an active case assignment.
#[derive(Debug, Clone)]
pub struct RemoveCaseAssignmentCommand {
    /// Case the assignment belongs to.
    pub case_id: CaseId,
    /// User whose assignment is removed.
    pub assignee_user_id: UserId,
    /// Group names the assignee holds at command time.
    pub assignee_groups: RoleMembership,
    /// Whether other advocates of the same organisation remain assigned.
    pub has_other_advocates_assigned_to_case: bool,
    /// User performing the removal.
    pub removed_by_user_id: UserId,
    /// Whether a system sweep triggered the removal.
    pub is_automatic_unassignment: bool,
    /// When the removal happened.
    pub removed_timestamp: DateTime<Utc>,
}

/// One element of a hearing-listing batch assignment, optionally carrying
/// an error pre-computed upstream.
#[derive(Debug, Clone)]
pub struct CaseHearingAssignmentDetail {
    /// Case covered by the hearing.
    pub case_id: CaseId,
    /// Hearing the assignment is bounded to.
    pub hearing_id: HearingId,
    /// When the assignment was made.
    pub assignment_timestamp: DateTime<Utc>,
    /// Upstream-precomputed error code, when validation already failed.
    pub error_code: Option<String>,
    /// Upstream-precomputed failure detail.
    pub failure_reason: Option<String>,
}

impl CaseHearingAssignmentDetail {
    fn precomputed_error(&self) -> Option<HearingAssignmentError> {
        let error_code = self.error_code.clone()?;
        Some(HearingAssignmentError {
            case_id: self.case_id,
            hearing_id: self.hearing_id,
            error_code,
            failure_reason: self.failure_reason.clone().unwrap_or_default(),
        })
    }
}

/// Command to assign a batch of cases from a hearing listing.
#[derive(Debug, Clone)]
pub struct AssignCaseHearingCommand {
    /// Email the assignee lookup ran against.
    pub assignee_email: String,
    /// Resolved assignee identity; `None` when the lookup failed.
    pub assignee: Option<PersonDetails>,
    /// Organisation the assignee belongs to.
    pub assignee_organisation: Organisation,
    /// Assigning user.
    pub assignor: PersonDetails,
    /// Organisation the assignor belongs to.
    pub assignor_organisation: Organisation,
    /// Group names the assignee holds at command time.
    pub assignee_groups: RoleMembership,
    /// Whether the assignee is already defending any listed case.
    pub assignee_is_defending_case: bool,
    /// Whether the command was issued by a police organisation.
    pub is_police: bool,
    /// Whether the command was issued by the Crown Prosecution Service.
    pub is_cps: bool,
    /// Prosecuting-authority classification of the listed cases.
    pub representing_organisation: RepresentingOrganisation,
    /// Per-case/hearing elements of the batch.
    pub case_hearing_assignment_details: Vec<CaseHearingAssignmentDetail>,
}

/// Folded state of one case assignment stream: the currently active
/// assignments keyed by target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseAssignmentState {
    active: BTreeMap<AssignmentTarget, ActiveAssignment>,
}

impl CaseAssignmentState {
    /// Rebuilds state by folding previously emitted events.
    #[must_use]
    pub fn fold(events: &[CaseAssignmentEvent]) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }

        state
    }

    /// Applies one event to the folded state. Signals that carry no state
    /// change are ignored, so replay tolerates them at any position.
    pub fn apply(&mut self, event: &CaseAssignmentEvent) {
        match event {
            CaseAssignmentEvent::CaseAssignedToOrganisation {
                assignee_organisation,
                assignor_organisation,
                assignee_details,
                assignor_details,
                ..
            }
            | CaseAssignmentEvent::CasesAssignedToOrganisation {
                assignee_organisation,
                assignor_organisation,
                assignee_details,
                assignor_details,
                ..
            } => {
                self.active.insert(
                    AssignmentTarget::Organisation {
                        organisation_id: assignee_organisation.organisation_id(),
                    },
                    ActiveAssignment {
                        assignee_user_id: assignee_details.user_id,
                        assignee_organisation_id: assignee_organisation.organisation_id(),
                        assignor_user_id: assignor_details.user_id,
                        assignor_organisation_id: assignor_organisation.organisation_id(),
                    },
                );
            }
            CaseAssignmentEvent::CaseAssignedToAdvocate {
                assignee_organisation,
                assignor_organisation,
                assignee_details,
                assignor_details,
                ..
            }
            | CaseAssignmentEvent::CasesAssignedToAdvocate {
                assignee_organisation,
                assignor_organisation,
                assignee_details,
                assignor_details,
                ..
            } => {
                self.active.insert(
                    AssignmentTarget::Advocate {
                        user_id: assignee_details.user_id,
                    },
                    ActiveAssignment {
                        assignee_user_id: assignee_details.user_id,
                        assignee_organisation_id: assignee_organisation.organisation_id(),
                        assignor_user_id: assignor_details.user_id,
                        assignor_organisation_id: assignor_organisation.organisation_id(),
                    },
                );
            }
            CaseAssignmentEvent::CaseAssignmentToAdvocateRemoved {
                assignee_user_id, ..
            } => {
                self.active.remove(&AssignmentTarget::Advocate {
                    user_id: *assignee_user_id,
                });
            }
            CaseAssignmentEvent::CaseAssignmentToOrganisationRemoved {
                assignee_organisation_id,
                ..
            } => {
                self.active.remove(&AssignmentTarget::Organisation {
                    organisation_id: *assignee_organisation_id,
                });
            }
            CaseAssignmentEvent::UserNotFound { .. }
            | CaseAssignmentEvent::AssigneeNotInAllowedGroups { .. }
            | CaseAssignmentEvent::AssigneeForProsecutionIsDefendingCase { .. }
            | CaseAssignmentEvent::UserAlreadyAssigned { .. }
            | CaseAssignmentEvent::UserNotAssigned { .. }
            | CaseAssignmentEvent::CaseAssignmentsByHearingListingFailed { .. } => {}
        }
    }

    /// Returns the active assignment for a target, when one exists.
    #[must_use]
    pub fn active_assignment(&self, target: &AssignmentTarget) -> Option<&ActiveAssignment> {
        self.active.get(target)
    }

    fn active_assignment_for_user(
        &self,
        user_id: UserId,
    ) -> Option<(&AssignmentTarget, &ActiveAssignment)> {
        self.active
            .iter()
            .find(|(_, assignment)| assignment.assignee_user_id == user_id)
    }

    /// Decides the events for an assignment command.
    ///
    /// Checks run in a fixed order: identity, allowed groups, the
    /// defending/prosecuting conflict, idempotency, then role routing
    /// with defence lawyer precedence. The representing-organisation
    /// code never changes which event fires, only the payload.
    #[must_use]
    pub fn assign_case(
        &self,
        command: AssignCaseCommand,
        allowed_groups: &AllowedGroups,
    ) -> Vec<CaseAssignmentEvent> {
        let Some(assignee) = command.assignee else {
            return vec![CaseAssignmentEvent::UserNotFound {
                email: command.assignee_email,
            }];
        };

        if !allowed_groups.is_in_allowed_groups(&command.assignee_groups) {
            return vec![CaseAssignmentEvent::AssigneeNotInAllowedGroups {
                email: command.assignee_email,
            }];
        }

        let issued_by_prosecution = command.is_cps || command.is_police;
        if command.assignee_is_defending_case && issued_by_prosecution {
            return vec![CaseAssignmentEvent::AssigneeForProsecutionIsDefendingCase {
                email: command.assignee_email,
            }];
        }

        let assign_to_organisation = allowed_groups.is_defence_lawyer(&command.assignee_groups);
        let target = if assign_to_organisation {
            AssignmentTarget::Organisation {
                organisation_id: command.assignee_organisation.organisation_id(),
            }
        } else {
            AssignmentTarget::Advocate {
                user_id: assignee.user_id,
            }
        };

        let candidate = ActiveAssignment {
            assignee_user_id: assignee.user_id,
            assignee_organisation_id: command.assignee_organisation.organisation_id(),
            assignor_user_id: command.assignor.user_id,
            assignor_organisation_id: command.assignor_organisation.organisation_id(),
        };

        if self.active_assignment(&target) == Some(&candidate) {
            return vec![CaseAssignmentEvent::UserAlreadyAssigned {
                email: command.assignee_email,
            }];
        }

        let representing_organisation = command.representing_organisation.into_event_payload();
        if assign_to_organisation {
            vec![CaseAssignmentEvent::CaseAssignedToOrganisation {
                case_id: command.case_id,
                assignee_organisation: command.assignee_organisation,
                assignor_organisation: command.assignor_organisation,
                assignee_details: assignee,
                assignor_details: command.assignor,
                representing_organisation,
                assignment_timestamp: command.assignment_timestamp,
            }]
        } else {
            vec![CaseAssignmentEvent::CaseAssignedToAdvocate {
                case_id: command.case_id,
                assignee_organisation: command.assignee_organisation,
                assignor_organisation: command.assignor_organisation,
                assignee_details: assignee,
                assignor_details: command.assignor,
                representing_organisation,
                assignment_timestamp: command.assignment_timestamp,
            }]
        }
    }

    /// Decides the events for a removal command.
    ///
    /// Automatic sweeps tolerate already-cleared state: absence is only a
    /// signal on the manual path. Organisation access persists while any
    /// advocate of the organisation remains assigned.
    #[must_use]
    pub fn remove_case_assignment(
        &self,
        command: RemoveCaseAssignmentCommand,
        allowed_groups: &AllowedGroups,
    ) -> Vec<CaseAssignmentEvent> {
        let Some((_, active)) = self.active_assignment_for_user(command.assignee_user_id) else {
            if command.is_automatic_unassignment {
                return Vec::new();
            }

            return vec![CaseAssignmentEvent::UserNotAssigned {
                assignee_user_id: command.assignee_user_id,
                error_code: USER_NOT_ASSIGNED.to_owned(),
            }];
        };

        if allowed_groups.is_advocate(&command.assignee_groups) {
            return vec![CaseAssignmentEvent::CaseAssignmentToAdvocateRemoved {
                case_id: command.case_id,
                assignee_user_id: command.assignee_user_id,
                assignee_organisation_id: active.assignee_organisation_id,
                removed_by_user_id: command.removed_by_user_id,
                removed_timestamp: command.removed_timestamp,
                is_automatic_unassignment: command.is_automatic_unassignment,
            }];
        }

        if allowed_groups.is_defence_lawyer(&command.assignee_groups) {
            if command.has_other_advocates_assigned_to_case {
                return Vec::new();
            }

            return vec![CaseAssignmentEvent::CaseAssignmentToOrganisationRemoved {
                case_id: command.case_id,
                assignee_organisation_id: active.assignee_organisation_id,
                removed_by_user_id: command.removed_by_user_id,
                removed_timestamp: command.removed_timestamp,
                is_automatic_unassignment: command.is_automatic_unassignment,
            }];
        }

        Vec::new()
    }

    /// Decides the events for a hearing-listing batch assignment.
    ///
    /// Validation is a single upfront pass over all elements; the batch
    /// never partially succeeds.
    #[must_use]
    pub fn assign_case_hearing(
        &self,
        command: AssignCaseHearingCommand,
        allowed_groups: &AllowedGroups,
    ) -> Vec<CaseAssignmentEvent> {
        let precomputed_errors: Vec<HearingAssignmentError> = command
            .case_hearing_assignment_details
            .iter()
            .filter_map(CaseHearingAssignmentDetail::precomputed_error)
            .collect();

        let Some(assignee) = command.assignee else {
            let assignment_errors = if precomputed_errors.is_empty() {
                command
                    .case_hearing_assignment_details
                    .iter()
                    .map(|detail| HearingAssignmentError {
                        case_id: detail.case_id,
                        hearing_id: detail.hearing_id,
                        error_code: USER_NOT_FOUND.to_owned(),
                        failure_reason: format!(
                            "no user found for email '{}'",
                            command.assignee_email
                        ),
                    })
                    .collect()
            } else {
                precomputed_errors
            };

            return vec![CaseAssignmentEvent::CaseAssignmentsByHearingListingFailed {
                email: command.assignee_email,
                assignment_errors,
            }];
        };

        if !precomputed_errors.is_empty() {
            return vec![CaseAssignmentEvent::CaseAssignmentsByHearingListingFailed {
                email: command.assignee_email,
                assignment_errors: precomputed_errors,
            }];
        }

        if !allowed_groups.is_in_allowed_groups(&command.assignee_groups) {
            return vec![CaseAssignmentEvent::AssigneeNotInAllowedGroups {
                email: command.assignee_email,
            }];
        }

        let issued_by_prosecution = command.is_cps || command.is_police;
        if command.assignee_is_defending_case && issued_by_prosecution {
            return vec![CaseAssignmentEvent::AssigneeForProsecutionIsDefendingCase {
                email: command.assignee_email,
            }];
        }

        let assignments: Vec<HearingAssignmentEntry> = command
            .case_hearing_assignment_details
            .iter()
            .map(|detail| HearingAssignmentEntry {
                case_id: detail.case_id,
                hearing_id: detail.hearing_id,
                assignment_timestamp: detail.assignment_timestamp,
            })
            .collect();

        let representing_organisation = command.representing_organisation.into_event_payload();
        if allowed_groups.is_defence_lawyer(&command.assignee_groups) {
            vec![CaseAssignmentEvent::CasesAssignedToOrganisation {
                assignee_organisation: command.assignee_organisation,
                assignor_organisation: command.assignor_organisation,
                assignee_details: assignee,
                assignor_details: command.assignor,
                representing_organisation,
                assignments,
            }]
        } else {
            vec![CaseAssignmentEvent::CasesAssignedToAdvocate {
                assignee_organisation: command.assignee_organisation,
                assignor_organisation: command.assignor_organisation,
                assignee_details: assignee,
                assignor_details: command.assignor,
                representing_organisation,
                assignments,
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{
        AssignCaseCommand, AssignCaseHearingCommand, CaseAssignmentEvent, CaseAssignmentState,
        CaseHearingAssignmentDetail, RemoveCaseAssignmentCommand, USER_NOT_ASSIGNED,
        USER_NOT_FOUND,
    };
    use crate::ids::{CaseId, HearingId, OrganisationId, UserId};
    use crate::party::{
        AllowedGroups, Organisation, PersonDetails, RepresentingOrganisation, RoleMembership,
    };

    fn organisation(name: &str) -> Organisation {
        match Organisation::new(OrganisationId::new(), name) {
            Ok(organisation) => organisation,
            Err(error) => panic!("test organisation is valid: {error}"),
        }
    }

    fn person(first_name: &str, last_name: &str) -> PersonDetails {
        PersonDetails {
            user_id: UserId::new(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
        }
    }

    fn timestamp() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, 9, 30, 0).single().unwrap_or_default()
    }

    fn assign_command(
        assignee_groups: RoleMembership,
        assignee: Option<PersonDetails>,
    ) -> AssignCaseCommand {
        AssignCaseCommand {
            case_id: CaseId::new(),
            assignee_email: "j.fletcher@chambers.example.com".to_owned(),
            assignee,
            assignee_organisation: organisation("Fletcher Chambers"),
            assignor: person("Sam", "Barker"),
            assignor_organisation: organisation("Crown Prosecution Service"),
            assignee_groups,
            assignee_is_defending_case: false,
            is_police: false,
            is_cps: true,
            representing_organisation: RepresentingOrganisation::new("CPS"),
            assignment_timestamp: timestamp(),
        }
    }

    #[test]
    fn missing_identity_emits_user_not_found() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case(
            assign_command(RoleMembership::new(["Advocates"]), None),
            &AllowedGroups::default(),
        );

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], CaseAssignmentEvent::UserNotFound { .. }));
    }

    #[test]
    fn assignee_outside_allowed_groups_is_rejected() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case(
            assign_command(RoleMembership::new(["Listing Officers"]), Some(person("Jo", "Fletcher"))),
            &AllowedGroups::default(),
        );

        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::AssigneeNotInAllowedGroups { .. }]
        ));
    }

    #[test]
    fn defending_assignee_conflicts_with_prosecuting_context() {
        let state = CaseAssignmentState::default();
        let mut command = assign_command(
            RoleMembership::new(["Advocates"]),
            Some(person("Jo", "Fletcher")),
        );
        command.assignee_is_defending_case = true;
        // The conflict fires on the prosecuting flags alone; the
        // representing-organisation code is not consulted.
        command.representing_organisation = RepresentingOrganisation::new("TFL");

        let events = state.assign_case(command, &AllowedGroups::default());
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::AssigneeForProsecutionIsDefendingCase { .. }]
        ));
    }

    #[test]
    fn defending_assignee_is_allowed_outside_prosecuting_context() {
        let state = CaseAssignmentState::default();
        let mut command = assign_command(
            RoleMembership::new(["Advocates"]),
            Some(person("Jo", "Fletcher")),
        );
        command.assignee_is_defending_case = true;
        command.is_cps = false;
        command.is_police = false;

        let events = state.assign_case(command, &AllowedGroups::default());
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignedToAdvocate { .. }]
        ));
    }

    #[test]
    fn advocate_assignment_routes_to_advocate_event() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case(
            assign_command(RoleMembership::new(["Advocates"]), Some(person("Jo", "Fletcher"))),
            &AllowedGroups::default(),
        );

        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignedToAdvocate { .. }]
        ));
    }

    #[test]
    fn defence_lawyer_takes_precedence_over_advocate() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case(
            assign_command(
                RoleMembership::new(["Advocates", "Defence Lawyers"]),
                Some(person("Jo", "Fletcher")),
            ),
            &AllowedGroups::default(),
        );

        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignedToOrganisation { .. }]
        ));
    }

    #[test]
    fn repeating_an_assignment_signals_user_already_assigned() {
        let allowed = AllowedGroups::default();
        let command = assign_command(
            RoleMembership::new(["Advocates"]),
            Some(person("Jo", "Fletcher")),
        );

        let first = CaseAssignmentState::default().assign_case(command.clone(), &allowed);
        assert!(matches!(
            first.as_slice(),
            [CaseAssignmentEvent::CaseAssignedToAdvocate { .. }]
        ));

        let state = CaseAssignmentState::fold(&first);
        let second = state.assign_case(command, &allowed);
        assert!(matches!(
            second.as_slice(),
            [CaseAssignmentEvent::UserAlreadyAssigned { .. }]
        ));
    }

    #[test]
    fn changed_assignor_re_emits_the_assignment() {
        let allowed = AllowedGroups::default();
        let command = assign_command(
            RoleMembership::new(["Advocates"]),
            Some(person("Jo", "Fletcher")),
        );

        let first = CaseAssignmentState::default().assign_case(command.clone(), &allowed);
        let state = CaseAssignmentState::fold(&first);

        let mut reassignment = command;
        reassignment.assignor = person("Priya", "Nair");
        let events = state.assign_case(reassignment, &allowed);
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignedToAdvocate { .. }]
        ));
    }

    #[test]
    fn non_cps_code_is_carried_in_the_assignment_payload() {
        let mut command = assign_command(
            RoleMembership::new(["Advocates"]),
            Some(person("Jo", "Fletcher")),
        );
        command.representing_organisation = RepresentingOrganisation::new("DVLA");

        let events = CaseAssignmentState::default().assign_case(command, &AllowedGroups::default());
        let [CaseAssignmentEvent::CaseAssignedToAdvocate {
            representing_organisation,
            ..
        }] = events.as_slice()
        else {
            panic!("expected a single advocate assignment event");
        };
        assert!(
            representing_organisation
                .as_ref()
                .is_some_and(|code| code.code() == "DVLA")
        );
    }

    fn remove_command(
        assignee_user_id: UserId,
        groups: RoleMembership,
        is_automatic: bool,
    ) -> RemoveCaseAssignmentCommand {
        RemoveCaseAssignmentCommand {
            case_id: CaseId::new(),
            assignee_user_id,
            assignee_groups: groups,
            has_other_advocates_assigned_to_case: false,
            removed_by_user_id: UserId::new(),
            is_automatic_unassignment: is_automatic,
            removed_timestamp: timestamp(),
        }
    }

    #[test]
    fn manual_removal_without_assignment_signals_user_not_assigned() {
        let state = CaseAssignmentState::default();
        let events = state.remove_case_assignment(
            remove_command(UserId::new(), RoleMembership::new(["Advocates"]), false),
            &AllowedGroups::default(),
        );

        let [CaseAssignmentEvent::UserNotAssigned { error_code, .. }] = events.as_slice() else {
            panic!("expected a single user-not-assigned event");
        };
        assert_eq!(error_code, USER_NOT_ASSIGNED);
    }

    #[test]
    fn automatic_removal_without_assignment_is_silent() {
        let state = CaseAssignmentState::default();
        let events = state.remove_case_assignment(
            remove_command(UserId::new(), RoleMembership::new(["Advocates"]), true),
            &AllowedGroups::default(),
        );

        assert!(events.is_empty());
    }

    #[test]
    fn advocate_removal_clears_the_active_assignment() {
        let allowed = AllowedGroups::default();
        let assignee = person("Jo", "Fletcher");
        let assigned = CaseAssignmentState::default().assign_case(
            assign_command(RoleMembership::new(["Advocates"]), Some(assignee.clone())),
            &allowed,
        );
        let state = CaseAssignmentState::fold(&assigned);

        let events = state.remove_case_assignment(
            remove_command(assignee.user_id, RoleMembership::new(["Advocates"]), false),
            &allowed,
        );
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignmentToAdvocateRemoved { .. }]
        ));

        let mut cleared = state;
        for event in &events {
            cleared.apply(event);
        }
        assert!(cleared.active_assignment_for_user(assignee.user_id).is_none());
    }

    #[test]
    fn organisation_access_persists_while_other_advocates_remain() {
        let allowed = AllowedGroups::default();
        let assignee = person("Jo", "Fletcher");
        let assigned = CaseAssignmentState::default().assign_case(
            assign_command(RoleMembership::new(["Defence Lawyers"]), Some(assignee.clone())),
            &allowed,
        );
        let state = CaseAssignmentState::fold(&assigned);

        let mut command =
            remove_command(assignee.user_id, RoleMembership::new(["Defence Lawyers"]), false);
        command.has_other_advocates_assigned_to_case = true;

        assert!(state.remove_case_assignment(command, &allowed).is_empty());
    }

    #[test]
    fn last_defence_lawyer_removal_clears_organisation_access() {
        let allowed = AllowedGroups::default();
        let assignee = person("Jo", "Fletcher");
        let assigned = CaseAssignmentState::default().assign_case(
            assign_command(RoleMembership::new(["Defence Lawyers"]), Some(assignee.clone())),
            &allowed,
        );
        let state = CaseAssignmentState::fold(&assigned);

        let events = state.remove_case_assignment(
            remove_command(assignee.user_id, RoleMembership::new(["Defence Lawyers"]), false),
            &allowed,
        );
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CaseAssignmentToOrganisationRemoved { .. }]
        ));
    }

    fn hearing_detail(error_code: Option<&str>) -> CaseHearingAssignmentDetail {
        CaseHearingAssignmentDetail {
            case_id: CaseId::new(),
            hearing_id: HearingId::new(),
            assignment_timestamp: timestamp(),
            error_code: error_code.map(str::to_owned),
            failure_reason: error_code.map(|_| "listing validation failed".to_owned()),
        }
    }

    fn hearing_command(
        assignee: Option<PersonDetails>,
        details: Vec<CaseHearingAssignmentDetail>,
    ) -> AssignCaseHearingCommand {
        AssignCaseHearingCommand {
            assignee_email: "j.fletcher@chambers.example.com".to_owned(),
            assignee,
            assignee_organisation: organisation("Fletcher Chambers"),
            assignor: person("Sam", "Barker"),
            assignor_organisation: organisation("Crown Prosecution Service"),
            assignee_groups: RoleMembership::new(["Advocates"]),
            assignee_is_defending_case: false,
            is_police: false,
            is_cps: true,
            representing_organisation: RepresentingOrganisation::new("CPS"),
            case_hearing_assignment_details: details,
        }
    }

    #[test]
    fn one_failing_element_rejects_the_whole_batch() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case_hearing(
            hearing_command(
                Some(person("Jo", "Fletcher")),
                vec![hearing_detail(None), hearing_detail(Some("HEARING_NOT_FOUND"))],
            ),
            &AllowedGroups::default(),
        );

        let [CaseAssignmentEvent::CaseAssignmentsByHearingListingFailed {
            assignment_errors, ..
        }] = events.as_slice()
        else {
            panic!("expected a single batch failure event");
        };
        assert_eq!(assignment_errors.len(), 1);
        assert_eq!(assignment_errors[0].error_code, "HEARING_NOT_FOUND");
    }

    #[test]
    fn missing_identity_fails_the_batch_with_per_element_errors() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case_hearing(
            hearing_command(None, vec![hearing_detail(None), hearing_detail(None)]),
            &AllowedGroups::default(),
        );

        let [CaseAssignmentEvent::CaseAssignmentsByHearingListingFailed {
            assignment_errors, ..
        }] = events.as_slice()
        else {
            panic!("expected a single batch failure event");
        };
        assert_eq!(assignment_errors.len(), 2);
        assert!(assignment_errors.iter().all(|error| error.error_code == USER_NOT_FOUND));
    }

    #[test]
    fn clean_batch_emits_one_event_with_all_entries() {
        let state = CaseAssignmentState::default();
        let events = state.assign_case_hearing(
            hearing_command(
                Some(person("Jo", "Fletcher")),
                vec![hearing_detail(None), hearing_detail(None), hearing_detail(None)],
            ),
            &AllowedGroups::default(),
        );

        let [CaseAssignmentEvent::CasesAssignedToAdvocate { assignments, .. }] = events.as_slice()
        else {
            panic!("expected a single batch assignment event");
        };
        assert_eq!(assignments.len(), 3);
    }

    #[test]
    fn batch_routes_defence_lawyers_to_the_organisation_event() {
        let state = CaseAssignmentState::default();
        let mut command = hearing_command(Some(person("Jo", "Fletcher")), vec![hearing_detail(None)]);
        command.assignee_groups = RoleMembership::new(["Advocates", "Defence Lawyers"]);

        let events = state.assign_case_hearing(command, &AllowedGroups::default());
        assert!(matches!(
            events.as_slice(),
            [CaseAssignmentEvent::CasesAssignedToOrganisation { .. }]
        ));
    }

    #[test]
    fn removal_events_use_the_historical_storage_value() {
        let event = CaseAssignmentEvent::CaseAssignmentToOrganisationRemoved {
            case_id: CaseId::new(),
            assignee_organisation_id: OrganisationId::new(),
            removed_by_user_id: UserId::new(),
            removed_timestamp: timestamp(),
            is_automatic_unassignment: false,
        };

        let serialized = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(
            serialized.get("type").and_then(|value| value.as_str()),
            Some("case_assigment_to_organisation_removed")
        );
    }
}
