//! Defence organisation association aggregate.
//!
//! A defendant has at most one active association at a time. Associating
//! a new organisation while one is active implicitly disassociates the
//! old one first; consumers rely on disassociation preceding the new
//! association in the emitted sequence.

use advocase_core::NonEmptyString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DefendantId, OrganisationId, UserId};
use crate::party::Organisation;

/// Funding route under which an organisation represents a defendant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepresentationType {
    /// The defendant funds the representation privately.
    PrivatelyFunded,
    /// A representation order has been granted.
    RepresentationOrder,
    /// A representation order has been applied for.
    RepresentationOrderAppliedFor,
}

impl RepresentationType {
    /// Returns a stable storage value for this representation type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivatelyFunded => "PRIVATELY_FUNDED",
            Self::RepresentationOrder => "REPRESENTATION_ORDER",
            Self::RepresentationOrderAppliedFor => "REPRESENTATION_ORDER_APPLIED_FOR",
        }
    }
}

/// A defendant's association with a defence organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Represented defendant.
    pub defendant_id: DefendantId,
    /// Associated defence organisation.
    pub organisation_id: OrganisationId,
    /// Organisation display name at association time.
    pub organisation_name: NonEmptyString,
    /// Funding route, when known (orphan repairs arrive without one).
    pub representation_type: Option<RepresentationType>,
    /// Legal Aid Agency contract number, when supplied.
    pub laa_contract_number: Option<String>,
    /// When the association started.
    pub start_date: DateTime<Utc>,
    /// When the association ended; `None` while active.
    pub end_date: Option<DateTime<Utc>>,
    /// Set once a statutory representation order locks the association.
    /// Never cleared by a later association event.
    pub locked_by_rep_order: bool,
}

/// Events produced by the defence association aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DefenceAssociationEvent {
    /// A defence organisation now represents the defendant.
    DefenceOrganisationAssociated {
        /// Represented defendant.
        defendant_id: DefendantId,
        /// Associated organisation.
        organisation_id: OrganisationId,
        /// Organisation display name at association time.
        organisation_name: NonEmptyString,
        /// Funding route, when known.
        representation_type: Option<RepresentationType>,
        /// Legal Aid Agency contract number, when supplied.
        laa_contract_number: Option<String>,
        /// When the association started.
        start_date: DateTime<Utc>,
        /// User who made the association.
        associated_by: UserId,
    },
    /// The defendant's association with an organisation ended.
    DefenceOrganisationDisassociated {
        /// Represented defendant.
        defendant_id: DefendantId,
        /// Disassociated organisation.
        organisation_id: OrganisationId,
        /// Organisation display name at association time.
        organisation_name: NonEmptyString,
        /// When the association ended.
        end_date: DateTime<Utc>,
        /// User who triggered the disassociation.
        disassociated_by: UserId,
    },
    /// The organisation is already associated; idempotent rejection.
    DefenceAssociationFailed {
        /// Defendant the command referred to.
        defendant_id: DefendantId,
        /// Organisation the command referred to.
        organisation_id: OrganisationId,
    },
    /// Disassociation was requested for an absent or different
    /// organisation, including a repeated disassociation.
    DefenceDisassociationFailed {
        /// Defendant the command referred to.
        defendant_id: DefendantId,
        /// Organisation the command referred to.
        organisation_id: OrganisationId,
    },
    /// Only the LAA reference changed for the already-associated
    /// organisation on the representation-order channel.
    #[serde(rename = "defence_organisation_laareference_received")]
    DefenceOrganisationLaaReferenceReceived {
        /// Represented defendant.
        defendant_id: DefendantId,
        /// Associated organisation.
        organisation_id: OrganisationId,
        /// Newly received LAA contract number.
        laa_contract_number: String,
    },
    /// A statutory representation order locked the association.
    DefendantDefenceAssociationLockedForLaa {
        /// Locked defendant.
        defendant_id: DefendantId,
        /// LAA contract number the lock refers to.
        laa_contract_number: String,
    },
}

/// Command to associate a defence organisation with a defendant.
#[derive(Debug, Clone)]
pub struct AssociateOrganisationCommand {
    /// Represented defendant.
    pub defendant_id: DefendantId,
    /// Organisation to associate.
    pub organisation: Organisation,
    /// Funding route.
    pub representation_type: Option<RepresentationType>,
    /// Legal Aid Agency contract number, when supplied.
    pub laa_contract_number: Option<String>,
    /// User making the association.
    pub user_id: UserId,
    /// When the command was issued.
    pub association_timestamp: DateTime<Utc>,
}

/// Command to disassociate a defence organisation from a defendant.
#[derive(Debug, Clone)]
pub struct DisassociateOrganisationCommand {
    /// Represented defendant.
    pub defendant_id: DefendantId,
    /// Organisation to disassociate.
    pub organisation_id: OrganisationId,
    /// User triggering the disassociation.
    pub user_id: UserId,
    /// When the command was issued.
    pub disassociation_timestamp: DateTime<Utc>,
}

/// Command to repair an association that arrived before the defendant's
/// case record existed locally.
#[derive(Debug, Clone)]
pub struct OrphanedAssociationCommand {
    /// Represented defendant.
    pub defendant_id: DefendantId,
    /// Organisation to associate.
    pub organisation: Organisation,
    /// Legal Aid Agency contract number, when supplied.
    pub laa_contract_number: Option<String>,
    /// User making the association.
    pub user_id: UserId,
    /// When the command was issued.
    pub association_timestamp: DateTime<Utc>,
}

/// Command recording that a representation order locked the association.
#[derive(Debug, Clone)]
pub struct LockAssociationCommand {
    /// Locked defendant.
    pub defendant_id: DefendantId,
    /// LAA contract number the lock refers to.
    pub laa_contract_number: String,
}

/// Folded state of one defendant's association stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefenceAssociationState {
    active: Option<Association>,
    last_known: Option<Association>,
    locked_by_rep_order: bool,
}

impl DefenceAssociationState {
    /// Rebuilds state by folding previously emitted events.
    #[must_use]
    pub fn fold(events: &[DefenceAssociationEvent]) -> Self {
        let mut state = Self::default();
        for event in events {
            state.apply(event);
        }

        state
    }

    /// Applies one event to the folded state.
    pub fn apply(&mut self, event: &DefenceAssociationEvent) {
        match event {
            DefenceAssociationEvent::DefenceOrganisationAssociated {
                defendant_id,
                organisation_id,
                organisation_name,
                representation_type,
                laa_contract_number,
                start_date,
                ..
            } => {
                self.active = Some(Association {
                    defendant_id: *defendant_id,
                    organisation_id: *organisation_id,
                    organisation_name: organisation_name.clone(),
                    representation_type: *representation_type,
                    laa_contract_number: laa_contract_number.clone(),
                    start_date: *start_date,
                    end_date: None,
                    // The lock survives replacement of the association.
                    locked_by_rep_order: self.locked_by_rep_order,
                });
            }
            DefenceAssociationEvent::DefenceOrganisationDisassociated { end_date, .. } => {
                if let Some(mut association) = self.active.take() {
                    association.end_date = Some(*end_date);
                    self.last_known = Some(association);
                }
            }
            DefenceAssociationEvent::DefenceOrganisationLaaReferenceReceived {
                organisation_id,
                laa_contract_number,
                ..
            } => {
                if let Some(association) = self.active.as_mut()
                    && association.organisation_id == *organisation_id
                {
                    association.laa_contract_number = Some(laa_contract_number.clone());
                }
            }
            DefenceAssociationEvent::DefendantDefenceAssociationLockedForLaa { .. } => {
                self.locked_by_rep_order = true;
                if let Some(association) = self.active.as_mut() {
                    association.locked_by_rep_order = true;
                }
            }
            DefenceAssociationEvent::DefenceAssociationFailed { .. }
            | DefenceAssociationEvent::DefenceDisassociationFailed { .. } => {}
        }
    }

    /// Returns the active association, when one exists.
    #[must_use]
    pub fn active_association(&self) -> Option<&Association> {
        self.active.as_ref()
    }

    /// Returns the most recently ended association, for read purposes.
    #[must_use]
    pub fn last_known_association(&self) -> Option<&Association> {
        self.last_known.as_ref()
    }

    /// Decides the events for an association command.
    #[must_use]
    pub fn associate_organisation(
        &self,
        command: AssociateOrganisationCommand,
    ) -> Vec<DefenceAssociationEvent> {
        match self.active {
            Some(ref active)
                if active.organisation_id == command.organisation.organisation_id() =>
            {
                vec![DefenceAssociationEvent::DefenceAssociationFailed {
                    defendant_id: command.defendant_id,
                    organisation_id: command.organisation.organisation_id(),
                }]
            }
            Some(ref active) => vec![
                disassociation_event(active, command.user_id, command.association_timestamp),
                association_event(&command),
            ],
            None => vec![association_event(&command)],
        }
    }

    /// Decides the events for an association arriving on the statutory
    /// representation-order channel.
    ///
    /// Differs from [`Self::associate_organisation`] only when the same
    /// organisation is already associated: a changed LAA reference is
    /// recorded instead of rejected.
    #[must_use]
    pub fn associate_organisation_for_rep_order(
        &self,
        command: AssociateOrganisationCommand,
    ) -> Vec<DefenceAssociationEvent> {
        if let Some(ref active) = self.active
            && active.organisation_id == command.organisation.organisation_id()
        {
            if let Some(ref reference) = command.laa_contract_number
                && active.laa_contract_number.as_deref() != Some(reference.as_str())
            {
                return vec![
                    DefenceAssociationEvent::DefenceOrganisationLaaReferenceReceived {
                        defendant_id: command.defendant_id,
                        organisation_id: command.organisation.organisation_id(),
                        laa_contract_number: reference.clone(),
                    },
                ];
            }

            return vec![DefenceAssociationEvent::DefenceAssociationFailed {
                defendant_id: command.defendant_id,
                organisation_id: command.organisation.organisation_id(),
            }];
        }

        self.associate_organisation(command)
    }

    /// Decides the events for a disassociation command.
    #[must_use]
    pub fn disassociate_organisation(
        &self,
        command: DisassociateOrganisationCommand,
    ) -> Vec<DefenceAssociationEvent> {
        match self.active {
            Some(ref active) if active.organisation_id == command.organisation_id => {
                vec![disassociation_event(
                    active,
                    command.user_id,
                    command.disassociation_timestamp,
                )]
            }
            _ => vec![DefenceAssociationEvent::DefenceDisassociationFailed {
                defendant_id: command.defendant_id,
                organisation_id: command.organisation_id,
            }],
        }
    }

    /// Decides the events for an association whose defendant record did
    /// not yet exist locally when the association arrived.
    #[must_use]
    pub fn handle_orphaned_association(
        &self,
        command: OrphanedAssociationCommand,
    ) -> Vec<DefenceAssociationEvent> {
        let association = DefenceAssociationEvent::DefenceOrganisationAssociated {
            defendant_id: command.defendant_id,
            organisation_id: command.organisation.organisation_id(),
            organisation_name: command.organisation.organisation_name().clone(),
            representation_type: None,
            laa_contract_number: command.laa_contract_number,
            start_date: command.association_timestamp,
            associated_by: command.user_id,
        };

        match self.active {
            Some(ref active) => vec![
                disassociation_event(active, command.user_id, command.association_timestamp),
                association,
            ],
            None => vec![association],
        }
    }

    /// Records a representation-order lock. Each call is independent;
    /// the lock flag itself is folded by consumers of the event.
    #[must_use]
    pub fn handle_association_locked(
        &self,
        command: LockAssociationCommand,
    ) -> Vec<DefenceAssociationEvent> {
        vec![
            DefenceAssociationEvent::DefendantDefenceAssociationLockedForLaa {
                defendant_id: command.defendant_id,
                laa_contract_number: command.laa_contract_number,
            },
        ]
    }
}

fn association_event(command: &AssociateOrganisationCommand) -> DefenceAssociationEvent {
    DefenceAssociationEvent::DefenceOrganisationAssociated {
        defendant_id: command.defendant_id,
        organisation_id: command.organisation.organisation_id(),
        organisation_name: command.organisation.organisation_name().clone(),
        representation_type: command.representation_type,
        laa_contract_number: command.laa_contract_number.clone(),
        start_date: command.association_timestamp,
        associated_by: command.user_id,
    }
}

fn disassociation_event(
    active: &Association,
    user_id: UserId,
    end_date: DateTime<Utc>,
) -> DefenceAssociationEvent {
    DefenceAssociationEvent::DefenceOrganisationDisassociated {
        defendant_id: active.defendant_id,
        organisation_id: active.organisation_id,
        organisation_name: active.organisation_name.clone(),
        end_date,
        disassociated_by: user_id,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    use super::{
        AssociateOrganisationCommand, DefenceAssociationEvent, DefenceAssociationState,
        DisassociateOrganisationCommand, LockAssociationCommand, OrphanedAssociationCommand,
        RepresentationType,
    };
    use crate::ids::{DefendantId, OrganisationId, UserId};
    use crate::party::Organisation;

    fn organisation(id: OrganisationId, name: &str) -> Organisation {
        match Organisation::new(id, name) {
            Ok(organisation) => organisation,
            Err(error) => panic!("test organisation is valid: {error}"),
        }
    }

    fn timestamp() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 14, 0, 0).single().unwrap_or_default()
    }

    fn associate(defendant_id: DefendantId, org: Organisation) -> AssociateOrganisationCommand {
        AssociateOrganisationCommand {
            defendant_id,
            organisation: org,
            representation_type: Some(RepresentationType::RepresentationOrderAppliedFor),
            laa_contract_number: Some("1234567890".to_owned()),
            user_id: UserId::new(),
            association_timestamp: timestamp(),
        }
    }

    #[test]
    fn first_association_emits_one_event() {
        let defendant_id = DefendantId::new();
        let state = DefenceAssociationState::default();

        let events =
            state.associate_organisation(associate(defendant_id, organisation(OrganisationId::new(), "Tuckers")));
        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceOrganisationAssociated { .. }]
        ));
    }

    #[test]
    fn associating_the_same_organisation_again_fails() {
        let defendant_id = DefendantId::new();
        let org = organisation(OrganisationId::new(), "Tuckers");

        let first = DefenceAssociationState::default()
            .associate_organisation(associate(defendant_id, org.clone()));
        let state = DefenceAssociationState::fold(&first);

        let events = state.associate_organisation(associate(defendant_id, org));
        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceAssociationFailed { .. }]
        ));
    }

    #[test]
    fn replacing_the_organisation_disassociates_first() {
        // Case with non-CPS prosecutor "TFL": organisation O1 already
        // associated; associating O2 emits exactly two events, in order.
        let defendant_id = DefendantId::new();
        let first_org_id = OrganisationId::new();
        let second_org_id = OrganisationId::new();

        let history = DefenceAssociationState::default().associate_organisation(associate(
            defendant_id,
            organisation(first_org_id, "Org1"),
        ));
        let state = DefenceAssociationState::fold(&history);

        let events = state
            .associate_organisation(associate(defendant_id, organisation(second_org_id, "Org2")));

        assert_eq!(events.len(), 2);
        let DefenceAssociationEvent::DefenceOrganisationDisassociated {
            defendant_id: disassociated_defendant,
            organisation_id: disassociated_org,
            ..
        } = &events[0]
        else {
            panic!("expected disassociation first");
        };
        assert_eq!(*disassociated_defendant, defendant_id);
        assert_eq!(*disassociated_org, first_org_id);

        let DefenceAssociationEvent::DefenceOrganisationAssociated {
            organisation_id: associated_org,
            ..
        } = &events[1]
        else {
            panic!("expected association second");
        };
        assert_eq!(*associated_org, second_org_id);
    }

    #[test]
    fn disassociating_the_active_organisation_succeeds_once() {
        let defendant_id = DefendantId::new();
        let org_id = OrganisationId::new();
        let history = DefenceAssociationState::default()
            .associate_organisation(associate(defendant_id, organisation(org_id, "Tuckers")));
        let mut state = DefenceAssociationState::fold(&history);

        let command = DisassociateOrganisationCommand {
            defendant_id,
            organisation_id: org_id,
            user_id: UserId::new(),
            disassociation_timestamp: timestamp(),
        };

        let events = state.disassociate_organisation(command.clone());
        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceOrganisationDisassociated { .. }]
        ));

        for event in &events {
            state.apply(event);
        }
        let repeated = state.disassociate_organisation(command);
        assert!(matches!(
            repeated.as_slice(),
            [DefenceAssociationEvent::DefenceDisassociationFailed { .. }]
        ));
    }

    #[test]
    fn disassociating_a_different_organisation_fails() {
        let defendant_id = DefendantId::new();
        let history = DefenceAssociationState::default().associate_organisation(associate(
            defendant_id,
            organisation(OrganisationId::new(), "Tuckers"),
        ));
        let state = DefenceAssociationState::fold(&history);

        let events = state.disassociate_organisation(DisassociateOrganisationCommand {
            defendant_id,
            organisation_id: OrganisationId::new(),
            user_id: UserId::new(),
            disassociation_timestamp: timestamp(),
        });
        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceDisassociationFailed { .. }]
        ));
    }

    #[test]
    fn orphan_repair_replaces_an_active_association() {
        let defendant_id = DefendantId::new();
        let history = DefenceAssociationState::default().associate_organisation(associate(
            defendant_id,
            organisation(OrganisationId::new(), "Org1"),
        ));
        let state = DefenceAssociationState::fold(&history);

        let events = state.handle_orphaned_association(OrphanedAssociationCommand {
            defendant_id,
            organisation: organisation(OrganisationId::new(), "Org2"),
            laa_contract_number: None,
            user_id: UserId::new(),
            association_timestamp: timestamp(),
        });

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            DefenceAssociationEvent::DefenceOrganisationDisassociated { .. }
        ));
        assert!(matches!(
            events[1],
            DefenceAssociationEvent::DefenceOrganisationAssociated { .. }
        ));
    }

    #[test]
    fn orphan_repair_without_active_association_associates_only() {
        let events = DefenceAssociationState::default().handle_orphaned_association(
            OrphanedAssociationCommand {
                defendant_id: DefendantId::new(),
                organisation: organisation(OrganisationId::new(), "Org2"),
                laa_contract_number: Some("0987654321".to_owned()),
                user_id: UserId::new(),
                association_timestamp: timestamp(),
            },
        );

        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceOrganisationAssociated { .. }]
        ));
    }

    #[test]
    fn rep_order_channel_records_a_changed_laa_reference() {
        let defendant_id = DefendantId::new();
        let org = organisation(OrganisationId::new(), "Tuckers");
        let history = DefenceAssociationState::default()
            .associate_organisation(associate(defendant_id, org.clone()));
        let state = DefenceAssociationState::fold(&history);

        let mut command = associate(defendant_id, org);
        command.laa_contract_number = Some("5555555555".to_owned());

        let events = state.associate_organisation_for_rep_order(command);
        let [DefenceAssociationEvent::DefenceOrganisationLaaReferenceReceived {
            laa_contract_number,
            ..
        }] = events.as_slice()
        else {
            panic!("expected a single LAA reference event");
        };
        assert_eq!(laa_contract_number, "5555555555");
    }

    #[test]
    fn rep_order_channel_rejects_an_unchanged_reference() {
        let defendant_id = DefendantId::new();
        let org = organisation(OrganisationId::new(), "Tuckers");
        let history = DefenceAssociationState::default()
            .associate_organisation(associate(defendant_id, org.clone()));
        let state = DefenceAssociationState::fold(&history);

        let events = state.associate_organisation_for_rep_order(associate(defendant_id, org));
        assert!(matches!(
            events.as_slice(),
            [DefenceAssociationEvent::DefenceAssociationFailed { .. }]
        ));
    }

    #[test]
    fn lock_events_are_emitted_on_every_call() {
        let state = DefenceAssociationState::default();
        let command = LockAssociationCommand {
            defendant_id: DefendantId::new(),
            laa_contract_number: "1234567890".to_owned(),
        };

        let first = state.handle_association_locked(command.clone());
        let second = DefenceAssociationState::fold(&first).handle_association_locked(command);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn lock_survives_replacement_of_the_association() {
        let defendant_id = DefendantId::new();
        let mut events = DefenceAssociationState::default().associate_organisation(associate(
            defendant_id,
            organisation(OrganisationId::new(), "Org1"),
        ));
        events.extend(DefenceAssociationState::fold(&events).handle_association_locked(
            LockAssociationCommand {
                defendant_id,
                laa_contract_number: "1234567890".to_owned(),
            },
        ));
        let state = DefenceAssociationState::fold(&events);
        assert!(state.active_association().is_some_and(|a| a.locked_by_rep_order));

        let mut replaced = events;
        replaced.extend(DefenceAssociationState::fold(&replaced).associate_organisation(
            associate(defendant_id, organisation(OrganisationId::new(), "Org2")),
        ));
        let state = DefenceAssociationState::fold(&replaced);
        assert!(state.active_association().is_some_and(|a| a.locked_by_rep_order));
    }

    #[test]
    fn disassociation_moves_the_association_into_history() {
        let defendant_id = DefendantId::new();
        let org_id = OrganisationId::new();
        let mut events = DefenceAssociationState::default()
            .associate_organisation(associate(defendant_id, organisation(org_id, "Tuckers")));
        events.extend(DefenceAssociationState::fold(&events).disassociate_organisation(
            DisassociateOrganisationCommand {
                defendant_id,
                organisation_id: org_id,
                user_id: UserId::new(),
                disassociation_timestamp: timestamp(),
            },
        ));

        let state = DefenceAssociationState::fold(&events);
        assert!(state.active_association().is_none());
        assert!(
            state
                .last_known_association()
                .is_some_and(|a| a.organisation_id == org_id && a.end_date.is_some())
        );
    }

    proptest! {
        #[test]
        fn replacement_always_disassociates_before_associating(
            first in proptest::array::uniform16(any::<u8>()),
            second in proptest::array::uniform16(any::<u8>()),
        ) {
            prop_assume!(first != second);

            let defendant_id = DefendantId::new();
            let first_org = organisation(
                OrganisationId::from_uuid(uuid::Uuid::from_bytes(first)),
                "Org1",
            );
            let second_org = organisation(
                OrganisationId::from_uuid(uuid::Uuid::from_bytes(second)),
                "Org2",
            );

            let history = DefenceAssociationState::default()
                .associate_organisation(associate(defendant_id, first_org.clone()));
            let state = DefenceAssociationState::fold(&history);
            let events = state.associate_organisation(associate(defendant_id, second_org.clone()));

            prop_assert_eq!(events.len(), 2);
            let first_matches = matches!(
                &events[0],
                DefenceAssociationEvent::DefenceOrganisationDisassociated { organisation_id, .. }
                    if *organisation_id == first_org.organisation_id()
            );
            prop_assert!(first_matches);
            let second_matches = matches!(
                &events[1],
                DefenceAssociationEvent::DefenceOrganisationAssociated { organisation_id, .. }
                    if *organisation_id == second_org.organisation_id()
            );
            prop_assert!(second_matches);
        }
    }
}
