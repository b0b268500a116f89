use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use advocase_core::AppResult;
use advocase_domain::{
    AssociateOrganisationCommand, DefenceAssociationEvent, DefenceAssociationState, DefendantId,
    DisassociateOrganisationCommand, LockAssociationCommand, OrphanedAssociationCommand,
};

use crate::stream_locks::StreamLocks;

/// Event store port for defence association streams, one per defendant.
#[async_trait]
pub trait DefenceAssociationEventStore: Send + Sync {
    /// Loads the full association history of one defendant.
    async fn load_events(
        &self,
        defendant_id: DefendantId,
    ) -> AppResult<Vec<DefenceAssociationEvent>>;

    /// Appends newly decided events to one defendant's stream.
    async fn append_events(
        &self,
        defendant_id: DefendantId,
        events: &[DefenceAssociationEvent],
    ) -> AppResult<()>;
}

/// Application service handling defence association commands.
#[derive(Clone)]
pub struct DefenceAssociationService {
    event_store: Arc<dyn DefenceAssociationEventStore>,
    stream_locks: StreamLocks,
}

impl DefenceAssociationService {
    /// Creates a new defence association service.
    #[must_use]
    pub fn new(event_store: Arc<dyn DefenceAssociationEventStore>) -> Self {
        Self {
            event_store,
            stream_locks: StreamLocks::new(),
        }
    }

    /// Handles an association command and returns the emitted events.
    pub async fn associate_organisation(
        &self,
        command: AssociateOrganisationCommand,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let defendant_id = command.defendant_id;
        self.handle(defendant_id, |state| state.associate_organisation(command))
            .await
    }

    /// Handles an association arriving on the statutory
    /// representation-order channel.
    pub async fn associate_organisation_for_rep_order(
        &self,
        command: AssociateOrganisationCommand,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let defendant_id = command.defendant_id;
        self.handle(defendant_id, |state| {
            state.associate_organisation_for_rep_order(command)
        })
        .await
    }

    /// Handles a disassociation command and returns the emitted events.
    pub async fn disassociate_organisation(
        &self,
        command: DisassociateOrganisationCommand,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let defendant_id = command.defendant_id;
        self.handle(defendant_id, |state| {
            state.disassociate_organisation(command)
        })
        .await
    }

    /// Repairs an association whose defendant record arrived late.
    pub async fn handle_orphaned_association(
        &self,
        command: OrphanedAssociationCommand,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let defendant_id = command.defendant_id;
        self.handle(defendant_id, |state| {
            state.handle_orphaned_association(command)
        })
        .await
    }

    /// Records a representation-order lock for the defendant.
    pub async fn handle_association_locked(
        &self,
        command: LockAssociationCommand,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let defendant_id = command.defendant_id;
        self.handle(defendant_id, |state| {
            state.handle_association_locked(command)
        })
        .await
    }

    async fn handle(
        &self,
        defendant_id: DefendantId,
        decide: impl FnOnce(&DefenceAssociationState) -> Vec<DefenceAssociationEvent>,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        let _guard = self
            .stream_locks
            .acquire(format!("defence-association:{defendant_id}"))
            .await;

        let history = self.event_store.load_events(defendant_id).await?;
        let state = DefenceAssociationState::fold(&history);
        let events = decide(&state);

        if !events.is_empty() {
            self.event_store.append_events(defendant_id, &events).await?;
        }

        info!(
            defendant_id = %defendant_id,
            history_len = history.len(),
            event_count = events.len(),
            "defence association command handled"
        );

        Ok(events)
    }
}
