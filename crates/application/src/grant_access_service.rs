use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use advocase_core::AppResult;
use advocase_domain::{
    AllowedGroups, DefendantId, GrantAccessCommand, GrantAccessEvent, GrantAccessState,
    OrganisationId, RemoveGrantAccessCommand, UserId,
};

use crate::stream_locks::StreamLocks;

/// Event store port for grant access streams, one per defence client.
#[async_trait]
pub trait GrantAccessEventStore: Send + Sync {
    /// Loads the full grant history of one defence client.
    async fn load_events(&self, defence_client_id: DefendantId)
    -> AppResult<Vec<GrantAccessEvent>>;

    /// Appends newly decided events to one defence client's stream.
    async fn append_events(
        &self,
        defence_client_id: DefendantId,
        events: &[GrantAccessEvent],
    ) -> AppResult<()>;
}

/// Directory port resolving whether a defence client exists.
///
/// Lookups happen outside the aggregate; the aggregate only ever sees
/// the outcome.
#[async_trait]
pub trait DefenceClientDirectory: Send + Sync {
    /// Returns whether the defence client is known.
    async fn defence_client_exists(&self, defence_client_id: DefendantId) -> AppResult<bool>;
}

/// Application service handling grant and revoke commands.
#[derive(Clone)]
pub struct GrantAccessService {
    event_store: Arc<dyn GrantAccessEventStore>,
    directory: Arc<dyn DefenceClientDirectory>,
    allowed_groups: AllowedGroups,
    stream_locks: StreamLocks,
}

impl GrantAccessService {
    /// Creates a new grant access service.
    #[must_use]
    pub fn new(
        event_store: Arc<dyn GrantAccessEventStore>,
        directory: Arc<dyn DefenceClientDirectory>,
        allowed_groups: AllowedGroups,
    ) -> Self {
        Self {
            event_store,
            directory,
            allowed_groups,
            stream_locks: StreamLocks::new(),
        }
    }

    /// Handles a grant command and returns the emitted events.
    pub async fn grant_access_to_user(
        &self,
        command: GrantAccessCommand,
    ) -> AppResult<Vec<GrantAccessEvent>> {
        let defence_client_id = command.defence_client_id;

        if !self.directory.defence_client_exists(defence_client_id).await? {
            warn!(
                defence_client_id = %defence_client_id,
                "grant requested for unknown defence client"
            );
            let events = vec![GrantAccessEvent::DefenceClientDoesNotExist { defence_client_id }];
            self.event_store.append_events(defence_client_id, &events).await?;
            return Ok(events);
        }

        self.handle(defence_client_id, |state| {
            state.grant_access(command, &self.allowed_groups)
        })
        .await
    }

    /// Handles a revocation command and returns the emitted events.
    pub async fn remove_grant_access_to_user(
        &self,
        defence_client_id: DefendantId,
        command: RemoveGrantAccessCommand,
    ) -> AppResult<Vec<GrantAccessEvent>> {
        self.handle(defence_client_id, |state| {
            state.remove_grant_access(command, &self.allowed_groups)
        })
        .await
    }

    /// Revokes every tracked grantee of the defence client, one removal
    /// event per grantee. Used when an organisation is disassociated.
    pub async fn remove_all_grantees(
        &self,
        defence_client_id: DefendantId,
    ) -> AppResult<Vec<GrantAccessEvent>> {
        self.handle(defence_client_id, GrantAccessState::remove_all_grantees)
            .await
    }

    /// Returns whether the user already has access to the defence
    /// client, tracked or implicit.
    pub async fn is_already_granted(
        &self,
        defence_client_id: DefendantId,
        user_id: UserId,
        associated_organisation_id: Option<OrganisationId>,
        grantee_organisation_id: Option<OrganisationId>,
    ) -> AppResult<bool> {
        let history = self.event_store.load_events(defence_client_id).await?;
        let state = GrantAccessState::fold(&history);

        Ok(state.is_already_granted(user_id, associated_organisation_id, grantee_organisation_id))
    }

    async fn handle(
        &self,
        defence_client_id: DefendantId,
        decide: impl FnOnce(&GrantAccessState) -> Vec<GrantAccessEvent>,
    ) -> AppResult<Vec<GrantAccessEvent>> {
        let _guard = self
            .stream_locks
            .acquire(format!("grant-access:{defence_client_id}"))
            .await;

        let history = self.event_store.load_events(defence_client_id).await?;
        let state = GrantAccessState::fold(&history);
        let events = decide(&state);

        if !events.is_empty() {
            self.event_store
                .append_events(defence_client_id, &events)
                .await?;
        }

        info!(
            defence_client_id = %defence_client_id,
            history_len = history.len(),
            event_count = events.len(),
            "grant access command handled"
        );

        Ok(events)
    }
}
