//! In-memory event stores for development and tests. Streams live in a
//! tokio-locked map; append order is preserved per stream.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use advocase_application::{
    CaseAssignmentEventStore, CaseAssignmentStream, DefenceAssociationEventStore,
    GrantAccessEventStore,
};
use advocase_core::AppResult;
use advocase_domain::{CaseAssignmentEvent, DefenceAssociationEvent, DefendantId, GrantAccessEvent};

/// In-memory store for case assignment streams.
#[derive(Default)]
pub struct InMemoryCaseAssignmentEventStore {
    streams: RwLock<HashMap<String, Vec<CaseAssignmentEvent>>>,
}

impl InMemoryCaseAssignmentEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseAssignmentEventStore for InMemoryCaseAssignmentEventStore {
    async fn load_events(
        &self,
        stream: &CaseAssignmentStream,
    ) -> AppResult<Vec<CaseAssignmentEvent>> {
        Ok(self
            .streams
            .read()
            .await
            .get(&stream.to_string())
            .cloned()
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        stream: &CaseAssignmentStream,
        events: &[CaseAssignmentEvent],
    ) -> AppResult<()> {
        let mut streams = self.streams.write().await;
        let stored = streams.entry(stream.to_string()).or_default();
        stored.extend_from_slice(events);
        debug!(
            stream = %stream,
            appended = events.len(),
            stream_len = stored.len(),
            "case assignment events appended"
        );

        Ok(())
    }
}

/// In-memory store for defence association streams.
#[derive(Default)]
pub struct InMemoryDefenceAssociationEventStore {
    streams: RwLock<HashMap<DefendantId, Vec<DefenceAssociationEvent>>>,
}

impl InMemoryDefenceAssociationEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DefenceAssociationEventStore for InMemoryDefenceAssociationEventStore {
    async fn load_events(
        &self,
        defendant_id: DefendantId,
    ) -> AppResult<Vec<DefenceAssociationEvent>> {
        Ok(self
            .streams
            .read()
            .await
            .get(&defendant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        defendant_id: DefendantId,
        events: &[DefenceAssociationEvent],
    ) -> AppResult<()> {
        let mut streams = self.streams.write().await;
        let stored = streams.entry(defendant_id).or_default();
        stored.extend_from_slice(events);
        debug!(
            defendant_id = %defendant_id,
            appended = events.len(),
            stream_len = stored.len(),
            "defence association events appended"
        );

        Ok(())
    }
}

/// In-memory store for grant access streams.
#[derive(Default)]
pub struct InMemoryGrantAccessEventStore {
    streams: RwLock<HashMap<DefendantId, Vec<GrantAccessEvent>>>,
}

impl InMemoryGrantAccessEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GrantAccessEventStore for InMemoryGrantAccessEventStore {
    async fn load_events(
        &self,
        defence_client_id: DefendantId,
    ) -> AppResult<Vec<GrantAccessEvent>> {
        Ok(self
            .streams
            .read()
            .await
            .get(&defence_client_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        defence_client_id: DefendantId,
        events: &[GrantAccessEvent],
    ) -> AppResult<()> {
        let mut streams = self.streams.write().await;
        let stored = streams.entry(defence_client_id).or_default();
        stored.extend_from_slice(events);
        debug!(
            defence_client_id = %defence_client_id,
            appended = events.len(),
            stream_len = stored.len(),
            "grant access events appended"
        );

        Ok(())
    }
}
