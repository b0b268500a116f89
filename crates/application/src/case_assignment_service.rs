use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use advocase_core::AppResult;
use advocase_domain::{
    AllowedGroups, AssignCaseCommand, AssignCaseHearingCommand, CaseAssignmentEvent,
    CaseAssignmentState, CaseId, RemoveCaseAssignmentCommand,
};

use crate::stream_locks::StreamLocks;

/// Identity of one case assignment event stream.
///
/// Per-case commands share a stream per case; hearing-listing batches
/// span cases and are streamed per assignee instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseAssignmentStream {
    /// Stream of assignment commands for one case.
    Case(CaseId),
    /// Stream of hearing-listing batches for one assignee.
    HearingListing {
        /// Email identifying the assignee, available even when the
        /// identity lookup failed.
        assignee_email: String,
    },
}

impl std::fmt::Display for CaseAssignmentStream {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Case(case_id) => write!(formatter, "case-assignment:{case_id}"),
            Self::HearingListing { assignee_email } => {
                write!(formatter, "case-assignment:hearing-listing:{assignee_email}")
            }
        }
    }
}

/// Event store port for case assignment streams.
///
/// The caller owns durability and replay: `load_events` must return every
/// event previously appended to the stream, in append order.
#[async_trait]
pub trait CaseAssignmentEventStore: Send + Sync {
    /// Loads the full history of one stream.
    async fn load_events(
        &self,
        stream: &CaseAssignmentStream,
    ) -> AppResult<Vec<CaseAssignmentEvent>>;

    /// Appends newly decided events to one stream.
    async fn append_events(
        &self,
        stream: &CaseAssignmentStream,
        events: &[CaseAssignmentEvent],
    ) -> AppResult<()>;
}

/// Application service handling case assignment commands.
#[derive(Clone)]
pub struct CaseAssignmentService {
    event_store: Arc<dyn CaseAssignmentEventStore>,
    allowed_groups: AllowedGroups,
    stream_locks: StreamLocks,
}

impl CaseAssignmentService {
    /// Creates a new case assignment service.
    #[must_use]
    pub fn new(event_store: Arc<dyn CaseAssignmentEventStore>, allowed_groups: AllowedGroups) -> Self {
        Self {
            event_store,
            allowed_groups,
            stream_locks: StreamLocks::new(),
        }
    }

    /// Handles an assignment command and returns the emitted events.
    pub async fn assign_case(
        &self,
        command: AssignCaseCommand,
    ) -> AppResult<Vec<CaseAssignmentEvent>> {
        let stream = CaseAssignmentStream::Case(command.case_id);
        self.handle(&stream, |state| {
            state.assign_case(command, &self.allowed_groups)
        })
        .await
    }

    /// Handles a removal command and returns the emitted events.
    pub async fn remove_case_assignment(
        &self,
        command: RemoveCaseAssignmentCommand,
    ) -> AppResult<Vec<CaseAssignmentEvent>> {
        let stream = CaseAssignmentStream::Case(command.case_id);
        self.handle(&stream, |state| {
            state.remove_case_assignment(command, &self.allowed_groups)
        })
        .await
    }

    /// Handles a hearing-listing batch command and returns the emitted
    /// events.
    pub async fn assign_case_hearing(
        &self,
        command: AssignCaseHearingCommand,
    ) -> AppResult<Vec<CaseAssignmentEvent>> {
        let stream = CaseAssignmentStream::HearingListing {
            assignee_email: command.assignee_email.clone(),
        };
        self.handle(&stream, |state| {
            state.assign_case_hearing(command, &self.allowed_groups)
        })
        .await
    }

    async fn handle(
        &self,
        stream: &CaseAssignmentStream,
        decide: impl FnOnce(&CaseAssignmentState) -> Vec<CaseAssignmentEvent>,
    ) -> AppResult<Vec<CaseAssignmentEvent>> {
        let _guard = self.stream_locks.acquire(stream.to_string()).await;

        let history = self.event_store.load_events(stream).await?;
        let state = CaseAssignmentState::fold(&history);
        let events = decide(&state);

        if !events.is_empty() {
            self.event_store.append_events(stream, &events).await?;
        }

        info!(
            stream = %stream,
            history_len = history.len(),
            event_count = events.len(),
            "case assignment command handled"
        );

        Ok(events)
    }
}
