use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use advocase_core::AppResult;
use advocase_domain::{CaseId, Organisation, OrganisationId, PersonDetails, RepresentingOrganisation, UserId};

use crate::stream_locks::StreamLocks;

/// Pure expiry arithmetic supplied by the caller.
///
/// The projection only applies the policy; it never defines durations.
/// A time-bounded (hearing) policy returns a deadline, a permanent
/// (case) policy returns `None`.
pub trait ExpiryPolicy: Send + Sync {
    /// Computes the expiry for an assignment made at the given time.
    fn apply(&self, assignment_timestamp: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Key of one access projection record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessRecordKey {
    /// Organisation-level access to a case.
    Organisation {
        /// Assigned case.
        case_id: CaseId,
        /// Organisation holding access.
        organisation_id: OrganisationId,
    },
    /// Individual advocate access to a case.
    Advocate {
        /// Assigned case.
        case_id: CaseId,
        /// Advocate holding access.
        user_id: UserId,
    },
}

impl std::fmt::Display for AccessRecordKey {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Organisation {
                case_id,
                organisation_id,
            } => write!(formatter, "access:{case_id}:org:{organisation_id}"),
            Self::Advocate { case_id, user_id } => {
                write!(formatter, "access:{case_id}:advocate:{user_id}")
            }
        }
    }
}

/// Advocate-level sub-record attached to an organisation access record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvocateAccess {
    /// Advocate identity.
    pub advocate_details: PersonDetails,
    /// When the advocate was assigned.
    pub assigned_date: DateTime<Utc>,
    /// When the advocate's access lapses; `None` for permanent access.
    pub assignment_expiry_date: Option<DateTime<Utc>>,
}

/// One queryable access record: who currently has access to a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseAccessRecord {
    /// Record key.
    pub key: AccessRecordKey,
    /// Assigned person (defence lawyer or advocate).
    pub assignee_details: PersonDetails,
    /// User who made the assignment.
    pub assignor_details: PersonDetails,
    /// Organisation the assignor belongs to.
    pub assignor_organisation_id: OrganisationId,
    /// Non-CPS prosecuting-authority code, when present.
    pub representing_organisation: Option<RepresentingOrganisation>,
    /// When the (latest) assignment was made.
    pub assigned_date: DateTime<Utc>,
    /// When the access lapses; `None` for permanent access.
    pub assignment_expiry_date: Option<DateTime<Utc>>,
    /// Advocate sub-records under an organisation record.
    pub advocates: Vec<AdvocateAccess>,
}

/// Store port for access projection records.
#[async_trait]
pub trait AccessProjectionRepository: Send + Sync {
    /// Reads one record by key.
    async fn get(&self, key: &AccessRecordKey) -> AppResult<Option<CaseAccessRecord>>;

    /// Creates or replaces one record.
    async fn put(&self, record: CaseAccessRecord) -> AppResult<()>;

    /// Deletes one record by key.
    async fn delete(&self, key: &AccessRecordKey) -> AppResult<()>;
}

/// Input to a projection upsert, shaped after the assignment events.
#[derive(Debug, Clone)]
pub struct UpsertAccessInput {
    /// Assigned case.
    pub case_id: CaseId,
    /// Assigned person.
    pub assignee_details: PersonDetails,
    /// Organisation the assignee belongs to.
    pub assignee_organisation: Organisation,
    /// User who made the assignment.
    pub assignor_details: PersonDetails,
    /// Organisation the assignor belongs to.
    pub assignor_organisation: Organisation,
    /// Non-CPS prosecuting-authority code, when present.
    pub representing_organisation: Option<RepresentingOrganisation>,
    /// When the assignment was made.
    pub assignment_timestamp: DateTime<Utc>,
}

/// Stateless upsert procedure over keyed access records with
/// expiry-date arithmetic.
///
/// Each upsert and removal runs in a per-key critical section: the
/// read-check-write sequence must not interleave for the same key, or
/// concurrent hearing assignments could leave a stale expiry.
#[derive(Clone)]
pub struct AccessProjectionService {
    repository: Arc<dyn AccessProjectionRepository>,
    key_locks: StreamLocks,
}

impl AccessProjectionService {
    /// Creates a new access projection service.
    #[must_use]
    pub fn new(repository: Arc<dyn AccessProjectionRepository>) -> Self {
        Self {
            repository,
            key_locks: StreamLocks::new(),
        }
    }

    /// Creates or extends the organisation-level access record for a
    /// case.
    pub async fn upsert_organisation_access(
        &self,
        input: UpsertAccessInput,
        expiry_policy: &dyn ExpiryPolicy,
    ) -> AppResult<CaseAccessRecord> {
        let key = AccessRecordKey::Organisation {
            case_id: input.case_id,
            organisation_id: input.assignee_organisation.organisation_id(),
        };

        self.upsert(key, input, expiry_policy).await
    }

    /// Creates or extends the individual advocate access record for a
    /// case.
    pub async fn upsert_advocate_access(
        &self,
        input: UpsertAccessInput,
        expiry_policy: &dyn ExpiryPolicy,
    ) -> AppResult<CaseAccessRecord> {
        let key = AccessRecordKey::Advocate {
            case_id: input.case_id,
            user_id: input.assignee_details.user_id,
        };

        self.upsert(key, input, expiry_policy).await
    }

    /// Adds or refreshes an advocate sub-record under the organisation
    /// record, when that record exists.
    pub async fn register_advocate_access(
        &self,
        case_id: CaseId,
        organisation_id: OrganisationId,
        advocate: AdvocateAccess,
    ) -> AppResult<Option<CaseAccessRecord>> {
        let key = AccessRecordKey::Organisation {
            case_id,
            organisation_id,
        };
        let _guard = self.key_locks.acquire(key.to_string()).await;

        let Some(mut record) = self.repository.get(&key).await? else {
            return Ok(None);
        };

        record
            .advocates
            .retain(|existing| existing.advocate_details.user_id != advocate.advocate_details.user_id);
        record.advocates.push(advocate);
        self.repository.put(record.clone()).await?;

        Ok(Some(record))
    }

    /// Removes one advocate sub-record from the organisation record.
    ///
    /// The parent record survives while other advocate sub-records
    /// remain; it is deleted entirely when the last one goes. Returns
    /// the surviving record, or `None` when the parent was deleted or
    /// never existed.
    pub async fn remove_advocate_access(
        &self,
        case_id: CaseId,
        organisation_id: OrganisationId,
        advocate_user_id: UserId,
    ) -> AppResult<Option<CaseAccessRecord>> {
        let key = AccessRecordKey::Organisation {
            case_id,
            organisation_id,
        };
        let _guard = self.key_locks.acquire(key.to_string()).await;

        let Some(mut record) = self.repository.get(&key).await? else {
            return Ok(None);
        };

        record
            .advocates
            .retain(|advocate| advocate.advocate_details.user_id != advocate_user_id);

        if record.advocates.is_empty() {
            self.repository.delete(&key).await?;
            info!(key = %key, "access record deleted with its last advocate");
            return Ok(None);
        }

        self.repository.put(record.clone()).await?;
        Ok(Some(record))
    }

    async fn upsert(
        &self,
        key: AccessRecordKey,
        input: UpsertAccessInput,
        expiry_policy: &dyn ExpiryPolicy,
    ) -> AppResult<CaseAccessRecord> {
        let _guard = self.key_locks.acquire(key.to_string()).await;

        let Some(mut existing) = self.repository.get(&key).await? else {
            let record = CaseAccessRecord {
                key,
                assignee_details: input.assignee_details,
                assignor_details: input.assignor_details,
                assignor_organisation_id: input.assignor_organisation.organisation_id(),
                representing_organisation: input.representing_organisation,
                assigned_date: input.assignment_timestamp,
                assignment_expiry_date: expiry_policy.apply(input.assignment_timestamp),
                advocates: Vec::new(),
            };
            self.repository.put(record.clone()).await?;
            info!(key = %key, "access record created");
            return Ok(record);
        };

        // A record without an expiry is a permanent assignment; a later
        // hearing-based update must not convert it into a time-bounded
        // one.
        if existing.assignment_expiry_date.is_none() {
            return Ok(existing);
        }

        existing.assignment_expiry_date = expiry_policy.apply(input.assignment_timestamp);
        if existing.assignor_details.user_id != input.assignor_details.user_id {
            existing.assignor_details = input.assignor_details;
            existing.assignor_organisation_id = input.assignor_organisation.organisation_id();
        }
        existing.assigned_date = input.assignment_timestamp;

        self.repository.put(existing.clone()).await?;
        info!(key = %key, "access record extended");
        Ok(existing)
    }
}
