use async_trait::async_trait;
use workshop_core::{
    AdmissionPolicy, CounterDelta, Counters, Outcome, Registration, WaitlistEntry, Workshop,
    WorkshopStatus,
};

/// Kind of record a [`StoreError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Workshop,
    Registration,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Workshop => "workshop",
            Entity::Registration => "registration",
        })
    }
}

/// Errors reported by a [`WorkshopStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },
    /// The conditional counter update lost a race or would break capacity.
    #[error("conflicting counter update on workshop {workshop_id}")]
    Conflict { workshop_id: String },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn workshop_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: Entity::Workshop,
            id: id.to_string(),
        }
    }

    pub(crate) fn registration_not_found(id: &str) -> Self {
        StoreError::NotFound {
            entity: Entity::Registration,
            id: id.to_string(),
        }
    }
}

/// Admission counters together with the policy they are judged against and
/// the version used for conditional updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedCounters {
    pub counters: Counters,
    pub policy: AdmissionPolicy,
    pub status: WorkshopStatus,
    /// Bumped on every successful counter update.
    pub version: u64,
}

/// Persistence collaborator for workshops, registrations and waitlists.
///
/// Counters are owned by the admission engine: `save_workshop` never writes
/// them, and the only way to change them is `apply_counter_delta`.
#[async_trait]
pub trait WorkshopStore: Send + Sync {
    /// Stores a new workshop.
    async fn create_workshop(&self, workshop: Workshop) -> Result<(), StoreError>;

    /// Loads a workshop, including its current counters.
    async fn load_workshop(&self, id: &str) -> Result<Workshop, StoreError>;

    /// Replaces authoring state (title, form, policy, status). Stored counters are kept.
    async fn save_workshop(&self, workshop: &Workshop) -> Result<(), StoreError>;

    /// Reads counters, admission policy and the counter version.
    async fn read_counters(&self, workshop_id: &str) -> Result<VersionedCounters, StoreError>;

    /// Atomically applies `delta` if the counter version still equals
    /// `expected_version` and the result keeps counters non-negative and
    /// within capacity.
    ///
    /// Fails with [`StoreError::Conflict`] otherwise.
    async fn apply_counter_delta(
        &self,
        workshop_id: &str,
        expected_version: u64,
        delta: CounterDelta,
    ) -> Result<VersionedCounters, StoreError>;

    /// Stores a new registration.
    async fn write_registration(&self, registration: &Registration) -> Result<(), StoreError>;

    async fn load_registration(&self, id: &str) -> Result<Registration, StoreError>;

    /// Replaces an existing registration.
    async fn update_registration(&self, registration: &Registration) -> Result<(), StoreError>;

    /// Finds an active registration of the workshop with the given duplicate key.
    async fn find_registration_by_key(
        &self,
        workshop_id: &str,
        dedupe_key: &str,
    ) -> Result<Option<Registration>, StoreError>;

    /// Number of registrations ever written for the workshop, cancelled included.
    async fn count_registrations(&self, workshop_id: &str) -> Result<usize, StoreError>;

    /// Adds a summary to the workshop's FIFO waitlist, placed by its
    /// `sequence` and not by arrival. Positions are renumbered 1..n.
    async fn append_to_waitlist(
        &self,
        workshop_id: &str,
        entry: WaitlistEntry,
    ) -> Result<(), StoreError>;

    /// Removes and returns the head of the waitlist. Remaining positions shift up.
    async fn pop_waitlist_head(&self, workshop_id: &str)
        -> Result<Option<WaitlistEntry>, StoreError>;

    /// Removes one entry. Returns whether it was present. Remaining positions are renumbered.
    async fn remove_from_waitlist(
        &self,
        workshop_id: &str,
        registration_id: &str,
    ) -> Result<bool, StoreError>;

    /// Current waitlist, head first.
    async fn waitlist(&self, workshop_id: &str) -> Result<Vec<WaitlistEntry>, StoreError>;

    /// Workshops with `last_modified > since`, oldest change first.
    async fn workshops_modified_since(&self, since: u64) -> Result<Vec<Workshop>, StoreError>;
}

/// Delivers admission outcomes to respondents (email, push, ...).
///
/// Called off the request path; failures are logged and never reach the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, outcome: &Outcome, registration: &Registration) -> anyhow::Result<()>;
}
