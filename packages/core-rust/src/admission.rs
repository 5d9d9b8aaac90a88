//! Admission engine.
//!
//! A pure state machine over a workshop's admission counters. [`admit`]
//! classifies one validated submission as accepted, waitlisted or rejected
//! and returns the [`CounterDelta`] the persistence layer must apply. The
//! engine never touches storage; callers apply the delta through an atomic
//! conditional update and re-run [`admit`] on conflict.
//!
//! # Decision order
//!
//! 1. Closed (past the close point or the workshop end) => rejected `closed`.
//! 2. Unlimited capacity or a free slot => accepted, `registered += 1`.
//! 3. Full without waitlist => rejected `full`.
//! 4. Full with waitlist => waitlisted at `waitlist_count + 1`, `waitlist += 1`.

use serde::{Deserialize, Serialize};

use crate::clock::HOUR_MS;
use crate::registration::RegistrationStatus;

/// When registration stops accepting submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClosePolicy {
    /// At the workshop start time.
    #[default]
    AtStart,
    /// The given number of hours before the start time.
    HoursBeforeStart(u32),
    /// At the workshop end time.
    AtEnd,
}

/// Admission-relevant workshop settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionPolicy {
    /// `None` or `Some(0)` means unlimited.
    pub capacity: Option<u32>,
    pub enable_waitlist: bool,
    pub require_approval: bool,
    pub close_policy: ClosePolicy,
    /// Workshop start, epoch millis.
    pub starts_at: Option<u64>,
    /// Workshop end, epoch millis.
    pub ends_at: Option<u64>,
}

impl AdmissionPolicy {
    /// Finite capacity, if any.
    #[must_use]
    pub fn capacity_limit(&self) -> Option<u32> {
        self.capacity.filter(|c| *c > 0)
    }

    /// Point in time at which the close policy shuts registration.
    #[must_use]
    pub fn close_point(&self) -> Option<u64> {
        match self.close_policy {
            ClosePolicy::AtStart => self.starts_at,
            ClosePolicy::HoursBeforeStart(hours) => self
                .starts_at
                .map(|start| start.saturating_sub(u64::from(hours) * HOUR_MS)),
            ClosePolicy::AtEnd => self.ends_at.or(self.starts_at),
        }
    }

    #[must_use]
    pub fn is_closed(&self, now: u64) -> bool {
        self.close_point().is_some_and(|p| now >= p) || self.has_ended(now)
    }

    #[must_use]
    pub fn has_ended(&self, now: u64) -> bool {
        self.ends_at.is_some_and(|end| now >= end)
    }

    /// Status given to a submission that gets a slot.
    #[must_use]
    pub fn accepted_status(&self) -> RegistrationStatus {
        if self.require_approval {
            RegistrationStatus::Pending
        } else {
            RegistrationStatus::Confirmed
        }
    }
}

/// The workshop's shared mutable admission counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub registered_count: u32,
    pub waitlist_count: u32,
}

impl Counters {
    #[must_use]
    pub fn new(registered_count: u32, waitlist_count: u32) -> Self {
        Self {
            registered_count,
            waitlist_count,
        }
    }
}

/// Signed change to [`Counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterDelta {
    pub registered: i32,
    pub waitlist: i32,
}

impl CounterDelta {
    pub const NONE: CounterDelta = CounterDelta::new(0, 0);
    pub const ACCEPT: CounterDelta = CounterDelta::new(1, 0);
    pub const WAITLIST: CounterDelta = CounterDelta::new(0, 1);
    pub const PROMOTE: CounterDelta = CounterDelta::new(1, -1);

    #[must_use]
    pub const fn new(registered: i32, waitlist: i32) -> Self {
        Self {
            registered,
            waitlist,
        }
    }

    #[must_use]
    pub fn is_noop(self) -> bool {
        self == Self::NONE
    }

    /// Inverse delta, used to roll back a failed persistence step.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::new(-self.registered, -self.waitlist)
    }

    /// Applies the delta. Returns `None` if a counter would go negative or overflow.
    #[must_use]
    pub fn apply(self, counters: Counters) -> Option<Counters> {
        Some(Counters {
            registered_count: counters
                .registered_count
                .checked_add_signed(self.registered)?,
            waitlist_count: counters.waitlist_count.checked_add_signed(self.waitlist)?,
        })
    }
}

/// Workshop-level admission state, derived and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
    Open,
    FullNoWaitlist,
    FullWithWaitlist,
    Closed,
}

#[must_use]
pub fn admission_state(policy: &AdmissionPolicy, counters: Counters, now: u64) -> AdmissionState {
    if policy.is_closed(now) {
        return AdmissionState::Closed;
    }
    match policy.capacity_limit() {
        Some(cap) if counters.registered_count >= cap => {
            if policy.enable_waitlist {
                AdmissionState::FullWithWaitlist
            } else {
                AdmissionState::FullNoWaitlist
            }
        }
        _ => AdmissionState::Open,
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    Closed,
    Full,
    /// The respondent already holds an active registration.
    Duplicate,
}

impl RejectReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::Closed => "closed",
            RejectReason::Full => "full",
            RejectReason::Duplicate => "duplicate",
        }
    }
}

/// Fate of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    Accepted { status: RegistrationStatus },
    Waitlisted { position: u32 },
    Rejected { reason: RejectReason },
}

impl Outcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Accepted { .. } => "accepted",
            Outcome::Waitlisted { .. } => "waitlisted",
            Outcome::Rejected { .. } => "rejected",
        }
    }

    /// Registration status and waitlist position for admitted outcomes.
    #[must_use]
    pub fn placement(&self) -> Option<(RegistrationStatus, Option<u32>)> {
        match *self {
            Outcome::Accepted { status } => Some((status, None)),
            Outcome::Waitlisted { position } => {
                Some((RegistrationStatus::Waitlist, Some(position)))
            }
            Outcome::Rejected { .. } => None,
        }
    }
}

/// Decision plus the counter mutation it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub outcome: Outcome,
    pub delta: CounterDelta,
}

impl Admission {
    #[must_use]
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            outcome: Outcome::Rejected { reason },
            delta: CounterDelta::NONE,
        }
    }
}

/// Classifies one validated submission against the current counters.
#[must_use]
pub fn admit(policy: &AdmissionPolicy, counters: Counters, now: u64) -> Admission {
    match admission_state(policy, counters, now) {
        AdmissionState::Closed => Admission::rejected(RejectReason::Closed),
        AdmissionState::Open => Admission {
            outcome: Outcome::Accepted {
                status: policy.accepted_status(),
            },
            delta: CounterDelta::ACCEPT,
        },
        AdmissionState::FullNoWaitlist => Admission::rejected(RejectReason::Full),
        AdmissionState::FullWithWaitlist => Admission {
            outcome: Outcome::Waitlisted {
                position: counters.waitlist_count.saturating_add(1),
            },
            delta: CounterDelta::WAITLIST,
        },
    }
}

/// Moving the waitlist head into a freed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub status: RegistrationStatus,
    pub delta: CounterDelta,
}

/// Promotion transition: possible when the waitlist is non-empty, a slot is
/// free, and the workshop has not ended. The close policy does not apply;
/// it only gates new submissions.
#[must_use]
pub fn promote(policy: &AdmissionPolicy, counters: Counters, now: u64) -> Option<Promotion> {
    if counters.waitlist_count == 0 || policy.has_ended(now) {
        return None;
    }
    if policy
        .capacity_limit()
        .is_some_and(|cap| counters.registered_count >= cap)
    {
        return None;
    }
    Some(Promotion {
        status: policy.accepted_status(),
        delta: CounterDelta::PROMOTE,
    })
}

/// Counter delta for cancelling a registration currently in `status`.
#[must_use]
pub fn release(status: RegistrationStatus) -> CounterDelta {
    match status {
        RegistrationStatus::Confirmed | RegistrationStatus::Pending => CounterDelta::new(-1, 0),
        RegistrationStatus::Waitlist => CounterDelta::new(0, -1),
        RegistrationStatus::Cancelled => CounterDelta::NONE,
    }
}

/// The capacity invariant: `registered_count` never exceeds a finite capacity.
#[must_use]
pub fn within_capacity(policy: &AdmissionPolicy, counters: Counters) -> bool {
    policy
        .capacity_limit()
        .is_none_or(|cap| counters.registered_count <= cap)
}
