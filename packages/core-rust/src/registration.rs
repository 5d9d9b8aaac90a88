//! Registration records produced by the admission engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::EMAIL_FIELD;
use crate::types::{FormData, Value};

/// Lifecycle status of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Confirmed,
    /// Accepted into a slot but awaiting organizer approval.
    Pending,
    Cancelled,
    Waitlist,
}

impl RegistrationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Waitlist => "waitlist",
        }
    }

    /// Whether this status occupies one unit of workshop capacity.
    #[must_use]
    pub fn holds_slot(self) -> bool {
        matches!(self, RegistrationStatus::Confirmed | RegistrationStatus::Pending)
    }
}

/// One respondent's submission.
///
/// `form_data` is frozen at submission time; later schema edits never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub workshop_id: String,
    /// Account id, or an ephemeral id for anonymous respondents.
    pub student_id: String,
    pub status: RegistrationStatus,
    pub form_data: FormData,
    /// 1-based; set only while `status` is [`RegistrationStatus::Waitlist`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waitlist_position: Option<u32>,
    pub registered_at: u64,
    pub updated_at: u64,
    /// Duplicate-detection key, when duplicate prevention is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

impl Registration {
    /// Creates a registration with a fresh id.
    #[must_use]
    pub fn new(
        workshop_id: impl Into<String>,
        student_id: impl Into<String>,
        form_data: FormData,
        status: RegistrationStatus,
        waitlist_position: Option<u32>,
        now: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workshop_id: workshop_id.into(),
            student_id: student_id.into(),
            status,
            form_data,
            waitlist_position: waitlist_position.filter(|_| status == RegistrationStatus::Waitlist),
            registered_at: now,
            updated_at: now,
            dedupe_key: None,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status != RegistrationStatus::Cancelled
    }

    pub fn cancel(&mut self, now: u64) {
        self.status = RegistrationStatus::Cancelled;
        self.waitlist_position = None;
        self.updated_at = now;
    }

    /// Moves a waitlisted registration into a capacity slot.
    pub fn promote_to(&mut self, status: RegistrationStatus, now: u64) {
        self.status = status;
        self.waitlist_position = None;
        self.updated_at = now;
    }

    /// The summary stored on the workshop's waitlist, if waitlisted.
    ///
    /// `sequence` is the admission order key, see [`WaitlistEntry::sequence`].
    #[must_use]
    pub fn waitlist_entry(&self, sequence: u64) -> Option<WaitlistEntry> {
        if self.status != RegistrationStatus::Waitlist {
            return None;
        }
        self.waitlist_position.map(|position| WaitlistEntry {
            registration_id: self.id.clone(),
            student_id: self.student_id.clone(),
            position,
            sequence,
            added_at: self.registered_at,
        })
    }
}

/// Waitlist slot. Positions run 1..n in FIFO order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub registration_id: String,
    pub student_id: String,
    /// Current 1-based place in line. Shifts as entries ahead leave.
    pub position: u32,
    /// Fixed at admission and strictly increasing per workshop. The list is
    /// ordered by it, never by `position`.
    #[serde(default)]
    pub sequence: u64,
    pub added_at: u64,
}

/// Normalized respondent email from the reserved `email` answer.
#[must_use]
pub fn respondent_email(data: &FormData) -> Option<String> {
    data.get(EMAIL_FIELD)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}
