//! Workshop aggregate: authoring state, admission policy and counters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::admission::{AdmissionPolicy, Counters};
use crate::schema::{RegistrationFormConfig, SchemaError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkshopStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl WorkshopStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WorkshopStatus::Draft => "draft",
            WorkshopStatus::Published => "published",
            WorkshopStatus::Archived => "archived",
        }
    }
}

/// Input for creating a workshop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkshop {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub policy: AdmissionPolicy,
    #[serde(default)]
    pub form: RegistrationFormConfig,
}

/// The event entity students register for.
///
/// `counters` belong to the admission engine; authoring code reads them but
/// never writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workshop {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub status: WorkshopStatus,
    pub policy: AdmissionPolicy,
    pub counters: Counters,
    pub form: RegistrationFormConfig,
    pub created_at: u64,
    pub last_modified: u64,
}

impl Workshop {
    /// Creates a draft workshop with a fresh id and zeroed counters.
    #[must_use]
    pub fn new_draft(input: NewWorkshop, now: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            organization_id: input.organization_id,
            status: WorkshopStatus::Draft,
            policy: input.policy,
            counters: Counters::default(),
            form: input.form,
            created_at: now,
            last_modified: now,
        }
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == WorkshopStatus::Published
    }

    /// Publishes the workshop after a full schema check.
    ///
    /// # Errors
    ///
    /// Returns every schema violation; the workshop stays unpublished.
    pub fn publish(&mut self, now: u64) -> Result<(), Vec<SchemaError>> {
        self.form.validate_schema()?;
        self.status = WorkshopStatus::Published;
        self.touch(now);
        Ok(())
    }

    pub fn archive(&mut self, now: u64) {
        self.status = WorkshopStatus::Archived;
        self.touch(now);
    }

    /// Bumps `last_modified`. Never moves backwards.
    pub fn touch(&mut self, now: u64) {
        self.last_modified = self.last_modified.max(now);
    }

    /// Whether anyone currently holds a slot or a waitlist place.
    #[must_use]
    pub fn has_registrations(&self) -> bool {
        self.counters.registered_count > 0 || self.counters.waitlist_count > 0
    }
}
