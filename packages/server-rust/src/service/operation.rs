//! Operation types flowing through the service pipeline.

use serde::{Deserialize, Serialize};
use workshop_core::{
    FieldDefinition, FieldDraft, FieldFailure, FieldPatch, FormData, NewWorkshop, Outcome,
    Registration, RegistrationFormConfig, SchemaError, WaitlistEntry, Workshop,
};

use crate::traits::{Entity, StoreError};

/// Names under which domain services are registered with the router.
pub mod service_names {
    pub const FORMS: &str = "forms";
    pub const REGISTRATION: &str = "registration";
    pub const SYNC: &str = "sync";
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub service_name: &'static str,
    /// Wall-clock time the operation was classified, epoch millis. Used as `now`
    /// for every time-dependent decision the operation makes.
    pub timestamp: u64,
    pub call_timeout_ms: u64,
    /// Authenticated caller, when the transport knows one.
    pub actor: Option<String>,
}

impl OperationContext {
    #[must_use]
    pub fn new(
        call_id: u64,
        service_name: &'static str,
        timestamp: u64,
        call_timeout_ms: u64,
    ) -> Self {
        Self {
            call_id,
            service_name,
            timestamp,
            call_timeout_ms,
            actor: None,
        }
    }
}

/// Registration form submitted by a respondent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Account id; anonymous respondents get an ephemeral id.
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub form_data: FormData,
}

/// A request before classification: what the caller asked for, without
/// pipeline context.
#[derive(Debug, Clone)]
pub enum Request {
    CreateWorkshop { input: NewWorkshop },
    GetWorkshop { workshop_id: String },
    AddField { workshop_id: String, draft: FieldDraft },
    UpdateField { workshop_id: String, field_id: String, patch: FieldPatch },
    RemoveField { workshop_id: String, field_id: String },
    ReorderFields { workshop_id: String, field_ids: Vec<String> },
    SetDefaultFields { workshop_id: String, enabled: bool },
    ValidateSchema { workshop_id: String },
    PublishWorkshop { workshop_id: String },
    ArchiveWorkshop { workshop_id: String },
    SubmitRegistration { workshop_id: String, submission: Submission },
    CancelRegistration { workshop_id: String, registration_id: String },
    PromoteFromWaitlist { workshop_id: String },
    GetWaitlist { workshop_id: String },
    ChangesSince { since: u64 },
}

/// Typed operation variants dispatched through the pipeline.
#[derive(Debug)]
pub enum Operation {
    // ----- forms -----
    CreateWorkshop { ctx: OperationContext, input: NewWorkshop },
    GetWorkshop { ctx: OperationContext, workshop_id: String },
    AddField { ctx: OperationContext, workshop_id: String, draft: FieldDraft },
    UpdateField {
        ctx: OperationContext,
        workshop_id: String,
        field_id: String,
        patch: FieldPatch,
    },
    RemoveField { ctx: OperationContext, workshop_id: String, field_id: String },
    ReorderFields { ctx: OperationContext, workshop_id: String, field_ids: Vec<String> },
    SetDefaultFields { ctx: OperationContext, workshop_id: String, enabled: bool },
    ValidateSchema { ctx: OperationContext, workshop_id: String },
    PublishWorkshop { ctx: OperationContext, workshop_id: String },
    ArchiveWorkshop { ctx: OperationContext, workshop_id: String },

    // ----- registration -----
    SubmitRegistration {
        ctx: OperationContext,
        workshop_id: String,
        submission: Submission,
    },
    CancelRegistration {
        ctx: OperationContext,
        workshop_id: String,
        registration_id: String,
    },
    PromoteFromWaitlist { ctx: OperationContext, workshop_id: String },
    GetWaitlist { ctx: OperationContext, workshop_id: String },

    // ----- sync -----
    ChangesSince { ctx: OperationContext, since: u64 },
}

impl Operation {
    /// Returns the operation context.
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Operation::CreateWorkshop { ctx, .. }
            | Operation::GetWorkshop { ctx, .. }
            | Operation::AddField { ctx, .. }
            | Operation::UpdateField { ctx, .. }
            | Operation::RemoveField { ctx, .. }
            | Operation::ReorderFields { ctx, .. }
            | Operation::SetDefaultFields { ctx, .. }
            | Operation::ValidateSchema { ctx, .. }
            | Operation::PublishWorkshop { ctx, .. }
            | Operation::ArchiveWorkshop { ctx, .. }
            | Operation::SubmitRegistration { ctx, .. }
            | Operation::CancelRegistration { ctx, .. }
            | Operation::PromoteFromWaitlist { ctx, .. }
            | Operation::GetWaitlist { ctx, .. }
            | Operation::ChangesSince { ctx, .. } => ctx,
        }
    }

    /// Short variant name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::CreateWorkshop { .. } => "create_workshop",
            Operation::GetWorkshop { .. } => "get_workshop",
            Operation::AddField { .. } => "add_field",
            Operation::UpdateField { .. } => "update_field",
            Operation::RemoveField { .. } => "remove_field",
            Operation::ReorderFields { .. } => "reorder_fields",
            Operation::SetDefaultFields { .. } => "set_default_fields",
            Operation::ValidateSchema { .. } => "validate_schema",
            Operation::PublishWorkshop { .. } => "publish_workshop",
            Operation::ArchiveWorkshop { .. } => "archive_workshop",
            Operation::SubmitRegistration { .. } => "submit_registration",
            Operation::CancelRegistration { .. } => "cancel_registration",
            Operation::PromoteFromWaitlist { .. } => "promote_from_waitlist",
            Operation::GetWaitlist { .. } => "get_waitlist",
            Operation::ChangesSince { .. } => "changes_since",
        }
    }
}

/// Result of a submission that passed validation.
///
/// Rejections are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
}

/// Successful response from an operation handler.
#[derive(Debug)]
pub enum OperationResponse {
    Workshop(Box<Workshop>),
    Field(FieldDefinition),
    Form(RegistrationFormConfig),
    /// Empty when the schema is publishable.
    SchemaReport { errors: Vec<SchemaError> },
    Submission(Box<SubmissionReceipt>),
    Registration(Box<Registration>),
    /// `None` when nobody could be promoted.
    Promoted(Option<Box<Registration>>),
    Waitlist(Vec<WaitlistEntry>),
    Changes { workshops: Vec<Workshop>, cursor: u64 },
    Empty,
}

/// Errors returned by operation handlers.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("form schema has {} problem(s)", .errors.len())]
    SchemaInvalid { errors: Vec<SchemaError> },
    #[error("workshop {workshop_id} has registrations; only additive or cosmetic form edits are allowed")]
    SchemaLocked { workshop_id: String },
    #[error("submission failed validation on {} field(s)", .failures.len())]
    ValidationFailed { failures: Vec<FieldFailure> },
    #[error("workshop not found: {id}")]
    WorkshopNotFound { id: String },
    #[error("registration not found: {id}")]
    RegistrationNotFound { id: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("wrong service for operation")]
    WrongService,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OperationError {
    /// Stable machine-readable code, used in metrics labels and error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::Schema(SchemaError::NotFound { .. }) => "field_not_found",
            OperationError::Schema(_) | OperationError::SchemaInvalid { .. } => "schema_invalid",
            OperationError::SchemaLocked { .. } => "schema_locked",
            OperationError::ValidationFailed { .. } => "validation_failed",
            OperationError::WorkshopNotFound { .. } => "workshop_not_found",
            OperationError::RegistrationNotFound { .. } => "registration_not_found",
            OperationError::InvalidRequest(_) => "invalid_request",
            OperationError::PersistenceUnavailable(_) => "persistence_unavailable",
            OperationError::UnknownService { .. } => "unknown_service",
            OperationError::Timeout { .. } => "timeout",
            OperationError::Overloaded => "overloaded",
            OperationError::WrongService => "wrong_service",
            OperationError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for OperationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                entity: Entity::Workshop,
                id,
            } => OperationError::WorkshopNotFound { id },
            StoreError::NotFound {
                entity: Entity::Registration,
                id,
            } => OperationError::RegistrationNotFound { id },
            StoreError::Conflict { workshop_id } => OperationError::PersistenceUnavailable(
                format!("workshop {workshop_id} is under heavy contention"),
            ),
            StoreError::Unavailable(reason) => OperationError::PersistenceUnavailable(reason),
        }
    }
}
