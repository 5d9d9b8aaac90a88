//! Request classification: converts a transport-level `Request` into a typed `Operation`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use workshop_core::ClockSource;

use super::config::ServerConfig;
use super::operation::{service_names, Operation, OperationContext, Request};

// ---------------------------------------------------------------------------
// OperationService
// ---------------------------------------------------------------------------

/// Classifies incoming `Request` values into typed `Operation` variants.
///
/// Each call stamps the operation with the current wall-clock time and a
/// unique, monotonically increasing call ID.
pub struct OperationService {
    clock: Arc<dyn ClockSource>,
    config: Arc<ServerConfig>,
    call_id_counter: AtomicU64,
}

impl OperationService {
    #[must_use]
    pub fn new(clock: Arc<dyn ClockSource>, config: Arc<ServerConfig>) -> Self {
        Self {
            clock,
            config,
            call_id_counter: AtomicU64::new(1),
        }
    }

    fn next_call_id(&self) -> u64 {
        self.call_id_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn make_ctx(&self, service_name: &'static str, actor: Option<String>) -> OperationContext {
        let mut ctx = OperationContext::new(
            self.next_call_id(),
            service_name,
            self.clock.now(),
            self.config.default_operation_timeout_ms,
        );
        ctx.actor = actor;
        ctx
    }

    /// Classify a `Request` into an `Operation` bound for its domain service.
    #[must_use]
    pub fn classify(&self, request: Request, actor: Option<String>) -> Operation {
        match request {
            // ----- forms domain -----
            Request::CreateWorkshop { input } => Operation::CreateWorkshop {
                ctx: self.make_ctx(service_names::FORMS, actor),
                input,
            },
            Request::GetWorkshop { workshop_id } => Operation::GetWorkshop {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
            },
            Request::AddField { workshop_id, draft } => Operation::AddField {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
                draft,
            },
            Request::UpdateField {
                workshop_id,
                field_id,
                patch,
            } => Operation::UpdateField {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
                field_id,
                patch,
            },
            Request::RemoveField {
                workshop_id,
                field_id,
            } => Operation::RemoveField {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
                field_id,
            },
            Request::ReorderFields {
                workshop_id,
                field_ids,
            } => Operation::ReorderFields {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
                field_ids,
            },
            Request::SetDefaultFields {
                workshop_id,
                enabled,
            } => Operation::SetDefaultFields {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
                enabled,
            },
            Request::ValidateSchema { workshop_id } => Operation::ValidateSchema {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
            },
            Request::PublishWorkshop { workshop_id } => Operation::PublishWorkshop {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
            },
            Request::ArchiveWorkshop { workshop_id } => Operation::ArchiveWorkshop {
                ctx: self.make_ctx(service_names::FORMS, actor),
                workshop_id,
            },

            // ----- registration domain -----
            Request::SubmitRegistration {
                workshop_id,
                submission,
            } => Operation::SubmitRegistration {
                ctx: self.make_ctx(service_names::REGISTRATION, actor),
                workshop_id,
                submission,
            },
            Request::CancelRegistration {
                workshop_id,
                registration_id,
            } => Operation::CancelRegistration {
                ctx: self.make_ctx(service_names::REGISTRATION, actor),
                workshop_id,
                registration_id,
            },
            Request::PromoteFromWaitlist { workshop_id } => Operation::PromoteFromWaitlist {
                ctx: self.make_ctx(service_names::REGISTRATION, actor),
                workshop_id,
            },
            Request::GetWaitlist { workshop_id } => Operation::GetWaitlist {
                ctx: self.make_ctx(service_names::REGISTRATION, actor),
                workshop_id,
            },

            // ----- sync domain -----
            Request::ChangesSince { since } => Operation::ChangesSince {
                ctx: self.make_ctx(service_names::SYNC, actor),
                since,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
