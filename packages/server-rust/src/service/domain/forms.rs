//! Forms domain service: workshop creation, form schema authoring and the
//! publish gate.
//!
//! Once a workshop has registrations its schema is locked to additive and
//! cosmetic edits: adding fields, relabelling, and reordering. Anything that
//! could change what earlier respondents would have been asked fails with
//! `SchemaLocked`.

use std::sync::Arc;

use tracing::info;
use workshop_core::{
    FieldDraft, FieldPatch, NewWorkshop, Workshop, WorkshopStatus,
};

use crate::service::operation::{
    service_names, Operation, OperationContext, OperationError, OperationResponse,
};
use crate::traits::WorkshopStore;

/// Handles authoring operations against the workshop store.
pub struct FormService {
    store: Arc<dyn WorkshopStore>,
}

domain_service!(FormService, service_names::FORMS);

impl FormService {
    #[must_use]
    pub fn new(store: Arc<dyn WorkshopStore>) -> Self {
        Self { store }
    }

    async fn handle(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        match op {
            Operation::CreateWorkshop { ctx, input } => self.create_workshop(&ctx, input).await,
            Operation::GetWorkshop { workshop_id, .. } => {
                let workshop = self.store.load_workshop(&workshop_id).await?;
                Ok(OperationResponse::Workshop(Box::new(workshop)))
            }
            Operation::AddField {
                ctx,
                workshop_id,
                draft,
            } => self.add_field(&ctx, &workshop_id, draft).await,
            Operation::UpdateField {
                ctx,
                workshop_id,
                field_id,
                patch,
            } => self.update_field(&ctx, &workshop_id, &field_id, &patch).await,
            Operation::RemoveField {
                ctx,
                workshop_id,
                field_id,
            } => self.remove_field(&ctx, &workshop_id, &field_id).await,
            Operation::ReorderFields {
                ctx,
                workshop_id,
                field_ids,
            } => {
                let mut workshop = self.load_editable(&workshop_id).await?;
                workshop.form.reorder(&field_ids)?;
                self.save(&ctx, &mut workshop, "reorder_fields").await?;
                Ok(OperationResponse::Form(workshop.form))
            }
            Operation::SetDefaultFields {
                ctx,
                workshop_id,
                enabled,
            } => self.set_default_fields(&ctx, &workshop_id, enabled).await,
            Operation::ValidateSchema { workshop_id, .. } => {
                let workshop = self.store.load_workshop(&workshop_id).await?;
                let errors = workshop.form.validate_schema().err().unwrap_or_default();
                Ok(OperationResponse::SchemaReport { errors })
            }
            Operation::PublishWorkshop { ctx, workshop_id } => {
                self.publish(&ctx, &workshop_id).await
            }
            Operation::ArchiveWorkshop { ctx, workshop_id } => {
                let mut workshop = self.store.load_workshop(&workshop_id).await?;
                if workshop.status != WorkshopStatus::Archived {
                    workshop.archive(ctx.timestamp);
                    self.store.save_workshop(&workshop).await?;
                    info!(workshop_id = %workshop.id, "workshop archived");
                }
                Ok(OperationResponse::Workshop(Box::new(workshop)))
            }
            _ => Err(OperationError::WrongService),
        }
    }

    async fn create_workshop(
        &self,
        ctx: &OperationContext,
        mut input: NewWorkshop,
    ) -> Result<OperationResponse, OperationError> {
        input.title = input.title.trim().to_string();
        if input.title.is_empty() {
            return Err(OperationError::InvalidRequest(
                "workshop title must not be empty".to_string(),
            ));
        }
        if let (Some(starts), Some(ends)) = (input.policy.starts_at, input.policy.ends_at) {
            if ends < starts {
                return Err(OperationError::InvalidRequest(
                    "workshop must not end before it starts".to_string(),
                ));
            }
        }
        input
            .form
            .validate_schema()
            .map_err(|errors| OperationError::SchemaInvalid { errors })?;

        let workshop = Workshop::new_draft(input, ctx.timestamp);
        self.store.create_workshop(workshop.clone()).await?;
        info!(
            workshop_id = %workshop.id,
            actor = ctx.actor.as_deref().unwrap_or("-"),
            "workshop created"
        );
        Ok(OperationResponse::Workshop(Box::new(workshop)))
    }

    async fn add_field(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        draft: FieldDraft,
    ) -> Result<OperationResponse, OperationError> {
        let mut workshop = self.load_editable(workshop_id).await?;
        let field = workshop.form.add_field(draft)?;
        self.save(ctx, &mut workshop, "add_field").await?;
        Ok(OperationResponse::Field(field))
    }

    async fn update_field(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        field_id: &str,
        patch: &FieldPatch,
    ) -> Result<OperationResponse, OperationError> {
        let mut workshop = self.load_editable(workshop_id).await?;
        if !patch.is_cosmetic() {
            self.ensure_unlocked(&workshop).await?;
        }
        let field = workshop.form.update_field(field_id, patch)?;
        self.save(ctx, &mut workshop, "update_field").await?;
        Ok(OperationResponse::Field(field))
    }

    async fn remove_field(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        field_id: &str,
    ) -> Result<OperationResponse, OperationError> {
        let mut workshop = self.load_editable(workshop_id).await?;
        if workshop.form.field(field_id).is_none() {
            return Ok(OperationResponse::Form(workshop.form));
        }
        self.ensure_unlocked(&workshop).await?;
        workshop.form.remove_field(field_id);
        self.save(ctx, &mut workshop, "remove_field").await?;
        Ok(OperationResponse::Form(workshop.form))
    }

    async fn set_default_fields(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
        enabled: bool,
    ) -> Result<OperationResponse, OperationError> {
        let mut workshop = self.load_editable(workshop_id).await?;
        if workshop.form.use_default_fields == enabled {
            return Ok(OperationResponse::Form(workshop.form));
        }
        self.ensure_unlocked(&workshop).await?;
        workshop.form.set_use_default_fields(enabled)?;
        self.save(ctx, &mut workshop, "set_default_fields").await?;
        Ok(OperationResponse::Form(workshop.form))
    }

    async fn publish(
        &self,
        ctx: &OperationContext,
        workshop_id: &str,
    ) -> Result<OperationResponse, OperationError> {
        let mut workshop = self.store.load_workshop(workshop_id).await?;
        match workshop.status {
            WorkshopStatus::Published => {}
            WorkshopStatus::Archived => {
                return Err(OperationError::InvalidRequest(format!(
                    "workshop {workshop_id} is archived"
                )));
            }
            WorkshopStatus::Draft => {
                workshop
                    .publish(ctx.timestamp)
                    .map_err(|errors| OperationError::SchemaInvalid { errors })?;
                self.store.save_workshop(&workshop).await?;
                info!(workshop_id = %workshop.id, "workshop published");
            }
        }
        Ok(OperationResponse::Workshop(Box::new(workshop)))
    }

    /// Loads a workshop whose form may still be edited.
    async fn load_editable(&self, workshop_id: &str) -> Result<Workshop, OperationError> {
        let workshop = self.store.load_workshop(workshop_id).await?;
        if workshop.status == WorkshopStatus::Archived {
            return Err(OperationError::InvalidRequest(format!(
                "workshop {workshop_id} is archived"
            )));
        }
        Ok(workshop)
    }

    /// Fails with `SchemaLocked` once any registration references the form.
    async fn ensure_unlocked(&self, workshop: &Workshop) -> Result<(), OperationError> {
        if self.store.count_registrations(&workshop.id).await? > 0 {
            return Err(OperationError::SchemaLocked {
                workshop_id: workshop.id.clone(),
            });
        }
        Ok(())
    }

    async fn save(
        &self,
        ctx: &OperationContext,
        workshop: &mut Workshop,
        edit: &'static str,
    ) -> Result<(), OperationError> {
        workshop.touch(ctx.timestamp);
        self.store.save_workshop(workshop).await?;
        tracing::debug!(workshop_id = %workshop.id, edit, "form updated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
