//! Operation routing and execution framework.
//!
//! This module implements the service-oriented operation pipeline:
//!
//! 1. **Classification** (`classify`): `Request` -> `Operation`
//! 2. **Middleware** (`middleware`): Tower layers (load-shedding, timeout, metrics)
//! 3. **Routing** (`router`): Dispatch to domain services by `service_name`
//! 4. **Domain services** (`domain`): forms, registration, sync
//! 5. **Background workers** (`worker`, `notify`): notification delivery
//!
//! [`ServiceStack`] wires all of it together over one store.

pub mod classify;
pub mod config;
pub mod domain;
pub mod middleware;
pub mod notify;
pub mod operation;
pub mod registry;
pub mod router;
pub mod stack;
pub mod worker;

// Re-export key types for convenient access.
pub use classify::OperationService;
pub use config::ServerConfig;
pub use middleware::OperationPipeline;
pub use notify::{LogNotifier, NotificationQueue, NotificationRunnable, NotifyTask};
pub use operation::{
    service_names, Operation, OperationContext, OperationError, OperationResponse, Request,
    Submission, SubmissionReceipt,
};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use router::OperationRouter;
pub use stack::ServiceStack;
pub use worker::{BackgroundRunnable, BackgroundWorker};
