//! Domain services.
//!
//! Each service implements both `ManagedService` (lifecycle) and
//! `tower::Service<Operation>` (request handling). The tower impl is on
//! `Arc<Service>` so the router and the registry can share one instance.
//!
//! Operations run on their own task. A caller that stops waiting, through
//! the pipeline timeout or a dropped connection, does not cancel them: a
//! counter update is always followed by its write or its rollback.

/// Implements `ManagedService` and `tower::Service<Operation>` for a domain
/// service that provides `async fn handle(&self, op: Operation)`.
macro_rules! domain_service {
    ($name:ident, $svc_name:expr) => {
        #[async_trait::async_trait]
        impl $crate::service::registry::ManagedService for $name {
            fn name(&self) -> &'static str {
                $svc_name
            }

            async fn init(
                &self,
                ctx: &$crate::service::registry::ServiceContext,
            ) -> anyhow::Result<()> {
                tracing::debug!(service = $svc_name, node_id = %ctx.config.node_id, "service initialized");
                Ok(())
            }

            async fn shutdown(&self) -> anyhow::Result<()> {
                tracing::debug!(service = $svc_name, "service stopped");
                Ok(())
            }
        }

        impl tower::Service<$crate::service::operation::Operation> for std::sync::Arc<$name> {
            type Response = $crate::service::operation::OperationResponse;
            type Error = $crate::service::operation::OperationError;
            type Future = std::pin::Pin<
                Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
            >;

            fn poll_ready(
                &mut self,
                _cx: &mut std::task::Context<'_>,
            ) -> std::task::Poll<Result<(), Self::Error>> {
                std::task::Poll::Ready(Ok(()))
            }

            fn call(&mut self, op: $crate::service::operation::Operation) -> Self::Future {
                let svc = std::sync::Arc::clone(self);
                let task = tokio::spawn(async move { svc.handle(op).await });
                Box::pin(async move {
                    task.await.map_err(|err| {
                        $crate::service::operation::OperationError::Internal(anyhow::anyhow!(
                            "{} operation task failed: {err}",
                            $svc_name
                        ))
                    })?
                })
            }
        }
    };
}

pub mod forms;
pub mod registration;
pub mod sync;

pub use forms::FormService;
pub use registration::RegistrationService;
pub use sync::SyncService;
