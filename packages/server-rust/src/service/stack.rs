//! Assembly of the operation pipeline over a store.

use std::sync::Arc;

use parking_lot::Mutex;
use workshop_core::{ClockSource, SystemClock};

use super::classify::OperationService;
use super::config::ServerConfig;
use super::domain::{FormService, RegistrationService, SyncService};
use super::middleware::{build_operation_pipeline, OperationPipeline};
use super::notify::{LogNotifier, NotificationQueue, NotificationRunnable};
use super::operation::{service_names, OperationError, OperationResponse, Request};
use super::registry::{ServiceContext, ServiceRegistry};
use super::router::OperationRouter;
use super::worker::BackgroundWorker;
use crate::storage::MemoryWorkshopStore;
use crate::traits::{Notifier, WorkshopStore};

/// Everything needed to execute requests: domain services registered and
/// initialized, the middleware pipeline, and the notification worker.
pub struct ServiceStack {
    config: Arc<ServerConfig>,
    store: Arc<dyn WorkshopStore>,
    registry: ServiceRegistry,
    operations: OperationService,
    pipeline: OperationPipeline,
    notifications: Mutex<Option<BackgroundWorker<NotificationRunnable>>>,
}

impl ServiceStack {
    /// Builds and initializes the stack. Spawns the notification worker, so
    /// it must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a domain service fails to initialize.
    pub async fn start(
        config: ServerConfig,
        store: Arc<dyn WorkshopStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn ClockSource>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let worker = BackgroundWorker::start(
            NotificationRunnable::new(notifier),
            config.notification_queue_capacity,
            config.notification_tick_ms,
        );
        let queue = worker
            .sender()
            .map(NotificationQueue::new)
            .unwrap_or_default();

        let forms = Arc::new(FormService::new(Arc::clone(&store)));
        let registration = Arc::new(RegistrationService::new(
            Arc::clone(&store),
            Arc::clone(&config),
            queue,
        ));
        let sync = Arc::new(SyncService::new(Arc::clone(&store)));

        let mut registry = ServiceRegistry::new();
        registry.register(forms.clone());
        registry.register(registration.clone());
        registry.register(sync.clone());
        registry
            .init_all(&ServiceContext {
                config: Arc::clone(&config),
            })
            .await?;

        let mut router = OperationRouter::new();
        router.register(service_names::FORMS, forms);
        router.register(service_names::REGISTRATION, registration);
        router.register(service_names::SYNC, sync);
        let pipeline = OperationPipeline::new(build_operation_pipeline(router, &config));

        tracing::info!(
            node_id = %config.node_id,
            services = ?registry.names(),
            "service stack started"
        );
        Ok(Self {
            operations: OperationService::new(clock, Arc::clone(&config)),
            config,
            store,
            registry,
            pipeline,
            notifications: Mutex::new(Some(worker)),
        })
    }

    /// Stack over a fresh in-memory store that logs notifications.
    ///
    /// # Errors
    ///
    /// See [`ServiceStack::start`].
    pub async fn in_memory(config: ServerConfig) -> anyhow::Result<Self> {
        let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
        let store = Arc::new(MemoryWorkshopStore::new(Arc::clone(&clock)));
        Self::start(config, store, Arc::new(LogNotifier), clock).await
    }

    /// Classifies `request` and runs it through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's or the domain service's error.
    pub async fn execute(
        &self,
        request: Request,
        actor: Option<String>,
    ) -> Result<OperationResponse, OperationError> {
        let op = self.operations.classify(request, actor);
        self.pipeline.dispatch(op).await
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn WorkshopStore> {
        &self.store
    }

    /// Shuts down domain services, then drains and stops the notification
    /// worker. Later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns an error if a domain service fails to shut down.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let worker = self.notifications.lock().take();
        let Some(mut worker) = worker else {
            return Ok(());
        };
        self.registry.shutdown_all().await?;
        worker.stop().await;
        tracing::info!("service stack stopped");
        Ok(())
    }
}
