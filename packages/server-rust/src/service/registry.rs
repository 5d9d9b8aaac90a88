//! Lifecycle of the domain services owned by a [`ServiceStack`](super::ServiceStack).

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tracing::error;

use super::config::ServerConfig;

/// Handed to every service at startup.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

/// Startup and teardown hooks. Every domain service implements this.
#[async_trait]
pub trait ManagedService: Send + Sync {
    /// Stable service name, matching its routing key (e.g. `"forms"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// Services in registration order. Started first to last, stopped last to first.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Arc<dyn ManagedService>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Arc<dyn ManagedService>) {
        self.services.push(service);
    }

    /// Names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name()).collect()
    }

    /// Initializes services in registration order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The failing service's error, tagged with its name.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for service in &self.services {
            service
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize {} service", service.name()))?;
        }
        Ok(())
    }

    /// Shuts every service down in reverse order. A failure is logged and the
    /// remaining services are still stopped.
    ///
    /// # Errors
    ///
    /// The first failure encountered.
    pub async fn shutdown_all(&self) -> anyhow::Result<()> {
        let mut first_err = None;
        for service in self.services.iter().rev() {
            if let Err(err) = service.shutdown().await {
                error!(service = service.name(), error = %err, "service shutdown failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    struct Recorder {
        name: &'static str,
        fail_init: bool,
        fail_shutdown: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                fail_init: false,
                fail_shutdown: false,
                log: Arc::clone(log),
            }
        }
    }

    #[async_trait]
    impl ManagedService for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.name));
            if self.fail_init {
                anyhow::bail!("boom");
            }
            Ok(())
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            self.log.lock().push(format!("shutdown:{}", self.name));
            if self.fail_shutdown {
                anyhow::bail!("stuck");
            }
            Ok(())
        }
    }

    fn ctx() -> ServiceContext {
        ServiceContext {
            config: Arc::new(ServerConfig::default()),
        }
    }

    #[tokio::test]
    async fn starts_in_order_and_stops_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        for name in ["forms", "registration", "sync"] {
            registry.register(Arc::new(Recorder::new(name, &log)));
        }
        assert_eq!(registry.names(), ["forms", "registration", "sync"]);

        registry.init_all(&ctx()).await.unwrap();
        registry.shutdown_all().await.unwrap();

        assert_eq!(
            *log.lock(),
            [
                "init:forms",
                "init:registration",
                "init:sync",
                "shutdown:sync",
                "shutdown:registration",
                "shutdown:forms",
            ]
        );
    }

    #[tokio::test]
    async fn init_failure_names_the_service_and_stops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Recorder {
            fail_init: true,
            ..Recorder::new("forms", &log)
        }));
        registry.register(Arc::new(Recorder::new("sync", &log)));

        let err = registry.init_all(&ctx()).await.unwrap_err();
        assert!(err.to_string().contains("forms"));
        assert_eq!(*log.lock(), ["init:forms"]);
    }

    #[tokio::test]
    async fn shutdown_failure_does_not_skip_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(Arc::new(Recorder::new("forms", &log)));
        registry.register(Arc::new(Recorder {
            fail_shutdown: true,
            ..Recorder::new("sync", &log)
        }));

        assert!(registry.shutdown_all().await.is_err());
        assert_eq!(*log.lock(), ["shutdown:sync", "shutdown:forms"]);
    }
}
