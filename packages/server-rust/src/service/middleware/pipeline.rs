//! Pipeline composition: combines all middleware layers into a single service stack.

use tokio::sync::Mutex;
use tower::util::BoxService;
use tower::{Service, ServiceBuilder, ServiceExt};

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::router::OperationRouter;

/// Type-erased pipeline service.
pub type BoxedPipeline = BoxService<Operation, OperationResponse, OperationError>;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-operation timeouts
/// 3. `MetricsLayer` -- record timing and outcome (closest to the actual handler)
#[must_use]
pub fn build_operation_pipeline(router: OperationRouter, config: &ServerConfig) -> BoxedPipeline {
    BoxService::new(
        ServiceBuilder::new()
            .layer(LoadShedLayer::new(config.max_concurrent_operations))
            .layer(TimeoutLayer)
            .layer(MetricsLayer)
            .service(router),
    )
}

// ---------------------------------------------------------------------------
// OperationPipeline
// ---------------------------------------------------------------------------

/// Shareable handle to the pipeline.
///
/// The lock is held only while the service is polled ready and the call is
/// issued; the returned future runs unlocked, so operations still execute
/// concurrently.
pub struct OperationPipeline {
    inner: Mutex<BoxedPipeline>,
}

impl OperationPipeline {
    #[must_use]
    pub fn new(service: BoxedPipeline) -> Self {
        Self {
            inner: Mutex::new(service),
        }
    }

    /// Send one operation through the middleware stack.
    ///
    /// # Errors
    ///
    /// Returns whatever the middleware or the handling domain service returns.
    pub async fn dispatch(&self, op: Operation) -> Result<OperationResponse, OperationError> {
        let fut = {
            let mut svc = self.inner.lock().await;
            ServiceExt::ready(&mut *svc).await?;
            svc.call(op)
        };
        fut.await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use super::*;
    use crate::service::operation::{service_names, OperationContext};

    /// Returns the call id as a sync cursor after an optional delay.
    struct StubService {
        delay_ms: u64,
    }

    impl Service<Operation> for StubService {
        type Response = OperationResponse;
        type Error = OperationError;
        type Future =
            Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, op: Operation) -> Self::Future {
            let call_id = op.ctx().call_id;
            let delay = self.delay_ms;
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(OperationResponse::Changes {
                    workshops: Vec::new(),
                    cursor: call_id,
                })
            })
        }
    }

    fn make_op(call_id: u64, timeout_ms: u64) -> Operation {
        Operation::ChangesSince {
            ctx: OperationContext::new(call_id, service_names::SYNC, 0, timeout_ms),
            since: 0,
        }
    }

    fn make_pipeline(delay_ms: u64, max_concurrent: u32) -> OperationPipeline {
        let mut router = OperationRouter::new();
        router.register(service_names::SYNC, StubService { delay_ms });
        let config = ServerConfig {
            max_concurrent_operations: max_concurrent,
            ..ServerConfig::default()
        };
        OperationPipeline::new(build_operation_pipeline(router, &config))
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let svc = make_pipeline(0, 100);
        let resp = svc.dispatch(make_op(42, 5000)).await.unwrap();
        assert!(matches!(resp, OperationResponse::Changes { cursor: 42, .. }));
    }

    #[tokio::test]
    async fn pipeline_enforces_timeout() {
        let svc = make_pipeline(200, 100);
        let err = svc.dispatch(make_op(1, 20)).await.unwrap_err();
        assert!(matches!(err, OperationError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn dispatches_run_concurrently() {
        let svc = Arc::new(make_pipeline(100, 100));
        let start = std::time::Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.dispatch(make_op(i, 5000)).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert!(start.elapsed() < Duration::from_millis(450));
    }
}
