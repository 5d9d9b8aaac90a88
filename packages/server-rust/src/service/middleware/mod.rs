//! Tower middleware layers for the operation pipeline.
//!
//! - [`timeout`]: Per-operation timeout enforcement
//! - [`metrics`]: Operation timing and counting via `tracing` spans and the `metrics` facade
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes all layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use self::metrics::MetricsLayer;
pub use pipeline::{build_operation_pipeline, BoxedPipeline, OperationPipeline};
pub use timeout::TimeoutLayer;
