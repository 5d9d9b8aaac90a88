/// Server-level configuration for the operation pipeline and domain services.
///
/// Controls operation timeouts, concurrency limits, admission retries and
/// the optional registration policies.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique identifier for this server node.
    pub node_id: String,
    /// Default timeout for operations in milliseconds.
    pub default_operation_timeout_ms: u64,
    /// Maximum number of concurrent operations before load shedding.
    pub max_concurrent_operations: u32,
    /// Read-decide-apply rounds before a contended submission is rejected as full.
    pub max_admission_attempts: u32,
    /// Reject a second active registration from the same respondent.
    pub reject_duplicate_registrations: bool,
    /// Promote the waitlist head when a slot is released by a cancellation.
    pub auto_promote_waitlist: bool,
    /// Capacity of the notification worker's queue.
    pub notification_queue_capacity: usize,
    /// Interval between notification worker ticks in milliseconds.
    pub notification_tick_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            default_operation_timeout_ms: 30_000,
            max_concurrent_operations: 1000,
            max_admission_attempts: 3,
            reject_duplicate_registrations: false,
            auto_promote_waitlist: false,
            notification_queue_capacity: 256,
            notification_tick_ms: 60_000,
        }
    }
}
