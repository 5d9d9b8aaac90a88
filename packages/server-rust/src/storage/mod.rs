//! Storage implementations of the [`WorkshopStore`](crate::traits::WorkshopStore) collaborator.
//!
//! - [`MemoryWorkshopStore`]: `DashMap`-backed store used by the server binary and tests
//! - [`record`]: per-workshop bookkeeping (record metadata, counter version)

pub mod memory;
pub mod record;

pub use memory::MemoryWorkshopStore;
pub use record::{RecordMetadata, WorkshopRecord};
