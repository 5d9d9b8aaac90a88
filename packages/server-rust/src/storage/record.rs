//! Record types for the storage layer.

use workshop_core::Workshop;

/// Metadata tracked for every stored workshop.
///
/// Server-internal; never serialized to the wire.
#[derive(Debug, Clone, Default)]
pub struct RecordMetadata {
    /// Incremented on every write of any kind.
    pub version: u64,
    /// Wall-clock time (millis since epoch) when this record was created.
    pub creation_time: u64,
    /// Wall-clock time of the last write.
    pub last_update_time: u64,
}

impl RecordMetadata {
    /// Version starts at 1.
    #[must_use]
    pub fn new(now: u64) -> Self {
        Self {
            version: 1,
            creation_time: now,
            last_update_time: now,
        }
    }

    /// Records a write: increments `version` and updates `last_update_time`.
    pub fn on_update(&mut self, now: u64) {
        self.version = self.version.saturating_add(1);
        self.last_update_time = now;
    }
}

/// A workshop plus its storage bookkeeping.
///
/// `counters_version` moves only with counter updates, so authoring edits
/// never make an in-flight admission conflict.
#[derive(Debug, Clone)]
pub struct WorkshopRecord {
    pub workshop: Workshop,
    pub counters_version: u64,
    pub metadata: RecordMetadata,
}

impl WorkshopRecord {
    #[must_use]
    pub fn new(workshop: Workshop, now: u64) -> Self {
        Self {
            workshop,
            counters_version: 0,
            metadata: RecordMetadata::new(now),
        }
    }
}
