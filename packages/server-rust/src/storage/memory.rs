//! In-memory [`WorkshopStore`] backed by [`DashMap`].
//!
//! Counter updates run under the workshop entry's shard lock, so the
//! version check, capacity check and write form one atomic step even when
//! many tasks submit to the same workshop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use workshop_core::{
    within_capacity, ClockSource, CounterDelta, Registration, SystemClock, WaitlistEntry, Workshop,
};

use crate::storage::record::WorkshopRecord;
use crate::traits::{StoreError, VersionedCounters, WorkshopStore};

/// Concurrent in-memory storage for workshops, registrations and waitlists.
pub struct MemoryWorkshopStore {
    workshops: DashMap<String, WorkshopRecord>,
    registrations: DashMap<String, Registration>,
    waitlists: DashMap<String, Vec<WaitlistEntry>>,
    clock: Arc<dyn ClockSource>,
    unavailable: AtomicBool,
    failing_registration_writes: AtomicU32,
    failing_registration_updates: AtomicU32,
}

impl MemoryWorkshopStore {
    #[must_use]
    pub fn new(clock: Arc<dyn ClockSource>) -> Self {
        Self {
            workshops: DashMap::new(),
            registrations: DashMap::new(),
            waitlists: DashMap::new(),
            clock,
            unavailable: AtomicBool::new(false),
            failing_registration_writes: AtomicU32::new(0),
            failing_registration_updates: AtomicU32::new(0),
        }
    }

    /// Makes every call fail with [`StoreError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `count` registration writes fail while counters keep working.
    pub fn fail_registration_writes(&self, count: u32) {
        self.failing_registration_writes
            .store(count, Ordering::SeqCst);
    }

    /// Makes the next `count` registration updates fail.
    pub fn fail_registration_updates(&self, count: u32) {
        self.failing_registration_updates
            .store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn take_fault(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn snapshot(record: &WorkshopRecord) -> VersionedCounters {
        VersionedCounters {
            counters: record.workshop.counters,
            policy: record.workshop.policy.clone(),
            status: record.workshop.status,
            version: record.counters_version,
        }
    }

    /// Rewrites display positions to 1..n and mirrors them onto the stored
    /// registrations. Sequences are left alone.
    fn renumber(&self, entries: &mut [WaitlistEntry]) {
        for (index, entry) in entries.iter_mut().enumerate() {
            let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
            if entry.position == position {
                continue;
            }
            entry.position = position;
            if let Some(mut reg) = self.registrations.get_mut(&entry.registration_id) {
                if reg.waitlist_position.is_some() {
                    reg.waitlist_position = Some(position);
                }
            }
        }
    }
}

impl Default for MemoryWorkshopStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl WorkshopStore for MemoryWorkshopStore {
    async fn create_workshop(&self, workshop: Workshop) -> Result<(), StoreError> {
        self.check_available()?;
        let now = self.clock.now();
        self.waitlists.entry(workshop.id.clone()).or_default();
        self.workshops
            .insert(workshop.id.clone(), WorkshopRecord::new(workshop, now));
        Ok(())
    }

    async fn load_workshop(&self, id: &str) -> Result<Workshop, StoreError> {
        self.check_available()?;
        self.workshops
            .get(id)
            .map(|r| r.workshop.clone())
            .ok_or_else(|| StoreError::workshop_not_found(id))
    }

    async fn save_workshop(&self, workshop: &Workshop) -> Result<(), StoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let mut record = self
            .workshops
            .get_mut(&workshop.id)
            .ok_or_else(|| StoreError::workshop_not_found(&workshop.id))?;

        let counters = record.workshop.counters;
        let last_modified = record.workshop.last_modified;
        record.workshop = workshop.clone();
        record.workshop.counters = counters;
        record.workshop.touch(last_modified);
        record.metadata.on_update(now);
        Ok(())
    }

    async fn read_counters(&self, workshop_id: &str) -> Result<VersionedCounters, StoreError> {
        self.check_available()?;
        self.workshops
            .get(workshop_id)
            .map(|r| Self::snapshot(&r))
            .ok_or_else(|| StoreError::workshop_not_found(workshop_id))
    }

    async fn apply_counter_delta(
        &self,
        workshop_id: &str,
        expected_version: u64,
        delta: CounterDelta,
    ) -> Result<VersionedCounters, StoreError> {
        self.check_available()?;
        let now = self.clock.now();
        let conflict = || StoreError::Conflict {
            workshop_id: workshop_id.to_string(),
        };

        let mut record = self
            .workshops
            .get_mut(workshop_id)
            .ok_or_else(|| StoreError::workshop_not_found(workshop_id))?;

        if record.counters_version != expected_version {
            debug!(
                workshop_id,
                expected_version,
                actual_version = record.counters_version,
                "counter version moved"
            );
            return Err(conflict());
        }

        let next = delta.apply(record.workshop.counters).ok_or_else(conflict)?;
        // Releases and rollbacks may run while over a lowered capacity.
        if delta.registered > 0 && !within_capacity(&record.workshop.policy, next) {
            return Err(conflict());
        }

        record.workshop.counters = next;
        record.counters_version += 1;
        record.workshop.touch(now);
        record.metadata.on_update(now);
        Ok(Self::snapshot(&record))
    }

    async fn write_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        self.check_available()?;
        if Self::take_fault(&self.failing_registration_writes) {
            return Err(StoreError::Unavailable(
                "registration write failed".to_string(),
            ));
        }
        self.registrations
            .insert(registration.id.clone(), registration.clone());
        Ok(())
    }

    async fn load_registration(&self, id: &str) -> Result<Registration, StoreError> {
        self.check_available()?;
        self.registrations
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::registration_not_found(id))
    }

    async fn update_registration(&self, registration: &Registration) -> Result<(), StoreError> {
        self.check_available()?;
        if Self::take_fault(&self.failing_registration_updates) {
            return Err(StoreError::Unavailable(
                "registration update failed".to_string(),
            ));
        }
        let mut slot = self
            .registrations
            .get_mut(&registration.id)
            .ok_or_else(|| StoreError::registration_not_found(&registration.id))?;
        *slot = registration.clone();
        Ok(())
    }

    async fn find_registration_by_key(
        &self,
        workshop_id: &str,
        dedupe_key: &str,
    ) -> Result<Option<Registration>, StoreError> {
        self.check_available()?;
        Ok(self
            .registrations
            .iter()
            .find(|r| {
                r.workshop_id == workshop_id
                    && r.is_active()
                    && r.dedupe_key.as_deref() == Some(dedupe_key)
            })
            .map(|r| r.clone()))
    }

    async fn count_registrations(&self, workshop_id: &str) -> Result<usize, StoreError> {
        self.check_available()?;
        Ok(self
            .registrations
            .iter()
            .filter(|r| r.workshop_id == workshop_id)
            .count())
    }

    async fn append_to_waitlist(
        &self,
        workshop_id: &str,
        entry: WaitlistEntry,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let mut list = self.waitlists.entry(workshop_id.to_string()).or_default();
        // Appends can land out of order when two submissions race past the
        // counter update.
        let at = list.partition_point(|e| e.sequence <= entry.sequence);
        list.insert(at, entry);
        self.renumber(&mut list);
        Ok(())
    }

    async fn pop_waitlist_head(
        &self,
        workshop_id: &str,
    ) -> Result<Option<WaitlistEntry>, StoreError> {
        self.check_available()?;
        let Some(mut list) = self.waitlists.get_mut(workshop_id) else {
            return Ok(None);
        };
        if list.is_empty() {
            return Ok(None);
        }
        let head = list.remove(0);
        self.renumber(&mut list);
        Ok(Some(head))
    }

    async fn remove_from_waitlist(
        &self,
        workshop_id: &str,
        registration_id: &str,
    ) -> Result<bool, StoreError> {
        self.check_available()?;
        let Some(mut list) = self.waitlists.get_mut(workshop_id) else {
            return Ok(false);
        };
        let Some(index) = list
            .iter()
            .position(|e| e.registration_id == registration_id)
        else {
            return Ok(false);
        };
        list.remove(index);
        self.renumber(&mut list);
        Ok(true)
    }

    async fn waitlist(&self, workshop_id: &str) -> Result<Vec<WaitlistEntry>, StoreError> {
        self.check_available()?;
        if !self.workshops.contains_key(workshop_id) {
            return Err(StoreError::workshop_not_found(workshop_id));
        }
        Ok(self
            .waitlists
            .get(workshop_id)
            .map(|l| l.clone())
            .unwrap_or_default())
    }

    async fn workshops_modified_since(&self, since: u64) -> Result<Vec<Workshop>, StoreError> {
        self.check_available()?;
        let mut changed: Vec<Workshop> = self
            .workshops
            .iter()
            .filter(|r| r.workshop.last_modified > since)
            .map(|r| r.workshop.clone())
            .collect();
        changed.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(changed)
    }
}
