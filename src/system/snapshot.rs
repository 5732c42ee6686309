use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::metrics::MetricReading;

/// Latest reading per collector name.
///
/// Every write replaces a whole value, so a poisoned lock still guards a
/// consistent map and is recovered rather than propagated.
#[derive(Debug, Default)]
pub struct SnapshotTable {
    readings: Mutex<HashMap<String, MetricReading>>,
}

impl SnapshotTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MetricReading>> {
        self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `reading` under `name`, relabelling it so the key and the
    /// reading's own name never disagree.
    pub fn set(&self, name: impl Into<String>, mut reading: MetricReading) {
        let name = name.into();
        reading.name.clone_from(&name);
        self.lock().insert(name, reading);
    }

    pub fn get(&self, name: &str) -> Option<MetricReading> {
        self.lock().get(name).cloned()
    }

    /// Point-in-time copy of every reading, ordered by name.
    pub fn read_all(&self) -> Vec<MetricReading> {
        let mut readings: Vec<MetricReading> = self.lock().values().cloned().collect();
        readings.sort_by(|a, b| a.name.cmp(&b.name));
        readings
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
