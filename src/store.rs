//! In-memory case and SLA record store.
//!
//! Each case owns exactly one SLA record; both live in one entry and are
//! inserted and removed together. Entries are locked individually so
//! mutations on one case serialize while other cases stay available.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::SlaError;
use crate::models::{Case, SlaRecord};

/// A case and its SLA record
#[derive(Debug, Clone)]
pub struct CaseEntry {
    pub case: Case,
    pub record: SlaRecord,
}

#[derive(Default)]
pub struct CaseStore {
    entries: RwLock<HashMap<Uuid, Arc<Mutex<CaseEntry>>>>,
}

impl CaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a case together with its record.
    ///
    /// Returns `false` without touching the store if the id is taken or the
    /// record belongs to another case.
    pub fn insert(&self, case: Case, record: SlaRecord) -> bool {
        if record.case_id != case.id {
            return false;
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&case.id) {
            return false;
        }
        debug!(case_id = %case.id, "Case inserted");
        entries.insert(case.id, Arc::new(Mutex::new(CaseEntry { case, record })));
        true
    }

    /// Remove a case and its record.
    pub fn remove(&self, case_id: Uuid) -> Option<CaseEntry> {
        let entry = self.entries.write().remove(&case_id)?;
        let removed = entry.lock().clone();
        Some(removed)
    }

    pub fn get(&self, case_id: Uuid) -> Option<CaseEntry> {
        let entry = self.entry(case_id)?;
        let snapshot = entry.lock().clone();
        Some(snapshot)
    }

    /// Run `f` against one entry while holding that entry's lock.
    pub fn update<T, F>(&self, case_id: Uuid, f: F) -> Result<T, SlaError>
    where
        F: FnOnce(&mut CaseEntry) -> Result<T, SlaError>,
    {
        let entry = self
            .entry(case_id)
            .ok_or(SlaError::RecordNotFound(case_id))?;
        let mut guard = entry.lock();
        f(&mut guard)
    }

    /// Point-in-time copy of every entry, ordered by case id.
    pub fn snapshot(&self) -> Vec<CaseEntry> {
        let handles: Vec<_> = self.entries.read().values().cloned().collect();
        let mut entries: Vec<CaseEntry> = handles.iter().map(|e| e.lock().clone()).collect();
        entries.sort_by_key(|e| e.case.id);
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn entry(&self, case_id: Uuid) -> Option<Arc<Mutex<CaseEntry>>> {
        self.entries.read().get(&case_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CaseStatus, Priority, SlaTargets};
    use chrono::{Duration, Utc};
    use std::thread;

    fn new_case(n: u128) -> (Case, SlaRecord) {
        let case = Case {
            id: Uuid::from_u128(n),
            protocol: format!("PRT-{}", n),
            customer_name: "Joana".into(),
            case_type: "billing".into(),
            priority: Priority::Low,
            status: CaseStatus::Created,
            created_at: Utc::now(),
        };
        let record = SlaRecord::new(&case, SlaTargets::new(60, 480));
        (case, record)
    }

    #[test]
    fn test_insert_get_remove() {
        let store = CaseStore::new();
        let (case, record) = new_case(1);
        assert!(store.insert(case.clone(), record.clone()));
        assert!(!store.insert(case, record));
        assert_eq!(store.len(), 1);

        assert!(store.get(Uuid::from_u128(1)).is_some());
        assert!(store.remove(Uuid::from_u128(1)).is_some());
        assert!(store.get(Uuid::from_u128(1)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_record_for_other_case() {
        let store = CaseStore::new();
        let (case, _) = new_case(1);
        let (_, other_record) = new_case(2);
        assert!(!store.insert(case, other_record));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_missing_case() {
        let store = CaseStore::new();
        let result = store.update(Uuid::from_u128(9), |_| Ok(()));
        assert_eq!(result, Err(SlaError::RecordNotFound(Uuid::from_u128(9))));
    }

    #[test]
    fn test_concurrent_pause_has_single_winner() {
        let store = Arc::new(CaseStore::new());
        let (case, record) = new_case(1);
        let at = case.created_at + Duration::minutes(5);
        store.insert(case, record);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.update(Uuid::from_u128(1), |entry| entry.record.pause(at, "race"))
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == SlaError::AlreadyPaused));
        assert_eq!(
            store.get(Uuid::from_u128(1)).unwrap().record.paused_intervals.len(),
            1
        );
    }
}
