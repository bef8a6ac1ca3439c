//! The authoritative merged view of spot state.
//!
//! Two independent sources write here: the one-shot REST snapshot
//! (`replace_all`, authoritative for completeness) and the live push feed
//! (`apply_partial`, authoritative for freshness). Conflicts between the
//! two are resolved by arrival order alone; no timestamp arbitration is
//! performed. Display consumers watch the revision channel and re-run
//! their filter pipeline on every change.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::watch;

use crate::types::{SpotRecord, SpotStatus};

/// In-memory store keyed by `spot_id`; at most one record per id.
pub struct SpotStore {
    records: RwLock<HashMap<i64, SpotRecord>>,
    revision: watch::Sender<u64>,
}

impl SpotStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            records: RwLock::new(HashMap::new()),
            revision,
        }
    }

    /// Atomically replace the entire record set with a full snapshot.
    ///
    /// No merge with prior data: spots missing from the snapshot are gone
    /// from the visible set. If the input carries duplicate ids the last
    /// occurrence wins, preserving the one-record-per-id invariant.
    pub fn replace_all(&self, records: Vec<SpotRecord>) {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            map.insert(record.spot_id, record);
        }
        let count = map.len();
        *self.records.write() = map;
        tracing::debug!("Snapshot replaced store contents ({} spots)", count);
        self.bump();
    }

    /// Insert or overwrite a single record from the live feed.
    ///
    /// Unconditional: the feed is the live source of truth for status, so
    /// the last write wins in arrival order regardless of `updated_at`.
    pub fn apply_partial(&self, spot_id: i64, status: SpotStatus, updated_at: DateTime<Utc>) {
        self.records
            .write()
            .insert(spot_id, SpotRecord::new(spot_id, status, updated_at));
        self.bump();
    }

    /// Owned copy of the current record set, in no particular order.
    pub fn snapshot(&self) -> Vec<SpotRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Revision channel for display consumers; the value increments on
    /// every mutation.
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }
}

impl Default for SpotStore {
    fn default() -> Self {
        Self::new()
    }
}
