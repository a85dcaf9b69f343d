// CleanLog - app/state.rs
//
// Shared dashboard state: the loaded configuration and a bounded store of
// finished reports whose artifacts can still be downloaded.
// Cloned into every request handler; the store sits behind Arc<Mutex>.

use crate::core::export::{self, ArtifactKind};
use crate::core::report::StandardReport;
use crate::platform::config::AppConfig;
use crate::util::constants;
use crate::util::error::ExportError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Finished reports, oldest first. Capacity-bounded; inserting into a full
/// store evicts the oldest report.
#[derive(Debug)]
pub struct ArtifactStore {
    reports: VecDeque<(String, Arc<StandardReport>)>,
    capacity: usize,
    next_id: u64,
}

impl ArtifactStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    /// Store a report and return the id its downloads are addressed by.
    pub fn insert(&mut self, report: StandardReport) -> String {
        let id = format!("{}-{}", report.module.id(), self.next_id);
        self.next_id += 1;

        while self.reports.len() >= self.capacity {
            if let Some((evicted, _)) = self.reports.pop_front() {
                tracing::debug!(report = %evicted, "Evicted oldest stored report");
            }
        }
        self.reports.push_back((id.clone(), Arc::new(report)));
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<StandardReport>> {
        self.reports
            .iter()
            .find(|(k, _)| k == id)
            .map(|(_, r)| Arc::clone(r))
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new(constants::MAX_STORED_REPORTS)
    }
}

/// One downloadable file.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// State shared by all dashboard handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: Arc<Mutex<ArtifactStore>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(ArtifactStore::default())),
        }
    }

    /// Keep `report` for download; returns its id.
    pub fn store_report(&self, report: StandardReport) -> String {
        // Inserts never leave a partial entry, so a poisoned store is usable.
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.insert(report)
    }

    /// Build the artifact `kind` of stored report `id`.
    /// `Ok(None)` when the report is unknown or has no such artifact.
    pub fn artifact(&self, id: &str, kind: ArtifactKind) -> Result<Option<Artifact>, ExportError> {
        let report = {
            let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.get(id)
        };
        let Some(report) = report else {
            return Ok(None);
        };
        Ok(export::artifact_bytes(&report, kind)?.map(|bytes| Artifact {
            file_name: kind.file_name(report.module.id()),
            content_type: kind.content_type(),
            bytes,
        }))
    }
}
