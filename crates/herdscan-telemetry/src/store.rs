//! Scan record storage
//!
//! Provides append-only storage for scan records with:
//! - JSON-lines files, one record per line
//! - SHA-256 hash chaining that resumes across process restarts
//! - Listing by requester, newest first
//! - Chain verification

use crate::record::{verify_chain, ChainReport, ScanRecord, DEFAULT_SCAN_TYPE};
use herdscan_core::{CascadeOutcome, Error, RecordId, Result, ScanStore};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default page size when listing records
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Append-only destination for sealed scan records
pub trait RecordSink: Send + Sync {
    /// Chain and append a record, returning it as stored
    fn append(&self, record: ScanRecord) -> Result<ScanRecord>;

    /// All records, oldest first
    fn records(&self) -> Result<Vec<ScanRecord>>;

    /// Records for one requester (or everyone), newest first
    fn list(&self, requester_id: Option<&str>, limit: usize) -> Result<Vec<ScanRecord>> {
        let mut records = self.records()?;
        records.retain(|r| requester_id.map_or(true, |id| r.requester_id == id));
        records.reverse();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    /// Walk the whole chain
    fn verify(&self) -> Result<ChainReport> {
        Ok(verify_chain(&self.records()?))
    }
}

struct WriterState {
    file: File,
    last_hash: Option<String>,
}

/// JSON-lines scan record file
pub struct JsonlScanStore {
    path: PathBuf,
    state: Mutex<WriterState>,
}

impl JsonlScanStore {
    /// Open (or create) a record file and resume its hash chain
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let last_hash = read_records(&path)?.last().map(|r| r.hash.clone());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        info!(
            "Opened scan record store at {} (chain head: {})",
            path.display(),
            last_hash.as_deref().unwrap_or("empty")
        );

        Ok(Self {
            path,
            state: Mutex::new(WriterState {
                file,
                last_hash,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for JsonlScanStore {
    fn append(&self, record: ScanRecord) -> Result<ScanRecord> {
        let mut state = self.state.lock();
        let record = record.chain(state.last_hash.clone());

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        append_line(&mut state.file, line.as_bytes())
            .map_err(|e| Error::storage(format!("Failed to append scan record: {}", e)))?;

        state.last_hash = Some(record.hash.clone());
        debug!(record_id = %record.id, "Appended scan record");
        Ok(record)
    }

    fn records(&self) -> Result<Vec<ScanRecord>> {
        // Hold the writer lock so a half-written line is never read
        let _guard = self.state.lock();
        read_records(&self.path)
    }
}

/// Append one whole line, or leave the file as it was
fn append_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    let start = file.metadata()?.len();
    if let Err(e) = file.write_all(line) {
        if let Err(truncate) = file.set_len(start) {
            warn!("Could not roll back partial scan record write: {}", truncate);
        }
        return Err(e);
    }
    Ok(())
}

/// Read every record in a JSON-lines file, oldest first
fn read_records(path: &Path) -> Result<Vec<ScanRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record = serde_json::from_str::<ScanRecord>(&line).map_err(|e| {
            Error::storage(format!(
                "Corrupt scan record at {}:{}: {}",
                path.display(),
                index + 1,
                e
            ))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// In-memory record store for tests and embedding
#[derive(Default)]
pub struct MemoryScanStore {
    records: RwLock<Vec<ScanRecord>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordSink for MemoryScanStore {
    fn append(&self, record: ScanRecord) -> Result<ScanRecord> {
        let mut records = self.records.write();
        let record = record.chain(records.last().map(|r| r.hash.clone()));
        records.push(record.clone());
        Ok(record)
    }

    fn records(&self) -> Result<Vec<ScanRecord>> {
        Ok(self.records.read().clone())
    }
}

/// Writes cascade outcomes into a [`RecordSink`]
///
/// Carries the per-deployment scan type and an optional image reference for
/// the request being served.
pub struct ScanRecorder {
    sink: Arc<dyn RecordSink>,
    scan_type: String,
    image_ref: Option<String>,
}

impl ScanRecorder {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self {
            sink,
            scan_type: DEFAULT_SCAN_TYPE.to_string(),
            image_ref: None,
        }
    }

    /// Set scan type
    pub fn with_scan_type(mut self, scan_type: impl Into<String>) -> Self {
        self.scan_type = scan_type.into();
        self
    }

    /// Set image reference
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }
}

impl ScanStore for ScanRecorder {
    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId> {
        let mut record = ScanRecord::from_outcome(outcome, requester_id, subject_id)?
            .with_scan_type(self.scan_type.clone());
        if let Some(image_ref) = &self.image_ref {
            record = record.with_image_ref(image_ref.clone());
        }
        Ok(self.sink.append(record)?.id)
    }
}

impl ScanStore for JsonlScanStore {
    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId> {
        let record = ScanRecord::from_outcome(outcome, requester_id, subject_id)?;
        Ok(self.append(record)?.id)
    }
}

impl ScanStore for MemoryScanStore {
    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId> {
        let record = ScanRecord::from_outcome(outcome, requester_id, subject_id)?;
        Ok(self.append(record)?.id)
    }
}
