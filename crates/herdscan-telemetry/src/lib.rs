//! herdscan Telemetry
//!
//! Durable storage for actionable scan outcomes:
//! - `record`: the scan record and its SHA-256 hash chain
//! - `store`: JSON-lines and in-memory stores, plus the recorder that
//!   implements the cascade's storage contract

pub mod record;
pub mod store;

pub use record::{verify_chain, ChainReport, ScanRecord, DEFAULT_SCAN_TYPE};
pub use store::{JsonlScanStore, MemoryScanStore, RecordSink, ScanRecorder, DEFAULT_LIST_LIMIT};
