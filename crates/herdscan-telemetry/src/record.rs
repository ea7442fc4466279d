//! Scan records and their hash chain

use chrono::{DateTime, Utc};
use herdscan_core::{CascadeOutcome, DiagnosisLabel, RecordId, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Scan type written when none is configured
pub const DEFAULT_SCAN_TYPE: &str = "FMD_SCAN";

/// One persisted scan, never mutated after it is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: RecordId,

    /// Principal that requested the scan
    pub requester_id: String,

    /// Animal or other subject the scan refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    pub created_at: DateTime<Utc>,

    pub scan_type: String,

    pub threshold_used: f32,

    pub primary_prob: f32,

    pub secondary_prob: f32,

    pub passed_gate: bool,

    pub gate_rule: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_label: Option<DiagnosisLabel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_confidence: Option<f32>,

    /// Reference to the stored image, if the caller kept one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Full cascade outcome as JSON
    pub raw: serde_json::Value,

    /// Hash of the record written before this one
    #[serde(default)]
    pub previous_hash: Option<String>,

    /// Hash of this record, filled in when it is appended
    #[serde(default)]
    pub hash: String,
}

/// Generate a unique record ID using UUID v4
fn generate_record_id() -> RecordId {
    RecordId::new(format!("scan_{}", uuid::Uuid::new_v4()))
}

impl ScanRecord {
    /// Snapshot a cascade outcome into an unchained record
    pub fn from_outcome(
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            id: generate_record_id(),
            requester_id: requester_id.to_string(),
            subject_id: subject_id.map(str::to_string),
            created_at: Utc::now(),
            scan_type: DEFAULT_SCAN_TYPE.to_string(),
            threshold_used: outcome.threshold,
            primary_prob: outcome.gate.primary_prob,
            secondary_prob: outcome.gate.secondary_prob,
            passed_gate: outcome.gate.passed,
            gate_rule: outcome.gate.rule_description.clone(),
            diagnosis_label: outcome.diagnosis.as_ref().map(|d| d.label),
            diagnosis_confidence: outcome.diagnosis.as_ref().map(|d| d.confidence),
            image_ref: None,
            raw: serde_json::to_value(outcome)?,
            previous_hash: None,
            hash: String::new(),
        })
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

    /// Decode the stored outcome snapshot
    pub fn outcome(&self) -> Result<CascadeOutcome> {
        Ok(serde_json::from_value(self.raw.clone())?)
    }

    /// Link this record after `previous_hash` and seal it
    pub fn chain(mut self, previous_hash: Option<String>) -> Self {
        self.previous_hash = previous_hash;
        self.hash = self.compute_hash();
        self
    }

    /// Compute hash over every field except `hash` itself
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, self.id.as_str().as_bytes());
        update_field(&mut hasher, self.requester_id.as_bytes());
        update_field(&mut hasher, self.subject_id.as_deref().unwrap_or_default().as_bytes());
        update_field(&mut hasher, self.created_at.to_rfc3339().as_bytes());
        update_field(&mut hasher, self.scan_type.as_bytes());
        update_field(&mut hasher, &self.threshold_used.to_le_bytes());
        update_field(&mut hasher, &self.primary_prob.to_le_bytes());
        update_field(&mut hasher, &self.secondary_prob.to_le_bytes());
        update_field(&mut hasher, &[self.passed_gate as u8]);
        update_field(&mut hasher, self.gate_rule.as_bytes());
        update_field(
            &mut hasher,
            self.diagnosis_label
                .map(|l| l.as_str())
                .unwrap_or_default()
                .as_bytes(),
        );
        update_field(
            &mut hasher,
            &self.diagnosis_confidence.unwrap_or(-1.0).to_le_bytes(),
        );
        update_field(&mut hasher, self.image_ref.as_deref().unwrap_or_default().as_bytes());
        update_field(&mut hasher, self.raw.to_string().as_bytes());
        update_field(&mut hasher, self.previous_hash.as_deref().unwrap_or_default().as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Hash one field followed by a unit separator
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update(bytes);
    hasher.update([0x1fu8]);
}

/// Result of walking a record chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    /// Records checked
    pub records: usize,

    /// First record whose link or hash does not check out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_broken: Option<RecordId>,
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        self.first_broken.is_none()
    }
}

/// Verify that records form an unbroken chain, oldest first
pub fn verify_chain<'a>(records: impl IntoIterator<Item = &'a ScanRecord>) -> ChainReport {
    let mut prev_hash: Option<String> = None;
    let mut count = 0;

    for record in records {
        count += 1;

        if record.previous_hash != prev_hash || record.hash != record.compute_hash() {
            return ChainReport {
                records: count,
                first_broken: Some(record.id.clone()),
            };
        }

        prev_hash = Some(record.hash.clone());
    }

    ChainReport {
        records: count,
        first_broken: None,
    }
}
