//! Test doubles for the cascade
//!
//! Spy and failing models, a counting loader, and an in-memory recording store.

#![allow(dead_code)]

use herdscan_classifiers::{ImageTensor, ModelHandle, ModelLoader, ScoringModel};
use herdscan_core::{CascadeOutcome, Error, ModelKind, RecordId, Result, ScanStore};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Logits that softmax to `[p, 1 - p]`
pub fn logits_for(primary_prob: f32) -> [f32; 2] {
    [(primary_prob / (1.0 - primary_prob)).ln(), 0.0]
}

/// A small encoded PNG
pub fn sample_png() -> Vec<u8> {
    let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 90]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// A model returning fixed logits and counting its forward passes
pub struct SpyModel {
    kind: ModelKind,
    labels: [String; 2],
    logits: Vec<f32>,
    call_count: AtomicU32,
}

impl SpyModel {
    pub fn gate() -> Self {
        Self::new(ModelKind::Gate, ["cattle", "non_cattle"])
    }

    pub fn diagnostic() -> Self {
        Self::new(ModelKind::Diagnostic, ["healthy", "infected"])
    }

    fn new(kind: ModelKind, labels: [&str; 2]) -> Self {
        Self {
            kind,
            labels: [labels[0].to_string(), labels[1].to_string()],
            logits: vec![0.0, 0.0],
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the logits this model will return
    pub fn with_logits(mut self, logits: [f32; 2]) -> Self {
        self.logits = logits.to_vec();
        self
    }

    /// Return a malformed head output
    pub fn with_raw_output(mut self, logits: Vec<f32>) -> Self {
        self.logits = logits;
        self
    }

    /// Get the number of times forward was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl ScoringModel for SpyModel {
    fn name(&self) -> &str {
        "spy"
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn labels(&self) -> [&str; 2] {
        [&self.labels[0], &self.labels[1]]
    }

    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), [1, 3, 224, 224]);
        Ok(self.logits.clone())
    }
}

/// A model whose forward pass always fails
pub struct FailingModel {
    kind: ModelKind,
    message: String,
}

impl FailingModel {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            message: "Simulated backend failure".to_string(),
        }
    }
}

impl ScoringModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn labels(&self) -> [&str; 2] {
        ["a", "b"]
    }

    fn forward(&self, _input: &ImageTensor) -> Result<Vec<f32>> {
        Err(Error::inference(self.kind, &self.message))
    }
}

/// Hands out pre-built models and counts loads per kind
pub struct CountingLoader {
    gate: Option<ModelHandle>,
    diagnostic: Option<ModelHandle>,
    delay: Option<Duration>,
    gate_loads: AtomicU32,
    diagnostic_loads: AtomicU32,
}

impl CountingLoader {
    pub fn new(gate: ModelHandle, diagnostic: ModelHandle) -> Self {
        Self {
            gate: Some(gate),
            diagnostic: Some(diagnostic),
            delay: None,
            gate_loads: AtomicU32::new(0),
            diagnostic_loads: AtomicU32::new(0),
        }
    }

    /// A loader whose diagnostic model is missing
    pub fn without_diagnostic(gate: ModelHandle) -> Self {
        Self {
            diagnostic: None,
            ..Self::new(gate.clone(), gate)
        }
    }

    /// Slow every load down to widen race windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn loads(&self, kind: ModelKind) -> u32 {
        match kind {
            ModelKind::Gate => self.gate_loads.load(Ordering::SeqCst),
            ModelKind::Diagnostic => self.diagnostic_loads.load(Ordering::SeqCst),
        }
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        let (counter, model) = match kind {
            ModelKind::Gate => (&self.gate_loads, &self.gate),
            ModelKind::Diagnostic => (&self.diagnostic_loads, &self.diagnostic),
        };
        counter.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        model
            .clone()
            .ok_or_else(|| Error::model_load(kind, "weights not found"))
    }
}

/// Stored call to [`RecordingStore::persist`]
#[derive(Debug, Clone)]
pub struct PersistCall {
    pub outcome: CascadeOutcome,
    pub requester_id: String,
    pub subject_id: Option<String>,
}

/// Scan store that keeps every write in memory
#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<PersistCall>>,
    fail: bool,
}

impl RecordingStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<PersistCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl ScanStore for RecordingStore {
    fn persist(
        &self,
        outcome: &CascadeOutcome,
        requester_id: &str,
        subject_id: Option<&str>,
    ) -> Result<RecordId> {
        if self.fail {
            return Err(Error::storage("database unavailable"));
        }

        let mut calls = self.calls.lock().unwrap();
        calls.push(PersistCall {
            outcome: outcome.clone(),
            requester_id: requester_id.to_string(),
            subject_id: subject_id.map(str::to_string),
        });
        Ok(RecordId::new(format!("rec_{}", calls.len())))
    }
}

/// Convenience pair of spies wired into a counting loader
pub fn spies(
    gate_logits: [f32; 2],
    diagnostic_logits: [f32; 2],
) -> (Arc<SpyModel>, Arc<SpyModel>, Arc<CountingLoader>) {
    let gate = Arc::new(SpyModel::gate().with_logits(gate_logits));
    let diagnostic = Arc::new(SpyModel::diagnostic().with_logits(diagnostic_logits));
    let loader = Arc::new(CountingLoader::new(gate.clone(), diagnostic.clone()));
    (gate, diagnostic, loader)
}

struct Tally(Arc<AtomicU64>);

impl CounterFn for Tally {
    fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::SeqCst);
    }

    fn absolute(&self, value: u64) {
        self.0.store(value, Ordering::SeqCst);
    }
}

/// Metrics recorder that keeps counter totals, keyed as `name{label=value,..}`
#[derive(Default)]
pub struct CountingRecorder {
    counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
}

impl CountingRecorder {
    pub fn count(&self, key: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(key)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let labels: Vec<String> = key
            .labels()
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        let id = format!("{}{{{}}}", key.name(), labels.join(","));
        let cell = self.counters.lock().unwrap().entry(id).or_default().clone();
        Counter::from_arc(Arc::new(Tally(cell)))
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
