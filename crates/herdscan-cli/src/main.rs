//! herdscan
//!
//! Screens livestock images with a two-stage cascade: a gate model decides
//! whether the image shows cattle, and only then a diagnostic model checks it
//! for foot-and-mouth disease. Positive scans tied to an animal are written to
//! a hash-chained record file.

use anyhow::{bail, Context, Result};
use clap::Parser;
use herdscan_classifiers::{Cascade, CandleModelLoader, ModelCache, ModelsConfig};
use herdscan_core::{ModelKind, RecordId, ScanResponse};
use herdscan_policy::GatePolicy;
use herdscan_telemetry::{JsonlScanStore, RecordSink, ScanRecorder};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;
mod settings;

use cli::{Cli, Command, ScanArgs};
use settings::Settings;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanOutput {
    #[serde(flatten)]
    response: ScanResponse,
    persistence: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_id: Option<RecordId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    let metrics_handle = if cli.metrics {
        Some(init_metrics()?)
    } else {
        None
    };

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply_cli(&cli);
    info!(
        "Settings loaded: models={}, store={}",
        settings.models.display(),
        settings.store.display()
    );

    let result = run(cli.command, settings).await;

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    result
}

async fn run(command: Command, settings: Settings) -> Result<()> {
    match command {
        Command::Scan(args) => scan(args, &settings).await,
        Command::CheckModels => check_models(&settings).await,
        Command::Records { requester, limit } => {
            let store = JsonlScanStore::open(&settings.store)?;
            for record in store.list(requester.as_deref(), limit)? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Command::VerifyRecords => {
            let store = JsonlScanStore::open(&settings.store)?;
            let report = store.verify()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if let Some(id) = report.first_broken {
                bail!("scan record chain broken at {}", id);
            }
            Ok(())
        }
    }
}

/// Build the model cache and the gate policy from the model registry
fn load_models(settings: &Settings) -> Result<(ModelCache, GatePolicy)> {
    let mut models = ModelsConfig::from_file(&settings.models)
        .with_context(|| format!("loading model registry {}", settings.models.display()))?;

    if let Some(path) = &settings.gate_model {
        models = models.with_local_weights(ModelKind::Gate, path.clone());
    }
    if let Some(path) = &settings.diagnostic_model {
        models = models.with_local_weights(ModelKind::Diagnostic, path.clone());
    }

    let policy = models.gate_policy;
    let mut loader = CandleModelLoader::new(models);
    if let Some(dir) = &settings.model_cache_dir {
        loader = loader.with_cache_dir(dir.clone());
    }

    Ok((ModelCache::new(loader), policy))
}

async fn scan(args: ScanArgs, settings: &Settings) -> Result<()> {
    let (cache, policy) = load_models(settings)?;

    let store = Arc::new(JsonlScanStore::open(&settings.store)?);
    let mut recorder = ScanRecorder::new(store).with_scan_type(settings.scan_type.clone());
    if let Some(image_ref) = args.image_ref {
        recorder = recorder.with_image_ref(image_ref);
    }

    let cascade = Cascade::new(Arc::new(cache))
        .with_policy(policy)
        .with_store(Arc::new(recorder));

    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("reading {}", args.image.display()))?;
    let requester = args.requester.unwrap_or_else(|| settings.requester.clone());
    let subject = args.subject;
    let threshold = args.threshold;

    if subject.is_none() {
        warn!("No --subject given; a positive result will not be recorded");
    }

    let report = tokio::task::spawn_blocking(move || {
        cascade.scan(&bytes, threshold, &requester, subject.as_deref())
    })
    .await??;

    let output = ScanOutput {
        response: report.to_response(),
        persistence: report.persistence.as_str(),
        record_id: report.record_id,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn check_models(settings: &Settings) -> Result<()> {
    let (cache, _) = load_models(settings)?;
    let cache = Arc::new(cache);

    let statuses = tokio::task::spawn_blocking(move || {
        ModelKind::ALL
            .iter()
            .map(|&kind| (kind, cache.get(kind)))
            .collect::<Vec<_>>()
    })
    .await?;

    let mut failed = 0;
    for (kind, status) in statuses {
        match status {
            Ok(model) => println!("{:<10} ok      {}", kind.as_str(), model.name()),
            Err(e) => {
                failed += 1;
                println!("{:<10} FAILED  {}", kind.as_str(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} models failed to load", failed, ModelKind::ALL.len());
    }
    Ok(())
}

/// Initialize tracing/logging on stderr so stdout stays machine-readable
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("herdscan=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("herdscan=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Install the Prometheus recorder and describe the cascade metrics
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "herdscan_scans_total",
        "Cascade runs by outcome (rejected, positive, negative, error)"
    );
    metrics::describe_histogram!(
        "herdscan_stage_latency_us",
        metrics::Unit::Microseconds,
        "Per-stage latency in microseconds"
    );
    metrics::describe_counter!("herdscan_errors_total", "Errors by category");
    metrics::describe_counter!(
        "herdscan_records_persisted_total",
        "Scan records written to the store"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
