//! Benchmark harness.
//!
//! Streams the whole `records` table through each format into a temp file,
//! measuring wall time, output size and peak resident memory. One format
//! failing is logged and omitted; the request only fails when all four do.
//! Rust exposes no GC hint, so each run gets the settling pause only.

use std::time::Instant;

use log::{info, warn};
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, BENCHMARK_RSS_SAMPLE_INTERVAL, BENCHMARK_SETTLE_PAUSE};
use crate::error_handling::ExportError;
use crate::export::{queries, ExportPipeline, FileSink};
use crate::model::{ColumnMapping, ExportFormat, ExportRequest, SOURCE_COLUMNS};

/// Metrics for one successful format run.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatMetrics {
    /// Wall time, rounded to 0.01 s.
    pub duration_seconds: f64,
    /// Bytes written to the temp file.
    pub file_size_bytes: u64,
    /// Peak resident memory during the run, rounded to 0.01 MiB.
    pub peak_memory_mb: f64,
}

/// Response body of `GET /exports/benchmark`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    /// `COUNT(*)` over `records` at benchmark time.
    pub dataset_row_count: i64,
    /// Per-format metrics, in benchmark order.
    pub results: serde_json::Map<String, serde_json::Value>,
    /// Per-format failure messages for omitted formats.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub errors: serde_json::Map<String, serde_json::Value>,
}

/// Runs all four formats sequentially.
///
/// # Errors
///
/// Returns `CursorFailed` if the row count cannot be read, or
/// `EncoderFailed` when every format failed.
pub async fn run(pool: &PgPool, config: &Config) -> Result<BenchmarkReport, ExportError> {
    let dataset_row_count = queries::count_records(pool).await?;

    let mut results = serde_json::Map::new();
    let mut errors = serde_json::Map::new();

    for format in ExportFormat::ALL {
        // Let OS counters settle between runs.
        tokio::time::sleep(BENCHMARK_SETTLE_PAUSE).await;

        match run_format(pool, config, format).await {
            Ok(metrics) => {
                info!(
                    "Benchmark {}: {:.2}s, {} bytes, {:.2} MiB peak",
                    format.extension(),
                    metrics.duration_seconds,
                    metrics.file_size_bytes,
                    metrics.peak_memory_mb
                );
                results.insert(
                    format.extension().to_string(),
                    serde_json::to_value(metrics).expect("metrics serialize"),
                );
            }
            Err(e) => {
                warn!("Benchmark {} failed: {e}", format.extension());
                errors.insert(
                    format.extension().to_string(),
                    serde_json::Value::String(e.to_string()),
                );
            }
        }
    }

    if results.is_empty() {
        return Err(ExportError::EncoderFailed(
            "all benchmark formats failed".to_string(),
        ));
    }

    Ok(BenchmarkReport {
        dataset_row_count,
        results,
        errors,
    })
}

async fn run_format(
    pool: &PgPool,
    config: &Config,
    format: ExportFormat,
) -> Result<FormatMetrics, ExportError> {
    let request = ExportRequest {
        format,
        columns: full_mapping(),
        compression: None,
    };
    let pipeline = ExportPipeline::open(pool, request, config.benchmark_row_limit).await?;

    // NamedTempFile is removed on drop, i.e. on every exit path below.
    let temp = tempfile::NamedTempFile::new().map_err(|e| ExportError::SinkFailed(e.to_string()))?;
    let file = temp
        .reopen()
        .map_err(|e| ExportError::SinkFailed(e.to_string()))?;
    let mut sink = FileSink::new(tokio::fs::File::from_std(file));

    let cancel = CancellationToken::new();
    let sampler = tokio::spawn(sample_peak_rss(cancel.clone()));

    let start = Instant::now();
    let run_result = pipeline.run(&mut sink).await;
    let duration = start.elapsed();

    cancel.cancel();
    let peak_rss_kb = sampler.await.unwrap_or(0);

    run_result?;
    let file_size_bytes = sink.finish().await?;

    Ok(FormatMetrics {
        duration_seconds: round2(duration.as_secs_f64()),
        file_size_bytes,
        peak_memory_mb: round2(peak_rss_kb as f64 / 1024.0),
    })
}

/// Identity mapping over every record attribute.
fn full_mapping() -> Vec<ColumnMapping> {
    SOURCE_COLUMNS
        .iter()
        .map(|source| ColumnMapping {
            source: source.to_string(),
            target: source.to_string(),
        })
        .collect()
}

/// Samples resident memory until cancelled, returning the peak in KiB.
async fn sample_peak_rss(cancel: CancellationToken) -> u64 {
    let mut peak = sample_rss_kb().unwrap_or(0);
    let mut interval = tokio::time::interval(BENCHMARK_RSS_SAMPLE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(rss) = sample_rss_kb() {
                    peak = peak.max(rss);
                }
            }
            _ = cancel.cancelled() => return peak,
        }
    }
}

/// Reads `VmRSS` from `/proc/self/status`. Returns `None` off Linux, which
/// degrades the peak-memory metric to zero rather than failing the run.
fn sample_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse()
                .ok();
        }
    }
    None
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
