use crate::errors::Result;
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_requests_total",
        "Total requests received on the ingest endpoint"
    ))
    .unwrap();
    pub static ref UNAUTHORIZED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_unauthorized_total",
        "Total requests rejected for a missing or wrong token"
    ))
    .unwrap();
    pub static ref REJECTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_rejected_total",
        "Total requests rejected as malformed"
    ))
    .unwrap();
    pub static ref ROWS_INSERTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_rows_inserted_total",
        "Total telemetry rows accepted by the table store"
    ))
    .unwrap();
    pub static ref IMAGES_UPLOADED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_images_uploaded_total",
        "Total images written to the object store"
    ))
    .unwrap();
    pub static ref IMAGE_BYTES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_image_bytes_total",
        "Total image bytes written to the object store"
    ))
    .unwrap();
    pub static ref WRITE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "ingestor_write_failures_total",
        "Total downstream writes that failed"
    ))
    .unwrap();
    pub static ref WRITE_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ingestor_write_latency_seconds",
            "Time taken by the downstream write of one request"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(UNAUTHORIZED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REJECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ROWS_INSERTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(IMAGES_UPLOADED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(IMAGE_BYTES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WRITE_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WRITE_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    let text = String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("metrics are not UTF-8: {}", e)))?;
    Ok(text)
}
