use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

use crate::error::ErrorKind;

const LATENCY_BUCKETS: &[f64] = &[0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0];

/// Service operations tracked by the metrics
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Index,
    Search,
    Fetch,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Search => "search",
            Operation::Fetch => "fetch",
        }
    }
}

/// Prometheus metrics for the indexing service
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Completed operations by `op` and `outcome` (`ok` or an error kind)
    pub operations_total: CounterVec,
    pub operation_latency: HistogramVec,

    pub total_documents: Gauge,
    pub archive_size_bytes: Gauge,

    registry: Registry,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new(
                "docsearch_operations_total",
                "Completed operations by type and outcome",
            ),
            &["op", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_latency = HistogramVec::new(
            HistogramOpts::new("docsearch_operation_latency_seconds", "Operation latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["op"],
        )?;
        registry.register(Box::new(operation_latency.clone()))?;

        let total_documents = Gauge::with_opts(Opts::new(
            "docsearch_total_documents",
            "Current number of documents in the index",
        ))?;
        registry.register(Box::new(total_documents.clone()))?;

        let archive_size_bytes = Gauge::with_opts(Opts::new(
            "docsearch_archive_size_bytes",
            "Size of the stored field archive in bytes",
        ))?;
        registry.register(Box::new(archive_size_bytes.clone()))?;

        Ok(Self {
            operations_total,
            operation_latency,
            total_documents,
            archive_size_bytes,
            registry,
        })
    }

    /// Record one finished operation
    pub fn record(&self, op: Operation, outcome: Option<ErrorKind>, duration_secs: f64) {
        let outcome = outcome.map(|k| k.as_str()).unwrap_or("ok");
        self.operations_total
            .with_label_values(&[op.as_str(), outcome])
            .inc();
        self.operation_latency
            .with_label_values(&[op.as_str()])
            .observe(duration_secs);
    }

    pub fn set_index_stats(&self, documents: u64, archive_bytes: u64) {
        self.total_documents.set(documents as f64);
        self.archive_size_bytes.set(archive_bytes as f64);
    }

    /// Render every registered metric in the text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
