use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing summarization activity.
#[derive(Default)]
pub struct PipelineMetrics {
    summaries_generated: AtomicU64,
    summaries_failed: AtomicU64,
    chunks_extracted: AtomicU64,
    // Zero until the first successful run.
    last_selected_chunks: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the chunks produced by one extraction run.
    pub fn record_extraction(&self, chunk_count: u64) {
        self.chunks_extracted
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a completed summary and the number of chunks it was built from.
    pub fn record_summary(&self, selected_chunks: u64) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
        self.last_selected_chunks
            .store(selected_chunks, Ordering::Relaxed);
    }

    /// Record a pipeline run that ended in an error.
    pub fn record_failure(&self) {
        self.summaries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let generated = self.summaries_generated.load(Ordering::Relaxed);
        MetricsSnapshot {
            summaries_generated: generated,
            summaries_failed: self.summaries_failed.load(Ordering::Relaxed),
            chunks_extracted: self.chunks_extracted.load(Ordering::Relaxed),
            last_selected_chunks: (generated > 0)
                .then(|| self.last_selected_chunks.load(Ordering::Relaxed)),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Summaries produced since startup.
    pub summaries_generated: u64,
    /// Pipeline runs that failed since startup.
    pub summaries_failed: u64,
    /// Total chunks produced by text extraction across all runs.
    pub chunks_extracted: u64,
    /// Chunks handed to the summarizer by the most recent successful run.
    pub last_selected_chunks: Option<u64>,
}
