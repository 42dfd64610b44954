//! Summary pipeline coordinating extraction, clustering, and the summarization chains.

use crate::{
    config::{Config, LengthUnit},
    embedding::{EmbeddingClient, get_embedding_client},
    llm::{LlmClient, get_llm_client},
    metrics::{MetricsSnapshot, PipelineMetrics},
    processing::{
        chunking::TextSplitter,
        clustering::ClusteringFilter,
        extraction::{Extraction, extract_directory, extract_files},
        summarize::strategy::summarize_with_fallback,
        types::{
            ChainType, ChunkingError, ClusteringError, ExtractionError, PipelineError,
            SummaryOutcome,
        },
    },
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tunables for one pipeline instance, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum chunk length in `length_unit`.
    pub chunk_size: usize,
    /// Tail of the previous chunk carried into the next one.
    pub chunk_overlap: usize,
    /// How chunk length is measured.
    pub length_unit: LengthUnit,
    /// Model name used to pick a tokenizer when measuring in tokens.
    pub tokenizer_model: String,
    /// Redundancy filter applied before summarizing.
    pub clustering: ClusteringFilter,
    /// Primary summarization chain.
    pub chain_type: ChainType,
    /// Chain tried once when the primary chain fails.
    pub fallback_chain_type: Option<ChainType>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 0,
            length_unit: LengthUnit::Chars,
            tokenizer_model: String::new(),
            clustering: ClusteringFilter::default(),
            chain_type: ChainType::Refine,
            fallback_chain_type: None,
        }
    }
}

impl PipelineSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            length_unit: config.text_splitter_length_unit,
            tokenizer_model: config.llm_model.clone(),
            clustering: ClusteringFilter {
                num_clusters: config.cluster_count,
                seed: config.cluster_seed,
                sorted: config.cluster_sorted,
            },
            chain_type: config.summary_chain_type,
            fallback_chain_type: config.summary_fallback_chain_type,
        }
    }
}

/// Runs the full summarization pipeline: PDF text extraction, embedding-based clustering, and
/// the configured LLM chain.
///
/// The embedding and LLM clients are built once and reused for every request. Construct the
/// pipeline near process start and share it through an `Arc`.
pub struct SummaryPipeline {
    embedder: Box<dyn EmbeddingClient>,
    llm: Box<dyn LlmClient>,
    splitter: TextSplitter,
    settings: PipelineSettings,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait SummarizeApi: Send + Sync {
    /// Summarize every PDF directly inside `dir`.
    async fn summarize_directory(&self, dir: &Path) -> Result<SummaryOutcome, PipelineError>;

    /// Summarize exactly the given PDFs.
    async fn summarize_files(&self, files: Vec<PathBuf>)
    -> Result<SummaryOutcome, PipelineError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl SummaryPipeline {
    /// Assemble a pipeline from explicit providers.
    pub fn new(
        embedder: Box<dyn EmbeddingClient>,
        llm: Box<dyn LlmClient>,
        settings: PipelineSettings,
    ) -> Result<Self, ChunkingError> {
        let splitter = TextSplitter::new(
            settings.chunk_size,
            settings.chunk_overlap,
            settings.length_unit,
            &settings.tokenizer_model,
        )?;
        tracing::debug!(
            chunk_size = settings.chunk_size,
            overlap = settings.chunk_overlap,
            unit = ?settings.length_unit,
            clusters = settings.clustering.num_clusters,
            chain = %settings.chain_type,
            "Summary pipeline configured"
        );
        Ok(Self {
            embedder,
            llm,
            splitter,
            settings,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    /// Build a pipeline with the providers and settings named by `config`.
    pub fn from_config(config: &Config) -> Result<Self, ChunkingError> {
        tracing::info!("Initializing embedding and LLM clients");
        let embedder = get_embedding_client(config);
        let llm = get_llm_client(config);
        Self::new(embedder, llm, PipelineSettings::from_config(config))
    }

    /// Summarize every PDF directly inside `dir`.
    pub async fn summarize_directory(&self, dir: &Path) -> Result<SummaryOutcome, PipelineError> {
        tracing::info!(dir = %dir.display(), "Summarizing directory");
        let splitter = self.splitter.clone();
        let dir = dir.to_path_buf();
        let extraction = tokio::task::spawn_blocking(move || extract_directory(&dir, &splitter))
            .await
            .map_err(|error| ExtractionError::Task(error.to_string()));
        let result = match extraction {
            Ok(Ok(extraction)) => self.summarize_extraction(extraction).await,
            Ok(Err(error)) | Err(error) => Err(error.into()),
        };
        self.finish(result)
    }

    /// Summarize exactly the given PDFs.
    pub async fn summarize_files(
        &self,
        files: Vec<PathBuf>,
    ) -> Result<SummaryOutcome, PipelineError> {
        tracing::info!(files = files.len(), "Summarizing files");
        let splitter = self.splitter.clone();
        let extraction = tokio::task::spawn_blocking(move || extract_files(&files, &splitter))
            .await
            .map_err(|error| ExtractionError::Task(error.to_string()));
        let result = match extraction {
            Ok(Ok(extraction)) => self.summarize_extraction(extraction).await,
            Ok(Err(error)) | Err(error) => Err(error.into()),
        };
        self.finish(result)
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn summarize_extraction(
        &self,
        extraction: Extraction,
    ) -> Result<SummaryOutcome, PipelineError> {
        let Extraction {
            documents,
            pages,
            chunks,
        } = extraction;
        self.metrics.record_extraction(chunks.len() as u64);
        if chunks.is_empty() {
            return Err(PipelineError::NoText);
        }

        let chunk_count = chunks.len();
        let selected = match self
            .settings
            .clustering
            .filter(chunks.clone(), self.embedder.as_ref())
            .await
        {
            Ok(selected) => selected,
            Err(ClusteringError::NotEnoughChunks { chunks: found, clusters }) => {
                tracing::warn!(
                    chunks = found,
                    clusters,
                    "Too few chunks to cluster; summarizing all chunks"
                );
                chunks
            }
            Err(error) => return Err(error.into()),
        };

        let selected_chunks = selected.len();
        let texts: Vec<String> = selected.into_iter().map(|chunk| chunk.text).collect();
        let result = summarize_with_fallback(
            &texts,
            self.llm.as_ref(),
            self.settings.chain_type,
            self.settings.fallback_chain_type,
        )
        .await?;

        Ok(SummaryOutcome {
            summary: result.summary,
            documents,
            pages,
            chunks: chunk_count,
            selected_chunks,
            chain_type: result.chain_type,
        })
    }

    fn finish(
        &self,
        result: Result<SummaryOutcome, PipelineError>,
    ) -> Result<SummaryOutcome, PipelineError> {
        match &result {
            Ok(outcome) => {
                self.metrics.record_summary(outcome.selected_chunks as u64);
                tracing::info!(
                    documents = outcome.documents,
                    pages = outcome.pages,
                    chunks = outcome.chunks,
                    selected = outcome.selected_chunks,
                    chain = %outcome.chain_type,
                    "Summary generated"
                );
            }
            Err(error) => {
                self.metrics.record_failure();
                tracing::error!(error = %error, "Summarization pipeline failed");
            }
        }
        result
    }
}

#[async_trait]
impl SummarizeApi for SummaryPipeline {
    async fn summarize_directory(&self, dir: &Path) -> Result<SummaryOutcome, PipelineError> {
        SummaryPipeline::summarize_directory(self, dir).await
    }

    async fn summarize_files(
        &self,
        files: Vec<PathBuf>,
    ) -> Result<SummaryOutcome, PipelineError> {
        SummaryPipeline::summarize_files(self, files).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        SummaryPipeline::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingClientError;
    use crate::processing::extraction::test_pdf::write_pdf;
    use crate::processing::summarize::test_llm::RecordingLlm;
    use tempfile::tempdir;

    /// Embeds each text as (length, byte sum, 1) so distinct chunks get distinct vectors.
    struct ShapeEmbedder;

    #[async_trait]
    impl EmbeddingClient for ShapeEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(texts
                .iter()
                .map(|text| {
                    let sum: u32 = text.bytes().map(u32::from).sum();
                    vec![text.len() as f32, (sum % 97) as f32, 1.0]
                })
                .collect())
        }
    }

    fn pipeline(settings: PipelineSettings) -> SummaryPipeline {
        SummaryPipeline::new(
            Box::new(ShapeEmbedder),
            Box::new(RecordingLlm::default()),
            settings,
        )
        .expect("pipeline")
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let pipeline = pipeline(PipelineSettings::default());

        let error = pipeline
            .summarize_directory(dir.path())
            .await
            .expect_err("no documents");

        assert!(matches!(
            error,
            PipelineError::Extraction(ExtractionError::NoDocuments(_))
        ));
        assert_eq!(pipeline.metrics_snapshot().summaries_failed, 1);
        assert_eq!(pipeline.metrics_snapshot().summaries_generated, 0);
    }

    #[tokio::test]
    async fn single_small_pdf_is_summarized_without_clustering() {
        let dir = tempdir().expect("tempdir");
        write_pdf(&dir.path().join("note.pdf"), &["A short note about rust."]);
        let pipeline = pipeline(PipelineSettings::default());

        let outcome = pipeline
            .summarize_directory(dir.path())
            .await
            .expect("summary");

        assert_eq!(outcome.summary, "summary-1");
        assert_eq!(outcome.documents, 1);
        assert_eq!(outcome.chunks, 1);
        assert_eq!(outcome.selected_chunks, 1);
        assert_eq!(outcome.chain_type, ChainType::Refine);
        let metrics = pipeline.metrics_snapshot();
        assert_eq!(metrics.summaries_generated, 1);
        assert_eq!(metrics.chunks_extracted, 1);
        assert_eq!(metrics.last_selected_chunks, Some(1));
    }

    #[tokio::test]
    async fn many_chunks_are_reduced_to_one_per_cluster() {
        let dir = tempdir().expect("tempdir");
        write_pdf(
            &dir.path().join("long.pdf"),
            &[
                "alpha beta gamma delta epsilon zeta",
                "eta theta iota kappa lambda mu",
                "nu xi omicron pi rho sigma tau",
            ],
        );
        let settings = PipelineSettings {
            chunk_size: 12,
            clustering: ClusteringFilter {
                num_clusters: 3,
                ..ClusteringFilter::default()
            },
            chain_type: ChainType::Stuff,
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(settings);

        let outcome = pipeline
            .summarize_directory(dir.path())
            .await
            .expect("summary");

        assert!(outcome.chunks > 3);
        assert_eq!(outcome.selected_chunks, 3);
        assert_eq!(outcome.pages, 3);
        assert_eq!(outcome.chain_type, ChainType::Stuff);
    }

    #[tokio::test]
    async fn summarize_files_reads_only_the_named_documents() {
        let dir = tempdir().expect("tempdir");
        let wanted = dir.path().join("wanted.pdf");
        write_pdf(&wanted, &["Only this one."]);
        write_pdf(&dir.path().join("other.pdf"), &["Not this one."]);
        let pipeline = pipeline(PipelineSettings::default());

        let outcome = pipeline
            .summarize_files(vec![wanted])
            .await
            .expect("summary");

        assert_eq!(outcome.documents, 1);
        assert_eq!(outcome.pages, 1);
    }

    #[tokio::test]
    async fn llm_failure_is_counted() {
        let dir = tempdir().expect("tempdir");
        write_pdf(&dir.path().join("note.pdf"), &["Some text."]);
        let pipeline = SummaryPipeline::new(
            Box::new(ShapeEmbedder),
            Box::new(RecordingLlm::failing()),
            PipelineSettings::default(),
        )
        .expect("pipeline");

        let error = pipeline
            .summarize_directory(dir.path())
            .await
            .expect_err("llm failure");

        assert!(matches!(error, PipelineError::Summarize(_)));
        assert_eq!(pipeline.metrics_snapshot().summaries_failed, 1);
    }

    #[test]
    fn zero_chunk_size_is_rejected_at_construction() {
        let settings = PipelineSettings {
            chunk_size: 0,
            ..PipelineSettings::default()
        };
        let result = SummaryPipeline::new(
            Box::new(ShapeEmbedder),
            Box::new(RecordingLlm::default()),
            settings,
        );
        assert!(matches!(result, Err(ChunkingError::InvalidChunkSize)));
    }
}
