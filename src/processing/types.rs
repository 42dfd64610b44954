//! Core data types and error definitions for the summarization pipeline.

use crate::{embedding::EmbeddingClientError, llm::LlmError};
use anyhow::Error as TokenizerError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// A bounded segment of extracted PDF text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Chunk contents.
    pub text: String,
    /// PDF the chunk was extracted from.
    pub source: PathBuf,
    /// 1-based page number within `source`.
    pub page: u32,
}

/// Strategy used to combine several texts into one summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainType {
    /// Concatenate everything and summarize once.
    Stuff,
    /// Summarize the first text, then refine the running summary with each following text.
    Refine,
    /// Summarize each text independently, then summarize the summaries.
    MapReduce,
}

impl ChainType {
    /// Wire/config name of the strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stuff => "stuff",
            Self::Refine => "refine",
            Self::MapReduce => "map_reduce",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stuff" => Ok(Self::Stuff),
            "refine" => Ok(Self::Refine),
            "map_reduce" | "map-reduce" | "mapreduce" => Ok(Self::MapReduce),
            _ => Err(()),
        }
    }
}

/// Errors produced while splitting page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Splitter configured with an impossible length budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model whose encoding we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors produced while loading PDFs and splitting their text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Directory listing or file access failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The PDF could not be parsed or its text could not be decoded.
    #[error("failed to parse PDF {path}: {source}")]
    Pdf {
        /// Offending document.
        path: PathBuf,
        /// Error reported by the PDF library.
        #[source]
        source: lopdf::Error,
    },
    /// The directory contains no PDF files.
    #[error("no PDF documents found in {0}")]
    NoDocuments(PathBuf),
    /// Splitting page text failed.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// The blocking extraction task panicked or was cancelled.
    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Errors produced while reducing chunks by embedding clusters.
#[derive(Debug, Error)]
pub enum ClusteringError {
    /// Zero clusters were requested.
    #[error("number of clusters must be greater than zero")]
    InvalidClusterCount,
    /// Fewer chunks than clusters.
    #[error("cannot form {clusters} clusters from {chunks} chunks")]
    NotEnoughChunks {
        /// Chunks supplied.
        chunks: usize,
        /// Clusters requested.
        clusters: usize,
    },
    /// Embedding provider failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Provider returned a different number of vectors than chunks.
    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCount {
        /// Number of chunks sent.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
    /// Provider returned vectors of differing length.
    #[error("embedding dimensions are inconsistent")]
    DimensionMismatch,
    /// The k-means fit was rejected or failed.
    #[error("k-means failed: {0}")]
    KMeans(#[from] linfa_clustering::KMeansError),
    /// The blocking k-means task panicked or was cancelled.
    #[error("clustering task failed: {0}")]
    Task(String),
}

/// Errors produced by the summarization chains.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Nothing to summarize.
    #[error("no texts to summarize")]
    NoTexts,
    /// The language model call failed.
    #[error("{chain} chain failed: {source}")]
    Llm {
        /// Chain that was running.
        chain: ChainType,
        /// Underlying provider error.
        #[source]
        source: LlmError,
    },
}

/// Errors emitted by the end-to-end summarization pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading or splitting PDFs failed.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// PDFs were readable but contained no extractable text.
    #[error("No extractable text found in the supplied documents")]
    NoText,
    /// Clustering failed.
    #[error("Failed to cluster text: {0}")]
    Clustering(#[from] ClusteringError),
    /// Summarization failed.
    #[error("Failed to summarize text: {0}")]
    Summarize(#[from] SummarizeError),
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    /// Generated summary.
    pub summary: String,
    /// Number of PDFs read.
    pub documents: usize,
    /// Number of pages read across all PDFs.
    pub pages: usize,
    /// Number of chunks produced by the splitter.
    pub chunks: usize,
    /// Number of chunks handed to the summarizer.
    pub selected_chunks: usize,
    /// Chain that produced `summary` (the fallback when it was used).
    pub chain_type: ChainType,
}
