//! Summarization pipeline: PDF extraction, chunking, clustering, and LLM chains.

pub mod chunking;
pub mod clustering;
pub mod extraction;
mod service;
pub mod summarize;
pub mod types;

pub use clustering::ClusteringFilter;
pub use service::{PipelineSettings, SummarizeApi, SummaryPipeline};
pub use types::{
    ChainType, ChunkingError, ClusteringError, ExtractionError, PipelineError, SummarizeError,
    SummaryOutcome, TextChunk,
};
