#![deny(missing_docs)]

//! Core library for the PDF upload and summarization server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Upload directory and document registry.
pub mod documents;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// PDF extraction, clustering, and summarization pipeline.
pub mod processing;
