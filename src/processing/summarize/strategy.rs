//! Chain selection with a single fallback chain on failure.

use super::summarize_texts;
use crate::llm::LlmClient;
use crate::processing::types::{ChainType, SummarizeError};

/// Summary text and the chain that produced it.
pub(crate) struct StrategyResult {
    pub summary: String,
    pub chain_type: ChainType,
}

/// Run the primary chain and, if it fails and a distinct fallback is configured, the fallback.
///
/// The primary error is logged; when the fallback also fails its error is returned.
pub(crate) async fn summarize_with_fallback(
    texts: &[String],
    llm: &dyn LlmClient,
    primary: ChainType,
    fallback: Option<ChainType>,
) -> Result<StrategyResult, SummarizeError> {
    match summarize_texts(texts, llm, primary).await {
        Ok(summary) => Ok(StrategyResult {
            summary,
            chain_type: primary,
        }),
        Err(error @ SummarizeError::NoTexts) => Err(error),
        Err(error) => match fallback.filter(|chain| *chain != primary) {
            Some(chain) => {
                tracing::warn!(
                    error = %error,
                    primary = %primary,
                    fallback = %chain,
                    "Summarization chain failed; retrying with fallback chain"
                );
                let summary = summarize_texts(texts, llm, chain).await?;
                Ok(StrategyResult {
                    summary,
                    chain_type: chain,
                })
            }
            None => Err(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails any prompt that starts with the refine preamble.
    struct RefineRejectingLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for RefineRejectingLlm {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.starts_with("Your job is to produce a final summary") {
                return Err(LlmError::GenerationFailed("context window exceeded".into()));
            }
            Ok("stuffed summary".into())
        }
    }

    fn texts() -> Vec<String> {
        vec!["one".into(), "two".into()]
    }

    #[tokio::test]
    async fn fallback_chain_is_used_when_primary_fails() {
        let llm = RefineRejectingLlm {
            calls: AtomicUsize::new(0),
        };
        let result =
            summarize_with_fallback(&texts(), &llm, ChainType::Refine, Some(ChainType::Stuff))
                .await
                .expect("fallback summary");

        assert_eq!(result.chain_type, ChainType::Stuff);
        assert_eq!(result.summary, "stuffed summary");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn without_fallback_the_primary_error_propagates() {
        let llm = RefineRejectingLlm {
            calls: AtomicUsize::new(0),
        };
        let error = summarize_with_fallback(&texts(), &llm, ChainType::Refine, None)
            .await
            .err()
            .expect("error");
        assert!(matches!(
            error,
            SummarizeError::Llm {
                chain: ChainType::Refine,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fallback_identical_to_primary_is_not_retried() {
        let llm = RefineRejectingLlm {
            calls: AtomicUsize::new(0),
        };
        let outcome =
            summarize_with_fallback(&texts(), &llm, ChainType::Refine, Some(ChainType::Refine))
                .await;
        assert!(outcome.is_err());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }
}
