//! Summarization chains over an [`LlmClient`].
//!
//! - `stuff`: one call over all texts joined by blank lines.
//! - `refine`: one call per text, carrying a running summary forward.
//! - `map_reduce`: one call per text (issued concurrently), then one call over the partial
//!   summaries.

mod prompts;
pub(crate) mod strategy;

use super::types::{ChainType, SummarizeError};
use crate::llm::{LlmClient, LlmError};
use futures_util::future::try_join_all;

/// Summarize `texts` with the given chain strategy.
pub async fn summarize_texts(
    texts: &[String],
    llm: &dyn LlmClient,
    chain: ChainType,
) -> Result<String, SummarizeError> {
    let Some((first, rest)) = texts.split_first() else {
        return Err(SummarizeError::NoTexts);
    };

    tracing::info!(chain = %chain, texts = texts.len(), "Summarizing texts using LLM");
    let summary = match chain {
        ChainType::Stuff => stuff(texts, llm).await,
        ChainType::Refine => refine(first, rest, llm).await,
        ChainType::MapReduce => map_reduce(texts, llm).await,
    }
    .map_err(|source| SummarizeError::Llm { chain, source })?;
    tracing::info!(chain = %chain, chars = summary.len(), "Text summarization completed");
    Ok(summary)
}

async fn stuff(texts: &[String], llm: &dyn LlmClient) -> Result<String, LlmError> {
    llm.generate(&prompts::concise_summary(&texts.join("\n\n"))).await
}

async fn refine(first: &str, rest: &[String], llm: &dyn LlmClient) -> Result<String, LlmError> {
    let mut summary = llm.generate(&prompts::concise_summary(first)).await?;
    for (step, text) in rest.iter().enumerate() {
        tracing::debug!(step = step + 1, of = rest.len(), "Refining summary");
        summary = llm.generate(&prompts::refine_summary(&summary, text)).await?;
    }
    Ok(summary)
}

async fn map_reduce(texts: &[String], llm: &dyn LlmClient) -> Result<String, LlmError> {
    let requests: Vec<String> = texts
        .iter()
        .map(|text| prompts::concise_summary(text))
        .collect();
    let partials = try_join_all(requests.iter().map(|prompt| llm.generate(prompt))).await?;
    tracing::debug!(partials = partials.len(), "Combining partial summaries");
    llm.generate(&prompts::concise_summary(&partials.join("\n\n")))
        .await
}

#[cfg(test)]
pub(crate) mod test_llm {
    use crate::llm::{LlmClient, LlmError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and answers `summary-N` for the N-th call, optionally failing every call.
    #[derive(Default)]
    pub(crate) struct RecordingLlm {
        pub(crate) prompts: Mutex<Vec<String>>,
        pub(crate) fail: bool,
    }

    impl RecordingLlm {
        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }
    }

    #[async_trait]
    impl LlmClient for RecordingLlm {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let mut prompts = self.prompts.lock().expect("prompts lock");
            prompts.push(prompt.to_string());
            if self.fail {
                return Err(LlmError::GenerationFailed("scripted failure".into()));
            }
            Ok(format!("summary-{}", prompts.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_llm::RecordingLlm;
    use super::*;

    fn texts() -> Vec<String> {
        vec!["alpha".into(), "beta".into(), "gamma".into()]
    }

    #[tokio::test]
    async fn stuff_makes_a_single_call_with_all_texts() {
        let llm = RecordingLlm::default();
        let summary = summarize_texts(&texts(), &llm, ChainType::Stuff)
            .await
            .expect("summary");

        assert_eq!(summary, "summary-1");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("alpha\n\nbeta\n\ngamma"));
    }

    #[tokio::test]
    async fn refine_threads_the_running_summary() {
        let llm = RecordingLlm::default();
        let summary = summarize_texts(&texts(), &llm, ChainType::Refine)
            .await
            .expect("summary");

        assert_eq!(summary, "summary-3");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].contains("alpha"));
        assert!(prompts[1].contains("summary-1") && prompts[1].contains("beta"));
        assert!(prompts[2].contains("summary-2") && prompts[2].contains("gamma"));
    }

    #[tokio::test]
    async fn map_reduce_summarizes_each_text_then_the_partials() {
        let llm = RecordingLlm::default();
        let summary = summarize_texts(&texts(), &llm, ChainType::MapReduce)
            .await
            .expect("summary");

        assert_eq!(summary, "summary-4");
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 4);
        let reduce = &prompts[3];
        for partial in ["summary-1", "summary-2", "summary-3"] {
            assert!(reduce.contains(partial), "reduce prompt missing {partial}");
        }
    }

    #[tokio::test]
    async fn single_text_refine_makes_one_call() {
        let llm = RecordingLlm::default();
        summarize_texts(&["only".to_string()], &llm, ChainType::Refine)
            .await
            .expect("summary");
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let llm = RecordingLlm::default();
        let error = summarize_texts(&[], &llm, ChainType::Stuff)
            .await
            .expect_err("empty");
        assert!(matches!(error, SummarizeError::NoTexts));
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_names_the_chain() {
        let llm = RecordingLlm::failing();
        let error = summarize_texts(&texts(), &llm, ChainType::Refine)
            .await
            .expect_err("failure");
        assert!(matches!(
            error,
            SummarizeError::Llm {
                chain: ChainType::Refine,
                ..
            }
        ));
        assert_eq!(llm.prompts().len(), 1);
    }
}
