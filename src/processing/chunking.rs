//! Length-bounded semantic splitting of page text.
//!
//! Page text is split with `semchunk-rs`, which recurses through progressively finer
//! separators (blank lines, newlines, sentence punctuation, whitespace, characters) until every
//! segment fits the budget. Length is measured either in characters (the default, 2000 per
//! chunk) or in `tiktoken` tokens for callers that want to budget against an LLM context.
//! An optional overlap prepends the tail of the previous chunk to the next one.

use crate::config::LengthUnit;
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

use super::types::ChunkingError;

pub(crate) type LengthCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Splitter settings shared by every page of one extraction run.
#[derive(Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
    counter: LengthCounter,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("chunk_size", &self.chunk_size)
            .field("overlap", &self.overlap)
            .finish_non_exhaustive()
    }
}

impl TextSplitter {
    /// Build a splitter. `model` selects the tokenizer when `unit` is [`LengthUnit::Tokens`].
    pub fn new(
        chunk_size: usize,
        overlap: usize,
        unit: LengthUnit,
        model: &str,
    ) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        let counter = match unit {
            LengthUnit::Chars => char_counter(),
            LengthUnit::Tokens => build_tiktoken_counter(model)?,
        };
        Ok(Self {
            chunk_size,
            overlap,
            counter,
        })
    }

    /// Split `text` into chunks no longer than the configured size.
    ///
    /// Returns an empty vector when the input is all whitespace.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        chunk_text_with_counter(text, self.chunk_size, self.overlap, self.counter.clone())
    }
}

fn char_counter() -> LengthCounter {
    Arc::new(|segment: &str| segment.chars().count())
}

fn build_tiktoken_counter(model: &str) -> Result<LengthCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            if let Some(candidate) = encoding_from_name(model) {
                candidate
            } else {
                tracing::debug!(
                    model,
                    "Falling back to 'cl100k_base' encoding for token counting"
                );
                cl100k_base()
            }
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

fn chunk_text_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: LengthCounter,
) -> Vec<String> {
    let counter_for_chunker = counter.clone();
    let chunker = Chunker::new(
        chunk_size,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let base_chunks = enforce_budget(chunker.chunk(text), chunk_size, &counter);
    let overlapped = apply_overlap(base_chunks, chunk_size, overlap, &counter);
    enforce_budget(overlapped, chunk_size, &counter)
}

/// Re-split any chunk longer than `chunk_size`, cutting at the last whitespace that fits and
/// falling back to a character cut for a single oversized word.
///
/// `semchunk` re-joins merged splits with their separators, which can push a chunk past the
/// budget.
fn enforce_budget(
    chunks: Vec<String>,
    chunk_size: usize,
    counter: &LengthCounter,
) -> Vec<String> {
    let mut bounded = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let mut rest = chunk.trim();
        while !rest.is_empty() {
            if counter.as_ref()(rest) <= chunk_size {
                bounded.push(rest.to_string());
                break;
            }
            let (head, tail) = rest.split_at(split_point(rest, chunk_size, counter));
            bounded.push(head.trim_end().to_string());
            rest = tail.trim_start();
        }
    }
    bounded
}

/// Byte offset of the longest prefix of `text` that fits `limit`. Always at least one character.
fn split_point(text: &str, limit: usize, counter: &LengthCounter) -> usize {
    let mut best = None;
    for (offset, ch) in text.char_indices().skip(1) {
        if !ch.is_whitespace() {
            continue;
        }
        if counter.as_ref()(text[..offset].trim_end()) <= limit {
            best = Some(offset);
        } else {
            break;
        }
    }
    if let Some(offset) = best {
        return offset;
    }

    let mut cut = text.chars().next().map_or(text.len(), char::len_utf8);
    for (offset, _) in text.char_indices().skip(1) {
        if counter.as_ref()(&text[..offset]) <= limit {
            cut = offset;
        } else {
            break;
        }
    }
    cut
}

/// Prefix each chunk with up to `overlap` units from the end of the previous chunk, trimming
/// from the front so the result never exceeds `chunk_size`.
fn apply_overlap(
    chunks: Vec<String>,
    chunk_size: usize,
    overlap: usize,
    counter: &LengthCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(chunk_size.saturating_sub(1));
    if chunks.len() < 2 || effective_overlap == 0 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;

    for current in chunks {
        let next = match previous.as_deref() {
            Some(prev) => {
                build_overlapped_chunk(prev, &current, effective_overlap, chunk_size, counter)
            }
            None => current.clone(),
        };
        overlapped.push(next);
        previous = Some(current);
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &LengthCounter,
) -> String {
    let tail = longest_suffix_within(previous, overlap, counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);

    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
    }

    combined.push_str(current);
    longest_suffix_within(&combined, chunk_size, counter).to_string()
}

/// Longest whitespace-trimmed suffix of `text` whose length is at most `limit`.
fn longest_suffix_within<'a>(text: &'a str, limit: usize, counter: &LengthCounter) -> &'a str {
    if limit == 0 {
        return "";
    }

    let trimmed_text = text.trim_start();
    if counter.as_ref()(trimmed_text) <= limit {
        return trimmed_text;
    }

    for (offset, _) in text.char_indices().skip(1) {
        let candidate = text[offset..].trim_start();
        if counter.as_ref()(candidate) <= limit {
            return candidate;
        }
    }

    ""
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_counter() -> LengthCounter {
        Arc::new(|segment: &str| segment.split_whitespace().count())
    }

    #[test]
    fn chunk_text_respects_chunk_size_with_word_counter() {
        let text = "one two three four five";
        let chunks = chunk_text_with_counter(text, 2, 0, word_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn chunk_text_applies_overlap() {
        let text = "one two three four five";
        let counter = word_counter();
        let chunks = chunk_text_with_counter(text, 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two three", "three four five"]);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 3);
        }
    }

    #[test]
    fn char_splitter_keeps_every_chunk_within_budget() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let text = format!("{paragraph}\n\n{paragraph}");
        let splitter = TextSplitter::new(200, 0, LengthUnit::Chars, "").expect("splitter");
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
        }
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn merged_words_are_cut_back_to_the_budget() {
        let splitter = TextSplitter::new(12, 0, LengthUnit::Chars, "").expect("splitter");
        let chunks = splitter.split("alpha beta gamma delta");

        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 12), "{chunks:?}");
        assert_eq!(chunks.join(" "), "alpha beta gamma delta");
    }

    #[test]
    fn oversized_word_is_cut_by_characters() {
        let counter = char_counter();
        let chunks = enforce_budget(vec!["abcdefghij xy".to_string()], 4, &counter);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn overlapped_chunks_stay_within_budget() {
        let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        let splitter = TextSplitter::new(50, 15, LengthUnit::Chars, "").expect("splitter");
        let chunks = splitter.split(&paragraph);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(2000, 0, LengthUnit::Chars, "").expect("splitter");
        assert_eq!(splitter.split("Hello World!"), vec!["Hello World!"]);
    }

    #[test]
    fn whitespace_only_text_yields_no_chunks() {
        let splitter = TextSplitter::new(2000, 0, LengthUnit::Chars, "").expect("splitter");
        assert!(splitter.split(" \n\t ").is_empty());
        assert!(splitter.split("").is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = TextSplitter::new(0, 0, LengthUnit::Chars, "").unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn token_splitter_uses_tiktoken_budget() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let splitter =
            TextSplitter::new(5, 0, LengthUnit::Tokens, "gemini-2.0-flash").expect("splitter");
        let chunks = splitter.split(text);
        let counter = build_tiktoken_counter("cl100k_base").expect("counter");
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 5);
        }
        let chunk_words: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original_words: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(chunk_words, original_words);
    }
}
