//! Prompt templates for the summarization chains.

/// Prompt asking for a concise summary of `text`. Used by `stuff`, the first `refine` step,
/// and both phases of `map_reduce`.
pub(crate) fn concise_summary(text: &str) -> String {
    format!("Write a concise summary of the following text:\n\n\n\"{text}\"\n\n\nCONCISE SUMMARY:")
}

/// Prompt asking the model to fold `text` into an `existing` summary.
pub(crate) fn refine_summary(existing: &str, text: &str) -> String {
    format!(
        "Your job is to produce a final summary.\n\
         Here is the summary so far: {existing}\n\
         Below is more context that may improve it.\n\
         ------------\n\
         {text}\n\
         ------------\n\
         Using the new context, refine the summary so far. \
         If the context adds nothing useful, return the summary so far unchanged."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_their_inputs() {
        let concise = concise_summary("PAGE TEXT");
        assert!(concise.contains("\"PAGE TEXT\""));
        assert!(concise.ends_with("CONCISE SUMMARY:"));

        let refine = refine_summary("OLD SUMMARY", "NEW CONTEXT");
        assert!(refine.contains("OLD SUMMARY"));
        assert!(refine.contains("------------\nNEW CONTEXT\n------------"));
    }
}
