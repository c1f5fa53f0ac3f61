//! Token counting under the embedding model's tokenizer.

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::error::{Result, WaypointError};

/// Counts tokens with the BPE tokenizer of a given embedding model.
///
/// The same counter instance must be used for chunk-size measurement and
/// validation; mixing tokenizers makes chunk sizes drift relative to the
/// model's real limit.
///
/// # Example
///
/// ```rust,ignore
/// use waypoint_rag::TokenCounter;
///
/// let counter = TokenCounter::for_model("text-embedding-ada-002")?;
/// assert!(counter.count("Bahnhofstrasse") > 0);
/// ```
#[derive(Clone)]
pub struct TokenCounter {
    bpe: Arc<CoreBPE>,
}

impl TokenCounter {
    /// Create a counter for the tokenizer used by `model`.
    ///
    /// # Errors
    ///
    /// Returns [`WaypointError::Tokenizer`] when no tokenizer is known for
    /// the model name.
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| WaypointError::Tokenizer(format!("no tokenizer for '{model}': {e}")))?;
        Ok(Self { bpe: Arc::new(bpe) })
    }

    /// Count the tokens in `text`. Deterministic for a given model.
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter").finish_non_exhaustive()
    }
}
