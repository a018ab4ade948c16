// Context builder: packs ranked snippets into a token budget
use serde::{Deserialize, Serialize};

use crate::rag::tokens::TokenCounter;
use crate::rag::types::{ScoredDocument, SourceRef};

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum estimated tokens of retrieved context
    pub token_budget: usize,
    /// Smallest remainder worth filling with a truncated document
    pub min_usable_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_budget: 1500,
            min_usable_tokens: 50,
        }
    }
}

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledContext {
    /// The formatted context text
    pub text: String,
    /// Documents that contributed text, in order
    pub documents: Vec<ScoredDocument>,
    /// Estimated token count of `text`
    pub estimated_tokens: usize,
    /// Whether the last document was cut to fit
    pub truncated: bool,
}

impl AssembledContext {
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Citations for the documents actually used
    pub fn sources(&self) -> Vec<SourceRef> {
        self.documents.iter().map(SourceRef::from).collect()
    }
}

/// Greedy context packer
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    counter: TokenCounter,
}

impl ContextBuilder {
    /// Create with custom configuration
    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            counter: TokenCounter::new(),
        }
    }

    /// Pack `documents` in order until the budget is spent
    ///
    /// A document that would overflow is cut to fill the remainder exactly,
    /// provided the remainder exceeds `min_usable_tokens`; either way packing
    /// stops there.
    pub fn build(&self, documents: &[ScoredDocument]) -> AssembledContext {
        let budget = self.config.token_budget;
        let mut text = String::new();
        let mut used_tokens = 0;
        let mut used = Vec::new();
        let mut truncated = false;

        for (idx, doc) in documents.iter().enumerate() {
            let mut piece = String::new();
            if idx > 0 {
                piece.push_str("\n\n");
            }
            piece.push_str(&Self::format_document(idx + 1, doc));

            let cost = self.counter.estimate(&piece);
            if used_tokens + cost <= budget {
                text.push_str(&piece);
                used_tokens += cost;
                used.push(doc.clone());
                continue;
            }

            let remaining = budget - used_tokens;
            if remaining > self.config.min_usable_tokens {
                let cut = self.counter.truncate(&piece, remaining);
                text.push_str(cut);
                used_tokens += self.counter.estimate(cut);
                used.push(doc.clone());
                truncated = true;
            }
            break;
        }

        AssembledContext {
            text,
            documents: used,
            estimated_tokens: used_tokens,
            truncated,
        }
    }

    /// Format a single document
    fn format_document(index: usize, doc: &ScoredDocument) -> String {
        if doc.category.is_empty() {
            format!("[Documento {}] {}\n{}", index, doc.title, doc.snippet)
        } else {
            format!(
                "[Documento {}] {} ({})\n{}",
                index, doc.title, doc.category, doc.snippet
            )
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}
