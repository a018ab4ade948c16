//! Stateless query-to-expression transformation
use std::collections::HashSet;

use crate::rag::query::lexicon::{fold, Lexicon};

/// Default cap on terms in an optimized expression
pub const DEFAULT_MAX_TERMS: usize = 8;

/// Operator joining expression terms
pub const OR_OPERATOR: &str = " OR ";

/// Normalizes, filters and expands user queries
#[derive(Debug, Clone)]
pub struct QueryOptimizer {
    lexicon: Lexicon,
    max_terms: usize,
}

impl QueryOptimizer {
    /// Optimizer with the corporate lexicon and default term cap
    pub fn new() -> Self {
        Self::with_lexicon(Lexicon::corporate(), DEFAULT_MAX_TERMS)
    }

    pub fn with_lexicon(lexicon: Lexicon, max_terms: usize) -> Self {
        Self {
            lexicon,
            max_terms: max_terms.max(1),
        }
    }

    pub fn max_terms(&self) -> usize {
        self.max_terms
    }

    /// Build the search expression for `query`
    ///
    /// Returns an empty string when nothing searchable remains; callers must
    /// skip retrieval in that case.
    pub fn optimize(&self, query: &str) -> String {
        self.terms(query).join(OR_OPERATOR)
    }

    /// Ordered, deduplicated, capped terms for `query`
    pub fn terms(&self, query: &str) -> Vec<String> {
        let folded = fold(query);
        let cleaned: String = folded
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect();

        let tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|token| !self.lexicon.is_stopword(token))
            .collect();

        if tokens.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for token in tokens {
            let expanded = std::iter::once(token)
                .chain(self.lexicon.synonyms(token).iter().map(String::as_str));
            for term in expanded {
                if seen.insert(term.to_string()) {
                    terms.push(term.to_string());
                }
            }
        }

        terms.truncate(self.max_terms);
        terms
    }
}

impl Default for QueryOptimizer {
    fn default() -> Self {
        Self::new()
    }
}
