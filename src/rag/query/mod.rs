//! Query optimization: turns free text into a search expression
pub mod lexicon;
pub mod optimizer;

pub use lexicon::Lexicon;
pub use optimizer::{QueryOptimizer, DEFAULT_MAX_TERMS, OR_OPERATOR};
