//! Maps provider-specific raw scores onto `[0.0, 1.0]`
use serde::{Deserialize, Serialize};

/// Which direction of raw score means a better match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
    /// SQLite FTS5 `bm25()` style: more negative is better
    LowerIsBetter,
    /// Lucene/Tantivy style: larger is better
    HigherIsBetter,
}

/// Score normalization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationPolicy {
    pub order: ScoreOrder,
    /// Match strength below which a set of identical scores counts as weak
    ///
    /// Strength is the raw score oriented so larger is better (negated for
    /// `LowerIsBetter`).
    pub weak_match_strength: f64,
    /// Score assigned to every document of a weak identical-score set
    pub weak_match_score: f64,
}

impl Default for NormalizationPolicy {
    fn default() -> Self {
        Self {
            order: ScoreOrder::LowerIsBetter,
            weak_match_strength: 1e-6,
            weak_match_score: 0.1,
        }
    }
}

impl NormalizationPolicy {
    fn strength(&self, raw: f64) -> f64 {
        match self.order {
            ScoreOrder::LowerIsBetter => -raw,
            ScoreOrder::HigherIsBetter => raw,
        }
    }

    /// Normalize `raw` scores, preserving positions
    ///
    /// The best raw score maps to `1.0` and the worst to `0.0`. When every
    /// score is identical there is no spread to rescale, so the whole set maps
    /// to `1.0`, or to `weak_match_score` if the shared strength is weak.
    pub fn normalize(&self, raw: &[f64]) -> Vec<f64> {
        if raw.is_empty() {
            return Vec::new();
        }

        let strengths: Vec<f64> = raw.iter().map(|&s| self.strength(s)).collect();
        let min = strengths.iter().copied().fold(f64::INFINITY, f64::min);
        let max = strengths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;

        if spread <= f64::EPSILON * max.abs().max(1.0) {
            let score = if max < self.weak_match_strength {
                self.weak_match_score.clamp(0.0, 1.0)
            } else {
                1.0
            };
            return vec![score; raw.len()];
        }

        strengths
            .iter()
            .map(|s| ((s - min) / spread).clamp(0.0, 1.0))
            .collect()
    }
}
