//! Bounded TTL/LRU caching
//!
//! One generic store, instantiated twice by the pipeline:
//! - retrieval tier: raw provider hit lists keyed by search expression
//! - response tier: fully formatted answers keyed by normalized query text
//!
//! Both tiers share a [`Clock`] so expiry can be driven deterministically in tests.

pub mod clock;
pub mod key;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::generate_key;
pub use ttl::{CacheStats, TtlCache};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizing and lifetimes for both cache tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries per tier
    pub capacity: usize,
    /// Lifetime of cached provider hit lists
    pub retrieval_ttl_secs: u64,
    /// Lifetime of generated answers
    pub response_ttl_secs: u64,
    /// Lifetime of "nothing relevant" answers
    pub no_results_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            retrieval_ttl_secs: 300,
            response_ttl_secs: 3600,
            no_results_ttl_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn retrieval_ttl(&self) -> Duration {
        Duration::from_secs(self.retrieval_ttl_secs)
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }

    pub fn no_results_ttl(&self) -> Duration {
        Duration::from_secs(self.no_results_ttl_secs)
    }
}
