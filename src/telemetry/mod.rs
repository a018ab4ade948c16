//! Pipeline telemetry
//!
//! Collects per-request outcome events and aggregate counters for the
//! operational metrics surface.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Recent events kept for inspection
const MAX_RECENT_EVENTS: usize = 256;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    CacheHit {
        timestamp: Instant,
    },
    RetrievalCompleted {
        duration_ms: u64,
        documents: usize,
        timestamp: Instant,
    },
    RetrievalTimeout {
        budget_ms: u64,
        timestamp: Instant,
    },
    RetrievalFailed {
        timestamp: Instant,
    },
    NoResults {
        timestamp: Instant,
    },
    GenerationCompleted {
        duration_ms: u64,
        timestamp: Instant,
    },
    GenerationTimeout {
        budget_ms: u64,
        timestamp: Instant,
    },
    GenerationFailed {
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub cache_hits: usize,
    pub retrievals: usize,
    pub retrieval_timeouts: usize,
    pub retrieval_failures: usize,
    pub no_results: usize,
    pub answers_generated: usize,
    pub generation_timeouts: usize,
    pub generation_failures: usize,
    pub total_retrieval_ms: u64,
    pub total_generation_ms: u64,
}

impl PipelineStats {
    /// Requests that ended on a fallback answer
    pub fn degraded(&self) -> usize {
        self.retrieval_timeouts
            + self.retrieval_failures
            + self.generation_timeouts
            + self.generation_failures
    }

    pub fn mean_retrieval_ms(&self) -> f64 {
        if self.retrievals == 0 {
            0.0
        } else {
            self.total_retrieval_ms as f64 / self.retrievals as f64
        }
    }

    pub fn mean_generation_ms(&self) -> f64 {
        if self.answers_generated == 0 {
            0.0
        } else {
            self.total_generation_ms as f64 / self.answers_generated as f64
        }
    }
}

struct State {
    events: VecDeque<PipelineEvent>,
    stats: PipelineStats,
}

/// Telemetry collector
///
/// Cheap to clone; clones share the same counters.
#[derive(Clone)]
pub struct PipelineTelemetry {
    state: Arc<Mutex<State>>,
    start_time: Instant,
}

impl PipelineTelemetry {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                events: VecDeque::with_capacity(MAX_RECENT_EVENTS),
                stats: PipelineStats::default(),
            })),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an event
    pub fn record(&self, event: PipelineEvent) {
        let mut state = self.lock();
        let stats = &mut state.stats;
        match &event {
            PipelineEvent::CacheHit { .. } => stats.cache_hits += 1,
            PipelineEvent::RetrievalCompleted { duration_ms, .. } => {
                stats.retrievals += 1;
                stats.total_retrieval_ms += duration_ms;
            }
            PipelineEvent::RetrievalTimeout { .. } => stats.retrieval_timeouts += 1,
            PipelineEvent::RetrievalFailed { .. } => stats.retrieval_failures += 1,
            PipelineEvent::NoResults { .. } => stats.no_results += 1,
            PipelineEvent::GenerationCompleted { duration_ms, .. } => {
                stats.answers_generated += 1;
                stats.total_generation_ms += duration_ms;
            }
            PipelineEvent::GenerationTimeout { .. } => stats.generation_timeouts += 1,
            PipelineEvent::GenerationFailed { .. } => stats.generation_failures += 1,
        }

        if state.events.len() == MAX_RECENT_EVENTS {
            state.events.pop_front();
        }
        state.events.push_back(event);
    }

    /// Get current statistics
    pub fn stats(&self) -> PipelineStats {
        self.lock().stats.clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.lock().events.len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<PipelineEvent> {
        let state = self.lock();
        let start = state.events.len().saturating_sub(n);
        state.events.iter().skip(start).cloned().collect()
    }
}

impl Default for PipelineTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineTelemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineTelemetry")
            .field("stats", &self.stats())
            .finish()
    }
}
