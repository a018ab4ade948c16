//! Shared in-memory doubles for the search provider and generation backend

#![allow(dead_code)]

use async_trait::async_trait;
use ragserve::backends::{GenerationBackend, SamplingParams, SearchHit, SearchProvider};
use ragserve::errors::{Phase, RagError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn hit(id: i64, title: &str, snippet: &str, score: f64) -> SearchHit {
    SearchHit {
        document_id: id,
        title: title.to_string(),
        category: "rrhh".to_string(),
        snippet: snippet.to_string(),
        score,
    }
}

/// Three vacation-policy documents with bm25-style scores
pub fn vacation_hits() -> Vec<SearchHit> {
    vec![
        hit(11, "Politica de vacaciones", "Cada empleado dispone de 15 dias habiles.", -7.5),
        hit(12, "Calendario laboral", "Los dias festivos no cuentan como vacaciones.", -4.0),
        hit(13, "Manual del empleado", "Las solicitudes se hacen con un mes de antelacion.", -1.2),
    ]
}

/// Provider returning fixed hits, optionally slow or failing
pub struct StaticProvider {
    hits: Vec<SearchHit>,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticProvider {
    async fn search(&self, _expression: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RagError::upstream(
                Phase::Retrieval,
                "index shard 3 unreachable: secret-host-42",
            ));
        }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
}

/// Backend returning a fixed completion, optionally slow or failing
pub struct ScriptedBackend {
    reply: String,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_params: Mutex<Option<SamplingParams>>,
}

impl ScriptedBackend {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_params: Mutex::new(None),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    pub fn last_params(&self) -> Option<SamplingParams> {
        *self.last_params.lock().unwrap()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn complete(&self, prompt: &str, params: SamplingParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_params.lock().unwrap() = Some(params);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(RagError::upstream(Phase::Generation, "model crashed: CUDA OOM"));
        }
        Ok(self.reply.clone())
    }

    async fn health_check(&self) -> bool {
        !self.fail
    }
}
