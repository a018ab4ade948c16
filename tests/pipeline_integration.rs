//! Integration tests for the query-serving pipeline
//!
//! Runs the full serve path against in-memory search and generation doubles.

mod support;

use ragserve::cache::{Clock, ManualClock};
use ragserve::errors::RagError;
use ragserve::rag::prompt::{
    DISCLAIMER, FAILURE_ANSWER, GENERATION_TIMEOUT_ANSWER, NO_RESULTS_ANSWER,
    RETRIEVAL_TIMEOUT_ANSWER,
};
use ragserve::rag::{PipelineResult, QueryRequest, RagConfig, RagPipeline};
use std::sync::Arc;
use std::time::Duration;
use support::{hit, vacation_hits, ScriptedBackend, StaticProvider};

const REPLY: &str = "Tienes 15 dias habiles de vacaciones [Documento 1].";

fn pipeline_with(
    provider: Arc<StaticProvider>,
    backend: Arc<ScriptedBackend>,
    config: RagConfig,
) -> RagPipeline {
    RagPipeline::new(provider, backend, config)
}

fn default_pipeline() -> (RagPipeline, Arc<StaticProvider>, Arc<ScriptedBackend>) {
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let pipeline = pipeline_with(provider.clone(), backend.clone(), RagConfig::default());
    (pipeline, provider, backend)
}

fn assert_shape(result: &PipelineResult) {
    assert_eq!(result.documents_retrieved, result.sources.len());
    assert!(result.answer.ends_with(DISCLAIMER));
}

#[tokio::test]
async fn test_answer_generated_with_sources() {
    let (pipeline, provider, backend) = default_pipeline();

    let result = pipeline
        .serve(&QueryRequest::new("¿Cuántos días de vacaciones tengo?"))
        .await
        .unwrap();

    assert_shape(&result);
    assert!(result.answer.starts_with(REPLY));
    assert!(!result.cache_hit);
    assert_eq!(result.documents_retrieved, 3);
    assert_eq!(result.sources[0].document_id, 11);
    assert_eq!(result.sources[0].relevance_score, 1.0);
    assert!(result.response_time_ms >= result.retrieval_time_ms + result.llm_time_ms);
    assert_eq!(provider.calls(), 1);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_prompt_embeds_context_and_query() {
    let (pipeline, _provider, backend) = default_pipeline();
    let request = QueryRequest::new("vacaciones pendientes").with_sampling(0.7, 256);

    pipeline.serve(&request).await.unwrap();

    let prompt = backend.last_prompt().unwrap();
    assert!(prompt.contains("Cada empleado dispone de 15 dias habiles."));
    assert!(prompt.contains("vacaciones pendientes"));
    let params = backend.last_params().unwrap();
    assert_eq!(params.temperature, 0.7);
    assert_eq!(params.max_tokens, 256);
}

#[tokio::test]
async fn test_stopword_query_skips_generation() {
    let (pipeline, provider, backend) = default_pipeline();

    let result = pipeline.serve(&QueryRequest::new("el la y los")).await.unwrap();

    assert_shape(&result);
    assert_eq!(result.documents_retrieved, 0);
    assert!(result.answer.starts_with(NO_RESULTS_ANSWER));
    assert_eq!(result.llm_time_ms, 0);
    assert_eq!(provider.calls(), 0);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_empty_provider_result_skips_generation() {
    let provider = Arc::new(StaticProvider::new(Vec::new()));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let pipeline = pipeline_with(provider.clone(), backend.clone(), RagConfig::default());

    let result = pipeline.serve(&QueryRequest::new("reglamento")).await.unwrap();

    assert_shape(&result);
    assert_eq!(result.documents_retrieved, 0);
    assert_eq!(provider.calls(), 1);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_weak_matches_skip_generation() {
    let provider = Arc::new(StaticProvider::new(vec![hit(5, "Anexo", "texto", 0.0)]));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let pipeline = pipeline_with(provider, backend.clone(), RagConfig::default());

    let result = pipeline.serve(&QueryRequest::new("anexo")).await.unwrap();

    assert_eq!(result.documents_retrieved, 0);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_repeat_query_hits_response_cache() {
    let (pipeline, provider, backend) = default_pipeline();

    let first = pipeline
        .serve(&QueryRequest::new("Politica de vacaciones"))
        .await
        .unwrap();
    let second = pipeline
        .serve(&QueryRequest::new("  politica de VACACIONES "))
        .await
        .unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(second.llm_time_ms, 0);
    assert_eq!(second.answer, first.answer);
    assert_eq!(second.sources, first.sources);
    assert_eq!(second.documents_retrieved, first.documents_retrieved);
    assert_eq!(provider.calls(), 1);
    assert_eq!(backend.calls(), 1);

    let stats = pipeline.cache_stats();
    assert_eq!(stats.response.hits, 1);
    assert_eq!(stats.response.misses, 1);
    assert_eq!(pipeline.telemetry().stats().cache_hits, 1);
}

#[tokio::test]
async fn test_generation_timeout_falls_back() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY).slow(Duration::from_millis(500)));
    let mut config = RagConfig::default();
    config.generation.timeout_ms = 50;
    let pipeline = pipeline_with(provider, backend.clone(), config);

    let result = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();

    assert_shape(&result);
    assert!(result.answer.starts_with(GENERATION_TIMEOUT_ANSWER));
    assert!(result.sources.is_empty());
    assert!(result.llm_time_ms < 500);
    assert_eq!(pipeline.telemetry().stats().generation_timeouts, 1);

    // Fallbacks are not cached
    pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_retrieval_timeout_falls_back() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()).slow(Duration::from_millis(500)));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let mut config = RagConfig::default();
    config.retrieval.timeout_ms = 50;
    let pipeline = pipeline_with(provider, backend.clone(), config);

    let result = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();

    assert_shape(&result);
    assert!(result.answer.starts_with(RETRIEVAL_TIMEOUT_ANSWER));
    assert_ne!(RETRIEVAL_TIMEOUT_ANSWER, GENERATION_TIMEOUT_ANSWER);
    assert_eq!(result.documents_retrieved, 0);
    assert!(result.response_time_ms < 500);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_provider_failure_hides_detail() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()).failing());
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let pipeline = pipeline_with(provider, backend.clone(), RagConfig::default());

    let result = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();

    assert_shape(&result);
    assert!(result.answer.starts_with(FAILURE_ANSWER));
    assert!(!result.answer.contains("secret-host-42"));
    assert_eq!(backend.calls(), 0);
    assert_eq!(pipeline.telemetry().stats().retrieval_failures, 1);
}

#[tokio::test]
async fn test_backend_failure_hides_detail() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY).failing());
    let pipeline = pipeline_with(provider, backend, RagConfig::default());

    let result = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();

    assert_shape(&result);
    assert!(result.answer.starts_with(FAILURE_ANSWER));
    assert!(!result.answer.contains("CUDA"));
    assert!(result.sources.is_empty());
}

#[tokio::test]
async fn test_invalid_input_is_an_error() {
    let (pipeline, provider, backend) = default_pipeline();

    for top_k in [0, 11] {
        let err = pipeline
            .serve(&QueryRequest::new("vacaciones").with_top_k(top_k))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput { field: "top_k", .. }));
    }

    let err = pipeline.serve(&QueryRequest::new("  ")).await.unwrap_err();
    assert!(err.is_input_error());

    assert_eq!(provider.calls(), 0);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_sources_are_documents_used_in_context() {
    let long = "x".repeat(4000);
    let provider = Arc::new(StaticProvider::new(vec![
        hit(1, "Primero", &long, -9.0),
        hit(2, "Segundo", "breve", -5.0),
        hit(3, "Tercero", "breve", -1.0),
    ]));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let mut config = RagConfig::default();
    config.context.token_budget = 200;
    let pipeline = pipeline_with(provider, backend, config);

    let result = pipeline.serve(&QueryRequest::new("contrato")).await.unwrap();

    assert_shape(&result);
    assert_eq!(result.documents_retrieved, 1);
    assert_eq!(result.sources[0].document_id, 1);
}

#[tokio::test]
async fn test_deadline_clips_generation_budget() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY).slow(Duration::from_secs(2)));
    let mut config = RagConfig::default();
    config.generation.timeout_ms = 10_000;
    config.pipeline.request_deadline_ms = 100;
    let pipeline = pipeline_with(provider, backend, config);

    let result = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();

    assert!(result.answer.starts_with(GENERATION_TIMEOUT_ANSWER));
    assert!(result.response_time_ms < 2000);
}

#[tokio::test]
async fn test_concurrent_identical_queries_not_deduplicated() {
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY).slow(Duration::from_millis(100)));
    let pipeline = Arc::new(pipeline_with(provider, backend.clone(), RagConfig::default()));

    let a = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.serve(&QueryRequest::new("vacaciones")).await })
    };
    let b = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.serve(&QueryRequest::new("vacaciones")).await })
    };
    let (a, b) = tokio::join!(a, b);

    assert!(!a.unwrap().unwrap().cache_hit);
    assert!(!b.unwrap().unwrap().cache_hit);
    assert_eq!(backend.calls(), 2);

    let third = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    assert!(third.cache_hit);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_response_ttls_follow_outcome() {
    let clock = ManualClock::new();
    let provider = Arc::new(StaticProvider::new(vacation_hits()));
    let backend = Arc::new(ScriptedBackend::new(REPLY));
    let config = RagConfig::default();
    let no_results_ttl = config.cache.no_results_ttl();
    let response_ttl = config.cache.response_ttl();
    let pipeline = RagPipeline::with_clock(
        provider.clone(),
        backend.clone(),
        config,
        Arc::new(clock.clone()) as Arc<dyn Clock>,
    );

    pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    pipeline.serve(&QueryRequest::new("los y el")).await.unwrap();

    // No-results answer expires first
    clock.advance(no_results_ttl);
    assert!(pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap().cache_hit);
    assert!(!pipeline.serve(&QueryRequest::new("los y el")).await.unwrap().cache_hit);

    clock.advance(response_ttl);
    assert!(!pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap().cache_hit);
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn test_reset_caches_forces_recompute() {
    let (pipeline, provider, backend) = default_pipeline();

    pipeline.serve(&QueryRequest::new("salario")).await.unwrap();
    pipeline.reset_caches();
    let result = pipeline.serve(&QueryRequest::new("salario")).await.unwrap();

    assert!(!result.cache_hit);
    assert_eq!(provider.calls(), 2);
    assert_eq!(backend.calls(), 2);
    assert_eq!(pipeline.cache_stats().response.size, 1);
}

#[tokio::test]
async fn test_retrieval_cache_shared_across_answers() {
    let (pipeline, provider, backend) = default_pipeline();

    // Different raw text, same optimized expression
    pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    pipeline.serve(&QueryRequest::new("¿vacaciones?")).await.unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(backend.calls(), 2);
    assert_eq!(pipeline.cache_stats().retrieval.hits, 1);
}

#[tokio::test]
async fn test_cached_result_round_trips() {
    let (pipeline, _provider, _backend) = default_pipeline();

    let fresh = pipeline.serve(&QueryRequest::new("horario")).await.unwrap();
    let replay = pipeline.serve(&QueryRequest::new("horario")).await.unwrap();

    let json = serde_json::to_string(&replay).unwrap();
    let decoded: PipelineResult = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded.answer, fresh.answer);
    assert_eq!(decoded.sources, fresh.sources);
    assert_eq!(decoded.documents_retrieved, fresh.documents_retrieved);
    assert!(decoded.cache_hit);
}

#[tokio::test]
async fn test_unbounded_lifetimes_do_not_panic() {
    let (provider, backend) = (
        Arc::new(StaticProvider::new(vacation_hits())),
        Arc::new(ScriptedBackend::new(REPLY)),
    );
    let mut config = RagConfig::default();
    config.cache.retrieval_ttl_secs = u64::MAX;
    config.cache.response_ttl_secs = u64::MAX;
    config.cache.no_results_ttl_secs = u64::MAX;
    config.pipeline.request_deadline_ms = u64::MAX;
    let pipeline = pipeline_with(provider, backend.clone(), config);

    let first = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    let second = pipeline.serve(&QueryRequest::new("vacaciones")).await.unwrap();
    let empty = pipeline.serve(&QueryRequest::new("el la y los")).await.unwrap();

    assert!(first.answer.starts_with(REPLY));
    assert!(second.cache_hit);
    assert_eq!(empty.documents_retrieved, 0);
    assert_eq!(backend.calls(), 1);
}
