//! End-to-end pipeline tests over mock adapters: mode routing, the
//! re-ranker's fallback protocol and response assembly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use anzsic_classify::{
    CatalogueRepository, ClassifierPipeline, ClassifyError, CodeRecord, CodeSummary,
    HybridRetriever, InMemoryCatalogueRepository, LlmReranker, MockEmbedding, MockLlm, SearchMode,
    SearchRequest,
};

/// Catalogue with the three codes Stage 1 can surface.
fn pool_catalogue() -> InMemoryCatalogueRepository {
    let mut catalogue = InMemoryCatalogueRepository::new();
    catalogue.insert(
        CodeRecord::new("X", "Vehicle servicing")
            .with_hierarchy("Auto repair", "Auto group", "Repair subdivision", "Other services")
            .with_enriched_text("mechanic vehicle servicing repair"),
        vec![1.0, 0.0, 0.0],
    );
    catalogue.insert(
        CodeRecord::new("Y", "Mobile mechanical repair")
            .with_hierarchy("Auto repair", "Auto group", "Repair subdivision", "Other services")
            .with_enriched_text("mobile mechanic on-site repair"),
        vec![0.9, 0.1, 0.0],
    );
    catalogue.insert(
        CodeRecord::new("Z", "Tyre retailing")
            .with_hierarchy("Retail", "Tyre group", "Retail subdivision", "Retail trade")
            .with_enriched_text("tyre sales fitting"),
        vec![0.7, 0.3, 0.0],
    );
    catalogue
}

/// The pool catalogue plus one code ("Q") only reachable through the
/// re-ranker's catalogue-wide reference.
fn full_catalogue() -> InMemoryCatalogueRepository {
    let mut catalogue = pool_catalogue();
    catalogue.insert(
        CodeRecord::new("Q", "Quarrying support services")
            .with_hierarchy("Mining support", "Mining group", "Mining subdivision", "Mining")
            .with_enriched_text("quarry blasting overburden"),
        vec![0.0, 0.0, 1.0],
    );
    catalogue
}

fn build_pipeline(
    llm: Arc<MockLlm>,
    stage1: Arc<InMemoryCatalogueRepository>,
    reference: Arc<InMemoryCatalogueRepository>,
) -> ClassifierPipeline {
    let retriever = HybridRetriever::new(stage1, Arc::new(MockEmbedding::with_dimensions(3)));
    ClassifierPipeline::new(retriever, LlmReranker::new(llm, reference))
}

fn pipeline(llm: Arc<MockLlm>) -> ClassifierPipeline {
    let catalogue = Arc::new(pool_catalogue());
    build_pipeline(llm, catalogue.clone(), catalogue)
}

fn request(mode: SearchMode, top_k: usize) -> SearchRequest {
    SearchRequest::new("mobile mechanic")
        .with_mode(mode)
        .with_top_k(top_k)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

#[tokio::test]
async fn fast_mode_passes_candidates_through_without_llm() {
    init_tracing();
    let llm = Arc::new(MockLlm::new(vec![]));
    let pipeline = pipeline(llm.clone());

    let response = pipeline
        .classify(&request(SearchMode::Fast, 2))
        .await
        .expect("classify");

    assert_eq!(llm.call_count(), 0, "fast mode must never call the LLM");
    assert_eq!(response.results().len(), 2);
    assert_eq!(response.results()[0].rank(), 1);
    assert_eq!(response.results()[1].rank(), 2);
    for result in response.results() {
        assert!(result.reason().starts_with("RRF score "));
        assert!(result.reason().contains("sources: "));
    }
    assert_eq!(response.mode(), SearchMode::Fast);
    assert_eq!(response.embed_model(), "mock-embedding");
    assert_eq!(response.llm_model(), "mock-llm");
}

#[tokio::test]
async fn high_fidelity_happy_path_uses_llm_ranking() {
    let llm = Arc::new(MockLlm::new(vec![
        r#"[{"rank":1,"code":"Y","reason":"exact domain match"},{"rank":2,"code":"X","reason":"adjacent"}]"#,
    ]));
    let pipeline = pipeline(llm.clone());

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    assert_eq!(llm.call_count(), 1);
    let results = response.results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].code(), "Y");
    assert_eq!(results[0].reason(), "exact domain match");
    assert_eq!(results[1].code(), "X");
    assert_eq!(results[1].reason(), "adjacent");
    assert_eq!(results[0].rank(), 1);
    assert_eq!(results[1].rank(), 2);
    assert!(results[0].rrf_score() > 0.0, "pool score carried through");
}

#[tokio::test]
async fn empty_first_pass_falls_back_to_catalogue_reference() {
    init_tracing();
    let llm = Arc::new(MockLlm::new(vec![
        "[]",
        r#"[{"rank":1,"code":"Q","reason":"CSV hit"}]"#,
    ]));
    // "Q" is absent from the Stage-1 store but present in the catalogue
    // reference the re-ranker consults on retry.
    let pipeline = build_pipeline(llm.clone(), Arc::new(pool_catalogue()), Arc::new(full_catalogue()));

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    assert_eq!(llm.call_count(), 2);
    let results = response.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].rank(), 1);
    assert_eq!(results[0].code(), "Q");
    assert_eq!(results[0].description(), "Quarrying support services");
    assert_eq!(results[0].division_desc(), "Mining");
    assert_eq!(results[0].rrf_score(), 0.0);

    // The retry prompt embeds the catalogue listing; the first one must not.
    let captured = llm.captured();
    assert!(!captured[0].0.contains("Q,Quarrying support services"));
    assert!(captured[1].0.contains("Q,Quarrying support services"));
    assert!(captured[1].0.contains("JSON"));
}

#[tokio::test]
async fn empty_after_fallback_is_a_legal_outcome() {
    let llm = Arc::new(MockLlm::new(vec!["[]", "[]"]));
    let pipeline = pipeline(llm.clone());

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    assert_eq!(llm.call_count(), 2);
    assert!(response.results().is_empty());
    assert!(response.candidates_retrieved() > 0);
}

#[tokio::test]
async fn llm_failure_propagates_without_fallback() {
    // No scripted responses: the first call fails at the provider layer,
    // which must not trigger the catalogue-wide retry.
    let llm = Arc::new(MockLlm::new(vec![]));
    let pipeline = pipeline(llm.clone());

    let err = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .unwrap_err();

    assert!(matches!(err, ClassifyError::Llm(_)));
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn malformed_llm_output_is_an_llm_error() {
    let llm = Arc::new(MockLlm::new(vec!["the best match is Y"]));
    let pipeline = pipeline(llm);

    let err = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .unwrap_err();
    assert!(matches!(err, ClassifyError::Llm(_)));
}

#[tokio::test]
async fn unknown_and_duplicate_codes_are_dropped() {
    let llm = Arc::new(MockLlm::new(vec![
        r#"[{"rank":1,"code":"X","reason":"best"},
            {"rank":2,"code":"X","reason":"repeat"},
            {"rank":3,"code":"NOPE","reason":"hallucinated"},
            {"rank":4,"code":"Z","reason":"weak"}]"#,
    ]));
    let pipeline = pipeline(llm);

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    let codes: Vec<&str> = response.results().iter().map(|r| r.code()).collect();
    assert_eq!(codes, vec!["X", "Z"]);
    let ranks: Vec<usize> = response.results().iter().map(|r| r.rank()).collect();
    assert_eq!(ranks, vec![1, 2]);
}

#[tokio::test]
async fn results_never_exceed_top_k() {
    let llm = Arc::new(MockLlm::new(vec![
        r#"[{"rank":1,"code":"Y","reason":"a"},
            {"rank":2,"code":"X","reason":"b"},
            {"rank":3,"code":"Z","reason":"c"}]"#,
    ]));
    let pipeline = pipeline(llm);

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 2))
        .await
        .expect("classify");
    assert_eq!(response.results().len(), 2);
    assert_eq!(response.top_k_requested(), 2);
}

#[tokio::test]
async fn invalid_request_is_a_configuration_error() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let pipeline = pipeline(llm.clone());

    let bad = SearchRequest::new("mechanic").with_top_k(10).with_pool_size(5);
    let err = pipeline.classify(&bad).await.unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn empty_pool_skips_the_llm_in_high_fidelity() {
    let llm = Arc::new(MockLlm::new(vec![]));
    let catalogue = Arc::new(InMemoryCatalogueRepository::new());
    let retriever = HybridRetriever::new(
        catalogue.clone(),
        Arc::new(MockEmbedding::with_dimensions(3)),
    );
    let pipeline = ClassifierPipeline::new(retriever, LlmReranker::new(llm.clone(), catalogue));

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    assert_eq!(llm.call_count(), 0);
    assert!(response.results().is_empty());
    assert_eq!(response.candidates_retrieved(), 0);
}

#[tokio::test]
async fn response_json_round_trips() {
    let llm = Arc::new(MockLlm::new(vec![
        r#"[{"rank":1,"code":"Y","reason":"match"}]"#,
    ]));
    let pipeline = pipeline(llm);

    let response = pipeline
        .classify(&request(SearchMode::HighFidelity, 5))
        .await
        .expect("classify");

    let json = serde_json::to_string(&response).expect("serialize");
    let parsed: anzsic_classify::ClassifyResponse =
        serde_json::from_str(&json).expect("deserialize");
    assert_eq!(serde_json::to_string(&parsed).expect("re-serialize"), json);
}

/// Catalogue whose searches never complete, to pin the pipeline at a
/// suspension point.
struct StalledCatalogue;

#[async_trait]
impl CatalogueRepository for StalledCatalogue {
    async fn vector_search(
        &self,
        _embedding: &[f32],
        _n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(vec![])
    }

    async fn fts_search(
        &self,
        _query_text: &str,
        _n: usize,
    ) -> Result<Vec<(String, usize)>, ClassifyError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(vec![])
    }

    async fn fetch_by_codes(
        &self,
        _codes: &[String],
    ) -> Result<HashMap<String, CodeRecord>, ClassifyError> {
        Ok(HashMap::new())
    }

    async fn all_codes(&self) -> Result<Vec<CodeSummary>, ClassifyError> {
        Ok(vec![])
    }

    async fn healthcheck(&self) -> bool {
        true
    }
}

#[tokio::test]
async fn cancellation_aborts_at_the_next_suspension_point() {
    let catalogue = Arc::new(StalledCatalogue);
    let retriever = HybridRetriever::new(
        catalogue.clone(),
        Arc::new(MockEmbedding::with_dimensions(3)),
    );
    let pipeline = ClassifierPipeline::new(
        retriever,
        LlmReranker::new(Arc::new(MockLlm::new(vec![])), catalogue),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline
        .classify_with_cancellation(&request(SearchMode::HighFidelity, 5), &cancel)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
