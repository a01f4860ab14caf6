//! A failing reranker must never fail or reorder retrieval.

mod common;

use std::sync::Arc;

use common::{engine_with, test_config, topic_corpus, FailingScorer, OverlapScorer, ScriptedProvider};
use ragent_core::{Mode, Passage, QueryRequest, RerankerBackend, RetrievalRequest};

fn contents(passages: &[Passage]) -> Vec<&str> {
    passages.iter().map(|p| p.content.as_str()).collect()
}

#[tokio::test]
async fn test_failing_reranker_keeps_retrieval_order() {
    let scorer: Arc<dyn RerankerBackend> = Arc::new(FailingScorer);
    let engine = engine_with(test_config(3), ScriptedProvider::echo(""), Some(scorer));
    engine.index_documents(topic_corpus()).await.unwrap();
    let retriever = engine.orchestrator().retriever();
    assert!(retriever.reranker().is_enabled());

    let query = "vector search library";
    let reranked = retriever
        .retrieve_with(RetrievalRequest::new(query, 4))
        .await;
    let plain = retriever
        .retrieve_with(RetrievalRequest::new(query, 4).with_rerank(false))
        .await;

    assert_eq!(reranked.len(), 4);
    assert_eq!(contents(&reranked), contents(&plain));
}

#[tokio::test]
async fn test_working_reranker_can_reorder() {
    let scorer: Arc<dyn RerankerBackend> = OverlapScorer::new();
    let engine = engine_with(test_config(3), ScriptedProvider::echo(""), Some(scorer));
    engine.index_documents(topic_corpus()).await.unwrap();
    let retriever = engine.orchestrator().retriever();

    let reranked = retriever
        .retrieve_with(RetrievalRequest::new("stopwords removed before indexing", 1))
        .await;

    assert_eq!(
        contents(&reranked),
        vec!["Stopwords are frequent words removed before indexing."]
    );
}

#[tokio::test]
async fn test_advanced_mode_survives_failing_reranker() {
    let scorer: Arc<dyn RerankerBackend> = Arc::new(FailingScorer);
    let provider = ScriptedProvider::echo("rust memory safety\nasync runtime");
    let engine = engine_with(test_config(2), Arc::clone(&provider), Some(scorer));
    engine.index_documents(topic_corpus()).await.unwrap();

    let response = engine
        .process_query(QueryRequest::new("Why is Rust safe?").with_mode(Mode::Advanced))
        .await
        .unwrap();

    // Falls back to the first final_k passages of the union
    assert_eq!(response.citations.len(), 5);
    let expected = engine
        .orchestrator()
        .retriever()
        .retrieve_with(RetrievalRequest::new("rust memory safety", 10).with_rerank(false))
        .await;
    assert_eq!(response.citations[0].content, expected[0].content);
}

#[tokio::test]
async fn test_disabled_reranker_config_ignores_backend() {
    let scorer = OverlapScorer::new();
    let backend: Arc<dyn RerankerBackend> = Arc::clone(&scorer) as Arc<dyn RerankerBackend>;
    let mut config = test_config(2);
    config.retrieval.reranker.enabled = false;
    let engine = engine_with(config, ScriptedProvider::echo("a\nb"), Some(backend));
    engine.index_documents(topic_corpus()).await.unwrap();

    engine
        .process_query(QueryRequest::new("Why is Rust safe?").with_mode(Mode::Advanced))
        .await
        .unwrap();

    assert!(!engine.orchestrator().retriever().reranker().is_enabled());
    assert!(scorer.calls().is_empty());
}
