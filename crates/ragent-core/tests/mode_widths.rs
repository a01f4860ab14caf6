//! How much work each mode does: dense searches issued, their width, and
//! the candidates handed to the reranker.

mod common;

use std::sync::{Arc, Mutex};

use common::{
    engine_with, hash_embed, test_config, topic_corpus, OverlapScorer, RecordingIndex, ScriptedProvider,
    SearchCall,
};
use ragent_core::{Bm25Index, IndexSnapshot, Mode, QueryRequest, RagEngine, RerankerBackend};
use ragent_db::vector::{FlatVectorIndex, VectorMetric, VectorRecord};

const WIDTH: usize = 8;

const EXPANSIONS: &str = "rust memory safety\ngarbage collector free languages\nasync runtime for rust";

type Calls = Arc<Mutex<Vec<SearchCall>>>;

/// Engine over `topic_corpus` whose dense and lexical indexes record every
/// search.
fn recording_engine(scorer: Arc<OverlapScorer>) -> (RagEngine, Calls, Calls) {
    let mut config = test_config(3);
    config.retrieval.hybrid.retrieval_width = WIDTH;

    let reranker: Arc<dyn RerankerBackend> = scorer;
    let engine = engine_with(config.clone(), ScriptedProvider::echo(EXPANSIONS), Some(reranker));

    let passages = topic_corpus();
    let mut dense = FlatVectorIndex::new(common::DIM, VectorMetric::Cosine);
    dense
        .insert(
            passages
                .iter()
                .enumerate()
                .map(|(i, p)| VectorRecord::new(i, hash_embed(&p.content)).with_metadata(p.metadata.clone()))
                .collect(),
        )
        .unwrap();
    let dense = RecordingIndex::new(dense);
    let dense_calls = Arc::clone(&dense.calls);
    let lexical = RecordingIndex::new(Bm25Index::build(
        &config.retrieval.hybrid.bm25,
        passages.iter().map(|p| p.content.as_str()),
    ));
    let lexical_calls = Arc::clone(&lexical.calls);

    let snapshot = IndexSnapshot::new(passages, Arc::new(dense), Arc::new(lexical)).unwrap();
    engine.orchestrator().retriever().set_snapshot(snapshot);
    (engine, dense_calls, lexical_calls)
}

fn take_calls(calls: &Calls) -> Vec<SearchCall> {
    std::mem::take(&mut *calls.lock().unwrap())
}

#[tokio::test]
async fn test_search_count_and_width_per_mode() {
    let (engine, dense_calls, lexical_calls) = recording_engine(OverlapScorer::new());
    let question = "What makes Rust memory safe?";

    for (mode, expected_searches) in [(Mode::Fast, 1), (Mode::Simple, 1), (Mode::Advanced, 4)] {
        engine
            .process_query(QueryRequest::new(question).with_mode(mode))
            .await
            .unwrap();

        for (index, calls) in [("dense", &dense_calls), ("lexical", &lexical_calls)] {
            let searches = take_calls(calls);
            assert_eq!(searches.len(), expected_searches, "{mode} {index} searches");
            assert!(
                searches.iter().all(|c| c.limit == WIDTH),
                "{mode} {index} searched with {searches:?}"
            );
        }
    }
}

#[tokio::test]
async fn test_citation_counts_grow_with_mode() {
    let (engine, _, _) = recording_engine(OverlapScorer::new());
    let question = "What makes Rust memory safe?";

    let mut counts = Vec::new();
    for mode in Mode::ALL {
        let response = engine
            .process_query(QueryRequest::new(question).with_mode(mode))
            .await
            .unwrap();
        counts.push(response.citations.len());
    }

    assert_eq!(counts, vec![1, 3, 5]);
}

#[tokio::test]
async fn test_only_advanced_mode_reranks_the_union() {
    let scorer = OverlapScorer::new();
    let (engine, calls, _) = recording_engine(Arc::clone(&scorer));
    let question = "What makes Rust memory safe?";

    for mode in [Mode::Fast, Mode::Simple] {
        engine
            .process_query(QueryRequest::new(question).with_mode(mode))
            .await
            .unwrap();
    }
    assert!(scorer.calls().is_empty());
    take_calls(&calls);

    engine
        .process_query(QueryRequest::new(question).with_mode(Mode::Advanced))
        .await
        .unwrap();

    // One rerank over the deduplicated union of every expanded query
    let reranked = scorer.calls();
    assert_eq!(reranked.len(), 1);
    let widest_single_query = take_calls(&calls).iter().map(|c| c.returned).max().unwrap();
    assert!(reranked[0] >= widest_single_query.min(WIDTH));
    assert!(reranked[0] <= 4 * WIDTH);
}

#[tokio::test]
async fn test_expansion_prompt_asks_for_configured_count() {
    let provider = ScriptedProvider::echo(EXPANSIONS);
    let engine = engine_with(test_config(3), Arc::clone(&provider), None);
    engine.index_documents(topic_corpus()).await.unwrap();

    engine
        .process_query(QueryRequest::new("What is Tokio?").with_mode(Mode::Advanced))
        .await
        .unwrap();

    let raw = provider.raw_requests();
    assert_eq!(raw.len(), 1);
    assert!(raw[0].question.contains("Generate 3 different search queries"));
    assert!(raw[0].question.contains("What is Tokio?"));
}

#[tokio::test]
async fn test_fast_and_simple_never_expand() {
    let provider = ScriptedProvider::echo(EXPANSIONS);
    let engine = engine_with(test_config(3), Arc::clone(&provider), None);
    engine.index_documents(topic_corpus()).await.unwrap();

    for mode in [Mode::Fast, Mode::Simple] {
        engine
            .process_query(QueryRequest::new("What is Tokio?").with_mode(mode))
            .await
            .unwrap();
    }

    assert!(provider.raw_requests().is_empty());
    assert_eq!(provider.grounded_requests().len(), 2);
}
