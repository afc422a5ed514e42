//! Property tests for in-memory vector store search ordering.

use std::collections::HashMap;

use proptest::prelude::*;
use ultima_rag::document::Chunk;
use ultima_rag::inmemory::InMemoryVectorStore;
use ultima_rag::vectorstore::{DistanceMetric, VectorStore};

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-8 {
            return None;
        }
        for val in &mut v {
            *val /= norm;
        }
        Some(v)
    })
}

/// Generate a chunk with a normalized embedding.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z]{3,8}", "[a-z ]{5,30}", arb_normalized_embedding(dim)).prop_map(
        |(id, text, embedding)| Chunk {
            id,
            text,
            embedding,
            metadata: HashMap::new(),
            document_id: "doc_1".to_string(),
        },
    )
}

fn arb_metric() -> impl Strategy<Value = DistanceMetric> {
    prop::sample::select(DistanceMetric::ALL.to_vec())
}

/// **Property 1: Search ordering**
/// *For any* set of chunks stored in an InMemoryVectorStore and any distance
/// metric, searching SHALL return results ordered by descending score, at most
/// `top_k` of them, each carrying its stored embedding.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_top_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            metric in arb_metric(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unique_count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", DIM).await.unwrap();

                // Deduplicate chunks by id to avoid upsert overwriting
                let mut deduped: HashMap<String, Chunk> = HashMap::new();
                for chunk in &chunks {
                    deduped.entry(chunk.id.clone()).or_insert_with(|| chunk.clone());
                }
                let unique_chunks: Vec<Chunk> = deduped.into_values().collect();
                let count = unique_chunks.len();

                store.upsert("test", &unique_chunks).await.unwrap();
                let results = store.search("test", &query, top_k, metric).await.unwrap();
                (results, count)
            });

            prop_assert!(results.len() <= top_k);
            prop_assert_eq!(results.len(), top_k.min(unique_count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
            for result in &results {
                prop_assert_eq!(result.chunk.embedding.len(), DIM);
            }
        }
    }
}

#[tokio::test]
async fn collection_exists_tracks_create_and_delete() {
    let store = InMemoryVectorStore::new();
    assert!(!store.collection_exists("docs").await.unwrap());
    store.create_collection("docs", 4).await.unwrap();
    assert!(store.collection_exists("docs").await.unwrap());
    store.delete_collection("docs").await.unwrap();
    assert!(!store.collection_exists("docs").await.unwrap());
}

#[tokio::test]
async fn upsert_into_missing_collection_fails() {
    let store = InMemoryVectorStore::new();
    let chunk = Chunk {
        id: "a".into(),
        text: "a".into(),
        embedding: vec![1.0],
        metadata: HashMap::new(),
        document_id: "doc".into(),
    };
    assert!(store.upsert("missing", &[chunk]).await.is_err());
}
