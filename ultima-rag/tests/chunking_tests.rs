//! Property tests for the token-bounded splitter and dataset identity.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use ultima_rag::chunking::TokenChunker;
use ultima_rag::dataset::{Mode, clean_string_for_storing, get_dataset_path};
use ultima_rag::tokenizer::{TiktokenTokenizer, Tokenizer, WhitespaceTokenizer};

/// Text made of words, sentences, lines and paragraphs of varying length.
fn arb_text() -> impl Strategy<Value = String> {
    let word = "[a-zA-Z0-9]{1,12}";
    let sentence = proptest::collection::vec(word, 1..15).prop_map(|w| w.join(" ") + ".");
    let line = proptest::collection::vec(sentence, 1..4).prop_map(|s| s.join(" "));
    let paragraph = proptest::collection::vec(line, 1..4).prop_map(|l| l.join("\n"));
    proptest::collection::vec(paragraph, 1..6).prop_map(|p| p.join("\n\n"))
}

fn arb_budget() -> impl Strategy<Value = (usize, usize)> {
    (2usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// **Property 2: Chunk token bound**
/// *For any* text and any `chunk_overlap < chunk_size`, every chunk produced
/// by the TokenChunker SHALL be at most `chunk_size` tokens long, measured by
/// the chunker's own tokenizer, and no chunk SHALL be blank.
mod prop_chunk_token_bound {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn whitespace_chunks_fit_the_budget(text in arb_text(), (size, overlap) in arb_budget()) {
            let chunker = TokenChunker::new(size, overlap, Arc::new(WhitespaceTokenizer)).unwrap();
            let chunks = chunker.split_text(&text);
            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                let tokens = WhitespaceTokenizer.count(chunk);
                prop_assert!(tokens <= size, "{tokens} > {size}: {chunk:?}");
                prop_assert!(!chunk.trim().is_empty());
            }
        }

        #[test]
        fn bpe_chunks_fit_the_budget(text in arb_text(), (size, overlap) in arb_budget()) {
            let tokenizer = Arc::new(TiktokenTokenizer::cl100k().unwrap());
            let chunker = TokenChunker::new(size, overlap, tokenizer.clone()).unwrap();
            for chunk in chunker.split_text(&text) {
                let tokens = tokenizer.count(&chunk);
                prop_assert!(tokens <= size, "{tokens} > {size}: {chunk:?}");
            }
        }
    }
}

#[test]
fn long_single_line_text_splits_in_bounded_time() {
    let text = (0..40_000).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
    let tokenizer = Arc::new(TiktokenTokenizer::cl100k().unwrap());
    let chunker = TokenChunker::new(1536, 128, tokenizer.clone()).unwrap();

    let started = Instant::now();
    let chunks = chunker.split_text(&text);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_secs(30), "splitting took {elapsed:?}");
    assert!(chunks.len() > 10);
    assert!(chunks.iter().all(|c| tokenizer.count(c) <= 1536));
    assert!(chunks.first().unwrap().starts_with("w0 "));
    assert!(chunks.last().unwrap().ends_with("w39999"));
}

/// **Property 3: Dataset identity purity**
/// *For any* inputs, `get_dataset_path` SHALL return the same identity for
/// identical inputs and a different identity when the source, the chunk size,
/// the chunk overlap or the mode changes (and the organization, in API mode).
/// Sources only name different datasets when they clean to different strings.
mod prop_dataset_identity {
    use super::*;

    proptest! {
        #[test]
        fn identity_is_deterministic_and_sensitive(
            source in "[ -~]{1,24}",
            other_source in "[ -~]{1,24}",
            size in 1usize..5000,
            overlap in 0usize..500,
            org in "[a-z]{1,8}",
            other_org in "[a-z]{1,8}",
        ) {
            let dir = Path::new("/data");
            let path = |source: &str, size, overlap, mode, org: &str| {
                get_dataset_path(source, size, overlap, mode, org, dir)
            };
            let base = path(&source, size, overlap, Mode::Api, &org);
            prop_assert_eq!(&base, &path(&source, size, overlap, Mode::Api, &org));

            prop_assert_ne!(&base, &path(&source, size + 1, overlap, Mode::Api, &org));
            prop_assert_ne!(&base, &path(&source, size, overlap + 1, Mode::Api, &org));
            prop_assert_ne!(&base, &path(&source, size, overlap, Mode::Local, &org));
            let other = path(&other_source, size, overlap, Mode::Api, &org);
            if clean_string_for_storing(&other_source) != clean_string_for_storing(&source) {
                prop_assert_ne!(&base, &other);
            } else {
                prop_assert_eq!(&base, &other);
            }
            if other_org != org {
                prop_assert_ne!(&base, &path(&source, size, overlap, Mode::Api, &other_org));
            }
        }
    }
}
