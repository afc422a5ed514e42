//! Integration tests for loading directories and the create-or-reuse manager.

mod support;

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ultima_rag::document::PAGE_KEY;
use ultima_rag::{
    DistanceMetric, HashEmbeddingProvider, IndexConfig, InMemoryVectorStore, LocalVectorStore,
    Mode, RagError, SearchParams, Tokenizer, VectorStore, VectorStoreManager, WhitespaceTokenizer,
    load_data_source, load_directory, load_document,
};

use crate::support::{pdf_with_pages, serve};

/// Whitespace tokenizer that counts how often it is asked to encode.
#[derive(Default)]
struct CountingTokenizer {
    calls: AtomicUsize,
}

impl Tokenizer for CountingTokenizer {
    fn name(&self) -> &str {
        "counting"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        WhitespaceTokenizer.encode(text)
    }
}

fn manager(
    store: Arc<dyn VectorStore>,
    tokenizer: Arc<dyn Tokenizer>,
    data_dir: &std::path::Path,
) -> VectorStoreManager {
    VectorStoreManager::builder()
        .config(
            IndexConfig::builder()
                .mode(Mode::Local)
                .data_dir(data_dir)
                .chunk_size(12)
                .chunk_overlap(2)
                .build()
                .unwrap(),
        )
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(64)))
        .vector_store(store)
        .tokenizer(tokenizer)
        .build()
        .unwrap()
}

#[test]
fn directory_loading_skips_hidden_and_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha notes").unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested/b.csv"), "k,v\none,1\ntwo,2\n").unwrap();
    fs::write(dir.path().join(".secret.txt"), "hidden").unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();
    fs::write(dir.path().join(".git/config"), "hidden too").unwrap();
    fs::write(dir.path().join("broken.pdf"), "not a pdf").unwrap();
    fs::write(dir.path().join("blob.bin"), [0u8, 1, 2, 255]).unwrap();

    let docs = load_directory(dir.path(), true).unwrap();
    let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
    assert_eq!(texts, vec!["alpha notes", "k: one\nv: 1", "k: two\nv: 2"]);

    let strict = load_directory(dir.path(), false);
    assert!(strict.is_err());
}

#[test]
fn pdf_pages_become_documents() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.pdf");
    fs::write(&file, pdf_with_pages(&["Quarterly revenue grew", "Hiring slowed down"])).unwrap();

    let docs = load_document(&file).unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs[0].text.contains("revenue"), "{:?}", docs[0].text);
    assert!(docs[1].text.contains("Hiring"), "{:?}", docs[1].text);
    assert_eq!(docs[0].metadata.get(PAGE_KEY).unwrap(), "1");
    assert_eq!(docs[1].metadata.get(PAGE_KEY).unwrap(), "2");
    assert_eq!(docs[1].source().unwrap(), file.display().to_string());
}

#[tokio::test]
async fn pdf_directory_builds_a_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    fs::create_dir(&docs).unwrap();
    fs::write(docs.join("report.pdf"), pdf_with_pages(&["Quarterly revenue grew"])).unwrap();
    fs::write(docs.join("broken.pdf"), b"%PDF-1.4\n1 0 obj << /Type /Catalog").unwrap();

    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let manager = manager(store.clone(), Arc::new(WhitespaceTokenizer), dir.path());
    let index = manager.get_vector_store(docs.to_str().unwrap()).await.unwrap();
    assert!(index.created);

    let hits = store.search(&index.collection, &[0.0; 64], 10, DistanceMetric::L2).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.text.contains("revenue"));
}

#[tokio::test]
async fn web_pages_are_reduced_to_visible_text() {
    let html = "<html><head><title>Team</title><style>body { color: red }</style></head>\
                <body><h1>Roadmap</h1><script>track()</script>\
                <p>Ship the beta in May.</p></body></html>";
    let base = serve("text/html", html.as_bytes().to_vec()).await;
    let url = format!("{base}/roadmap");

    let docs = load_data_source(&url).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "Roadmap\nShip the beta in May.");
    assert_eq!(docs[0].source().unwrap(), url);
}

#[tokio::test]
async fn pdf_urls_are_parsed_per_page() {
    let pdf = pdf_with_pages(&["Quarterly revenue grew", "Hiring slowed down"]);
    let base = serve("application/pdf", pdf).await;

    let docs = load_data_source(&format!("{base}/files/report.pdf")).await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs[1].text.contains("Hiring"));
    assert_eq!(docs[1].metadata.get(PAGE_KEY).unwrap(), "2");
}

#[tokio::test]
async fn builds_once_then_reuses_without_loading() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("notes.txt");
    fs::write(
        &source,
        "Rust has ownership.\n\nBorrowing lets code use values without taking them.\n\n\
         Lifetimes describe how long references stay valid.",
    )
    .unwrap();
    let source = source.to_str().unwrap().to_string();

    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let tokenizer = Arc::new(CountingTokenizer::default());
    let manager = manager(store.clone(), tokenizer.clone(), dir.path());

    let first = manager.get_vector_store(&source).await.unwrap();
    assert!(first.created);
    assert!(store.collection_exists(&first.collection).await.unwrap());
    let calls_after_build = tokenizer.calls.load(Ordering::SeqCst);
    assert!(calls_after_build > 0);

    // The source disappears; the dataset is still found by identity.
    fs::remove_file(&source).unwrap();
    let second = manager.get_vector_store(&source).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.path, first.path);
    assert_eq!(tokenizer.calls.load(Ordering::SeqCst), calls_after_build);

    let retriever = manager
        .retriever(&second, SearchParams { k: 1, fetch_k: 3, ..SearchParams::default() })
        .unwrap();
    let hits = retriever.retrieve("how long do references stay valid").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.text.contains("Lifetimes"));
}

#[tokio::test]
async fn local_datasets_persist_across_managers() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("facts.txt");
    fs::write(&source, "The sky is blue.\n\nGrass is green.").unwrap();
    let source = source.to_str().unwrap().to_string();
    let data_dir = dir.path().join("data");

    let first = manager(
        Arc::new(LocalVectorStore::new(&data_dir)),
        Arc::new(WhitespaceTokenizer),
        &data_dir,
    )
    .get_vector_store(&source)
    .await
    .unwrap();
    assert!(first.created);
    assert!(data_dir.join(first.path.name()).join("index.json").exists());

    let store = Arc::new(LocalVectorStore::new(&data_dir));
    let reopened = manager(store.clone(), Arc::new(WhitespaceTokenizer), &data_dir)
        .get_vector_store(&source)
        .await
        .unwrap();
    assert!(!reopened.created);

    let query = [0.0f32; 64];
    let hits = store.search(&reopened.collection, &query, 10, DistanceMetric::L2).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].chunk.text.contains("Grass is green."));
}

#[tokio::test]
async fn missing_source_is_a_data_source_error_and_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new());
    let manager = manager(store.clone(), Arc::new(WhitespaceTokenizer), dir.path());

    let err = manager.get_vector_store("nowhere/notes.txt").await.unwrap_err();
    assert!(matches!(err, RagError::DataSource { .. }));
    let collection = manager.dataset_path("nowhere/notes.txt").collection_name();
    assert!(!store.collection_exists(&collection).await.unwrap());
}
