//! Turning data sources into documents.
//!
//! A data source is a file path, a directory, or a URL. Files are parsed by a
//! loader picked from their extension; anything without a dedicated loader
//! goes through a best-effort parser that handles HTML and plain text and
//! rejects binary content.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use scraper::{Html, Node, Selector};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::document::{Document, PAGE_KEY, ROW_KEY};
use crate::error::{RagError, Result};

/// Where to ask for support of new kinds of data sources.
pub const PROJECT_URL: &str = "https://github.com/Ultima-Insights/WaynePracticum";

type FileLoader = fn(&Path) -> Result<Vec<Document>>;

/// Dedicated loaders, keyed by lowercase file extension.
const FILE_LOADERS: [(&str, FileLoader); 3] =
    [("csv", load_csv), ("pdf", load_pdf), ("txt", load_text)];

/// Elements whose text is never part of a page's content.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// What a data source string refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// An existing directory.
    Directory,
    /// An existing file.
    File,
    /// A web address (anything starting with `http`).
    Url,
    /// None of the above.
    Unknown,
}

/// Decide how `source` should be loaded.
pub fn classify(source: &str) -> SourceKind {
    let path = Path::new(source);
    if path.is_dir() {
        SourceKind::Directory
    } else if path.is_file() {
        SourceKind::File
    } else if source.starts_with("http") {
        SourceKind::Url
    } else {
        SourceKind::Unknown
    }
}

/// Load a single file with the loader registered for its extension.
///
/// Files without a dedicated loader are parsed as HTML or plain text.
///
/// # Errors
///
/// Returns [`RagError::Load`] if the file cannot be read or parsed, and
/// [`RagError::UnsupportedFormat`] for binary content without a loader.
pub fn load_document(path: &Path) -> Result<Vec<Document>> {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let loader = ext
        .as_deref()
        .and_then(|ext| FILE_LOADERS.iter().find(|(known, _)| *known == ext))
        .map(|(_, loader)| *loader)
        .unwrap_or(load_generic);
    loader(path)
}

/// Recursively load every non-hidden file under `path`, in path order.
///
/// With `silent_errors`, files that fail to load are logged and skipped;
/// otherwise the first failure is returned.
pub fn load_directory(path: &Path, silent_errors: bool) -> Result<Vec<Document>> {
    let files: Vec<PathBuf> = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()))
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    let progress = ProgressBar::new(files.len() as u64);
    let template = "{msg} [{elapsed_precise}] {bar:30} {pos}/{len}";
    if let Ok(style) = ProgressStyle::with_template(template) {
        progress.set_style(style.progress_chars("=>-"));
    }
    progress.set_message("Loading documents");

    let mut documents = Vec::new();
    for file in &files {
        match load_document(file) {
            Ok(docs) => documents.extend(docs),
            Err(e) if silent_errors => {
                warn!(path = %file.display(), error = %e, "failed to load file, skipping");
            }
            Err(e) => {
                progress.abandon();
                return Err(e);
            }
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    info!(
        directory = %path.display(),
        files = files.len(),
        documents = documents.len(),
        "loaded directory"
    );
    Ok(documents)
}

/// Fetch a web page or an online PDF.
///
/// URLs whose path ends in `.pdf` are parsed as PDF; everything else is
/// treated as an HTML page and reduced to its text.
pub async fn load_url(client: &reqwest::Client, url: &str) -> Result<Vec<Document>> {
    let load_err =
        |e: reqwest::Error| RagError::Load { path: url.to_string(), message: e.to_string() };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(load_err)?
        .error_for_status()
        .map_err(load_err)?;

    if is_pdf_url(url) {
        let bytes = response.bytes().await.map_err(load_err)?;
        let pages = guard_pdf(url, || pdf_extract::extract_text_from_mem_by_pages(&bytes))?;
        return Ok(pdf_documents(url, pages));
    }

    let text = html_to_text(&response.text().await.map_err(load_err)?);
    Ok(vec![Document::from_source(url, text, url)])
}

/// Load whatever `source` refers to.
///
/// # Errors
///
/// Every failure, including a source that cannot be classified or that
/// yields no documents, is reported as [`RagError::DataSource`].
pub async fn load_data_source(source: &str) -> Result<Vec<Document>> {
    let kind = classify(source);
    let loaded = match kind {
        SourceKind::Directory => {
            let dir = PathBuf::from(source);
            blocking(move || load_directory(&dir, true)).await
        }
        SourceKind::File => {
            let file = PathBuf::from(source);
            blocking(move || load_document(&file)).await
        }
        SourceKind::Url => load_url(&reqwest::Client::new(), source).await,
        SourceKind::Unknown => Err(RagError::UnsupportedFormat {
            path: source.to_string(),
            reason: "not an existing file, directory or http(s) URL".into(),
        }),
    };

    let result = loaded.and_then(|docs| {
        if docs.iter().all(|d| d.text.trim().is_empty()) {
            Err(RagError::Load { path: source.to_string(), message: "no text found".into() })
        } else {
            Ok(docs)
        }
    });

    result.map_err(|e| {
        let err = RagError::DataSource {
            source_name: source.to_string(),
            message: format!("{e}. Consider contributing: {PROJECT_URL}"),
        };
        error!(source = source, ?kind, error = %e, "failed to load data source");
        err
    })
}

async fn blocking<T: Send + 'static>(f: impl FnOnce() -> Result<T> + Send + 'static) -> Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::PipelineError(format!("loader task failed: {e}")))?
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn is_pdf_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".pdf")
}

fn source_of(path: &Path) -> String {
    path.display().to_string()
}

fn load_failed(path: &Path, e: impl std::fmt::Display) -> RagError {
    RagError::Load { path: source_of(path), message: e.to_string() }
}

fn load_text(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path).map_err(|e| load_failed(path, e))?;
    let source = source_of(path);
    Ok(vec![Document::from_source(source.clone(), text, &source)])
}

/// One document per record, each field rendered as `header: value`.
fn load_csv(path: &Path) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| load_failed(path, e))?;
    let headers = reader.headers().map_err(|e| load_failed(path, e))?.clone();
    let source = source_of(path);

    reader
        .records()
        .enumerate()
        .map(|(row, record)| {
            let record = record.map_err(|e| load_failed(path, e))?;
            let text = headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Document::from_source(format!("{source}#row{row}"), text, &source)
                .with_metadata(ROW_KEY, row.to_string()))
        })
        .collect()
}

/// PDF text, one document per page with text.
fn load_pdf(path: &Path) -> Result<Vec<Document>> {
    let source = source_of(path);
    let pages = guard_pdf(&source, || pdf_extract::extract_text_by_pages(path))?;
    Ok(pdf_documents(&source, pages))
}

fn pdf_documents(source: &str, pages: Vec<String>) -> Vec<Document> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| {
            Document::from_source(format!("{source}#page{}", i + 1), page, source)
                .with_metadata(PAGE_KEY, (i + 1).to_string())
        })
        .collect()
}

/// Run the PDF parser, reporting its errors and panics as load errors of
/// this one source.
fn guard_pdf<E: std::fmt::Display>(
    source: &str,
    extract: impl FnOnce() -> std::result::Result<Vec<String>, E>,
) -> Result<Vec<String>> {
    let load_err = |message: String| RagError::Load { path: source.to_string(), message };
    match panic::catch_unwind(AssertUnwindSafe(extract)) {
        Ok(pages) => pages.map_err(|e| load_err(e.to_string())),
        Err(payload) => {
            let cause = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown cause".into());
            Err(load_err(format!("PDF parser panicked: {cause}")))
        }
    }
}

fn load_generic(path: &Path) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path).map_err(|e| load_failed(path, e))?;
    let source = source_of(path);

    let text = match String::from_utf8(bytes) {
        Ok(text) if !text.contains('\0') => text,
        _ => {
            return Err(RagError::UnsupportedFormat {
                path: source,
                reason: "binary content without a dedicated loader".into(),
            });
        }
    };

    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let text = if matches!(ext.as_deref(), Some("html" | "htm")) || looks_like_html(&text) {
        html_to_text(&text)
    } else {
        text
    };

    Ok(vec![Document::from_source(source.clone(), text, &source)])
}

fn looks_like_html(text: &str) -> bool {
    let head = text.trim_start().get(..64).unwrap_or(text.trim_start()).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Reduce an HTML page to its visible text, one text run per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    root.descendants()
        .filter_map(|node| {
            let text = match node.value() {
                Node::Text(text) => text,
                _ => return None,
            };
            let hidden = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| e.name().to_string()))
                .is_some_and(|name| SKIPPED_ELEMENTS.contains(&name.as_str()));
            let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
            (!hidden && !line.is_empty()).then_some(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sources() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();

        assert_eq!(classify(dir.path().to_str().unwrap()), SourceKind::Directory);
        assert_eq!(classify(file.to_str().unwrap()), SourceKind::File);
        assert_eq!(classify("https://example.com"), SourceKind::Url);
        assert_eq!(classify("no/such/thing"), SourceKind::Unknown);
    }

    #[test]
    fn loads_text_with_source_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "some notes").unwrap();

        let docs = load_document(&file).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "some notes");
        assert_eq!(docs[0].source().unwrap(), file.display().to_string());
    }

    #[test]
    fn loads_csv_rows_as_documents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("people.CSV");
        std::fs::write(&file, "name,city\nAda,London\nGrace,Arlington\n").unwrap();

        let docs = load_document(&file).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].text, "name: Grace\ncity: Arlington");
        assert_eq!(docs[1].metadata.get(ROW_KEY).unwrap(), "1");
    }

    #[test]
    fn generic_loader_strips_html() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("page.html");
        std::fs::write(
            &file,
            "<html><head><style>p {}</style></head><body><h1>Title</h1>\
             <script>var x;</script><p>Body   text</p></body></html>",
        )
        .unwrap();

        let docs = load_document(&file).unwrap();
        assert_eq!(docs[0].text, "Title\nBody text");
    }

    #[test]
    fn generic_loader_reads_unknown_text_and_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("readme.md");
        std::fs::write(&md, "# Heading\n\nText").unwrap();
        assert_eq!(load_document(&md).unwrap()[0].text, "# Heading\n\nText");

        let bin = dir.path().join("blob.bin");
        std::fs::write(&bin, [0u8, 159, 146, 150]).unwrap();
        assert!(matches!(load_document(&bin), Err(RagError::UnsupportedFormat { .. })));
    }

    #[test]
    fn broken_pdf_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("broken.pdf");
        std::fs::write(&file, "not a pdf").unwrap();
        assert!(matches!(load_document(&file), Err(RagError::Load { .. })));
    }

    #[test]
    fn pdf_parser_panic_is_a_load_error_of_that_file() {
        let err = guard_pdf("scan.pdf", || -> std::result::Result<Vec<String>, String> {
            panic!("invalid cross-reference table")
        })
        .unwrap_err();
        match err {
            RagError::Load { path, message } => {
                assert_eq!(path, "scan.pdf");
                assert!(message.contains("invalid cross-reference table"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn html_to_text_drops_hidden_elements() {
        let html = "<!doctype html><html><head><title>t</title></head><body>\
                    <noscript>Enable JS</noscript><div>First  line</div>\
                    <style>.a { b: c }</style><p>Second <b>bold</b> line</p>\
                    <script>alert(1)</script><template>unused</template></body></html>";
        assert_eq!(html_to_text(html), "First line\nSecond\nbold\nline");
        assert_eq!(html_to_text("plain words"), "plain words");
    }

    #[test]
    fn pdf_urls_ignore_query_strings() {
        assert!(is_pdf_url("https://example.com/paper.PDF?download=1"));
        assert!(!is_pdf_url("https://example.com/pdf/index.html"));
    }

    #[tokio::test]
    async fn unknown_source_is_a_data_source_error() {
        let err = load_data_source("definitely/not/here.txt").await.unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, RagError::DataSource { .. }));
        assert!(message.contains("definitely/not/here.txt"));
        assert!(message.contains(PROJECT_URL));
    }

    #[tokio::test]
    async fn empty_file_is_a_data_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.txt");
        std::fs::write(&file, "   ").unwrap();
        let err = load_data_source(file.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, RagError::DataSource { .. }));
    }
}
