//! Integration tests for folder loading and ingestion.
//!
//! Covers every supported extension, per-file failures inside a batch, and
//! re-ingestion into the SQLite store.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ragbot::config::Config;
use ragbot::ingest::Ingestor;
use ragbot::knowledge::KnowledgeBase;
use ragbot::loader::{load_folder, FolderLoader};
use ragbot::sqlite_store::SqliteStore;
use ragbot_core::embedding::Embedder;
use ragbot_core::chunk::ChunkPolicy;
use ragbot_core::models::{Document, DocumentFormat};
use ragbot_core::store::VectorStore;
use tempfile::TempDir;

/// Minimal valid PDF whose only text is `phrase`. Body first, then an xref
/// table with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    pdf_with_page_resources(phrase, "/Resources << /Font << /F1 5 0 R >> >>")
}

/// Same layout as [`minimal_pdf_with_phrase`], with the page's resource
/// dictionary supplied by the caller.
fn pdf_with_page_resources(phrase: &str, resources: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(
        format!(
            "3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R {} >> endobj\n",
            resources
        )
        .as_bytes(),
    );
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

/// Minimal docx: a ZIP holding `word/document.xml` with one run of text.
fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
        phrase
    );
    zip_with(&[("word/document.xml", xml)])
}

/// Minimal pptx: one slide per phrase.
fn minimal_pptx_with_slides(phrases: &[&str]) -> Vec<u8> {
    let slides: Vec<(String, String)> = phrases
        .iter()
        .enumerate()
        .map(|(i, p)| {
            (
                format!("ppt/slides/slide{}.xml", i + 1),
                format!(
                    "<p:sld xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\" xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
                    p
                ),
            )
        })
        .collect();
    let entries: Vec<(&str, String)> = slides.iter().map(|(n, b)| (n.as_str(), b.clone())).collect();
    zip_with(&entries)
}

fn write_every_format(dir: &Path) {
    fs::write(dir.join("notes.txt"), "plain text about harbors").unwrap();
    fs::write(dir.join("guide.md"), "# Guide\n\nMarkdown about lighthouses.").unwrap();
    fs::write(dir.join("ships.csv"), "name,tonnage\nAurora,1200\nBorealis,900\n").unwrap();
    fs::write(
        dir.join("page.html"),
        "<html><head><title>Tides</title><style>p{}</style></head><body><p>Tide tables</p></body></html>",
    )
    .unwrap();
    fs::write(dir.join("report.pdf"), minimal_pdf_with_phrase("harbor report phrase")).unwrap();
    fs::write(dir.join("memo.docx"), minimal_docx_with_text("office test phrase")).unwrap();
    fs::write(dir.join("deck.pptx"), minimal_pptx_with_slides(&["first slide", "second slide"])).unwrap();
}

#[test]
fn every_supported_format_loads_one_document() {
    let tmp = TempDir::new().unwrap();
    write_every_format(tmp.path());
    fs::write(tmp.path().join("image.png"), [0x89u8, 0x50, 0x4e, 0x47]).unwrap();

    let report = FolderLoader::new(tmp.path()).unwrap().load();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.documents.len(), 7);
    assert_eq!(report.skipped.len(), 1);

    for doc in &report.documents {
        assert!(!doc.text.trim().is_empty(), "{} has no text", doc.source_id);
    }

    let by_format = |format: DocumentFormat| {
        report
            .documents
            .iter()
            .find(|d| d.format == format)
            .unwrap_or_else(|| panic!("no {} document", format))
    };
    assert!(by_format(DocumentFormat::Pdf).text.contains("harbor report phrase"));
    assert!(by_format(DocumentFormat::Docx).text.contains("office test phrase"));
    let deck = &by_format(DocumentFormat::Pptx).text;
    assert!(deck.find("first slide").unwrap() < deck.find("second slide").unwrap());
    assert!(by_format(DocumentFormat::Csv).text.contains("name: Aurora"));
    let page = by_format(DocumentFormat::Html);
    assert_eq!(page.title, "Tides");
    assert!(!page.text.contains("p{}"));
}

#[test]
fn malformed_file_fails_alone() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("a.txt"), "first good file").unwrap();
    fs::write(tmp.path().join("b.md"), "second good file").unwrap();
    fs::write(tmp.path().join("broken.pdf"), b"not a pdf at all").unwrap();

    let report = load_folder(tmp.path()).unwrap();
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].source_id.ends_with("broken.pdf"));
    assert!(!report.failures[0].reason.is_empty());
}

#[tokio::test]
async fn pdf_with_missing_font_fails_alone() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("rawdata");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "first good file").unwrap();
    fs::write(docs.join("b.txt"), "second good file").unwrap();
    fs::write(docs.join("c.pdf"), pdf_with_page_resources("lost glyphs", "")).unwrap();

    let report = load_folder(&docs).unwrap();
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].source_id.ends_with("c.pdf"));

    let mut config = Config::default();
    config.documents.folder = docs;
    let store = Arc::new(SqliteStore::open(&tmp.path().join("kb.sqlite")).await.unwrap());
    let kb = KnowledgeBase::new(&config, Arc::new(LetterEmbedder), store).unwrap();
    let ingested = kb.load_documents().await.unwrap();
    assert_eq!(ingested.documents, 2);
    assert_eq!(ingested.failures.len(), 1);
    assert!(ingested.failures[0].source.ends_with("c.pdf"));
}

/// Bag-of-letters vectors: deterministic and good enough to rank by overlap.
struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    fn dims(&self) -> usize {
        26
    }

    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 26];
                for c in t.chars().filter(char::is_ascii_alphabetic) {
                    v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
                }
                v
            })
            .collect())
    }
}

#[tokio::test]
async fn reingesting_keeps_one_chunk_set_per_source() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("rawdata");
    fs::create_dir_all(&docs).unwrap();
    write_every_format(&docs);

    let mut config = Config::default();
    config.documents.folder = docs.clone();
    config.chunking.chunk_size = 40;
    config.chunking.chunk_overlap = 10;

    let db = tmp.path().join("data/kb.sqlite");
    let store = Arc::new(SqliteStore::open(&db).await.unwrap());
    let kb = KnowledgeBase::new(&config, Arc::new(LetterEmbedder), store.clone())
        .unwrap()
        .with_store_path(&db);

    let first = kb.load_documents().await.unwrap();
    assert_eq!(first.documents, 7);
    assert!(first.failures.is_empty());
    let chunks_after_first = store.chunk_count().await.unwrap();
    assert_eq!(chunks_after_first, first.chunks);

    let second = kb.load_documents().await.unwrap();
    assert_eq!(second.chunks, first.chunks);
    assert_eq!(store.chunk_count().await.unwrap(), chunks_after_first);
    assert_eq!(store.document_count().await.unwrap(), 7);

    let hits = kb.search("lighthouses", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let stats = kb.stats().await.unwrap();
    assert_eq!(stats.documents, 7);
    assert!(stats.store_bytes > 0);
    assert_eq!(stats.chunks_by_format.values().sum::<usize>(), chunks_after_first);
}

#[tokio::test]
async fn empty_store_retrieves_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&tmp.path().join("kb.sqlite")).await.unwrap());
    let kb = KnowledgeBase::new(&Config::default(), Arc::new(LetterEmbedder), store).unwrap();
    assert!(kb.search("anything", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn whitespace_heavy_document_stores_every_chunk() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&tmp.path().join("kb.sqlite")).await.unwrap());

    let text = format!(
        "{}{}{}{}\n\n\n{}",
        " ".repeat(700),
        "a".repeat(100),
        " ".repeat(50),
        "b".repeat(300),
        "short lines\n\n".repeat(20)
    );
    let doc = Document::new("padded.txt", "padded", DocumentFormat::Text, text);

    for policy in [ChunkPolicy::default(), ChunkPolicy::new(40, 10), ChunkPolicy::new(10, 9)] {
        let ingestor = Ingestor::new(Arc::new(LetterEmbedder), store.clone(), policy);
        let written = ingestor.ingest(&doc).await.unwrap();
        assert!(written > 0);
        assert_eq!(store.chunk_count().await.unwrap(), written);
    }
}
