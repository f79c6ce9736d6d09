use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pdf_rag_service::embedding::Embedder;
use pdf_rag_service::error::{Error, Result};
use pdf_rag_service::extractor::{OcrEngine, TextExtractor};
use pdf_rag_service::generator::Generator;
use pdf_rag_service::handlers::AppState;
use pdf_rag_service::pipeline::{PipelineSettings, RagPipeline};
use pdf_rag_service::splitter::{ChunkSettings, Chunker};
use pdf_rag_service::vector_store::LocalVectorStore;

pub const ORIGIN: &str = "http://localhost:5173";
pub const BOUNDARY: &str = "----pdf-rag-test-boundary";

/// Single-page-per-entry PDF with a Helvetica text layer.
pub fn pdf_with_text(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Multipart body with one part per `(field, filename, bytes)`.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Word-hashing embedder: questions sharing words with a chunk land near it.
pub struct WordEmbedder;

pub fn word_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; 64];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(7u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32));
        v[(hash % 64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for WordEmbedder {
    async fn embed_documents(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| word_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(word_vector(text))
    }

    fn dimension(&self) -> usize {
        64
    }
}

/// Answers with the prompt it was given, so tests can see what reached the LLM.
#[derive(Default)]
pub struct EchoGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(prompt.to_string())
    }

    fn model(&self) -> &str {
        "echo"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(Error::llm("rate limited"))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

/// OCR stub returning canned pages per file name.
#[derive(Default)]
pub struct CannedOcr {
    pub pages: HashMap<String, Vec<String>>,
}

impl OcrEngine for CannedOcr {
    fn recognize_pages(&self, pdf_path: &Path) -> Result<Vec<String>> {
        let name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.pages
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::ocr(format!("no OCR output for {name}")))
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub pipeline: Arc<RagPipeline>,
    pub root: PathBuf,
}

pub const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

pub async fn test_app(
    root: &Path,
    generator: Arc<dyn Generator>,
    ocr: CannedOcr,
    fallback_document: Option<PathBuf>,
) -> TestApp {
    test_app_with_limit(root, generator, ocr, fallback_document, UPLOAD_LIMIT).await
}

pub async fn test_app_with_limit(
    root: &Path,
    generator: Arc<dyn Generator>,
    ocr: CannedOcr,
    fallback_document: Option<PathBuf>,
    max_upload_bytes: usize,
) -> TestApp {
    let store = LocalVectorStore::open(root.join("db")).await.unwrap();
    let pipeline = Arc::new(RagPipeline::new(
        PipelineSettings {
            upload_dir: root.join("uploaded_files"),
            top_k: 4,
            fallback_document,
        },
        TextExtractor::new(Arc::new(ocr)),
        Chunker::new(ChunkSettings::default()).unwrap(),
        Arc::new(WordEmbedder),
        Arc::new(store),
        generator,
    ));
    let router =
        pdf_rag_service::build_router(AppState::new(pipeline.clone()), ORIGIN, max_upload_bytes)
            .unwrap();
    TestApp {
        router,
        pipeline,
        root: root.to_path_buf(),
    }
}
