//! Deterministic stand-ins for the embedding provider and text extractor,
//! plus writers for small real PDF and DOCX files.

use crate::error::{EmbeddingError, ExtractionError};
use crate::extractor::TextExtractor;
use crate::models::{DocumentFormat, ExtractedText};
use crate::traits::EmbeddingProvider;
use async_trait::async_trait;
use docx_rust::document::Paragraph;
use docx_rust::Docx;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const VOCABULARY: [&str; 8] = [
    "pump", "seal", "filter", "pressure", "weekly", "valve", "motor", "report",
];

/// One axis per vocabulary word; texts sharing the same words embed identically.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn embed(text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        VOCABULARY
            .iter()
            .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn max_batch_size(&self) -> usize {
        100
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|text| Self::embed(text)).collect())
    }
}

/// Succeeds for the first `healthy_batches` calls, then reports a rate limit.
pub struct RateLimitedEmbedder {
    pub healthy_batches: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for RateLimitedEmbedder {
    fn max_batch_size(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.healthy_batches {
            return Err(EmbeddingError::RateLimited("quota exhausted".to_string()));
        }
        Ok(texts.iter().map(|text| KeywordEmbedder::embed(text)).collect())
    }
}

/// Serves canned text keyed by file name; unknown names fail extraction.
#[derive(Default)]
pub struct StaticExtractor {
    documents: Mutex<HashMap<String, ExtractedText>>,
}

impl StaticExtractor {
    pub fn with(self, name: &str, format: DocumentFormat, text: &str) -> Self {
        self.set(name, format, text);
        self
    }

    pub fn set(&self, name: &str, format: DocumentFormat, text: &str) {
        self.documents.lock().unwrap().insert(
            name.to_string(),
            ExtractedText {
                format,
                text: text.to_string(),
            },
        );
    }
}

impl TextExtractor for StaticExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        self.documents
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ExtractionError::PdfParse(format!("cannot read {name}")))
    }
}

pub fn text(value: &str) -> Object {
    Object::string_literal(value)
}

/// Writes a PDF with one page per entry, each page drawing its operations
/// with a Helvetica font registered as `F1`.
pub fn write_pdf(path: &Path, pages: Vec<Vec<Operation>>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let media_box: Vec<Object> = vec![0.into(), 0.into(), 595.into(), 842.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

pub fn write_docx(path: &Path, paragraphs: &[&str]) {
    let mut docx = Docx::default();
    for paragraph in paragraphs {
        docx.document.push(Paragraph::default().push_text(*paragraph));
    }
    docx.write_file(path).unwrap();
}
