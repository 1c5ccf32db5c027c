use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("docx") {
            Some(Self::Docx)
        } else {
            None
        }
    }
}

/// Text pulled out of a source document, tagged with the format it came from
/// so the chunker knows whether PDF line-wrap repair applies.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub format: DocumentFormat,
    pub text: String,
}

/// One chunk ready for storage. The norm is derived by the store at insert time.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub chunk_index: u32,
    pub chunk_text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileSummary {
    pub file_identifier: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub file_identifier: String,
    pub chunk_index: u32,
    pub chunk_text: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub text: String,
    pub top_k: usize,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self {
            text: text.into(),
            top_k,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexedDocument {
    pub file_identifier: String,
    pub chunk_count: usize,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStage {
    Extracting,
    Chunking,
    Embedding,
    Storing,
    Done,
    Failed,
}

impl fmt::Display for IndexStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Extracting => "extracting",
            Self::Chunking => "chunking",
            Self::Embedding => "embedding",
            Self::Storing => "storing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    /// Paragraphs longer than this are split at whitespace.
    pub max_chunk_chars: usize,
    /// Queries at or below this length are embedded as a single segment.
    pub query_segment_chars: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4_000,
            query_segment_chars: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentFormat;
    use std::path::Path;

    #[test]
    fn format_detection_ignores_extension_case() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("/tmp/Report.PDF")),
            Some(DocumentFormat::Pdf)
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("notes.docx")),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(DocumentFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentFormat::from_path(Path::new("README")), None);
    }
}
