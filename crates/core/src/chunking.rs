use crate::error::ExtractionError;
use crate::models::{ChunkingOptions, DocumentFormat, ExtractedText};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::debug;

const PARAGRAPH_BREAK: &str = "\n\n";

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', " ")
}

static HYPHEN_BREAK: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static PARAGRAPH_BREAKS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

/// Prefixes that form real compounds; a line break after `self-` keeps the
/// hyphen. Other hyphenated breaks are treated as soft and joined, which also
/// drops the hyphen of compounds not listed here.
const COMPOUND_PREFIXES: [&str; 10] = [
    "all", "co", "cross", "ex", "half", "multi", "non", "pre", "self", "well",
];

fn cached(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Result<&'static Regex, regex::Error> {
    cell.get_or_init(|| Regex::new(pattern))
        .as_ref()
        .map_err(Clone::clone)
}

/// Repairs PDF line wrapping: hyphenated breaks are joined, runs of blank
/// lines become a single paragraph break, and the remaining single newlines
/// inside a paragraph collapse to spaces.
pub fn normalize_pdf_text(text: &str) -> Result<String, ExtractionError> {
    let hyphen_break = cached(&HYPHEN_BREAK, r"(\p{L}+)-[ \t]*\n[ \t]*(\p{Ll})")?;
    let paragraph_breaks = cached(&PARAGRAPH_BREAKS, r"(?:[ \t]*\n){2,}[ \t]*")?;

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let joined = hyphen_break.replace_all(&unified, |caps: &Captures<'_>| {
        let head = &caps[1];
        let hyphen = if COMPOUND_PREFIXES.contains(&head.to_lowercase().as_str()) {
            "-"
        } else {
            ""
        };
        format!("{head}{hyphen}{}", &caps[2])
    });
    let separated = paragraph_breaks.replace_all(&joined, PARAGRAPH_BREAK);

    let paragraphs = separated
        .split(PARAGRAPH_BREAK)
        .map(normalize_whitespace)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>();

    Ok(paragraphs.join(PARAGRAPH_BREAK))
}

pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split(PARAGRAPH_BREAK)
        .map(|paragraph| paragraph.trim().to_string())
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Turns extracted document text into ordered, non-empty paragraph chunks.
pub fn chunk_text(
    extracted: &ExtractedText,
    options: ChunkingOptions,
) -> Result<Vec<String>, ExtractionError> {
    let prepared = match extracted.format {
        DocumentFormat::Pdf => normalize_pdf_text(&extracted.text)?,
        DocumentFormat::Docx => extracted.text.replace("\r\n", "\n"),
    };

    let chunks = split_paragraphs(&prepared)
        .into_iter()
        .flat_map(|paragraph| split_oversized(&paragraph, options.max_chunk_chars))
        .collect::<Vec<_>>();

    if chunks.is_empty() {
        return Err(ExtractionError::NoText(
            "text produced no chunks".to_string(),
        ));
    }

    debug!(chunks = chunks.len(), format = ?extracted.format, "split text into paragraphs");
    Ok(chunks)
}

/// Most queries are a single segment; only queries longer than the segment
/// threshold are broken up by paragraph.
pub fn split_query(query: &str, options: ChunkingOptions) -> Vec<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if trimmed.chars().count() <= options.query_segment_chars {
        return vec![trimmed.to_string()];
    }

    split_paragraphs(trimmed)
        .into_iter()
        .flat_map(|paragraph| split_oversized(&paragraph, options.query_segment_chars))
        .collect()
}

fn split_oversized(paragraph: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in paragraph.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            pieces.extend(chars.chunks(max_chars).map(|piece| piece.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed > max_chars {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}
