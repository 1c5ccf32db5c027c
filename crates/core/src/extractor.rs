use crate::error::ExtractionError;
use crate::models::{DocumentFormat, ExtractedText};
use docx_rust::document::BodyContent;
use docx_rust::DocxFile;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionError>;
}

/// Dispatches on the file extension to the PDF or DOCX reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionError> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| {
            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{}", ext.to_lowercase()))
                .unwrap_or_else(|| path.display().to_string());
            ExtractionError::UnsupportedFormat(extension)
        })?;

        if !path.is_file() {
            return Err(ExtractionError::NotFound(path.display().to_string()));
        }

        let text = match format {
            DocumentFormat::Pdf => extract_pdf_text(path)?,
            DocumentFormat::Docx => extract_docx_text(path)?,
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoText(path.display().to_string()));
        }

        debug!(file = %path.display(), ?format, chars = text.len(), "extracted text");
        Ok(ExtractedText { format, text })
    }
}

pub fn extract_text(path: &Path) -> Result<ExtractedText, ExtractionError> {
    DocumentExtractor.extract(path)
}

fn extract_pdf_text(path: &Path) -> Result<String, ExtractionError> {
    let document =
        Document::load(path).map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (_page_no, page_id) in document.get_pages() {
        let text = page_text(&document, page_id)?;
        if !text.trim().is_empty() {
            pages.push(text);
        }
    }

    if pages.is_empty() {
        return Err(ExtractionError::NoText(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages.join(PAGE_BREAK))
}

const PAGE_BREAK: &str = "\n\n";
const LINE_HEIGHT_PER_FONT_SIZE: f32 = 1.2;
/// A baseline drop larger than this many line heights starts a new paragraph.
const PARAGRAPH_GAP_LINES: f32 = 1.5;
/// Baselines closer than this fraction of a line height count as the same line.
const SAME_LINE_TOLERANCE: f32 = 0.3;
const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Walks the decoded content stream of one page and lays the shown strings
/// out as lines: a baseline change emits `\n`, and a drop wider than the
/// line leading emits a blank line so paragraphs survive extraction.
fn page_text(document: &Document, page_id: ObjectId) -> Result<String, ExtractionError> {
    let encodings = document
        .get_page_fonts(page_id)
        .into_iter()
        .map(|(name, font)| (name, font.get_font_encoding()))
        .collect::<BTreeMap<Vec<u8>, &str>>();
    let content = document
        .get_and_decode_page_content(page_id)
        .map_err(|error| ExtractionError::PdfParse(error.to_string()))?;

    let mut layout = TextLayout::default();
    let mut encoding = None;

    for operation in &content.operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "BT" => layout.begin_text(),
            "Tf" => {
                encoding = operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| encodings.get(name).copied());
                if let Some(size) = number(operands, 1) {
                    layout.font_size = size.abs();
                }
            }
            "TL" => {
                if let Some(leading) = number(operands, 0) {
                    layout.leading = leading;
                }
            }
            "Td" | "TD" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    if operation.operator == "TD" {
                        layout.leading = -ty;
                    }
                    layout.translate(tx, ty);
                }
            }
            "Tm" => {
                let matrix = (0..6)
                    .map(|index| number(operands, index))
                    .collect::<Option<Vec<_>>>();
                if let Some(matrix) = matrix {
                    layout.set_matrix([
                        matrix[0], matrix[1], matrix[2], matrix[3], matrix[4], matrix[5],
                    ]);
                }
            }
            "T*" => layout.next_line(),
            "Tj" | "TJ" => layout.show(&decode_operands(encoding, operands)),
            "'" => {
                layout.next_line();
                layout.show(&decode_operands(encoding, operands));
            }
            "\"" => {
                layout.next_line();
                layout.show(&decode_operands(encoding, operands.get(2..).unwrap_or_default()));
            }
            _ => {}
        }
    }

    Ok(layout.text)
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|operand| operand.as_float().ok())
}

fn decode_operands(encoding: Option<&str>, operands: &[Object]) -> String {
    let mut text = String::new();
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)),
            Object::Array(items) => text.push_str(&decode_operands(encoding, items)),
            // Large negative kerning in a TJ array is an inter-word gap.
            Object::Integer(offset) if *offset < -100 => text.push(' '),
            Object::Real(offset) if *offset < -100.0 => text.push(' '),
            _ => {}
        }
    }
    text
}

struct TextLayout {
    text: String,
    line_matrix: [f32; 6],
    leading: f32,
    font_size: f32,
    last_baseline: Option<f32>,
    moved: bool,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            text: String::new(),
            line_matrix: IDENTITY,
            leading: 0.0,
            font_size: 0.0,
            last_baseline: None,
            moved: false,
        }
    }
}

impl TextLayout {
    fn begin_text(&mut self) {
        self.set_matrix(IDENTITY);
    }

    fn set_matrix(&mut self, matrix: [f32; 6]) {
        self.line_matrix = matrix;
        self.moved = true;
    }

    fn translate(&mut self, tx: f32, ty: f32) {
        let [a, b, c, d, e, f] = self.line_matrix;
        self.line_matrix[4] = e + tx * a + ty * c;
        self.line_matrix[5] = f + tx * b + ty * d;
        self.moved = true;
    }

    fn next_line(&mut self) {
        self.translate(0.0, -self.line_height());
    }

    /// Line height in text space; falls back to the font size when no
    /// leading was set.
    fn line_height(&self) -> f32 {
        let height = if self.leading > 0.0 {
            self.leading
        } else {
            self.font_size * LINE_HEIGHT_PER_FONT_SIZE
        };
        height.max(1.0)
    }

    fn vertical_scale(&self) -> f32 {
        let [_, _, c, d, _, _] = self.line_matrix;
        let scale = c.hypot(d);
        if scale > 0.0 {
            scale
        } else {
            1.0
        }
    }

    fn show(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let baseline = self.line_matrix[5];
        if let Some(previous) = self.last_baseline {
            let line = self.line_height() * self.vertical_scale();
            let drop = previous - baseline;

            if drop.abs() <= line * SAME_LINE_TOLERANCE {
                if self.moved && !self.text.ends_with(char::is_whitespace) {
                    self.text.push(' ');
                }
            } else if drop > line * PARAGRAPH_GAP_LINES {
                self.text.push_str("\n\n");
            } else {
                self.text.push('\n');
            }
        }

        self.text.push_str(fragment);
        self.last_baseline = Some(baseline);
        self.moved = false;
    }
}

fn extract_docx_text(path: &Path) -> Result<String, ExtractionError> {
    let file = DocxFile::from_file(path)
        .map_err(|error| ExtractionError::DocxParse(format!("{error:?}")))?;
    let docx = file
        .parse()
        .map_err(|error| ExtractionError::DocxParse(format!("{error:?}")))?;

    let paragraphs = docx
        .document
        .body
        .content
        .iter()
        .filter_map(|content| match content {
            BodyContent::Paragraph(paragraph) => Some(paragraph.text()),
            _ => None,
        })
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>();

    Ok(paragraphs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::{extract_text, ExtractionError};
    use crate::chunking::chunk_text;
    use crate::models::{ChunkingOptions, DocumentFormat};
    use crate::testing::{text, write_docx, write_pdf};
    use lopdf::content::Operation;
    use lopdf::Object;
    use std::fs;
    use tempfile::tempdir;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn begin(size: i64) -> Vec<Operation> {
        vec![op("BT", vec![]), op("Tf", vec!["F1".into(), size.into()])]
    }

    #[test]
    fn pdf_lines_and_paragraphs_survive_extraction() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("manual.pdf");

        let mut first_page = begin(12);
        first_page.extend([
            op("TL", vec![14.into()]),
            op("Td", vec![72.into(), 720.into()]),
            op("Tj", vec![text("The pump must be primed")]),
            op("T*", vec![]),
            op("Tj", vec![text("before start.")]),
            op("Td", vec![0.into(), (-28).into()]),
            op("Tj", vec![text("Inspect every seal weekly.")]),
            op("ET", vec![]),
        ]);
        first_page.extend(begin(12));
        first_page.extend([
            op("Td", vec![72.into(), 600.into()]),
            op("Tj", vec![text("Replace the filter when pres-")]),
            op("ET", vec![]),
        ]);
        first_page.extend(begin(12));
        first_page.extend([
            op("Td", vec![72.into(), 586.into()]),
            op("Tj", vec![text("sure drops.")]),
            op("ET", vec![]),
        ]);

        let mut second_page = begin(12);
        second_page.extend([
            op("Td", vec![72.into(), 720.into()]),
            op(
                "TJ",
                vec![Object::Array(vec![text("Check the"), (-250).into(), text("valve.")])],
            ),
            op("ET", vec![]),
        ]);

        write_pdf(&path, vec![first_page, second_page]);

        let extracted = extract_text(&path)?;
        assert_eq!(extracted.format, DocumentFormat::Pdf);
        assert_eq!(
            extracted.text,
            "The pump must be primed\nbefore start.\n\nInspect every seal weekly.\n\n\
             Replace the filter when pres-\nsure drops.\n\nCheck the valve."
        );

        let chunks = chunk_text(&extracted, ChunkingOptions::default())?;
        assert_eq!(
            chunks,
            vec![
                "The pump must be primed before start.",
                "Inspect every seal weekly.",
                "Replace the filter when pressure drops.",
                "Check the valve.",
            ]
        );
        Ok(())
    }

    #[test]
    fn text_matrix_and_quote_operator_move_to_new_lines(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("valves.pdf");

        let mut page = begin(10);
        page.extend([
            op("TL", vec![12.into()]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 72.into(), 700.into()]),
            op("Tj", vec![text("Open the valve")]),
            op("'", vec![text("slowly.")]),
            op("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 72.into(), 640.into()]),
            op("Tj", vec![text("Then start")]),
            op("Td", vec![60.into(), 0.into()]),
            op("Tj", vec![text("the motor.")]),
            op("ET", vec![]),
        ]);
        write_pdf(&path, vec![page]);

        let extracted = extract_text(&path)?;
        assert_eq!(extracted.text, "Open the valve\nslowly.\n\nThen start the motor.");
        assert_eq!(chunk_text(&extracted, ChunkingOptions::default())?.len(), 2);
        Ok(())
    }

    #[test]
    fn pdf_without_text_operations_has_no_text() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("scan.pdf");
        write_pdf(&path, vec![vec![op("q", vec![]), op("Q", vec![])]]);

        let result = extract_text(&path);
        assert!(matches!(result, Err(ExtractionError::NoText(_))));
        Ok(())
    }

    #[test]
    fn docx_paragraphs_are_separated_by_blank_lines() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.docx");
        write_docx(&path, &["Prime the pump.", "", "Check the seals weekly."]);

        let extracted = extract_text(&path)?;
        assert_eq!(extracted.format, DocumentFormat::Docx);
        assert_eq!(extracted.text, "Prime the pump.\n\nCheck the seals weekly.");
        assert_eq!(chunk_text(&extracted, ChunkingOptions::default())?.len(), 2);
        Ok(())
    }

    #[test]
    fn unsupported_extension_is_rejected_before_reading() {
        let result = extract_text(std::path::Path::new("/nonexistent/notes.txt"));
        assert!(matches!(
            result,
            Err(ExtractionError::UnsupportedFormat(ext)) if ext == ".txt"
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = extract_text(std::path::Path::new("/nonexistent/manual.pdf"));
        assert!(matches!(result, Err(ExtractionError::NotFound(_))));
    }

    #[test]
    fn broken_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = extract_text(&path);
        assert!(matches!(result, Err(ExtractionError::PdfParse(_))));
        Ok(())
    }

    #[test]
    fn broken_docx_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.docx");
        fs::write(&path, b"not a zip archive")?;

        let result = extract_text(&path);
        assert!(matches!(result, Err(ExtractionError::DocxParse(_))));
        Ok(())
    }
}
