//! Document loader boundary and built-in format support

use crate::error::{Error, Result};
use crate::types::DocumentFormat;

/// Boundary trait for extracting plain text from raw document bytes
///
/// Implementations must be pure with respect to their input: the same bytes
/// and format always yield the same text.
pub trait DocumentLoader: Send + Sync {
    /// Extract plain text, or fail with a load error
    fn load(&self, data: &[u8], format: DocumentFormat) -> Result<String>;
}

/// Built-in loader for the supported formats
#[derive(Debug, Default)]
pub struct FormatLoader;

impl FormatLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }

    fn load_pdf(data: &[u8]) -> Result<String> {
        let content = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::load("document.pdf", e.to_string()))?;

        // Strip null characters and collapse blank lines left by extraction
        let content = content
            .replace('\0', "")
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(content)
    }

    fn load_docx(data: &[u8]) -> Result<String> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::load("document.docx", e.to_string()))?;

        let mut content = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                content.push_str(&t.text);
                            }
                        }
                    }
                }
                content.push('\n');
            }
        }

        Ok(content)
    }

    fn load_html(data: &[u8]) -> Result<String> {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);

        let body_selector = scraper::Selector::parse("body")
            .map_err(|e| Error::internal(format!("Invalid body selector: {}", e)))?;

        let mut content = String::new();
        if let Some(body) = document.select(&body_selector).next() {
            for text in body.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(trimmed);
                }
            }
        }

        Ok(content)
    }

    fn load_txt(data: &[u8]) -> Result<String> {
        String::from_utf8(data.to_vec())
            .map_err(|e| Error::load("document.txt", format!("not valid UTF-8: {}", e)))
    }

    fn load_csv(data: &[u8]) -> Result<String> {
        let mut reader = csv::Reader::from_reader(data);
        let mut content = String::new();

        if let Ok(headers) = reader.headers() {
            content.push_str(&headers.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        for record in reader.records() {
            let record =
                record.map_err(|e| Error::load("document.csv", e.to_string()))?;
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        Ok(content)
    }
}

impl DocumentLoader for FormatLoader {
    fn load(&self, data: &[u8], format: DocumentFormat) -> Result<String> {
        match format {
            DocumentFormat::Pdf => Self::load_pdf(data),
            DocumentFormat::Docx => Self::load_docx(data),
            DocumentFormat::Html => Self::load_html(data),
            DocumentFormat::Txt => Self::load_txt(data),
            DocumentFormat::Csv => Self::load_csv(data),
        }
    }
}
