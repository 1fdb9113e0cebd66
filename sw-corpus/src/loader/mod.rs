//! Document loading: per-page text extraction with an OCR fallback for
//! image-based PDFs.
//!
//! The OCR decision is made once per document at load time: the loader
//! samples direct extraction over the first few pages, and if the average
//! character count falls under [`LoaderConfig::ocr_threshold`] the whole
//! document is rasterized and recognized instead. The decision is recorded
//! on the returned [`LoadedDocument`] so the ingestion report can surface
//! it per file.

mod ocr;

pub use ocr::TesseractOcr;

use std::path::Path;

use scraper::Html;
use serde::{Deserialize, Serialize};

use crate::types::CorpusError;

/// Number of leading pages sampled when deciding between direct text
/// extraction and OCR.
const OCR_SAMPLE_PAGES: usize = 5;

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Logical source path of the owning document.
    pub source: String,
    /// Zero-based page index.
    pub page: usize,
    /// Total pages in the document.
    pub total_pages: usize,
    /// Raw extracted text. May be empty when a single page failed to
    /// rasterize; the document as a whole still loads.
    pub text: String,
}

/// A loaded document: its pages plus how they were produced.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub pages: Vec<Page>,
    pub ocr_used: bool,
}

/// Loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Average characters per sampled page below which a PDF is treated as
    /// image-based.
    pub ocr_threshold: usize,
    /// Rasterization resolution for the OCR path.
    pub ocr_dpi: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            ocr_threshold: 100,
            ocr_dpi: 200,
        }
    }
}

/// Extracts page-level text from uploaded documents.
///
/// Construction probes the OCR toolchain once; a loader built on a host
/// without `tesseract`/`pdftoppm` still loads text-based documents and
/// fails image-based ones with [`CorpusError::OcrUnavailable`].
pub struct DocumentLoader {
    config: LoaderConfig,
    ocr: Option<TesseractOcr>,
}

impl DocumentLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let ocr = TesseractOcr::detect(config.ocr_dpi);
        if ocr.is_none() {
            tracing::warn!("OCR toolchain not found; image-based PDFs will be rejected");
        }
        Self { config, ocr }
    }

    /// Whether the OCR fallback is available on this host.
    pub fn ocr_available(&self) -> bool {
        self.ocr.is_some()
    }

    /// Extract per-page text from `bytes`, dispatching on the extension of
    /// `source_path`.
    pub async fn load(
        &self,
        source_path: &str,
        bytes: &[u8],
    ) -> Result<LoadedDocument, CorpusError> {
        let extension = Path::new(source_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => self.load_pdf(source_path, bytes).await,
            Some("txt") | Some("md") => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                Ok(LoadedDocument {
                    pages: vec![Page {
                        source: source_path.to_string(),
                        page: 0,
                        total_pages: 1,
                        text,
                    }],
                    ocr_used: false,
                })
            }
            _ => Err(CorpusError::UnsupportedFormat {
                path: source_path.into(),
            }),
        }
    }

    /// Extract text from an HTML document (webpage ingestion path).
    ///
    /// The whole page becomes one logical [`Page`]; chunking handles the
    /// rest.
    pub fn load_html(&self, source: &str, html: &str) -> LoadedDocument {
        let text = html_to_text(html);
        LoadedDocument {
            pages: vec![Page {
                source: source.to_string(),
                page: 0,
                total_pages: 1,
                text,
            }],
            ocr_used: false,
        }
    }

    async fn load_pdf(
        &self,
        source_path: &str,
        bytes: &[u8],
    ) -> Result<LoadedDocument, CorpusError> {
        let direct = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|err| {
            CorpusError::Extraction {
                path: source_path.into(),
                message: err.to_string(),
            }
        })?;

        let sampled = direct.len().min(OCR_SAMPLE_PAGES).max(1);
        let sampled_chars: usize = direct
            .iter()
            .take(sampled)
            .map(|text| text.trim().len())
            .sum();
        let avg_chars_per_page = sampled_chars / sampled;

        if avg_chars_per_page >= self.config.ocr_threshold {
            tracing::debug!(
                source = source_path,
                pages = direct.len(),
                avg_chars_per_page,
                "direct text extraction"
            );
            let total_pages = direct.len();
            let pages = direct
                .into_iter()
                .enumerate()
                .map(|(page, text)| Page {
                    source: source_path.to_string(),
                    page,
                    total_pages,
                    text,
                })
                .collect();
            return Ok(LoadedDocument {
                pages,
                ocr_used: false,
            });
        }

        tracing::info!(
            source = source_path,
            avg_chars_per_page,
            threshold = self.config.ocr_threshold,
            "document looks image-based, falling back to OCR"
        );

        let Some(ocr) = &self.ocr else {
            return Err(CorpusError::OcrUnavailable {
                path: source_path.into(),
            });
        };

        let pages = ocr.recognize_pdf(source_path, bytes).await?;
        Ok(LoadedDocument {
            pages,
            ocr_used: true,
        })
    }
}

/// Strip markup from an HTML document, keeping block-ish boundaries as
/// newlines so the chunker still sees paragraph structure.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for text in document.root_element().text() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(trimmed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_extension_is_rejected() {
        let loader = DocumentLoader::new(LoaderConfig::default());
        let err = loader.load("notes.docx", b"irrelevant").await.unwrap_err();
        assert!(matches!(err, CorpusError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn plain_text_loads_as_single_page() {
        let loader = DocumentLoader::new(LoaderConfig::default());
        let doc = loader
            .load("notes.txt", "A rational number is a ratio.".as_bytes())
            .await
            .unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].page, 0);
        assert_eq!(doc.pages[0].total_pages, 1);
        assert!(!doc.ocr_used);
        assert!(doc.pages[0].text.contains("rational number"));
    }

    #[test]
    fn html_is_stripped_to_text() {
        let loader = DocumentLoader::new(LoaderConfig::default());
        let doc = loader.load_html(
            "https://example.com/chapter1",
            "<html><body><h1>Number Systems</h1><p>A rational number is p/q.</p></body></html>",
        );
        let text = &doc.pages[0].text;
        assert!(text.contains("Number Systems"));
        assert!(text.contains("rational number"));
        assert!(!text.contains('<'));
    }
}
