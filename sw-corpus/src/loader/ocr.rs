//! CLI-backed OCR for image-based PDFs.
//!
//! Rasterizes pages with `pdftoppm` and recognizes them with `tesseract`,
//! both staged in a temporary directory. Availability of both binaries is
//! probed once at construction; the loader treats an absent toolchain as
//! "no OCR support" rather than failing lazily mid-ingest.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::Page;
use crate::types::CorpusError;

pub struct TesseractOcr {
    dpi: u32,
}

impl TesseractOcr {
    /// Probe the host for `tesseract` and `pdftoppm`. Returns `None` when
    /// either is missing.
    pub fn detect(dpi: u32) -> Option<Self> {
        let have_tesseract = probe("tesseract", "--version");
        let have_pdftoppm = probe("pdftoppm", "-v");
        if have_tesseract && have_pdftoppm {
            tracing::debug!(dpi, "OCR toolchain detected");
            Some(Self { dpi })
        } else {
            None
        }
    }

    /// Rasterize every page of `bytes` and run OCR over the images.
    ///
    /// A page that fails to rasterize or recognize is emitted with empty
    /// text; the document does not fail.
    pub async fn recognize_pdf(
        &self,
        source_path: &str,
        bytes: &[u8],
    ) -> Result<Vec<Page>, CorpusError> {
        let staging = tempfile::tempdir()?;
        let pdf_path = staging.path().join("input.pdf");
        tokio::fs::write(&pdf_path, bytes).await?;

        let status = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&pdf_path)
            .arg(staging.path().join("page"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(CorpusError::Extraction {
                path: source_path.into(),
                message: format!("pdftoppm exited with {status}"),
            });
        }

        let mut images = list_page_images(staging.path()).await?;
        images.sort();
        let total_pages = images.len();

        let mut pages = Vec::with_capacity(total_pages);
        for (page, image) in images.into_iter().enumerate() {
            let text = match self.recognize_image(&image).await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(
                        source = source_path,
                        page,
                        error = %err,
                        "OCR failed for page, emitting empty text"
                    );
                    String::new()
                }
            };
            pages.push(Page {
                source: source_path.to_string(),
                page,
                total_pages,
                text,
            });
        }
        Ok(pages)
    }

    async fn recognize_image(&self, image: &Path) -> Result<String, CorpusError> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .stderr(Stdio::null())
            .output()
            .await?;
        if !output.status.success() {
            return Err(CorpusError::Extraction {
                path: image.into(),
                message: format!("tesseract exited with {}", output.status),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn probe(binary: &str, flag: &str) -> bool {
    std::process::Command::new(binary)
        .arg(flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

async fn list_page_images(dir: &Path) -> Result<Vec<PathBuf>, CorpusError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("png") {
            images.push(path);
        }
    }
    Ok(images)
}
