//! PDF text extraction with a fallback chain.
//!
//! KNBS publications are PDF-heavy and of mixed vintage; no single parser
//! reads all of them. [`ExtractorChain`] runs the configured
//! [`TextExtractor`]s in order and takes the first one that recovers text.
//! Extraction method never affects chunk or citation semantics, so the
//! chain is free to fall back without the rest of the pipeline noticing.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::fallback;

/// Why one extractor failed on one document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The parser could not read the PDF.
    #[error("PDF parse failed: {0}")]
    Pdf(String),
    /// The parser succeeded but recovered no text (e.g. a scanned image).
    #[error("no text recovered")]
    Empty,
}

/// Converts PDF bytes to plain text.
pub trait TextExtractor: Send + Sync {
    /// Short identifier used in logs and failure reports.
    fn name(&self) -> &'static str;

    /// Extract text from the document bytes.
    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, ExtractError>;
}

/// Primary extractor, backed by the `pdf-extract` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, ExtractError> {
        let text = pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

/// Alternate extractor, backed by `lopdf`'s content-stream text recovery.
///
/// Slower and cruder than the primary, but reads some malformed documents
/// the primary rejects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, ExtractError> {
        let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        let text = doc.extract_text(&pages).map_err(|e| ExtractError::Pdf(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

/// Ordered chain of extractors; first success wins.
pub struct ExtractorChain {
    extractors: Vec<Arc<dyn TextExtractor>>,
}

impl Default for ExtractorChain {
    /// The standard chain: `pdf-extract` first, `lopdf` as fallback.
    fn default() -> Self {
        Self { extractors: vec![Arc::new(PdfExtractor), Arc::new(LopdfExtractor)] }
    }
}

impl ExtractorChain {
    /// Build a chain from an explicit extractor list, in priority order.
    pub fn new(extractors: Vec<Arc<dyn TextExtractor>>) -> Self {
        Self { extractors }
    }

    /// Extract text from a PDF, falling through the chain on failure.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] for this document only, naming each
    /// extractor that was tried and why it failed. The caller records the
    /// failure and continues with the rest of the batch.
    pub async fn extract(&self, source_name: &str, bytes: &[u8]) -> Result<String> {
        let outcome = fallback::first_success(
            self.extractors.iter().cloned(),
            |extractor| extractor.name().to_string(),
            |extractor| async move { extractor.extract(bytes) },
        )
        .await;

        match outcome {
            Ok((text, extractor)) => {
                debug!(source_name, extractor = %extractor, chars = text.len(), "extracted PDF text");
                Ok(text)
            }
            Err(rejections) => {
                let message = rejections
                    .iter()
                    .map(|r| format!("{}: {}", r.provider, r.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!(source_name, %message, "every extractor failed");
                Err(RagError::Extraction { source_name: source_name.to_string(), message })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedExtractor {
        name: &'static str,
        result: std::result::Result<String, ()>,
    }

    impl TextExtractor for FixedExtractor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn extract(&self, _bytes: &[u8]) -> std::result::Result<String, ExtractError> {
            self.result.clone().map_err(|_| ExtractError::Pdf("broken".into()))
        }
    }

    #[tokio::test]
    async fn garbage_bytes_fail_both_real_extractors() {
        let chain = ExtractorChain::default();
        let err = chain.extract("bad.pdf", b"this is not a pdf").await.unwrap_err();
        match err {
            RagError::Extraction { source_name, message } => {
                assert_eq!(source_name, "bad.pdf");
                assert!(message.contains("pdf-extract"));
                assert!(message.contains("lopdf"));
            }
            other => panic!("expected extraction error, got {other}"),
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_extractor() {
        let chain = ExtractorChain::new(vec![
            Arc::new(FixedExtractor { name: "primary", result: Err(()) }),
            Arc::new(FixedExtractor { name: "alternate", result: Ok("recovered".into()) }),
        ]);
        let text = chain.extract("doc.pdf", b"irrelevant").await.unwrap();
        assert_eq!(text, "recovered");
    }

    #[tokio::test]
    async fn first_extractor_success_short_circuits() {
        let chain = ExtractorChain::new(vec![
            Arc::new(FixedExtractor { name: "primary", result: Ok("first".into()) }),
            Arc::new(FixedExtractor { name: "alternate", result: Ok("second".into()) }),
        ]);
        let text = chain.extract("doc.pdf", b"irrelevant").await.unwrap();
        assert_eq!(text, "first");
    }
}
