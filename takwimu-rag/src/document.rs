//! Data types for documents, chunks, retrieval results, and answers.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Required metadata carried by every document and every chunk cut from it.
///
/// `published` and `data_period` hold a year (`2024`) or a year range
/// (`2020-2024`). They feed the citation wire format verbatim, so they are
/// kept as strings rather than parsed dates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceMeta {
    /// Name of the source report, e.g. `Kenya Economic Survey 2024`.
    pub source_name: String,
    /// Publication year or range.
    pub published: String,
    /// The period the statistics cover.
    pub data_period: String,
}

fn published_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)publi(?:shed|cation\s*date|cation)\s*:?\s*(?:[A-Za-z]+\s+)?(\d{4})")
            .expect("published pattern is valid")
    })
}

fn data_period_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)data\s*period\s*:?\s*(\d{4})(?:\s*(?:-|–|to|/)\s*(\d{4}))?")
            .expect("data period pattern is valid")
    })
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:^|\D)((?:19|20)\d{2})(?:\D|$)").expect("year pattern is valid")
    })
}

impl SourceMeta {
    /// Create metadata from already-known fields.
    pub fn new(
        source_name: impl Into<String>,
        published: impl Into<String>,
        data_period: impl Into<String>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            published: published.into(),
            data_period: data_period.into(),
        }
    }

    /// Metadata with only the source name filled in.
    ///
    /// The ingestion pipeline infers the remaining fields from the document
    /// text once it has been extracted.
    pub fn named(source_name: impl Into<String>) -> Self {
        Self { source_name: source_name.into(), published: String::new(), data_period: String::new() }
    }

    /// Infer `published` and `data_period` from document text.
    ///
    /// Looks for `Published: <year>` and `Data Period: <year or range>`
    /// declarations in the text, the convention used by KNBS report
    /// front matter. Falls back to a year found in the source name, then
    /// to `unknown`.
    pub fn infer(source_name: &str, text: &str) -> Self {
        let published = published_regex()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| {
                year_regex()
                    .captures(source_name)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let data_period = data_period_regex()
            .captures(text)
            .map(|caps| {
                let start = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                match caps.get(2) {
                    Some(end) => format!("{start}-{}", end.as_str()),
                    None => start.to_string(),
                }
            })
            .unwrap_or_else(|| published.clone());

        Self { source_name: source_name.to_string(), published, data_period }
    }

    /// Check that the required fields are present.
    ///
    /// Called at the ingestion boundary so malformed input fails fast
    /// instead of producing half-labelled chunks.
    pub fn validate(&self) -> Result<()> {
        if self.source_name.trim().is_empty() {
            return Err(RagError::InvalidDocument {
                source_name: self.source_name.clone(),
                message: "missing source_name".to_string(),
            });
        }
        if self.published.trim().is_empty() {
            return Err(RagError::InvalidDocument {
                source_name: self.source_name.clone(),
                message: "missing published year".to_string(),
            });
        }
        Ok(())
    }

    /// The citation this metadata renders to.
    pub fn citation(&self) -> Citation {
        Citation {
            source_name: self.source_name.clone(),
            published: self.published.clone(),
            data_period: self.data_period.clone(),
        }
    }
}

/// Raw document content as supplied by a document source.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// Plain text, used as-is.
    Text(String),
    /// PDF bytes, run through the extractor chain before chunking.
    Pdf(Vec<u8>),
}

/// A document as handed to the ingestion pipeline: metadata plus either
/// extracted text or raw PDF bytes.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Source metadata. Empty `published`/`data_period` fields are inferred
    /// from the text after extraction.
    pub meta: SourceMeta,
    /// The document content.
    pub payload: DocumentPayload,
}

impl RawDocument {
    /// A text document with fully specified metadata.
    pub fn text(meta: SourceMeta, text: impl Into<String>) -> Self {
        Self { meta, payload: DocumentPayload::Text(text.into()) }
    }

    /// A PDF document with fully specified metadata.
    pub fn pdf(meta: SourceMeta, bytes: Vec<u8>) -> Self {
        Self { meta, payload: DocumentPayload::Pdf(bytes) }
    }
}

/// A source document with extracted text, ready to chunk.
///
/// Immutable once ingested; identified by `meta.source_name`. Re-ingesting
/// the same source name replaces its prior chunks in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Source metadata propagated to every chunk.
    pub meta: SourceMeta,
    /// The full extracted text.
    pub text: String,
}

/// A contiguous slice of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{source_name}_{index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Character offset of this chunk within the parent document.
    pub offset: usize,
    /// The vector embedding for this chunk's text. Empty until the
    /// pipeline attaches one.
    pub embedding: Vec<f32>,
    /// Metadata inherited from the parent document.
    pub meta: SourceMeta,
}

/// A retrieved [`Chunk`] paired with its distance from the query.
///
/// Lower distance means more relevant. Retrieval results are ordered
/// ascending by distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieved {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Non-negative similarity distance reported by the vector store.
    pub distance: f32,
}

/// A citation rendered into the mandated bracketed wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    /// Name of the cited report.
    pub source_name: String,
    /// Publication year or range.
    pub published: String,
    /// The period the cited statistics cover.
    pub data_period: String,
}

impl std::fmt::Display for Citation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[Source: {}, Published: {}, Data Period: {}]",
            self.source_name, self.published, self.data_period
        )
    }
}

/// The final answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The answer text, truncated to the configured maximum length.
    pub text: String,
    /// Citations backing the answer, in order of first appearance.
    /// Always a subset of the sources that were retrieved as evidence.
    pub citations: Vec<Citation>,
    /// Identifier of the generation backend that produced the text, or
    /// `none` for the no-evidence answer.
    pub backend_used: String,
}

/// One document that failed during ingestion, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFailure {
    /// The document that failed.
    pub source_name: String,
    /// Why it failed.
    pub reason: String,
}

/// Counts and per-document failures for one ingestion batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    /// Documents handed to the pipeline.
    pub documents_attempted: usize,
    /// Documents whose chunks were written to the store.
    pub documents_succeeded: usize,
    /// Documents skipped after a local failure.
    pub documents_failed: usize,
    /// Total chunks written across all succeeded documents.
    pub chunks_created: usize,
    /// The specific failures, in batch order.
    pub failures: Vec<IngestFailure>,
}
