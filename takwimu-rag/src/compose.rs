//! Answer composition: prompt assembly, generation, citation grounding.
//!
//! The composer is the only component that talks to the generation
//! backends, and it enforces the system's core correctness invariant: an
//! answer's citations are always a subset of the sources it was actually
//! shown as evidence. Citations are rendered from retrieved chunk
//! metadata, never from model output, so a backend cannot invent a
//! publication year any more than it can invent a source.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{error, info, warn};

use crate::config::GroundingPolicy;
use crate::document::{Answer, Citation, Retrieved};
use crate::error::{RagError, Result};
use crate::generation::BackendSelector;
use crate::retrieve::Retriever;

/// The fixed answer returned when retrieval finds no relevant evidence.
pub const NO_EVIDENCE_TEXT: &str =
    "I apologize, I cannot find that specific information in the provided knowledge base.";

/// The default system instruction. Mandates the exact citation format the
/// validator parses back out.
const DEFAULT_INSTRUCTION: &str = "\
You are a statistical research assistant answering questions about Kenya \
using official reports from the Kenya National Bureau of Statistics. Answer \
using ONLY the evidence provided below. After every factual claim, cite the \
supporting report in exactly this format: \
[Source: <report name>, Published: <year>, Data Period: <period>]. \
If the evidence does not answer the question, say so plainly instead of guessing.";

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\[Source:\s*(?P<source>.+?),\s*Published:\s*(?P<published>\d{4}(?:-\d{4})?|unknown),\s*Data Period:\s*(?P<period>\d{4}(?:-\d{4})?|unknown)\]",
        )
        .expect("citation pattern is valid")
    })
}

/// Composes grounded answers from retrieval plus generation.
pub struct AnswerComposer {
    retriever: Retriever,
    selector: BackendSelector,
    max_tokens: u32,
    max_response_chars: usize,
    grounding_policy: GroundingPolicy,
    instruction: String,
}

impl AnswerComposer {
    /// Create a composer.
    pub fn new(
        retriever: Retriever,
        selector: BackendSelector,
        max_tokens: u32,
        max_response_chars: usize,
        grounding_policy: GroundingPolicy,
        instruction: Option<String>,
    ) -> Self {
        Self {
            retriever,
            selector,
            max_tokens,
            max_response_chars,
            grounding_policy,
            instruction: instruction.unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
        }
    }

    /// Answer a question against the ingested corpus.
    ///
    /// Retrieval completes fully before generation begins. An empty
    /// retrieval short-circuits to the fixed no-evidence answer without
    /// calling any backend.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::AllBackendsExhausted`] when every backend
    /// fails, or [`RagError::Grounding`] under the fail policy when the
    /// generated text cites a source that was not retrieved.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let retrieved = self.retriever.retrieve(query).await?;
        if retrieved.is_empty() {
            info!(query, "no evidence above threshold, returning fixed refusal");
            return Ok(Answer {
                text: NO_EVIDENCE_TEXT.to_string(),
                citations: Vec::new(),
                backend_used: "none".to_string(),
            });
        }

        let prompt = self.build_prompt(query, &retrieved);
        let (raw, backend_used) = self.selector.generate(&prompt, self.max_tokens).await?;

        let (text, citations) = ground_citations(&raw, &retrieved, self.grounding_policy)?;
        let text = truncate_preserving_citations(&text, self.max_response_chars);

        Ok(Answer { text, citations, backend_used })
    }

    /// Assemble the grounded prompt: instruction, evidence blocks in
    /// ascending-distance order, then the question.
    fn build_prompt(&self, query: &str, retrieved: &[Retrieved]) -> String {
        let mut prompt = String::with_capacity(
            self.instruction.len() + query.len() + retrieved.iter().map(|r| r.chunk.text.len() + 80).sum::<usize>(),
        );
        prompt.push_str(&self.instruction);
        prompt.push_str("\n\nEvidence:\n\n");
        for r in retrieved {
            let meta = &r.chunk.meta;
            prompt.push_str(&format!(
                "--- Source: {} (Published: {}, Data Period: {}) ---\n{}\n\n",
                meta.source_name, meta.published, meta.data_period, r.chunk.text
            ));
        }
        prompt.push_str(&format!("Question: {query}\n"));
        prompt
    }
}

/// Validate the citations in generated text against retrieved evidence.
///
/// Grounded citations are collected in order of first appearance, rendered
/// from the matching chunk's metadata. Unverifiable citations are stripped
/// or fail the answer, depending on policy.
fn ground_citations(
    raw: &str,
    retrieved: &[Retrieved],
    policy: GroundingPolicy,
) -> Result<(String, Vec<Citation>)> {
    let known: HashSet<&str> =
        retrieved.iter().map(|r| r.chunk.meta.source_name.as_str()).collect();

    let mut citations: Vec<Citation> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stripped: Vec<std::ops::Range<usize>> = Vec::new();

    for caps in citation_regex().captures_iter(raw) {
        let Some(whole) = caps.get(0) else { continue };
        let source = caps.name("source").map(|m| m.as_str().trim()).unwrap_or_default();

        if known.contains(source) {
            if seen.insert(source.to_string()) {
                if let Some(r) = retrieved.iter().find(|r| r.chunk.meta.source_name == source) {
                    citations.push(r.chunk.meta.citation());
                }
            }
        } else {
            match policy {
                GroundingPolicy::Fail => {
                    error!(source_name = source, "answer cites a source that was not retrieved");
                    return Err(RagError::Grounding { source_name: source.to_string() });
                }
                GroundingPolicy::Strip => {
                    warn!(source_name = source, "stripping unverifiable citation");
                    stripped.push(whole.range());
                }
            }
        }
    }

    if stripped.is_empty() {
        return Ok((raw.to_string(), citations));
    }

    // captures_iter runs left to right, so the ranges are ascending and
    // non-overlapping.
    let mut text = String::with_capacity(raw.len());
    let mut pos = 0;
    for range in stripped {
        text.push_str(&raw[pos..range.start]);
        pos = range.end;
    }
    text.push_str(&raw[pos..]);

    Ok((text, citations))
}

/// Truncate `text` to at most `max_chars` characters without cutting
/// through a citation marker; a cut landing inside one moves to the
/// marker's start.
fn truncate_preserving_citations(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let mut cut = text.char_indices().nth(max_chars).map_or(text.len(), |(i, _)| i);
    for marker in citation_regex().find_iter(text) {
        if marker.start() >= cut {
            break;
        }
        if cut < marker.end() {
            cut = marker.start();
            break;
        }
    }

    text[..cut].trim_end().to_string()
}
