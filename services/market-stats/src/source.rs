//! Reading raw documents from text
//!
//! Accepts either a single JSON array of documents or JSON Lines (one
//! document per line, blank lines ignored).

use serde_json::Value;
use types::record::RawDocument;

/// Errors while decoding a document source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid JSON array of documents: {0}")]
    Array(#[source] serde_json::Error),

    #[error("invalid document on line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode every raw document in `input`.
pub fn parse_documents(input: &str) -> Result<Vec<RawDocument>, SourceError> {
    if input.trim_start().starts_with('[') {
        return serde_json::from_str(input).map_err(SourceError::Array);
    }

    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| SourceError::Line { line: i + 1, source })
        })
        .collect()
}

/// Wrap bare provider payloads (e.g. a `coins/markets` response array) as
/// freshly captured documents.
pub fn capture_payloads(payloads: Vec<Value>) -> Vec<RawDocument> {
    payloads.into_iter().map(RawDocument::capture).collect()
}
