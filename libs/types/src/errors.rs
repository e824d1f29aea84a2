//! Error types for the market statistics pipeline
//!
//! Field-level problems degrade to null values and are only reported as
//! diagnostics. Structural and integrity problems are never repaired.

use thiserror::Error;

use crate::ids::{CoinId, RecordId};

/// Top-level pipeline error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Empty batch: upstream returned no documents")]
    EmptyBatch,
}

/// Host-assigned fields every raw document must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostField {
    RecordId,
    IngestedAt,
}

impl std::fmt::Display for HostField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostField::RecordId => write!(f, "record_id"),
            HostField::IngestedAt => write!(f, "ingested_at"),
        }
    }
}

/// A raw document is missing a host-assigned field and cannot be flattened
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("Document is missing {field}")]
    MissingHostField { field: HostField },

    #[error("Document {record_id} is missing {field}")]
    MissingHostFieldFor { field: HostField, record_id: RecordId },
}

impl StructuralError {
    /// The host field that was missing.
    pub fn field(&self) -> HostField {
        match self {
            StructuralError::MissingHostField { field }
            | StructuralError::MissingHostFieldFor { field, .. } => *field,
        }
    }

    /// Identifier of the offending document, when it carried one.
    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            StructuralError::MissingHostField { .. } => None,
            StructuralError::MissingHostFieldFor { record_id, .. } => Some(record_id),
        }
    }
}

/// The record set handed to the aggregator is internally inconsistent
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("Duplicate record_id in partition {}: {}", display_coin(.coin_id), join_ids(.record_ids))]
    DuplicateRecordId {
        coin_id: Option<CoinId>,
        record_ids: Vec<RecordId>,
    },
}

/// A single JSON field could not be coerced to its declared type.
///
/// Recoverable: the field becomes null and the record is still produced.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Field {field} at {path}: cannot coerce {found} to {expected}")]
pub struct FieldCoercionError {
    pub field: &'static str,
    pub path: String,
    pub expected: &'static str,
    pub found: String,
}

fn display_coin(coin_id: &Option<CoinId>) -> String {
    match coin_id {
        Some(coin) => coin.to_string(),
        None => "<null coin_id>".to_string(),
    }
}

fn join_ids(ids: &[RecordId]) -> String {
    ids.iter()
        .map(RecordId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
