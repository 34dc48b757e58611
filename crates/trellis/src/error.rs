use thiserror::Error;
use trellis_codec::CodecError;
use trellis_store::StoreError;
use trellis_types::TypeError;

/// Top-level error for client-facing operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An update targeted an id with no stored record.
    #[error("no {type_name} record with id {id}")]
    NotFound { type_name: String, id: String },

    /// A query predicate referenced a field the type does not declare.
    #[error("type {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Type(#[from] TypeError),

    /// The blocking worker task backing an async call was cancelled or
    /// panicked.
    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
