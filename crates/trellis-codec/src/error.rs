use trellis_store::{EntityId, StoreError};
use trellis_types::TypeError;

/// Errors from encoding, decoding, and payload handling.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A type used for by-id operations declares no usable identity field.
    #[error("type `{type_name}` has no identity field value")]
    MissingIdentity { type_name: String },

    /// An expected property or link was absent during decode. Signals
    /// corruption or a schema mismatch; never recovered.
    #[error("corrupt data on {entity} field `{field}`: {reason}")]
    Corrupt {
        entity: EntityId,
        field: String,
        reason: String,
    },

    /// A value's runtime shape disagrees with its descriptor. Propagated as
    /// is; hardening beyond this error is out of scope.
    #[error("type mismatch on field `{field}`: descriptor says {expected}, value is {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A field kind the codec does not persist (e.g. a list of lists).
    #[error("unsupported shape on field `{field}`: {reason}")]
    Unsupported { field: String, reason: String },

    /// Identity canonicalization failed.
    #[error("identity encoding error: {0}")]
    Identity(String),

    /// Out-of-band payload serialization or compression failure.
    #[error("payload error: {0}")]
    Payload(String),

    /// Descriptor or enum resolution failure.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Error from the underlying entity store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error on the payload directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
