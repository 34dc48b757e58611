use crate::traits::EntityId;

/// Errors from entity store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced entity does not exist in this transaction's snapshot.
    #[error("unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// A mutation was attempted in a read-only transaction.
    #[error("transaction is read-only")]
    ReadOnly,

    /// I/O error from a persistent backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
