/// Errors from descriptor and value-model operations.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// No descriptor registered for the requested type.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// An enum symbol is not one of the descriptor's variants.
    #[error("unknown variant `{symbol}` for enum field")]
    UnknownVariant { symbol: String },

    /// An enum ordinal is outside the descriptor's variant list.
    #[error("enum ordinal {ordinal} out of range (variant count {count})")]
    OrdinalOutOfRange { ordinal: i64, count: usize },

    /// Variant resolution was attempted on a non-enum field kind.
    #[error("field kind `{kind}` is not an enum")]
    NotAnEnum { kind: String },
}

/// Result alias for type-model operations.
pub type TypeResult<T> = Result<T, TypeError>;
