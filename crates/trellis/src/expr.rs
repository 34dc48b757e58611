//! Query expression builder.
//!
//! A [`Query`] is an ordered conjunction of field predicates. The client
//! resolves the first predicate through a store index (`find` /
//! `find_starting_with`) and applies the remaining predicates as in-memory
//! filters over the candidate set, so the most selective predicate should
//! come first.

use trellis_types::Value;

/// One field predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Exact match on the stored property value.
    Eq { field: String, value: Value },
    /// Prefix match on a string property.
    StartsWith { field: String, prefix: String },
}

impl Predicate {
    /// The field this predicate constrains.
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. } | Self::StartsWith { field, .. } => field,
        }
    }
}

/// Ordered AND of predicates. An empty query matches nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    predicates: Vec<Predicate>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal `value` exactly.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Require the string `field` to start with `prefix`.
    pub fn starts_with(mut self, field: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.predicates.push(Predicate::StartsWith {
            field: field.into(),
            prefix: prefix.into(),
        });
        self
    }

    /// Predicates in the order they were added.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Returns `true` if no predicates were added.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
