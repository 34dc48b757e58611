//! Typed store client: blocking persistence primitives plus an async
//! facade that runs them on the blocking thread pool.

use std::sync::Arc;

use tracing::debug;
use trellis_codec::{
    delete_recursively, encode_identity, CodecError, Decoder, Encoder, PayloadStore,
};
use trellis_store::{EntityId, EntityStore, PropertyValue, Transaction};
use trellis_types::{
    collect_external_fields, DescriptorProvider, FieldKind, Record, ScalarKind, TypeDescriptor,
    Value,
};

use crate::error::{Error, Result};
use crate::expr::{Predicate, Query};

struct ClientInner<S> {
    store: S,
    schema: Arc<dyn DescriptorProvider>,
    payloads: PayloadStore,
}

/// Handle to one named store: the backing [`EntityStore`], the schema used
/// to encode and decode records, and the payload directory for out-of-band
/// fields.
///
/// Cloning is cheap; all clones share the same backend.
pub struct StoreClient<S: EntityStore> {
    inner: Arc<ClientInner<S>>,
}

impl<S: EntityStore> Clone for StoreClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: EntityStore> StoreClient<S> {
    pub fn new(store: S, schema: Arc<dyn DescriptorProvider>, payloads: PayloadStore) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                store,
                schema,
                payloads,
            }),
        }
    }

    /// The backing store.
    pub fn backend(&self) -> &S {
        &self.inner.store
    }

    /// The payload store serving this client's out-of-band fields.
    pub fn payloads(&self) -> &PayloadStore {
        &self.inner.payloads
    }

    /// Run `block` inside a read-write transaction, committing on success.
    ///
    /// If the commit loses the race against a concurrent writer the
    /// snapshot is refreshed and the block replayed, so the block must be
    /// safe to run more than once. An error from the block aborts the
    /// transaction and leaves the store untouched.
    pub fn in_transaction<T>(
        &self,
        block: impl Fn(&mut dyn Transaction) -> Result<T>,
    ) -> Result<T> {
        let mut txn = self.inner.store.begin()?;
        loop {
            let out = block(txn.as_mut())?;
            if txn.flush()? {
                return Ok(out);
            }
            debug!("snapshot superseded by a concurrent commit, replaying");
        }
    }

    /// Run `block` inside a read-only transaction.
    pub fn in_read_only<T>(&self, block: impl FnOnce(&dyn Transaction) -> Result<T>) -> Result<T> {
        let txn = self.inner.store.begin_read_only()?;
        block(txn.as_ref())
    }

    /// Persist a record, fully replacing any stored record with the same
    /// identity (the old subtree is deleted first, payload files included).
    pub fn store_blocking(&self, record: &Record) -> Result<()> {
        let (id_field, probe) = self.identity_probe(record)?;
        let externals = collect_external_fields(self.inner.schema.as_ref(), record.type_name());
        self.in_transaction(|txn| {
            for existing in txn.find(record.type_name(), &id_field, &probe)? {
                delete_recursively(txn, existing, &externals)?;
            }
            self.encode_root(txn, record)
        })
    }

    /// Replace a record that must already exist.
    pub fn update_blocking(&self, record: &Record) -> Result<()> {
        let (id_field, probe) = self.identity_probe(record)?;
        let externals = collect_external_fields(self.inner.schema.as_ref(), record.type_name());
        self.in_transaction(|txn| {
            let existing = txn.find(record.type_name(), &id_field, &probe)?;
            if existing.is_empty() {
                return Err(Error::NotFound {
                    type_name: record.type_name().to_string(),
                    id: probe.as_str().unwrap_or_default().to_string(),
                });
            }
            for entity in existing {
                delete_recursively(txn, entity, &externals)?;
            }
            self.encode_root(txn, record)
        })
    }

    /// Every stored record of a type, in creation order.
    pub fn get_all_blocking(&self, type_name: &str) -> Result<Vec<Record>> {
        self.in_read_only(|txn| {
            let decoder = self.decoder(txn);
            let mut records = Vec::new();
            for entity in txn.all(type_name)? {
                records.push(decoder.decode_entity(entity)?);
            }
            Ok(records)
        })
    }

    /// Look up one record by its identity value.
    pub fn find_by_id_blocking(&self, type_name: &str, id: &Value) -> Result<Option<Record>> {
        let (id_field, probe) = self.identity_probe_for(type_name, id)?;
        self.in_read_only(|txn| {
            match txn.find(type_name, &id_field, &probe)?.first() {
                Some(entity) => Ok(Some(self.decoder(txn).decode_entity(*entity)?)),
                None => Ok(None),
            }
        })
    }

    /// Records matching every predicate of `query`. An empty query matches
    /// nothing.
    pub fn find_by_blocking(&self, type_name: &str, query: &Query) -> Result<Vec<Record>> {
        self.in_read_only(|txn| {
            let decoder = self.decoder(txn);
            let mut records = Vec::new();
            for entity in self.resolve_query(txn, type_name, query)? {
                records.push(decoder.decode_entity(entity)?);
            }
            Ok(records)
        })
    }

    /// Delete the record with the given identity, subtree and payload files
    /// included. Returns `true` if a record was deleted.
    pub fn delete_by_id_blocking(&self, type_name: &str, id: &Value) -> Result<bool> {
        let (id_field, probe) = self.identity_probe_for(type_name, id)?;
        let externals = collect_external_fields(self.inner.schema.as_ref(), type_name);
        self.in_transaction(|txn| {
            let existing = txn.find(type_name, &id_field, &probe)?;
            let found = !existing.is_empty();
            for entity in existing {
                delete_recursively(txn, entity, &externals)?;
            }
            Ok(found)
        })
    }

    /// Delete every record matching `query`; returns how many were deleted.
    pub fn delete_by_blocking(&self, type_name: &str, query: &Query) -> Result<usize> {
        let externals = collect_external_fields(self.inner.schema.as_ref(), type_name);
        self.in_transaction(|txn| {
            let matched = self.resolve_query(txn, type_name, query)?;
            let count = matched.len();
            for entity in matched {
                delete_recursively(txn, entity, &externals)?;
            }
            Ok(count)
        })
    }

    /// Delete every record of a type; returns how many were deleted.
    pub fn delete_all_blocking(&self, type_name: &str) -> Result<usize> {
        let externals = collect_external_fields(self.inner.schema.as_ref(), type_name);
        self.in_transaction(|txn| {
            let all = txn.all(type_name)?;
            let count = all.len();
            for entity in all {
                delete_recursively(txn, entity, &externals)?;
            }
            Ok(count)
        })
    }

    fn encode_root(&self, txn: &mut dyn Transaction, record: &Record) -> Result<()> {
        let root = txn.new_entity(record.type_name())?;
        Encoder::new(txn, self.inner.schema.as_ref(), &self.inner.payloads)
            .encode_record(record, root)?;
        Ok(())
    }

    fn decoder<'a>(&'a self, txn: &'a dyn Transaction) -> Decoder<'a> {
        Decoder::new(txn, self.inner.schema.as_ref(), &self.inner.payloads)
    }

    /// The identity property name and comparable probe for a record.
    fn identity_probe(&self, record: &Record) -> Result<(String, PropertyValue)> {
        let desc = self.inner.schema.require(record.type_name())?;
        let field = identity_field(desc)?;
        let value = record
            .field(&field.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| CodecError::MissingIdentity {
                type_name: record.type_name().to_string(),
            })?;
        Ok((field.name.clone(), PropertyValue::from(encode_identity(value)?)))
    }

    fn identity_probe_for(&self, type_name: &str, id: &Value) -> Result<(String, PropertyValue)> {
        let desc = self.inner.schema.require(type_name)?;
        let field = identity_field(desc)?;
        Ok((field.name.clone(), PropertyValue::from(encode_identity(id)?)))
    }

    /// Resolve a query: the first predicate goes through a store index,
    /// the rest filter the candidate set in memory.
    fn resolve_query(
        &self,
        txn: &dyn Transaction,
        type_name: &str,
        query: &Query,
    ) -> Result<Vec<EntityId>> {
        let Some((first, rest)) = query.predicates().split_first() else {
            return Ok(Vec::new());
        };
        let desc = self.inner.schema.require(type_name)?;

        let mut candidates = match first {
            Predicate::Eq { field, value } => {
                let probe = probe_value(desc, field, value)?;
                txn.find(type_name, field, &probe)?
            }
            Predicate::StartsWith { field, prefix } => {
                txn.find_starting_with(type_name, field, prefix)?
            }
        };

        for predicate in rest {
            let mut kept = Vec::with_capacity(candidates.len());
            match predicate {
                Predicate::Eq { field, value } => {
                    let probe = probe_value(desc, field, value)?;
                    for entity in candidates {
                        if txn.property(entity, field)?.as_ref() == Some(&probe) {
                            kept.push(entity);
                        }
                    }
                }
                Predicate::StartsWith { field, prefix } => {
                    for entity in candidates {
                        let matched = txn
                            .property(entity, field)?
                            .and_then(|p| p.as_str().map(|s| s.starts_with(prefix.as_str())))
                            .unwrap_or(false);
                        if matched {
                            kept.push(entity);
                        }
                    }
                }
            }
            candidates = kept;
        }
        Ok(candidates)
    }
}

/// Async facade. Every call clones the client and runs the blocking
/// counterpart on the blocking thread pool.
impl<S: EntityStore + 'static> StoreClient<S> {
    pub async fn store(&self, record: Record) -> Result<()> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.store_blocking(&record)).await?
    }

    pub async fn update(&self, record: Record) -> Result<()> {
        let client = self.clone();
        tokio::task::spawn_blocking(move || client.update_blocking(&record)).await?
    }

    pub async fn get_all(&self, type_name: impl Into<String>) -> Result<Vec<Record>> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.get_all_blocking(&type_name)).await?
    }

    pub async fn find_by_id(&self, type_name: impl Into<String>, id: Value) -> Result<Option<Record>> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.find_by_id_blocking(&type_name, &id)).await?
    }

    pub async fn find_by(&self, type_name: impl Into<String>, query: Query) -> Result<Vec<Record>> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.find_by_blocking(&type_name, &query)).await?
    }

    pub async fn delete_by_id(&self, type_name: impl Into<String>, id: Value) -> Result<bool> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.delete_by_id_blocking(&type_name, &id)).await?
    }

    pub async fn delete_by(&self, type_name: impl Into<String>, query: Query) -> Result<usize> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.delete_by_blocking(&type_name, &query)).await?
    }

    pub async fn delete_all(&self, type_name: impl Into<String>) -> Result<usize> {
        let client = self.clone();
        let type_name = type_name.into();
        tokio::task::spawn_blocking(move || client.delete_all_blocking(&type_name)).await?
    }
}

fn identity_field(desc: &TypeDescriptor) -> Result<&trellis_types::FieldDescriptor> {
    desc.identity_field()
        .ok_or_else(|| {
            Error::Codec(CodecError::MissingIdentity {
                type_name: desc.type_name.clone(),
            })
        })
}

/// Convert a query probe into the property representation the encoder
/// would have stored for the field.
fn probe_value(desc: &TypeDescriptor, field_name: &str, value: &Value) -> Result<PropertyValue> {
    let field = desc.field(field_name).ok_or_else(|| Error::UnknownField {
        type_name: desc.type_name.clone(),
        field: field_name.to_string(),
    })?;
    if field.identity {
        return Ok(PropertyValue::from(encode_identity(value)?));
    }
    match (&field.kind, value) {
        (FieldKind::Scalar(ScalarKind::Bool), Value::Bool(b)) => Ok(PropertyValue::Bool(*b)),
        (FieldKind::Scalar(ScalarKind::Int), Value::Int(i)) => Ok(PropertyValue::Int(*i)),
        (FieldKind::Scalar(ScalarKind::Float), Value::Float(f)) => Ok(PropertyValue::Float(*f)),
        (FieldKind::Scalar(ScalarKind::String), Value::String(s)) => {
            Ok(PropertyValue::String(s.clone()))
        }
        (FieldKind::Enum { .. }, Value::Enum(symbol)) => {
            Ok(PropertyValue::Int(field.kind.enum_ordinal(symbol)?))
        }
        (kind, probe) => Err(Error::Codec(CodecError::Unsupported {
            field: field_name.to_string(),
            reason: format!(
                "cannot query a {} field with a {} probe",
                kind.name(),
                probe.kind_name()
            ),
        })),
    }
}
