//! Structural decoder: entity graph + descriptors → record.

use std::path::Path;

use trellis_store::{EntityId, PropertyValue, Transaction};
use trellis_types::{
    DescriptorProvider, FieldDescriptor, FieldKind, Record, ScalarKind, Value,
};

use crate::error::{CodecError, CodecResult};
use crate::identity::decode_identity;
use crate::payload::PayloadStore;
use crate::SIZE_PROPERTY;

/// Mirror of the [`Encoder`](crate::Encoder) walk: rebuilds a [`Record`]
/// from the entity graph, dispatching on the same field descriptors.
///
/// Decoding is read-only; it runs equally well inside read-only and
/// read-write transactions.
pub struct Decoder<'a> {
    txn: &'a dyn Transaction,
    provider: &'a dyn DescriptorProvider,
    payloads: &'a PayloadStore,
}

impl<'a> Decoder<'a> {
    pub fn new(
        txn: &'a dyn Transaction,
        provider: &'a dyn DescriptorProvider,
        payloads: &'a PayloadStore,
    ) -> Self {
        Self {
            txn,
            provider,
            payloads,
        }
    }

    /// Rebuild the record rooted at `entity`. The entity's type tag selects
    /// the descriptor, so subtype entities decode as their runtime type.
    pub fn decode_entity(&self, entity: EntityId) -> CodecResult<Record> {
        let type_name = self.txn.entity_type(entity)?;
        let desc = self.provider.require(&type_name)?;
        let mut record = Record::new(type_name);
        for field in &desc.fields {
            let value = self.decode_field(field, entity)?;
            record.set_field(&field.name, value);
        }
        Ok(record)
    }

    fn decode_field(&self, field: &FieldDescriptor, entity: EntityId) -> CodecResult<Value> {
        if let Some(encoding) = &field.external {
            let Some(prop) = self.txn.property(entity, &field.name)? else {
                return self.absent(field, entity);
            };
            let Some(path) = prop.as_str() else {
                return Err(self.corrupt(entity, field, "payload path is not a string"));
            };
            return self.payloads.decode(Path::new(path), encoding);
        }

        if field.identity {
            let Some(prop) = self.txn.property(entity, &field.name)? else {
                return self.absent(field, entity);
            };
            let Some(encoded) = prop.as_str() else {
                return Err(self.corrupt(entity, field, "identity is not a string"));
            };
            return decode_identity(encoded, &field.kind);
        }

        match self.decode_kind(&field.name, &field.kind, entity)? {
            Some(value) => Ok(value),
            None => self.absent(field, entity),
        }
    }

    /// Decode one value stored under `tag` on `entity`. Returns `Ok(None)`
    /// when nothing was stored under the tag.
    fn decode_kind(
        &self,
        tag: &str,
        kind: &FieldKind,
        entity: EntityId,
    ) -> CodecResult<Option<Value>> {
        let value = match kind {
            FieldKind::Scalar(scalar) => {
                match self.txn.property(entity, tag)? {
                    Some(prop) => Some(scalar_value(entity, tag, *scalar, prop)?),
                    None => None,
                }
            }
            FieldKind::Enum { .. } => match self.txn.property(entity, tag)? {
                Some(PropertyValue::Int(ordinal)) => {
                    let symbol = kind.enum_symbol(ordinal)?;
                    Some(Value::Enum(symbol.into()))
                }
                Some(_) => {
                    return Err(CodecError::Corrupt {
                        entity,
                        field: tag.to_string(),
                        reason: "enum ordinal is not an int".to_string(),
                    })
                }
                None => None,
            },
            FieldKind::Bytes => self.txn.blob(entity, tag)?.map(Value::Bytes),
            FieldKind::Record(_) => match self.txn.link(entity, tag)? {
                Some(child) => Some(Value::Record(self.decode_entity(child)?)),
                None => None,
            },
            FieldKind::List(elem) | FieldKind::Set(elem) => {
                let items = self.decode_collection(tag, elem, entity)?;
                items.map(|items| match kind {
                    FieldKind::Set(_) => Value::set(items),
                    _ => Value::List(items),
                })
            }
            FieldKind::Map { key, value } => match self.txn.link(entity, tag)? {
                Some(holder) => {
                    let size = self.holder_size(holder, tag)?;
                    let mut pairs = Vec::with_capacity(size);
                    for i in 0..size {
                        let k = self.require_element(holder, &format!("k{i}"), key)?;
                        let v = self.require_element(holder, &format!("v{i}"), value)?;
                        pairs.push((k, v));
                    }
                    Some(Value::Map(pairs))
                }
                None => None,
            },
        };
        Ok(value)
    }

    fn decode_collection(
        &self,
        tag: &str,
        elem: &FieldKind,
        entity: EntityId,
    ) -> CodecResult<Option<Vec<Value>>> {
        match elem {
            FieldKind::Record(_) => {
                // Record collections have no holder entity, so an empty
                // collection and an absent one both store zero links;
                // decode yields the empty collection.
                let targets = self.txn.links(entity, tag)?;
                let mut items = Vec::with_capacity(targets.len());
                for child in targets {
                    items.push(Value::Record(self.decode_entity(child)?));
                }
                Ok(Some(items))
            }
            FieldKind::Scalar(_) | FieldKind::Enum { .. } => {
                let Some(holder) = self.txn.link(entity, tag)? else {
                    return Ok(None);
                };
                let size = self.holder_size(holder, tag)?;
                let mut items = Vec::with_capacity(size);
                for i in 0..size {
                    items.push(self.require_element(holder, &i.to_string(), elem)?);
                }
                Ok(Some(items))
            }
            other => Err(CodecError::Unsupported {
                field: tag.to_string(),
                reason: format!("collections of {} elements are not persisted", other.name()),
            }),
        }
    }

    /// An element a holder entity claims to have must actually be present.
    fn require_element(
        &self,
        holder: EntityId,
        tag: &str,
        kind: &FieldKind,
    ) -> CodecResult<Value> {
        self.decode_kind(tag, kind, holder)?
            .ok_or_else(|| CodecError::Corrupt {
                entity: holder,
                field: tag.to_string(),
                reason: "holder element missing".to_string(),
            })
    }

    fn holder_size(&self, holder: EntityId, tag: &str) -> CodecResult<usize> {
        let size = self
            .txn
            .property(holder, SIZE_PROPERTY)?
            .and_then(|p| p.as_int())
            .ok_or_else(|| CodecError::Corrupt {
                entity: holder,
                field: tag.to_string(),
                reason: "holder has no size property".to_string(),
            })?;
        usize::try_from(size).map_err(|_| CodecError::Corrupt {
            entity: holder,
            field: tag.to_string(),
            reason: format!("negative holder size {size}"),
        })
    }

    fn absent(&self, field: &FieldDescriptor, entity: EntityId) -> CodecResult<Value> {
        if field.nullable {
            Ok(Value::Null)
        } else {
            Err(self.corrupt(entity, field, "required field has no stored value"))
        }
    }

    fn corrupt(&self, entity: EntityId, field: &FieldDescriptor, reason: &str) -> CodecError {
        CodecError::Corrupt {
            entity,
            field: field.name.clone(),
            reason: reason.to_string(),
        }
    }
}

fn scalar_value(
    entity: EntityId,
    tag: &str,
    scalar: ScalarKind,
    prop: PropertyValue,
) -> CodecResult<Value> {
    match (scalar, prop) {
        (ScalarKind::Bool, PropertyValue::Bool(b)) => Ok(Value::Bool(b)),
        (ScalarKind::Int, PropertyValue::Int(i)) => Ok(Value::Int(i)),
        (ScalarKind::Float, PropertyValue::Float(f)) => Ok(Value::Float(f)),
        (ScalarKind::String, PropertyValue::String(s)) => Ok(Value::String(s)),
        (_, found) => Err(CodecError::Corrupt {
            entity,
            field: tag.to_string(),
            reason: format!("stored property kind {found:?} does not match descriptor"),
        }),
    }
}
