//! Structural encoder: record + descriptors → entity graph.

use trellis_store::{EntityId, PropertyValue, Transaction};
use trellis_types::{
    DescriptorProvider, FieldDescriptor, FieldKind, Record, ScalarKind, Value,
};

use crate::error::{CodecError, CodecResult};
use crate::identity::encode_identity;
use crate::payload::PayloadStore;
use crate::SIZE_PROPERTY;

/// Recursive graph walk from a [`Record`] to entity properties, links,
/// holder entities, and blobs on the active transaction.
///
/// Dispatch is driven entirely by the field descriptors; the current field
/// name is threaded through each recursive call as a parameter.
pub struct Encoder<'a> {
    txn: &'a mut dyn Transaction,
    provider: &'a dyn DescriptorProvider,
    payloads: &'a PayloadStore,
}

impl<'a> Encoder<'a> {
    pub fn new(
        txn: &'a mut dyn Transaction,
        provider: &'a dyn DescriptorProvider,
        payloads: &'a PayloadStore,
    ) -> Self {
        Self {
            txn,
            provider,
            payloads,
        }
    }

    /// Encode every field of `record` onto `entity`, in descriptor order.
    pub fn encode_record(&mut self, record: &Record, entity: EntityId) -> CodecResult<()> {
        let provider: &'a dyn DescriptorProvider = self.provider;
        let desc = provider.require(record.type_name())?;
        for field in &desc.fields {
            self.encode_field(record.type_name(), field, record.field(&field.name), entity)?;
        }
        Ok(())
    }

    fn encode_field(
        &mut self,
        owner_type: &str,
        field: &FieldDescriptor,
        value: Option<&Value>,
        entity: EntityId,
    ) -> CodecResult<()> {
        let value = match value {
            None | Some(Value::Null) => {
                if field.nullable {
                    // Absence is encoded as nothing; the decoder infers it
                    // from the missing property/link.
                    return Ok(());
                }
                return Err(CodecError::TypeMismatch {
                    field: field.name.clone(),
                    expected: field.kind.name(),
                    found: "null",
                });
            }
            Some(v) => v,
        };

        if let Some(encoding) = &field.external {
            let namespace = format!("{owner_type}:{}", field.name);
            let path = self.payloads.encode(value, &namespace, encoding)?;
            self.txn.set_property(
                entity,
                &field.name,
                PropertyValue::from(path.to_string_lossy().into_owned()),
            )?;
            return Ok(());
        }

        if field.identity {
            // Identity values become a scalar property regardless of their
            // underlying kind; the canonical string is the lookup key.
            let encoded = encode_identity(value)?;
            self.txn
                .set_property(entity, &field.name, PropertyValue::from(encoded))?;
            return Ok(());
        }

        self.encode_kind(owner_type, &field.name, &field.kind, value, entity)
    }

    /// Encode one value under `tag` on `entity`, whose type tag is
    /// `owner_type`. Shared by record fields and map/collection elements.
    fn encode_kind(
        &mut self,
        owner_type: &str,
        tag: &str,
        kind: &FieldKind,
        value: &Value,
        entity: EntityId,
    ) -> CodecResult<()> {
        match kind {
            FieldKind::Scalar(scalar) => {
                let prop = scalar_property(tag, *scalar, value)?;
                self.txn.set_property(entity, tag, prop)?;
            }
            FieldKind::Enum { .. } => {
                let Value::Enum(symbol) = value else {
                    return Err(mismatch(tag, kind, value));
                };
                let ordinal = kind.enum_ordinal(symbol)?;
                self.txn
                    .set_property(entity, tag, PropertyValue::Int(ordinal))?;
            }
            FieldKind::Bytes => {
                let Value::Bytes(bytes) = value else {
                    return Err(mismatch(tag, kind, value));
                };
                self.txn.set_blob(entity, tag, bytes.clone())?;
            }
            FieldKind::Record(_) => {
                let Value::Record(record) = value else {
                    return Err(mismatch(tag, kind, value));
                };
                // The child entity is named after the value's runtime type.
                let child = self.txn.new_entity(record.type_name())?;
                self.encode_record(record, child)?;
                self.txn.set_link(entity, tag, child)?;
            }
            FieldKind::List(elem) | FieldKind::Set(elem) => {
                let items = match value {
                    Value::List(items) | Value::Set(items) => items,
                    _ => return Err(mismatch(tag, kind, value)),
                };
                self.encode_collection(owner_type, tag, elem, items, entity)?;
            }
            FieldKind::Map { key, value: val } => {
                let Value::Map(pairs) = value else {
                    return Err(mismatch(tag, kind, value));
                };
                let holder_type = format!("{owner_type}:{tag}:map");
                let holder = self.txn.new_entity(&holder_type)?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    self.encode_kind(&holder_type, &format!("k{i}"), key, k, holder)?;
                    self.encode_kind(&holder_type, &format!("v{i}"), val, v, holder)?;
                }
                self.txn.set_property(
                    holder,
                    SIZE_PROPERTY,
                    PropertyValue::Int(pairs.len() as i64),
                )?;
                self.txn.set_link(entity, tag, holder)?;
            }
        }
        Ok(())
    }

    fn encode_collection(
        &mut self,
        owner_type: &str,
        tag: &str,
        elem: &FieldKind,
        items: &[Value],
        entity: EntityId,
    ) -> CodecResult<()> {
        match elem {
            FieldKind::Record(_) => {
                // One owned entity per element, multi-linked in iteration
                // order; decode reads links back in the same order.
                for item in items {
                    let Value::Record(record) = item else {
                        return Err(mismatch(tag, elem, item));
                    };
                    let child = self.txn.new_entity(record.type_name())?;
                    self.encode_record(record, child)?;
                    self.txn.add_link(entity, tag, child)?;
                }
            }
            FieldKind::Scalar(scalar) => {
                let holder = self.txn.new_entity(&format!("{owner_type}:{tag}:list"))?;
                self.txn.set_property(
                    holder,
                    SIZE_PROPERTY,
                    PropertyValue::Int(items.len() as i64),
                )?;
                for (i, item) in items.iter().enumerate() {
                    let prop = scalar_property(tag, *scalar, item)?;
                    self.txn.set_property(holder, &i.to_string(), prop)?;
                }
                self.txn.set_link(entity, tag, holder)?;
            }
            FieldKind::Enum { .. } => {
                let holder = self.txn.new_entity(&format!("{owner_type}:{tag}:list"))?;
                self.txn.set_property(
                    holder,
                    SIZE_PROPERTY,
                    PropertyValue::Int(items.len() as i64),
                )?;
                for (i, item) in items.iter().enumerate() {
                    let Value::Enum(symbol) = item else {
                        return Err(mismatch(tag, elem, item));
                    };
                    let ordinal = elem.enum_ordinal(symbol)?;
                    self.txn
                        .set_property(holder, &i.to_string(), PropertyValue::Int(ordinal))?;
                }
                self.txn.set_link(entity, tag, holder)?;
            }
            other => {
                return Err(CodecError::Unsupported {
                    field: tag.to_string(),
                    reason: format!("collections of {} elements are not persisted", other.name()),
                });
            }
        }
        Ok(())
    }
}

fn scalar_property(tag: &str, scalar: ScalarKind, value: &Value) -> CodecResult<PropertyValue> {
    match (scalar, value) {
        (ScalarKind::Bool, Value::Bool(b)) => Ok(PropertyValue::Bool(*b)),
        (ScalarKind::Int, Value::Int(i)) => Ok(PropertyValue::Int(*i)),
        (ScalarKind::Float, Value::Float(f)) => Ok(PropertyValue::Float(*f)),
        (ScalarKind::String, Value::String(s)) => Ok(PropertyValue::String(s.clone())),
        (_, found) => Err(CodecError::TypeMismatch {
            field: tag.to_string(),
            expected: match scalar {
                ScalarKind::Bool => "bool",
                ScalarKind::Int => "int",
                ScalarKind::Float => "float",
                ScalarKind::String => "string",
            },
            found: found.kind_name(),
        }),
    }
}

fn mismatch(tag: &str, kind: &FieldKind, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field: tag.to_string(),
        expected: kind.name(),
        found: value.kind_name(),
    }
}
