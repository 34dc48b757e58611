//! Recursive entity-subtree deletion.

use std::path::Path;

use tracing::trace;
use trellis_store::{EntityId, StoreError, Transaction};

use crate::error::CodecResult;
use crate::payload::PayloadStore;

/// Delete `entity` together with every entity reachable through its links:
/// child records, collection elements, and holder entities.
///
/// `external_fields` is the flat list of out-of-band field names reachable
/// from the root type (see
/// [`collect_external_fields`](trellis_types::collect_external_fields));
/// any matching string property in the subtree is treated as a payload path
/// and its file removed best-effort. A missing file is logged and ignored.
///
/// Deleting an entity that is already gone is a no-op, so replayed
/// transaction blocks and overlapping deletes stay safe.
pub fn delete_recursively(
    txn: &mut dyn Transaction,
    entity: EntityId,
    external_fields: &[String],
) -> CodecResult<()> {
    match txn.entity_type(entity) {
        Ok(_) => {}
        Err(StoreError::UnknownEntity(_)) => return Ok(()),
        Err(err) => return Err(err.into()),
    }

    for field in external_fields {
        if let Some(prop) = txn.property(entity, field)? {
            if let Some(path) = prop.as_str() {
                PayloadStore::remove(Path::new(path));
            }
        }
    }

    for name in txn.link_names(entity)? {
        for target in txn.links(entity, &name)? {
            delete_recursively(txn, target, external_fields)?;
        }
        txn.delete_links(entity, &name)?;
    }

    trace!(%entity, "deleting entity subtree root");
    txn.delete_entity(entity)?;
    Ok(())
}
