//! Out-of-band payload store.
//!
//! Fields flagged with an [`ExternalEncoding`] bypass the entity-link graph
//! entirely: the value is run through a binary codec, optionally
//! compressed, and written to a uniquely-named file under a directory
//! namespaced by the owning type and field. Only the file path is stored on
//! the entity, as an ordinary string property. Decode reverses the pipeline
//! and passes every decoded string through the intern pool.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};
use trellis_types::{Compression, ExternalEncoding, PayloadFormat, Record, Value};
use uuid::Uuid;

use crate::error::{CodecError, CodecResult};
use crate::intern::intern;

/// Zstd level matching the rest of the storage stack.
const ZSTD_LEVEL: i32 = 3;

/// Writes and reads out-of-band payload files under one root directory.
///
/// File names are random (UUID), which is the only concurrency guard the
/// shared payload directory needs; collision probability is negligible.
#[derive(Clone, Debug)]
pub struct PayloadStore {
    root: PathBuf,
}

impl PayloadStore {
    /// Create a payload store rooted at the given directory. The directory
    /// itself is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory payload files live under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Encode a value to a fresh payload file and return its path.
    ///
    /// `namespace` is the owning `type:field` pair; its segments become the
    /// subdirectory the file is written into.
    pub fn encode(
        &self,
        value: &Value,
        namespace: &str,
        encoding: &ExternalEncoding,
    ) -> CodecResult<PathBuf> {
        let dir = self.namespace_dir(namespace);
        fs::create_dir_all(&dir)?;

        let bytes = match encoding.format {
            PayloadFormat::Bincode => {
                bincode::serialize(value).map_err(|e| CodecError::Payload(e.to_string()))?
            }
        };
        let bytes = match encoding.compression {
            Compression::Zstd => zstd::encode_all(bytes.as_slice(), ZSTD_LEVEL)
                .map_err(|e| CodecError::Payload(e.to_string()))?,
            Compression::None => bytes,
        };

        let path = dir.join(format!("{}.bin", Uuid::now_v7()));
        fs::write(&path, &bytes)?;
        trace!(namespace, path = %path.display(), "wrote out-of-band payload");
        Ok(path)
    }

    /// Decode a payload file written by [`encode`](Self::encode).
    ///
    /// Every string in the decoded value is interned before being returned.
    pub fn decode(&self, path: &Path, encoding: &ExternalEncoding) -> CodecResult<Value> {
        let bytes = fs::read(path)?;
        let bytes = match encoding.compression {
            Compression::Zstd => zstd::decode_all(bytes.as_slice())
                .map_err(|e| CodecError::Payload(e.to_string()))?,
            Compression::None => bytes,
        };
        let value = match encoding.format {
            PayloadFormat::Bincode => bincode::deserialize(&bytes)
                .map_err(|e| CodecError::Payload(e.to_string()))?,
        };
        trace!(path = %path.display(), "read out-of-band payload");
        Ok(intern_strings(value))
    }

    /// Best-effort removal of a payload file. Failures are logged and
    /// swallowed; the file may already be gone.
    pub fn remove(path: &Path) -> bool {
        match fs::remove_file(path) {
            Ok(()) => true,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "couldn't delete payload file");
                false
            }
        }
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        let mut dir = self.root.clone();
        for segment in namespace.split(':') {
            dir.push(segment);
        }
        dir
    }
}

/// Replace every string in the value tree with its interned instance.
fn intern_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(intern(s)),
        Value::Enum(s) => Value::Enum(intern(s)),
        Value::Record(record) => {
            let (type_name, fields) = record.into_parts();
            let fields = fields
                .into_iter()
                .map(|(n, v)| (n, intern_strings(v)))
                .collect();
            Value::Record(Record::from_parts(type_name, fields))
        }
        Value::List(items) => Value::List(items.into_iter().map(intern_strings).collect()),
        Value::Set(items) => Value::Set(items.into_iter().map(intern_strings).collect()),
        Value::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (intern_strings(k), intern_strings(v)))
                .collect(),
        ),
        other => other,
    }
}
