//! Process-wide, best-effort string intern pool.
//!
//! Used only by the out-of-band payload decode path: decoded values often
//! repeat the same strings across many records, and sharing one allocation
//! keeps resident memory down. Entries are held weakly, so the pool never
//! keeps a string alive on its own and is never required for correctness.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, Weak};

use tracing::info;

/// Env var overriding the pool's initial capacity.
const CAPACITY_ENV: &str = "TRELLIS_INTERN_CAPACITY";

const DEFAULT_CAPACITY: usize = 100_000;

struct InternPool {
    entries: Mutex<HashMap<Box<str>, Weak<str>>>,
    capacity: usize,
}

static POOL: LazyLock<InternPool> = LazyLock::new(|| {
    let capacity = std::env::var(CAPACITY_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_CAPACITY);
    info!(capacity, "string intern pool initialized");
    InternPool {
        entries: Mutex::new(HashMap::with_capacity(capacity)),
        capacity,
    }
});

/// Return a shared instance for the given string content.
///
/// If a live instance with equal content is already pooled, it is returned
/// and `s` is dropped; otherwise `s` itself is registered and returned.
/// While callers hold a returned `Arc`, repeated interning of equal content
/// yields reference-identical results.
pub fn intern(s: Arc<str>) -> Arc<str> {
    let mut entries = POOL.entries.lock().expect("lock poisoned");
    if let Some(weak) = entries.get(&*s) {
        if let Some(live) = weak.upgrade() {
            return live;
        }
    }
    if entries.len() >= POOL.capacity {
        entries.retain(|_, weak| weak.strong_count() > 0);
    }
    entries.insert(Box::from(&*s), Arc::downgrade(&s));
    s
}

/// Number of live entries currently pooled.
pub fn live_count() -> usize {
    POOL.entries
        .lock()
        .expect("lock poisoned")
        .values()
        .filter(|weak| weak.strong_count() > 0)
        .count()
}
