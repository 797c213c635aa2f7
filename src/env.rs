//! Environment: shared home for a set of contexts.
//!
//! The environment tracks which contexts are alive. Its mutex guards
//! only that registry; each context is otherwise exclusively owned by
//! its caller. Cross-context collection and stowage coordinate through
//! here in higher layers.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::error::ErrorCode;

#[derive(Debug, Default)]
pub(crate) struct EnvShared {
    contexts: Mutex<BTreeSet<u64>>,
    next_id: AtomicU64,
}

impl EnvShared {
    fn register(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.contexts.lock().expect("environment registry poisoned").insert(id);
        id
    }

    pub(crate) fn forget(&self, id: u64) {
        self.contexts.lock().expect("environment registry poisoned").remove(&id);
    }
}

/// Shared home for a set of contexts. Cheap to clone; clones share the
/// registry.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    shared: Arc<EnvShared>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Create a context backed by `size_mb` MiB of arena, split into two
    /// semi-spaces. Sizes below 1 MiB are rejected as malformed.
    pub fn create_context(&self, size_mb: u32) -> Result<Context, ErrorCode> {
        if size_mb < 1 {
            return Err(ErrorCode::InvalidArgument);
        }
        let id = self.shared.register();
        match Context::build(Arc::clone(&self.shared), id, size_mb) {
            Ok(cx) => Ok(cx),
            Err(code) => {
                self.shared.forget(id);
                Err(code)
            }
        }
    }

    /// How many contexts are currently alive. Zero is the precondition
    /// for tearing the environment down.
    pub fn context_count(&self) -> usize {
        self.shared.contexts.lock().expect("environment registry poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_deregister_on_drop() {
        let env = Environment::new();
        assert_eq!(env.context_count(), 0);
        let a = env.create_context(2).unwrap();
        let b = env.create_context(2).unwrap();
        assert_eq!(env.context_count(), 2);
        drop(a);
        assert_eq!(env.context_count(), 1);
        drop(b);
        assert_eq!(env.context_count(), 0);
    }

    #[test]
    fn zero_size_is_malformed() {
        let env = Environment::new();
        assert_eq!(env.create_context(0).unwrap_err(), ErrorCode::InvalidArgument);
    }
}
