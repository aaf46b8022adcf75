//! Construction session: the ids currently being constructed.

use parking_lot::Mutex;
use tracing::trace;

use crate::{AutowireError, Result};

/// Ordered set of ids on the active construction chain
#[derive(Debug)]
pub(crate) struct ConstructionSession {
    stack: Mutex<Vec<String>>,
    max_depth: usize,
}

impl ConstructionSession {
    pub(crate) fn new(max_depth: usize) -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
            max_depth,
        }
    }

    /// Mark `id` as being constructed until the returned guard is dropped.
    ///
    /// Fails if `id` is already on the chain, reporting the chain with `id` appended.
    pub(crate) fn enter(&self, id: &str) -> Result<SessionGuard<'_>> {
        let mut stack = self.stack.lock();
        if stack.iter().any(|entered| entered == id) {
            let mut chain = stack.clone();
            chain.push(id.to_string());
            return Err(AutowireError::CircularDependency(chain));
        }
        if stack.len() >= self.max_depth {
            return Err(AutowireError::DepthExceeded(self.max_depth));
        }
        stack.push(id.to_string());
        trace!(id, depth = stack.len(), "enter construction");
        Ok(SessionGuard {
            session: self,
            id: id.to_string(),
        })
    }

    pub(crate) fn chain(&self) -> Vec<String> {
        self.stack.lock().clone()
    }
}

/// Removes its id from the session on every exit path
#[derive(Debug)]
pub(crate) struct SessionGuard<'a> {
    session: &'a ConstructionSession,
    id: String,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let mut stack = self.session.stack.lock();
        if let Some(pos) = stack.iter().rposition(|entered| *entered == self.id) {
            stack.remove(pos);
        }
        trace!(id = %self.id, depth = stack.len(), "leave construction");
    }
}
