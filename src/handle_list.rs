use std::sync::{Arc, Mutex};

/// Thread-safe ordered collection of FIFO handles.
///
/// Used to hold the mirror graph's edges (`sources`/`dests`). Mutation is
/// mediated by an internal lock distinct from the owning [`crate::Fifo`]'s
/// own lock, so appending/popping an edge never needs to reason about
/// re-entrancy with the FIFO's push/pull path.
#[derive(Debug)]
pub(crate) struct HandleList<H> {
    handles: Mutex<Vec<Arc<H>>>,
}

impl<H> HandleList<H> {
    pub(crate) fn new() -> HandleList<H> {
        HandleList {
            handles: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn append(&self, handle: Arc<H>) {
        self.lock().push(handle);
    }

    /// Removes and returns the first handle for which `predicate` returns
    /// `true`.
    pub(crate) fn pop_by<F>(&self, predicate: F) -> Option<Arc<H>>
    where
        F: Fn(&Arc<H>) -> bool,
    {
        let mut handles = self.lock();
        let index = handles.iter().position(predicate)?;
        Some(handles.remove(index))
    }

    /// Removes and returns the first handle, if any. Used to bulk-drain the
    /// list one element at a time.
    pub(crate) fn pop_first(&self) -> Option<Arc<H>> {
        let mut handles = self.lock();
        if handles.is_empty() {
            None
        } else {
            Some(handles.remove(0))
        }
    }

    /// Clones the current list of handles under the lock and returns it as
    /// an owned `Vec`.
    ///
    /// This is the Rust substitute for a re-entrant cursor: since the
    /// returned `Vec` holds fresh `Arc` clones and not the list's lock,
    /// iterating over it tolerates concurrent mutation of the list by
    /// another thread, and "halting" iteration early is simply breaking out
    /// of the loop over the snapshot.
    pub(crate) fn snapshot(&self) -> Vec<Arc<H>> {
        self.lock().clone()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<H>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<H> Default for HandleList<H> {
    fn default() -> HandleList<H> {
        HandleList::new()
    }
}
