use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Records items only after `enable` has been called, so that production code
// pays nothing until someone (a test or the command log dialog) listens.
#[derive(Default, Clone, Debug)]
pub struct OutputTracker<T> {
    store: Arc<Mutex<Option<Vec<T>>>>,
}

impl<T> OutputTracker<T> {
    pub fn new() -> Self {
        OutputTracker {
            store: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Vec<T>>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl<T: Clone + std::fmt::Debug> OutputTracker<T> {
    pub fn enable(&self) {
        let mut inner = self.lock();
        if inner.is_none() {
            *inner = Some(vec![]);
        }
    }
    pub fn push(&self, item: T) {
        if let Some(v) = &mut *self.lock() {
            v.push(item);
        }
    }
    pub fn items(&self) -> Vec<T> {
        self.lock().clone().unwrap_or_default()
    }
}
