use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::matching::batch_console::BatchConsole;
use crate::matching::batch_logger::BatchLogger;
use crate::matching::encoding_cache::EncodingCache;

/// State scoped to one batch run and shared by its workers.
///
/// Created by the orchestrator at batch start and consumed at batch end;
/// nothing here outlives the batch except what [`BatchContext::finish`]
/// hands back.
pub struct BatchContext<'a> {
    cache: EncodingCache,
    console: Mutex<BatchConsole<'a>>,
}

impl<'a> BatchContext<'a> {
    pub fn new(cache: EncodingCache, logger: &'a mut dyn BatchLogger, total_images: usize) -> Self {
        Self {
            cache,
            console: Mutex::new(BatchConsole::new(logger, total_images)),
        }
    }

    pub fn cache(&self) -> &EncodingCache {
        &self.cache
    }

    /// Lock the console. A worker that panicked while holding the lock
    /// leaves it usable, since console state stays consistent per call.
    pub fn console(&self) -> MutexGuard<'_, BatchConsole<'a>> {
        self.console.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// End the batch: hand back the cache and the drained error log.
    pub fn finish(self) -> (EncodingCache, Vec<String>) {
        let mut console = self
            .console
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        (self.cache, console.take_errors())
    }
}
