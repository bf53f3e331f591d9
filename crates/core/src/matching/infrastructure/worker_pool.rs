use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;

/// Counting semaphore built on a mutex-guarded counter and a condvar.
pub struct Semaphore {
    permits: Mutex<usize>,
    freed: Condvar,
}

/// Returns its slot to the semaphore when dropped, including on unwind.
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            freed: Condvar::new(),
        }
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> SemaphorePermit<'_> {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .freed
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
        SemaphorePermit { semaphore: self }
    }

    fn release(&self) {
        *self.permits.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        self.freed.notify_one();
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Run `f`, turning a panic into its message.
///
/// Jobs that must account for every item call this themselves so the
/// failure can be reported against the item that caused it.
pub fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(&*payload))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one blocking job per item on scoped threads, at most `slots` at once.
///
/// Layout: `dispatcher [acquire slot → spawn] → workers → channel → consumer`
///
/// Each worker sends its output on a channel before giving its slot back;
/// the consumer drains the channel only once every worker has dropped its
/// sender, so aggregation sees the complete set regardless of finish order.
pub struct WorkerPool {
    slots: usize,
}

impl WorkerPool {
    /// Pool for `max_workers` requested workers. One worker's worth is left
    /// to the dispatching thread, with a floor of one slot.
    pub fn new(max_workers: usize) -> Self {
        Self {
            slots: max_workers.saturating_sub(1).max(1),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Run `job` for every item and collect the `Some` outputs.
    ///
    /// A job that panics contributes nothing; the batch carries on.
    /// Output order follows completion order, so callers that need a stable
    /// order must key or sort the results.
    pub fn run<T, R, F>(&self, items: Vec<T>, job: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Option<R> + Sync,
    {
        let semaphore = Semaphore::new(self.slots);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<R>();
        let job = &job;

        thread::scope(|s| {
            for item in items {
                let permit = semaphore.acquire();
                let result_tx = result_tx.clone();
                s.spawn(move || {
                    let _permit = permit;
                    match catch_panic(|| job(item)) {
                        Ok(Some(output)) => {
                            // Receiver outlives every worker
                            let _ = result_tx.send(output);
                        }
                        Ok(None) => {}
                        Err(message) => log::error!("Worker panicked, item dropped: {message}"),
                    }
                });
            }
            drop(result_tx);

            result_rx.iter().collect()
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(1)
    }
}
