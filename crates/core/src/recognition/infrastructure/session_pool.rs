use std::ops::{Deref, DerefMut};

use crossbeam_channel::{Receiver, RecvError, Sender};

/// Fixed set of inference sessions handed out one caller at a time.
///
/// Size it to the worker pool's slot count so every concurrent worker runs
/// inference on its own session. Idle sessions wait in a bounded channel;
/// `checkout` blocks while all of them are in use.
pub struct SessionPool<S> {
    idle_tx: Sender<S>,
    idle_rx: Receiver<S>,
}

/// A checked-out session, returned to its pool on drop.
pub struct PooledSession<'a, S> {
    session: Option<S>,
    pool: &'a SessionPool<S>,
}

impl<S> SessionPool<S> {
    /// Build `count` sessions (at least one) with `factory`.
    pub fn open<E>(count: usize, mut factory: impl FnMut() -> Result<S, E>) -> Result<Self, E> {
        let size = count.max(1);
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(size);
        for _ in 0..size {
            // Capacity equals size and the receiver is held, so this never fails
            let _ = idle_tx.send(factory()?);
        }
        Ok(Self { idle_tx, idle_rx })
    }

    pub fn checkout(&self) -> Result<PooledSession<'_, S>, RecvError> {
        let session = self.idle_rx.recv()?;
        Ok(PooledSession {
            session: Some(session),
            pool: self,
        })
    }
}

impl<S> Deref for PooledSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        // Only taken in drop
        self.session.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl<S> DerefMut for PooledSession<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.session.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl<S> Drop for PooledSession<'_, S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = self.pool.idle_tx.send(session);
        }
    }
}
