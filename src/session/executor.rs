//! The per-session serialization point.
//!
//! One thread owns all mutable session state ([`super::SessionCore`]); the
//! only way to touch it is a task posted through an [`ExecutorHandle`]. Tasks
//! never block on the backend - a round trip is a pending completion token,
//! and the thread keeps draining the queue while replies are outstanding.

use std::sync::mpsc::{channel, Sender};
use std::thread;

use crate::session::SessionCore;

pub(crate) type Task = Box<dyn FnOnce(&mut SessionCore) + Send + 'static>;

/// Cloneable handle for posting work onto the session executor.
#[derive(Clone)]
pub struct ExecutorHandle {
    tasks: Sender<Task>,
}

impl ExecutorHandle {
    /// Post a task. Posting after session teardown is a no-op apart from a
    /// warning; late completion tokens land here.
    pub fn submit(&self, task: impl FnOnce(&mut SessionCore) + Send + 'static) {
        if self.tasks.send(Box::new(task)).is_err() {
            log::warn!(target: "session", "task submitted after session executor shutdown");
        }
    }

    /// Post a task and block the calling thread until it ran. This is how
    /// external threads read session state without racing the executor.
    pub fn query<T, F>(&self, f: F) -> T
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionCore) -> T + Send + 'static,
    {
        let (tx, rx) = channel();
        self.submit(move |core| {
            _ = tx.send(f(core));
        });
        rx.recv().expect("session executor gone")
    }
}

/// The executor thread. Dropping the struct lets the thread finish once every
/// outstanding handle is gone.
pub struct SessionExecutor {
    handle: ExecutorHandle,
}

impl SessionExecutor {
    pub fn spawn(mut core: SessionCore) -> Self {
        let (tx, rx) = channel::<Task>();
        thread::Builder::new()
            .name("gmx-session".to_string())
            .spawn(move || {
                while let Ok(task) = rx.recv() {
                    task(&mut core);
                }
                log::debug!(target: "session", "session executor finished");
            })
            .expect("spawn session executor");

        Self {
            handle: ExecutorHandle { tasks: tx },
        }
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }
}
