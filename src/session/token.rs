//! One-shot asynchronous result handles.
//!
//! A token carries the continuation for one pending operation. Resolution
//! consumes the token, so firing twice is impossible outside this module, and
//! the internal path asserts loudly instead of ignoring a second fire - a
//! double resolution is always a protocol bug. Continuations run as tasks on
//! the token's executor, never inline on the thread that delivered the raw
//! backend reply.

use std::sync::mpsc::{channel, Receiver};

use crate::error::Error;
use crate::session::executor::ExecutorHandle;
use crate::session::SessionCore;

type Continuation<T> = Box<dyn FnOnce(&mut SessionCore, Result<T, Error>) + Send + 'static>;

pub struct CompletionToken<T: Send + 'static> {
    executor: ExecutorHandle,
    continuation: Option<Continuation<T>>,
}

impl<T: Send + 'static> CompletionToken<T> {
    pub fn new(
        executor: ExecutorHandle,
        continuation: impl FnOnce(&mut SessionCore, Result<T, Error>) + Send + 'static,
    ) -> Self {
        Self {
            executor,
            continuation: Some(Box::new(continuation)),
        }
    }

    /// A token that discards its outcome; for fire-and-forget commands.
    pub fn sink(executor: ExecutorHandle) -> Self {
        Self::new(executor, |_, _| {})
    }

    /// A token paired with a receiver the calling thread can block on.
    pub fn channelled(executor: ExecutorHandle) -> (Self, Receiver<Result<T, Error>>) {
        let (tx, rx) = channel();
        let token = Self::new(executor, move |_, result| {
            _ = tx.send(result);
        });
        (token, rx)
    }

    pub fn executor(&self) -> ExecutorHandle {
        self.executor.clone()
    }

    pub fn resolve(mut self, value: T) {
        self.fire(Ok(value));
    }

    pub fn fail(mut self, error: Error) {
        self.fire(Err(error));
    }

    pub fn complete(mut self, result: Result<T, Error>) {
        self.fire(result);
    }

    fn fire(&mut self, result: Result<T, Error>) {
        let continuation = self
            .continuation
            .take()
            .expect("completion token fired twice");
        self.executor.submit(move |core| continuation(core, result));
    }

    /// Delegation: build a token whose success is handled by `step` (which
    /// receives `parent` for the next link of the sequence) and whose failure
    /// is forwarded to `parent` untouched. This is what keeps multi-step
    /// operations short-circuiting on the first failing step.
    pub fn chain<U, F>(parent: CompletionToken<U>, step: F) -> CompletionToken<T>
    where
        U: Send + 'static,
        F: FnOnce(&mut SessionCore, T, CompletionToken<U>) + Send + 'static,
    {
        let executor = parent.executor();
        CompletionToken::new(executor, move |core, result| match result {
            Ok(value) => step(core, value, parent),
            Err(e) => parent.fail(e),
        })
    }
}

impl<T: Send + 'static> Drop for CompletionToken<T> {
    fn drop(&mut self) {
        if self.continuation.is_some() {
            log::warn!(target: "session", "completion token dropped without resolution");
        }
    }
}
