//! FIFO command channel to the backend process.
//!
//! A single connection carries strictly ordered requests; the backend answers
//! them in the same order, so reply matching is a pop from the front of the
//! pending queue. Out-of-band notification lines are routed onto the session
//! executor instead. Teardown (explicit close, backend EOF or a write error)
//! fails every still-pending token with `ChannelClosed`, in enqueue order, and
//! rejects any later enqueue immediately. The channel never retries a
//! command; retry policy belongs to the caller.

pub mod command;
pub mod transport;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::channel::command::{BackendLine, Command, Reply};
use crate::channel::transport::{TransportSink, TransportSource};
use crate::error::Error;
use crate::session::executor::ExecutorHandle;
use crate::session::token::CompletionToken;

struct PendingCommand {
    seq: u64,
    token: CompletionToken<Reply>,
}

struct Shared {
    pending: Mutex<VecDeque<PendingCommand>>,
    closed: AtomicBool,
}

impl Shared {
    /// Fail every pending token in enqueue order.
    fn drain_pending(&self) {
        let drained: Vec<PendingCommand> = {
            let mut pending = self.pending.lock().expect("lock pending commands");
            pending.drain(..).collect()
        };
        for cmd in drained {
            cmd.token.fail(Error::ChannelClosed);
        }
    }
}

/// Cloneable producer side of the channel.
#[derive(Clone)]
pub struct ChannelHandle {
    sink: Arc<Mutex<Box<dyn TransportSink>>>,
    shared: Arc<Shared>,
    next_seq: Arc<AtomicU64>,
}

impl ChannelHandle {
    /// Append a command to the outbound queue. Returns immediately; the
    /// matching reply (or channel teardown) resolves `token`.
    pub fn enqueue(&self, command: Command, token: CompletionToken<Reply>) {
        if self.shared.closed.load(Ordering::SeqCst) {
            token.fail(Error::ChannelClosed);
            return;
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let line = command.operation.render(seq);
        log::debug!(target: "channel", "-> {line}");

        // Register and write under the pending lock so queue order always
        // matches wire order.
        let write_result = {
            let mut pending = self.shared.pending.lock().expect("lock pending commands");
            pending.push_back(PendingCommand { seq, token });
            self.sink
                .lock()
                .expect("lock transport sink")
                .send_request(&line)
        };

        if let Err(e) = write_result {
            log::warn!(target: "channel", "backend write failed: {e}");
            self.close();
        }
    }

    /// Close the channel: no further commands are accepted and every pending
    /// token fails with `ChannelClosed`.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!(target: "channel", "command channel closed");
        self.shared.drain_pending();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// The channel itself; owns the reader thread for the lifetime of the
/// backend connection.
pub struct CommandChannel {
    handle: ChannelHandle,
}

impl CommandChannel {
    /// Start the channel over the given transport halves. Replies fire their
    /// command's token; notifications are posted to the session executor.
    pub fn start(
        sink: Box<dyn TransportSink>,
        source: Box<dyn TransportSource>,
        executor: ExecutorHandle,
    ) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        });
        let handle = ChannelHandle {
            sink: Arc::new(Mutex::new(sink)),
            shared: shared.clone(),
            next_seq: Arc::new(AtomicU64::new(1)),
        };

        thread::Builder::new()
            .name("gmx-backend-reader".to_string())
            .spawn(move || reader_loop(source, shared, executor))
            .expect("spawn backend reader");

        Self { handle }
    }

    pub fn handle(&self) -> ChannelHandle {
        self.handle.clone()
    }

    pub fn close(&self) {
        self.handle.close();
    }
}

fn reader_loop(mut source: Box<dyn TransportSource>, shared: Arc<Shared>, executor: ExecutorHandle) {
    loop {
        let line = match source.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!(target: "channel", "backend closed the stream");
                break;
            }
            Err(e) => {
                log::warn!(target: "channel", "backend read failed: {e}");
                break;
            }
        };
        log::debug!(target: "channel", "<- {line}");

        match BackendLine::parse(&line) {
            BackendLine::Noise => {}
            BackendLine::Notification(notification) => {
                executor.submit(move |core| core.handle_notification(notification));
            }
            BackendLine::Reply(reply) => {
                let front = {
                    let mut pending = shared.pending.lock().expect("lock pending commands");
                    pending.pop_front()
                };
                let Some(cmd) = front else {
                    log::warn!(target: "channel", "reply with no pending command: {line}");
                    continue;
                };
                let answered_seq = match &reply {
                    Ok(r) => r.seq,
                    Err((seq, _)) => *seq,
                };
                if let Some(answered) = answered_seq {
                    if answered != cmd.seq {
                        log::warn!(
                            target: "channel",
                            "reply sequence {answered} does not match command {}", cmd.seq
                        );
                    }
                }
                match reply {
                    Ok(r) => cmd.token.resolve(r),
                    Err((_, message)) => cmd.token.fail(Error::BackendRejected(message)),
                }
            }
        }
    }

    shared.closed.store(true, Ordering::SeqCst);
    shared.drain_pending();
}
