#![allow(dead_code)]

use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gdbmux::channel::transport::{TransportSink, TransportSource};
use gdbmux::context::ContextId;
use gdbmux::error::Error;
use gdbmux::session::backend::{BackendDescriptor, SessionType};
use gdbmux::session::token::CompletionToken;
use gdbmux::session::{
    BreakpointTracker, DebugSession, EventHook, HostProcessList, ProcessInfo,
};

pub type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

/// Scripted backend sink: records every request line and pushes the scripted
/// replies into the source queue, preserving request order.
pub struct ScriptedSink {
    sent: Arc<Mutex<Vec<String>>>,
    responder: Responder,
    out: Sender<String>,
}

impl TransportSink for ScriptedSink {
    fn send_request(&mut self, line: &str) -> io::Result<()> {
        self.sent.lock().unwrap().push(line.to_string());
        for reply in (self.responder)(line) {
            _ = self.out.send(reply);
        }
        Ok(())
    }
}

/// Source fed from an in-memory queue; `recv` error (all senders gone) reads
/// as end of stream.
pub struct QueueSource {
    lines: Receiver<String>,
}

impl TransportSource for QueueSource {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.recv().ok())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ContainerStarted(ContextId),
    InferiorStopped(Option<String>),
}

#[derive(Clone, Default)]
pub struct RecordingHook {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl EventHook for RecordingHook {
    fn on_container_started(&self, container: ContextId) {
        self.events
            .lock()
            .unwrap()
            .push(Event::ContainerStarted(container));
    }

    fn on_inferior_stopped(&self, reason: Option<String>) {
        self.events
            .lock()
            .unwrap()
            .push(Event::InferiorStopped(reason));
    }
}

#[derive(Clone, Default)]
pub struct RecordingTracker {
    pub targets: Arc<Mutex<Vec<ContextId>>>,
}

impl BreakpointTracker for RecordingTracker {
    fn start_tracking(&mut self, target: ContextId, done: CompletionToken<()>) {
        self.targets.lock().unwrap().push(target);
        done.resolve(());
    }
}

/// Host process table a test mutates between enumerations.
#[derive(Clone, Default)]
pub struct SharedProcessList {
    pub table: Arc<Mutex<Option<Vec<ProcessInfo>>>>,
}

impl HostProcessList for SharedProcessList {
    fn processes(&self) -> Option<Vec<ProcessInfo>> {
        self.table.lock().unwrap().clone()
    }
}

pub struct TestSession {
    pub session: DebugSession,
    pub sent: Arc<Mutex<Vec<String>>>,
    pub events: Arc<Mutex<Vec<Event>>>,
    pub bp_targets: Arc<Mutex<Vec<ContextId>>>,
    pub host: Arc<Mutex<Option<Vec<ProcessInfo>>>>,
    /// Out-of-band backend line injection; also keeps the source stream open.
    pub inject: Sender<String>,
}

impl TestSession {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn set_host_table(&self, table: Option<Vec<ProcessInfo>>) {
        *self.host.lock().unwrap() = table;
    }
}

pub fn start_session(
    session_type: SessionType,
    program: Option<&str>,
    responder: Responder,
) -> TestSession {
    let (inject, lines) = channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let hook = RecordingHook::default();
    let tracker = RecordingTracker::default();
    let host = SharedProcessList::default();

    let sink = ScriptedSink {
        sent: sent.clone(),
        responder,
        out: inject.clone(),
    };
    let source = QueueSource { lines };

    let session = DebugSession::start(
        BackendDescriptor::new(session_type, program.map(PathBuf::from)),
        Box::new(sink),
        Box::new(source),
        Box::new(hook.clone()),
        Box::new(tracker.clone()),
        Box::new(host.clone()),
    );

    TestSession {
        session,
        sent,
        events: hook.events,
        bp_targets: tracker.targets,
        host: host.table,
        inject,
    }
}

/// Answer every request with "<seq>^done".
pub fn ok_responder() -> Responder {
    Box::new(|line| vec![format!("{}^done", seq_of(line))])
}

/// Swallow every request; commands stay pending forever.
pub fn silent_responder() -> Responder {
    Box::new(|_| Vec::new())
}

pub fn seq_of(line: &str) -> String {
    line.chars().take_while(|c| c.is_ascii_digit()).collect()
}

pub fn wait<T: Send + 'static>(rx: &Receiver<Result<T, Error>>) -> Result<T, Error> {
    rx.recv_timeout(Duration::from_secs(5))
        .expect("operation timed out")
}

/// Barrier: returns after every task posted to the executor so far has run.
pub fn flush(session: &DebugSession) {
    session.executor().query(|_| ());
}

pub fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not met in time");
}

/// A process context as a picker or manual pid entry would create it.
pub fn process_context(session: &DebugSession, pid: &str) -> ContextId {
    let pid = pid.to_string();
    session.executor().query(move |core| {
        let connection = core.connection_context();
        core.contexts_mut().create_process(connection, Some(pid))
    })
}

/// A thread context below a fresh container of `process`.
pub fn thread_context(session: &DebugSession, process: ContextId) -> ContextId {
    session.executor().query(move |core| {
        let container = core.contexts_mut().create_container(process, "i1");
        core.contexts_mut().create_thread(container, 1)
    })
}

/// A bare container context for start/restart calls.
pub fn container_context(session: &DebugSession, pid: Option<&str>) -> ContextId {
    let pid = pid.map(str::to_string);
    session.executor().query(move |core| {
        let connection = core.connection_context();
        let process = core.contexts_mut().create_process(connection, pid);
        core.contexts_mut().create_container(process, "i1")
    })
}
