//! One end-to-end debug session: executor, channel, state and collaborators.

pub mod backend;
pub mod control;
pub mod executor;
pub mod registry;
pub mod token;

use sysinfo::{RefreshKind, System};

use crate::channel::command::Notification;
use crate::channel::transport::{TransportSink, TransportSource};
use crate::channel::{ChannelHandle, CommandChannel};
use crate::context::{ContextArena, ContextId, SessionId};
use crate::session::backend::BackendDescriptor;
use crate::session::control::ProcessControl;
use crate::session::executor::{ExecutorHandle, SessionExecutor};
use crate::session::registry::ProcessRegistry;
use crate::session::token::CompletionToken;

/// Inferior lifecycle. `connected` is an independent axis: a local launch
/// reaches `Running` without the session ever being attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferiorState {
    #[default]
    None,
    Running,
    Stopped,
    /// Terminal; nothing resurrects an inferior.
    Terminated,
}

/// The process being debugged, as far as the backend reports it.
#[derive(Debug, Default)]
pub struct Inferior {
    pub state: InferiorState,
    /// Pid recorded at attach time. Commands issued later use this when their
    /// context does not carry a pid of its own.
    pub pid: Option<String>,
}

/// Session events published by the control layer. Delivery order relative to
/// command replies is not guaranteed; subscribers must not assume one.
pub trait EventHook: Send {
    /// A container (process group) started on the backend.
    fn on_container_started(&self, container: ContextId);
    /// The backend reported the inferior halted.
    fn on_inferior_stopped(&self, reason: Option<String>);
}

/// Post-attach collaborator. Breakpoint state itself lives outside this
/// crate; the session only tells the tracker where to start.
pub trait BreakpointTracker: Send {
    /// Called once per successful attach with the breakpoint-capable context.
    fn start_tracking(&mut self, target: ContextId, done: CompletionToken<()>);
}

/// Tracker for sessions where nothing manages breakpoints.
#[derive(Debug, Default)]
pub struct NoopTracker;

impl BreakpointTracker for NoopTracker {
    fn start_tracking(&mut self, _target: ContextId, done: CompletionToken<()>) {
        done.resolve(());
    }
}

/// One `{pid, name}` row of the host process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Host process table, queried for local-flavoured sessions. `None` means "no
/// list available": callers disable the process picker and let the user type
/// a pid by hand.
pub trait HostProcessList: Send {
    fn processes(&self) -> Option<Vec<ProcessInfo>>;
}

/// sysinfo-backed host process table.
#[derive(Debug, Default)]
pub struct SysinfoProcessList;

impl HostProcessList for SysinfoProcessList {
    fn processes(&self) -> Option<Vec<ProcessInfo>> {
        let sys =
            System::new_with_specifics(RefreshKind::everything().without_cpu().without_memory());
        let mut list: Vec<ProcessInfo> = sys
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string(),
            })
            .collect();
        list.sort_by_key(|p| p.pid);
        Some(list)
    }
}

/// All mutable state of one session. Owned by the session executor thread;
/// the only way in from outside is a posted task, which is what makes the
/// "atomic as observed by readers" guarantees of the registry and the
/// connected/inferior fields hold.
pub struct SessionCore {
    session_id: SessionId,
    backend: BackendDescriptor,
    connection_ctx: ContextId,
    pub(crate) contexts: ContextArena,
    pub(crate) registry: ProcessRegistry,
    pub(crate) connected: bool,
    pub(crate) inferior: Inferior,
    /// Container of the current attach/launch; superseded by the next one.
    pub(crate) container: Option<ContextId>,
    pub(crate) hook: Box<dyn EventHook>,
    pub(crate) breakpoints: Box<dyn BreakpointTracker>,
    pub(crate) host_processes: Box<dyn HostProcessList>,
}

impl SessionCore {
    pub fn new(
        backend: BackendDescriptor,
        hook: Box<dyn EventHook>,
        breakpoints: Box<dyn BreakpointTracker>,
        host_processes: Box<dyn HostProcessList>,
    ) -> Self {
        let session_id = SessionId::new();
        let mut contexts = ContextArena::new(session_id);
        let connection_ctx = contexts.create_connection();
        Self {
            session_id,
            backend,
            connection_ctx,
            contexts,
            registry: ProcessRegistry::default(),
            connected: false,
            inferior: Inferior::default(),
            container: None,
            hook,
            breakpoints,
            host_processes,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn backend(&self) -> &BackendDescriptor {
        &self.backend
    }

    /// Root context of the backend connection.
    pub fn connection_context(&self) -> ContextId {
        self.connection_ctx
    }

    pub fn contexts(&self) -> &ContextArena {
        &self.contexts
    }

    /// Context creation for entities the caller knows out-of-band (manual pid
    /// entry, launches). Runs on the executor like any other mutation.
    pub fn contexts_mut(&mut self) -> &mut ContextArena {
        &mut self.contexts
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn inferior_state(&self) -> InferiorState {
        self.inferior.state
    }

    pub fn attached_pid(&self) -> Option<String> {
        self.inferior.pid.clone()
    }

    pub(crate) fn dispatch_container_started(&self, container: ContextId) {
        log::debug!(target: "session", "container started: {container:?}");
        self.hook.on_container_started(container);
    }

    pub(crate) fn handle_notification(&mut self, notification: Notification) {
        match notification {
            Notification::Stopped { reason } => {
                if self.inferior.state != InferiorState::Terminated {
                    self.inferior.state = InferiorState::Stopped;
                }
                self.hook.on_inferior_stopped(reason);
            }
            Notification::Other(line) => {
                log::debug!(target: "session", "unhandled backend notification: {line}");
            }
        }
    }
}

/// One end-to-end debug connection lifecycle.
pub struct DebugSession {
    executor: SessionExecutor,
    channel: CommandChannel,
    control: ProcessControl,
}

impl DebugSession {
    /// Wire a session over the given transport halves and collaborators.
    pub fn start(
        backend: BackendDescriptor,
        sink: Box<dyn TransportSink>,
        source: Box<dyn TransportSource>,
        hook: Box<dyn EventHook>,
        breakpoints: Box<dyn BreakpointTracker>,
        host_processes: Box<dyn HostProcessList>,
    ) -> Self {
        let core = SessionCore::new(backend, hook, breakpoints, host_processes);
        let executor = SessionExecutor::spawn(core);
        let channel = CommandChannel::start(sink, source, executor.handle());
        let control = ProcessControl::new(executor.handle(), channel.handle());
        Self {
            executor,
            channel,
            control,
        }
    }

    pub fn control(&self) -> &ProcessControl {
        &self.control
    }

    pub fn executor(&self) -> ExecutorHandle {
        self.executor.handle()
    }

    pub fn channel(&self) -> ChannelHandle {
        self.channel.handle()
    }

    /// Tear the session down: pending commands fail with `ChannelClosed`.
    pub fn shutdown(&self) {
        self.channel.close();
    }
}
