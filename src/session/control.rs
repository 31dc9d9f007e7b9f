//! Process lifecycle orchestration over the command channel.
//!
//! Every operation posts its body onto the session executor and reports
//! through the caller's completion token; nothing here blocks on the backend.
//! Multi-step sequences (bind image then attach, insert breakpoint then run)
//! are built by chaining tokens: the follow-up command is enqueued from
//! inside the predecessor's continuation, and the channel's FIFO ordering
//! does the rest.

use crate::channel::command::{Command, Operation, Reply};
use crate::channel::ChannelHandle;
use crate::context::{ContextId, ContextKind};
use crate::error::Error;
use crate::session::backend::SessionType;
use crate::session::executor::ExecutorHandle;
use crate::session::token::CompletionToken;
use crate::session::{InferiorState, SessionCore};

/// Stop symbol used when the caller asks for stop-at-entry without naming
/// one.
pub const DEFAULT_ENTRY_SYMBOL: &str = "main";

/// Backend thread-group id used until the backend hands out real group ids.
pub const UNIQUE_GROUP_ID: &str = "i1";

/// Launch attributes for start/restart.
#[derive(Debug, Clone, Default)]
pub struct StartAttributes {
    /// Halt at an entry symbol before user code runs.
    pub stop_at_entry: bool,
    /// Symbol for the entry breakpoint; [`DEFAULT_ENTRY_SYMBOL`] when unset.
    pub entry_symbol: Option<String>,
}

impl StartAttributes {
    fn entry_symbol(&self) -> &str {
        self.entry_symbol.as_deref().unwrap_or(DEFAULT_ENTRY_SYMBOL)
    }
}

/// Display data resolved for a thread's owning process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadData {
    pub name: String,
    pub pid: Option<String>,
}

/// Asynchronous process lifecycle operations of one debug session.
#[derive(Clone)]
pub struct ProcessControl {
    executor: ExecutorHandle,
    channel: ChannelHandle,
}

impl ProcessControl {
    pub fn new(executor: ExecutorHandle, channel: ChannelHandle) -> Self {
        Self { executor, channel }
    }

    /// Enumerate processes available for attach.
    ///
    /// Local-flavoured sessions query the host process table and rebuild the
    /// registry from it; `None` means the table is unavailable and the picker
    /// should be disabled. Remote sessions resolve with an empty list: there
    /// is no remote listing primitive, which is a capability gap, not an
    /// error.
    pub fn enumerate_processes(&self, done: CompletionToken<Option<Vec<ContextId>>>) {
        self.executor.submit(move |core| {
            if !core.backend().session_type.capabilities().process_listing {
                core.registry.clear();
                done.resolve(Some(Vec::new()));
                return;
            }

            match core.host_processes.processes() {
                None => {
                    core.registry.clear();
                    done.resolve(None);
                }
                Some(list) => {
                    core.registry
                        .rebuild(list.iter().map(|p| (p.pid, p.name.clone())));
                    let connection = core.connection_context();
                    let contexts = list
                        .iter()
                        .map(|p| {
                            core.contexts
                                .create_process(connection, Some(p.pid.to_string()))
                        })
                        .collect();
                    done.resolve(Some(contexts));
                }
            }
        });
    }

    /// Attach the backend to a running process.
    ///
    /// Remote sessions bind the program image first when its path is known;
    /// only the bind command's success leads to the generic attach sequence,
    /// and a bind failure surfaces as-is without the attach ever being
    /// issued. On attach success the session is connected, the inferior pid
    /// recorded and breakpoint tracking started before the caller receives
    /// the new container context.
    pub fn attach_to_process(&self, process_ctx: ContextId, done: CompletionToken<ContextId>) {
        let channel = self.channel.clone();
        self.executor
            .submit(move |core| attach_on_executor(core, &channel, process_ctx, done));
    }

    /// Detach from the debugged process. On success the session is no longer
    /// connected and the recorded pid is dropped; on failure both are left
    /// untouched.
    pub fn detach_from_process(&self, ctx: ContextId, done: CompletionToken<()>) {
        let channel = self.channel.clone();
        self.executor.submit(move |core| {
            log::debug!(target: "control", "detach, session {}", core.session_id());
            let detach_token = CompletionToken::chain(done, |core, _reply: Reply, done| {
                core.connected = false;
                core.inferior.pid = None;
                done.resolve(());
            });
            channel.enqueue(Command::new(Operation::TargetDetach, ctx), detach_token);
        });
    }

    /// Start the program, optionally halting at an entry symbol first.
    pub fn start(&self, container: ContextId, attrs: StartAttributes, done: CompletionToken<()>) {
        self.start_or_restart(container, attrs, false, done);
    }

    /// Restart the program. Capability-guarded: attach, core and remote
    /// sessions cannot restart (see [`SessionType::capabilities`]).
    pub fn restart(&self, container: ContextId, attrs: StartAttributes, done: CompletionToken<()>) {
        let channel = self.channel.clone();
        self.executor.submit(move |core| {
            if !core.backend().session_type.capabilities().can_restart {
                done.fail(Error::CapabilityUnavailable("restart"));
                return;
            }
            start_on_executor(core, &channel, container, attrs, true, done);
        });
    }

    /// Insert the entry breakpoint if requested, then start or restart the
    /// program. Attach-only sessions resolve immediately: the user controls
    /// program start, no command is issued.
    pub fn start_or_restart(
        &self,
        container: ContextId,
        attrs: StartAttributes,
        is_restart: bool,
        done: CompletionToken<()>,
    ) {
        let channel = self.channel.clone();
        self.executor
            .submit(move |core| start_on_executor(core, &channel, container, attrs, is_restart, done));
    }

    /// Capability check for restart; independent of the inferior state.
    pub fn can_restart(&self, _container: ContextId, done: CompletionToken<bool>) {
        self.executor.submit(move |core| {
            done.resolve(core.backend().session_type.capabilities().can_restart);
        });
    }

    /// Attach is offered while nothing is connected and the inferior has not
    /// terminated.
    pub fn can_attach(&self, done: CompletionToken<bool>) {
        self.executor.submit(move |core| {
            done.resolve(!core.connected && core.inferior.state != InferiorState::Terminated);
        });
    }

    /// Detach is implemented (and used internally after failed attaches) but
    /// not offered yet: proper event generation has to land first, so the
    /// capability answer stays "no".
    pub fn can_detach(&self, _ctx: ContextId, done: CompletionToken<bool>) {
        self.executor.submit(move |_core| done.resolve(false));
    }

    /// Resolve display data for the process owning `ctx`.
    ///
    /// Resolution order: pid carried by the context (falling back to the
    /// attached inferior's pid when the context has none), then the registry,
    /// then the program file name when the pid is our own inferior's, then
    /// the program file name unconditionally. Backends do not report a pid in
    /// every context on every version, so the chain has to stay exactly this
    /// lenient.
    pub fn get_execution_data(&self, ctx: ContextId, done: CompletionToken<ThreadData>) {
        self.executor.submit(move |core| {
            let Some(process_ctx) = core.contexts.ancestor_of_kind(ctx, ContextKind::Process)
            else {
                done.fail(Error::InvalidContext("process"));
                return;
            };

            let pid_str = core
                .contexts
                .process_pid(process_ctx)
                .filter(|pid| !pid.is_empty())
                .map(str::to_string)
                .or_else(|| core.inferior.pid.clone());
            let pid = pid_str.as_deref().and_then(|p| p.parse::<u32>().ok());

            let mut name = pid.and_then(|p| core.registry.lookup(p).map(str::to_string));

            if name.is_none() {
                // Registry miss. If the pid is our own inferior's, the binary
                // name is just as good.
                let inferior_pid = core
                    .inferior
                    .pid
                    .as_deref()
                    .and_then(|p| p.parse::<u32>().ok());
                if pid.is_some() && pid == inferior_pid {
                    name = core.backend().program_file_name();
                }
            }
            if name.is_none() {
                // Last resort: assume we are looking at our own program.
                name = core.backend().program_file_name();
            }

            done.resolve(ThreadData {
                name: name.unwrap_or_else(|| "unknown".to_string()),
                pid: pid_str,
            });
        });
    }

    /// Containers currently being debugged; empty unless the session is
    /// connected with a live inferior.
    pub fn debugged_processes(&self, done: CompletionToken<Vec<ContextId>>) {
        self.executor.submit(move |core| {
            if core.connected && core.inferior.state != InferiorState::Terminated {
                done.resolve(core.container.into_iter().collect());
            } else {
                done.resolve(Vec::new());
            }
        });
    }

    /// Terminate the inferior (and the backend with it). Valid for
    /// process-level contexts only; anything else is refused locally without
    /// the backend being contacted.
    pub fn terminate(&self, ctx: ContextId, done: CompletionToken<()>) {
        let channel = self.channel.clone();
        self.executor.submit(move |core| {
            if core.contexts.kind(ctx) != ContextKind::Process {
                done.fail(Error::InvalidContext("process"));
                return;
            }
            let exit_token = CompletionToken::chain(done, |core, _reply: Reply, done| {
                core.inferior.state = InferiorState::Terminated;
                done.resolve(());
            });
            channel.enqueue(Command::new(Operation::GdbExit, ctx), exit_token);
        });
    }
}

fn attach_on_executor(
    core: &mut SessionCore,
    channel: &ChannelHandle,
    process_ctx: ContextId,
    done: CompletionToken<ContextId>,
) {
    if core.contexts.kind(process_ctx) != ContextKind::Process {
        done.fail(Error::InvalidContext("process"));
        return;
    }
    let Some(pid) = core.contexts.process_pid(process_ctx).map(str::to_string) else {
        done.fail(Error::InvalidContext("process with a known pid"));
        return;
    };

    let container = core.contexts.create_container(process_ctx, UNIQUE_GROUP_ID);
    log::debug!(target: "control", "attach to pid {pid}, session {}", core.session_id());

    let attach_command = Command::new(Operation::TargetAttach { pid: pid.clone() }, container);

    if core.backend().session_type == SessionType::Remote {
        if let Some(path) = core.backend().program_path.clone() {
            // The remote stub cannot locate the image on its own; bind it
            // first and attach only once the bind went through.
            let attach_channel = channel.clone();
            let bind_token = CompletionToken::chain(done, move |_core, _reply: Reply, done| {
                attach_channel.enqueue(attach_command, generic_attach_token(done, container, pid));
            });
            let bind_command = Command::new(
                Operation::FileExecAndSymbols {
                    path: path.display().to_string(),
                },
                container,
            );
            channel.enqueue(bind_command, bind_token);
            return;
        }
    }

    channel.enqueue(attach_command, generic_attach_token(done, container, pid));
}

/// Token for the generic attach command: marks the session connected, records
/// the pid and starts breakpoint tracking, then hands the container to the
/// caller.
fn generic_attach_token(
    done: CompletionToken<ContextId>,
    container: ContextId,
    pid: String,
) -> CompletionToken<Reply> {
    CompletionToken::chain(done, move |core, _reply, done| {
        core.connected = true;
        core.inferior.pid = Some(pid);
        core.container = Some(container);

        let target = core
            .contexts
            .ancestor_of_kind(container, ContextKind::Container)
            .expect("attach container exists");
        let tracked = CompletionToken::chain(done, move |_core, _: (), done| {
            done.resolve(container);
        });
        core.breakpoints.start_tracking(target, tracked);
    })
}

fn start_on_executor(
    core: &mut SessionCore,
    channel: &ChannelHandle,
    container: ContextId,
    attrs: StartAttributes,
    is_restart: bool,
    done: CompletionToken<()>,
) {
    let session_type = core.backend().session_type;
    let caps = session_type.capabilities();
    if caps.attach_only {
        // Attached to a running process: no breakpoint to set, nothing to
        // start, it is all up to the user.
        done.resolve(());
        return;
    }

    let Some(target) = core.contexts.ancestor_of_kind(container, ContextKind::Container) else {
        done.fail(Error::InvalidContext("container"));
        return;
    };

    log::debug!(
        target: "control",
        "{} container {container:?}, session {}",
        if is_restart { "restart" } else { "start" },
        core.session_id()
    );
    core.container = Some(container);

    let exec_operation = if caps.use_continue {
        Operation::ExecContinue
    } else {
        Operation::ExecRun
    };

    if attrs.stop_at_entry {
        let symbol = attrs.entry_symbol().to_string();
        let exec_channel = channel.clone();
        let break_token = CompletionToken::chain(done, move |_core, _reply: Reply, done| {
            // Entry breakpoint is in; now the program may (re)start.
            let exec_command = Command::new(exec_operation, container);
            exec_channel.enqueue(exec_command, exec_token(done, container, session_type));
        });
        let break_command = Command::new(
            Operation::BreakInsert {
                symbol,
                temporary: true,
            },
            target,
        );
        channel.enqueue(break_command, break_token);
    } else {
        let exec_command = Command::new(exec_operation, container);
        channel.enqueue(exec_command, exec_token(done, container, session_type));
    }
}

/// Token for the run/continue command: marks the inferior running and
/// announces the container. Remote sessions already announce it through their
/// own connect path; a second event would be a duplicate.
fn exec_token(
    done: CompletionToken<()>,
    container: ContextId,
    session_type: SessionType,
) -> CompletionToken<Reply> {
    CompletionToken::chain(done, move |core, _reply, done| {
        core.inferior.state = InferiorState::Running;
        if session_type != SessionType::Remote {
            core.dispatch_container_started(container);
        }
        done.resolve(());
    })
}
