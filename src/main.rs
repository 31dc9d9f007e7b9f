use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail};
use clap::Parser;
use gdbmux::channel::transport::child_transport;
use gdbmux::config::LaunchProfile;
use gdbmux::context::ContextId;
use gdbmux::error::Error;
use gdbmux::session::backend::{BackendDescriptor, SessionType};
use gdbmux::session::control::{StartAttributes, UNIQUE_GROUP_ID};
use gdbmux::session::token::CompletionToken;
use gdbmux::session::{DebugSession, EventHook, InferiorState, NoopTracker, SysinfoProcessList};
use gdbmux::weak_error;
use itertools::Itertools;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Debugger backend executable.
    #[arg(long, env = "GMX_BACKEND")]
    backend: Option<String>,

    /// Session flavour: local, remote, core or attach.
    #[arg(long)]
    session: Option<String>,

    /// Launch profile file (toml).
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Program image to debug.
    program: Option<PathBuf>,

    /// Attach to this pid instead of launching the program.
    #[arg(long)]
    pid: Option<String>,

    /// Halt at the entry symbol before user code runs.
    #[arg(long)]
    stop_at_entry: bool,

    /// Symbol for the entry breakpoint.
    #[arg(long)]
    entry_symbol: Option<String>,

    /// List host processes available for attach and exit.
    #[arg(long)]
    list: bool,
}

/// Event hook that narrates the session on stdout.
struct PrintHook;

impl EventHook for PrintHook {
    fn on_container_started(&self, container: ContextId) {
        println!("container started: {container:?}");
    }

    fn on_inferior_stopped(&self, reason: Option<String>) {
        println!(
            "inferior stopped: {}",
            reason.as_deref().unwrap_or("unknown reason")
        );
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let profile = match &args.profile {
        Some(path) => LaunchProfile::load(path)?,
        None => LaunchProfile::default(),
    };

    let backend_bin = args
        .backend
        .or(profile.backend)
        .unwrap_or_else(|| "gdb".to_string());
    let session = args
        .session
        .or(profile.session)
        .unwrap_or_else(|| "local".to_string());
    let session_type = SessionType::from_str(&session)
        .map_err(|_| anyhow!("unknown session flavour `{session}`"))?;
    let program = args.program.or(profile.program);
    let stop_at_entry = args.stop_at_entry || profile.stop_at_entry.unwrap_or(false);
    let entry_symbol = args.entry_symbol.or(profile.entry_symbol);

    if session_type == SessionType::Local && program.is_none() && !args.list {
        bail!("a local session needs a program to debug");
    }

    let mut backend_cmd = std::process::Command::new(&backend_bin);
    backend_cmd
        .arg("--interpreter=mi2")
        .arg("--quiet")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    if let Some(program) = &program {
        backend_cmd.arg(program);
    }
    let mut backend_proc = backend_cmd.spawn()?;
    let (sink, source) = child_transport(&mut backend_proc)?;

    let session = DebugSession::start(
        BackendDescriptor::new(session_type, program),
        Box::new(sink),
        Box::new(source),
        Box::new(PrintHook),
        Box::new(NoopTracker),
        Box::new(SysinfoProcessList),
    );

    let outcome = drive(&session, &args.pid, stop_at_entry, entry_symbol, args.list);

    session.shutdown();
    weak_error!(backend_proc.kill(), "backend kill:");
    weak_error!(backend_proc.wait(), "backend wait:");
    outcome
}

fn drive(
    session: &DebugSession,
    pid: &Option<String>,
    stop_at_entry: bool,
    entry_symbol: Option<String>,
    list: bool,
) -> anyhow::Result<()> {
    if list {
        return list_processes(session);
    }
    if let Some(pid) = pid {
        return attach(session, pid.clone());
    }
    launch(session, stop_at_entry, entry_symbol)
}

fn list_processes(session: &DebugSession) -> anyhow::Result<()> {
    let (token, rx) = CompletionToken::channelled(session.executor());
    session.control().enumerate_processes(token);
    let Some(contexts) = wait(rx)? else {
        println!("host process list is unavailable, attach by pid instead");
        return Ok(());
    };

    let rows = session.executor().query(move |core| {
        contexts
            .iter()
            .filter_map(|&ctx| {
                let pid = core.contexts().process_pid(ctx)?.to_string();
                let name = pid
                    .parse::<u32>()
                    .ok()
                    .and_then(|p| core.registry().lookup(p).map(str::to_string))
                    .unwrap_or_default();
                Some((pid, name))
            })
            .collect::<Vec<_>>()
    });
    println!(
        "{}",
        rows.iter()
            .map(|(pid, name)| format!("{pid:>8}  {name}"))
            .join("\n")
    );
    Ok(())
}

fn attach(session: &DebugSession, pid: String) -> anyhow::Result<()> {
    let process_ctx = session.executor().query(move |core| {
        let connection = core.connection_context();
        core.contexts_mut().create_process(connection, Some(pid))
    });

    let (token, rx) = CompletionToken::channelled(session.executor());
    session.control().attach_to_process(process_ctx, token);
    let container = wait(rx)?;
    println!("attached: {container:?}");

    let (token, rx) = CompletionToken::channelled(session.executor());
    session.control().get_execution_data(process_ctx, token);
    let data = wait(rx)?;
    println!(
        "debugging {} (pid {})",
        data.name,
        data.pid.as_deref().unwrap_or("?")
    );

    let (token, rx) = CompletionToken::channelled(session.executor());
    session.control().detach_from_process(container, token);
    wait(rx)?;
    println!("detached");
    Ok(())
}

fn launch(
    session: &DebugSession,
    stop_at_entry: bool,
    entry_symbol: Option<String>,
) -> anyhow::Result<()> {
    let container = session.executor().query(|core| {
        let connection = core.connection_context();
        let process = core.contexts_mut().create_process(connection, None);
        core.contexts_mut()
            .create_container(process, UNIQUE_GROUP_ID)
    });

    let attrs = StartAttributes {
        stop_at_entry,
        entry_symbol,
    };
    let (token, rx) = CompletionToken::channelled(session.executor());
    session.control().start(container, attrs, token);
    wait(rx)?;
    println!("program started");

    if stop_at_entry {
        // The entry breakpoint reports back through the event path; give the
        // inferior a moment to reach it.
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            let state = session.executor().query(|core| core.inferior_state());
            if state == InferiorState::Stopped {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
    Ok(())
}

fn wait<T: Send + 'static>(rx: Receiver<Result<T, Error>>) -> anyhow::Result<T> {
    rx.recv()
        .map_err(|_| anyhow!("session ended before the operation completed"))?
        .map_err(anyhow::Error::from)
}
