//! Outbound commands and their wire syntax, plus parsing of backend answers.
//!
//! The rest of the crate treats operations as opaque descriptors; everything
//! that knows about the MI-flavoured text syntax lives in this module.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::ContextId;

/// A single outbound request: what to do and which context it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub operation: Operation,
    pub context: ContextId,
}

impl Command {
    pub fn new(operation: Operation, context: ContextId) -> Self {
        Self { operation, context }
    }
}

/// Backend operations issued by the control layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Bind a program image to the target. Required before a remote attach
    /// when the image path is known; local backends figure the image out
    /// themselves.
    FileExecAndSymbols { path: String },
    /// Insert a breakpoint at a symbol.
    BreakInsert { symbol: String, temporary: bool },
    ExecRun,
    ExecContinue,
    TargetAttach { pid: String },
    TargetDetach,
    /// Terminate the backend together with its inferior.
    GdbExit,
}

impl Operation {
    /// Render the request line, prefixed with the channel sequence number the
    /// backend echoes back on the answer.
    pub fn render(&self, seq: u64) -> String {
        match self {
            Operation::FileExecAndSymbols { path } => {
                format!("{seq}-file-exec-and-symbols {path}")
            }
            Operation::BreakInsert { symbol, temporary } => {
                if *temporary {
                    format!("{seq}-break-insert -t {symbol}")
                } else {
                    format!("{seq}-break-insert {symbol}")
                }
            }
            Operation::ExecRun => format!("{seq}-exec-run"),
            Operation::ExecContinue => format!("{seq}-exec-continue"),
            Operation::TargetAttach { pid } => format!("{seq}-target-attach {pid}"),
            Operation::TargetDetach => format!("{seq}-target-detach"),
            Operation::GdbExit => format!("{seq}-gdb-exit"),
        }
    }
}

/// A successful backend answer. Error statuses never reach callers as a
/// `Reply`; the channel converts them into [`crate::error::Error::BackendRejected`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Sequence number echoed by the backend, when present.
    pub seq: Option<u64>,
    /// Raw result payload after the status word, possibly empty.
    pub payload: String,
}

/// An asynchronous backend notification; not an answer to any command.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// The inferior halted.
    Stopped { reason: Option<String> },
    /// Anything else out-of-band, kept raw for logging.
    Other(String),
}

/// One classified line of backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendLine {
    Reply(Result<Reply, (Option<u64>, String)>),
    Notification(Notification),
    /// Prompt or blank line, ignored.
    Noise,
}

static ERROR_MSG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"msg="((?:[^"\\]|\\.)*)""#).expect("must compile"));
static STOP_REASON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"reason="((?:[^"\\]|\\.)*)""#).expect("must compile"));

impl BackendLine {
    pub fn parse(line: &str) -> BackendLine {
        let line = line.trim();
        if line.is_empty() || line.starts_with("(gdb)") {
            return BackendLine::Noise;
        }

        let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
        let seq = digits.parse::<u64>().ok();
        let rest = &line[digits.len()..];

        if let Some(status) = rest.strip_prefix('^') {
            if status.starts_with("error") {
                let message = ERROR_MSG_RE
                    .captures(status)
                    .map(|c| c[1].to_string())
                    .unwrap_or_else(|| status.to_string());
                return BackendLine::Reply(Err((seq, message)));
            }
            // "done", "running" and "connected" all acknowledge the command.
            let payload = status
                .split_once(',')
                .map(|(_, p)| p.to_string())
                .unwrap_or_default();
            return BackendLine::Reply(Ok(Reply { seq, payload }));
        }

        if let Some(event) = rest.strip_prefix('*') {
            if event.starts_with("stopped") {
                let reason = STOP_REASON_RE.captures(event).map(|c| c[1].to_string());
                return BackendLine::Notification(Notification::Stopped { reason });
            }
            return BackendLine::Notification(Notification::Other(line.to_string()));
        }

        // Stream/log output ("~", "&", "=") is uninteresting to the control
        // layer.
        BackendLine::Noise
    }
}
