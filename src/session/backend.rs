//! Backend session descriptor and the per-variant capability table.

use std::path::PathBuf;

use strum_macros::{Display, EnumString, IntoStaticStr};

/// How the backend session was launched. Immutable for the session lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SessionType {
    /// Backend and inferior run on this host.
    Local,
    /// Backend talks to a remote stub.
    Remote,
    /// Post-mortem session over a core dump.
    Core,
    /// The user attached to an already running process.
    Attach,
}

/// Protocol capabilities of one session type. One table entry per variant: a
/// new backend flavour is a new entry here, not another branch in every
/// operation.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    /// Restart needs a fresh launch, which attach and core sessions don't
    /// have. Remote restart is disabled too: gdbserver handles one restart
    /// but crashes on the second attempt, so the whole action stays off.
    pub can_restart: bool,
    /// Remote targets resume with "continue"; everything else starts with
    /// "run".
    pub use_continue: bool,
    /// Whether a host-side process listing can be offered. There is no remote
    /// listing primitive in pre-7.0-class backends.
    pub process_listing: bool,
    /// Program start is the user's business, never this layer's.
    pub attach_only: bool,
}

impl SessionType {
    pub fn capabilities(self) -> &'static Capabilities {
        const LOCAL: Capabilities = Capabilities {
            can_restart: true,
            use_continue: false,
            process_listing: true,
            attach_only: false,
        };
        const REMOTE: Capabilities = Capabilities {
            can_restart: false,
            use_continue: true,
            process_listing: false,
            attach_only: false,
        };
        const CORE: Capabilities = Capabilities {
            can_restart: false,
            use_continue: false,
            process_listing: true,
            attach_only: false,
        };
        const ATTACH: Capabilities = Capabilities {
            can_restart: false,
            use_continue: false,
            process_listing: true,
            attach_only: true,
        };

        match self {
            SessionType::Local => &LOCAL,
            SessionType::Remote => &REMOTE,
            SessionType::Core => &CORE,
            SessionType::Attach => &ATTACH,
        }
    }
}

/// What we know about the backend session: its type and the program image.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    pub session_type: SessionType,
    /// Path of the debugged program, when the launcher knows it.
    pub program_path: Option<PathBuf>,
}

impl BackendDescriptor {
    pub fn new(session_type: SessionType, program_path: Option<PathBuf>) -> Self {
        Self {
            session_type,
            program_path,
        }
    }

    /// Last path segment of the program image; the display-name fallback when
    /// the process registry has no entry for a pid.
    pub fn program_file_name(&self) -> Option<String> {
        self.program_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}
