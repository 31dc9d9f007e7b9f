use std::io;

/// Errors surfaced on completion tokens.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- channel errors --------------------------------------------
    /// The backend connection is gone; every command pending at that moment
    /// fails with this, in enqueue order.
    #[error("backend channel closed")]
    ChannelClosed,
    /// The backend answered a command with an error status. The message is
    /// kept verbatim so callers can tell the failing step apart.
    #[error("backend rejected command: {0}")]
    BackendRejected(String),

    // --------------------------------- local validation ------------------------------------------
    /// The caller passed a context of the wrong structural kind. Detected
    /// before any command is issued.
    #[error("invalid context: expected a {0} context")]
    InvalidContext(&'static str),
    /// A typed "no": the operation exists but this session cannot offer it.
    /// Callers hide or disable the corresponding action instead of showing an
    /// error.
    #[error("{0} is not supported by this session")]
    CapabilityUnavailable(&'static str),

    // --------------------------------- generic errors --------------------------------------------
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Return a hint to an interface - continue with the session after this
    /// error or tear it down.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::ChannelClosed => true,
            Error::Io(_) => true,

            Error::BackendRejected(_) => false,
            Error::InvalidContext(_) => false,
            Error::CapabilityUnavailable(_) => false,
        }
    }
}


/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "gdbmux", "{:#}", e);
                None
            }
        }
    };
    ($res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!(target: "gdbmux", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}
