//! gdbmux drives an external GDB/MI-class debugger backend.
//!
//! The backend is a separate process spoken to over a line-oriented
//! command/reply stream. This crate owns the concurrency discipline around
//! that stream: a FIFO [`channel::CommandChannel`] pairs every reply with the
//! command that produced it, a per-session executor serializes all state
//! mutation, and multi-step operations (bind image then attach, insert
//! breakpoint then run) are sequenced through chainable completion tokens.

pub mod channel;
pub mod config;
pub mod context;
pub mod error;
pub mod session;
