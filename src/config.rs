//! Launch profile loading.
//!
//! A profile file carries the settings a user does not want to retype on
//! every launch; command line flags always win over the profile.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchProfile {
    /// Debugger backend executable.
    pub backend: Option<String>,
    /// Session flavour: local, remote, core or attach.
    pub session: Option<String>,
    /// Program image to debug.
    pub program: Option<PathBuf>,
    /// Halt at the entry symbol before user code runs.
    pub stop_at_entry: Option<bool>,
    /// Symbol for the entry breakpoint.
    pub entry_symbol: Option<String>,
}

impl LaunchProfile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read launch profile {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse launch profile {}", path.display()))
    }
}
