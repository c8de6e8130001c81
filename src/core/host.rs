//! Terminal host abstraction
//!
//! The host owns terminal processes. This crate only lists them, creates new
//! ones and types text into them; it never keeps its own registry.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected host output: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// A terminal as reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    /// Host-specific handle
    pub id: String,
    /// Display name
    pub name: String,
    /// Set once the process has exited
    pub exit_status: Option<i32>,
}

impl Terminal {
    pub fn is_alive(&self) -> bool {
        self.exit_status.is_none()
    }
}

/// How to start a new terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

/// Terminal operations provided by the host
pub trait TerminalHost {
    /// All terminals the host knows about, live or exited
    fn terminals(&self) -> Result<Vec<Terminal>>;

    /// The terminal that currently has focus, if any
    fn active_terminal(&self) -> Result<Option<Terminal>>;

    /// Start a new terminal process
    fn create_terminal(&mut self, spec: &LaunchSpec) -> Result<Terminal>;

    /// Bring a terminal to the foreground
    fn show(&mut self, terminal: &Terminal) -> Result<()>;

    /// Type `text` into a terminal, pressing enter afterwards when `submit`
    fn send_text(&mut self, terminal: &Terminal, text: &str, submit: bool) -> Result<()>;
}
