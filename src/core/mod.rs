//! Core components.
//!
//! - **document**: line-addressable source text and selections
//! - **cells**: cell marker classification and run-range scanning
//! - **host**: terminal host trait
//! - **tmux**: tmux-backed terminal host
//! - **session**: session reuse/creation and paste framing
//!
//! # Architecture
//!
//! ```text
//! Document ──scan──▶ Affordance (action + line range)
//!     │
//!     └──excerpt──▶ PasteFrame ──SessionManager──▶ TerminalHost (tmux)
//! ```

pub mod cells;
pub mod document;
pub mod host;
pub mod session;
pub mod tmux;

#[cfg(test)]
pub(crate) mod testing;
