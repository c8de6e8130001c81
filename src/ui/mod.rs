//! User interface.
//!
//! - **picker**: command picker state and key handling
//! - **renderer**: crossterm rendering and the interactive chooser

pub mod picker;
pub mod renderer;

pub use renderer::TerminalChooser;
