//! Test doubles for the host and the command picker

use std::io;

use super::host::{LaunchSpec, Result, Terminal, TerminalHost};
use super::session::{ChoiceRequest, CommandChooser, PickOutcome};

/// Host double recording every mutation
#[derive(Default)]
pub struct RecordingHost {
    pub terminals: Vec<Terminal>,
    pub active: Option<usize>,
    pub created: Vec<LaunchSpec>,
    pub shown: Vec<String>,
    pub sent: Vec<(String, String, bool)>,
}

impl RecordingHost {
    pub fn with(terminals: Vec<Terminal>, active: Option<usize>) -> Self {
        Self {
            terminals,
            active,
            ..Default::default()
        }
    }
}

impl TerminalHost for RecordingHost {
    fn terminals(&self) -> Result<Vec<Terminal>> {
        Ok(self.terminals.clone())
    }

    fn active_terminal(&self) -> Result<Option<Terminal>> {
        Ok(self.active.and_then(|i| self.terminals.get(i).cloned()))
    }

    fn create_terminal(&mut self, spec: &LaunchSpec) -> Result<Terminal> {
        self.created.push(spec.clone());
        let terminal = Terminal {
            id: format!("@{}", self.terminals.len() + 1),
            name: spec.name.clone(),
            exit_status: None,
        };
        self.terminals.push(terminal.clone());
        Ok(terminal)
    }

    fn show(&mut self, terminal: &Terminal) -> Result<()> {
        self.shown.push(terminal.id.clone());
        Ok(())
    }

    fn send_text(&mut self, terminal: &Terminal, text: &str, submit: bool) -> Result<()> {
        self.sent
            .push((terminal.id.clone(), text.to_string(), submit));
        Ok(())
    }
}

/// Chooser answering every request with the same outcome
pub struct Scripted {
    pub outcome: PickOutcome,
    pub calls: usize,
}

impl Scripted {
    pub fn new(outcome: PickOutcome) -> Self {
        Self { outcome, calls: 0 }
    }
}

impl CommandChooser for Scripted {
    fn choose(&mut self, _request: &ChoiceRequest) -> io::Result<PickOutcome> {
        self.calls += 1;
        Ok(self.outcome.clone())
    }
}
