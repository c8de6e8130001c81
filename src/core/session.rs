//! Session management
//!
//! Finds a live interpreter session among the host's terminals, or creates
//! one, and pastes framed source excerpts into it.
//!
//! Liveness is always re-queried from the host: sessions can be closed by
//! the user at any time, so nothing is cached between requests.

use std::io;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::document::Excerpt;
use super::host::{HostError, LaunchSpec, Terminal, TerminalHost};

/// Display name prefix of sessions started by haskit
pub const SESSION_PREFIX: &str = "Đ Session - ";

/// Command run when the user accepts an empty choice
pub const FALLBACK_COMMAND: &str = "hski";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("Command picker failed: {0}")]
    Picker(#[from] io::Error),
}

/// How sessions are named and launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    pub prefix: String,
    pub launcher: String,
    pub launcher_args: Vec<String>,
    pub default_command: String,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            prefix: SESSION_PREFIX.to_string(),
            launcher: "/usr/bin/env".to_string(),
            launcher_args: vec!["epm".to_string(), "x".to_string()],
            default_command: FALLBACK_COMMAND.to_string(),
        }
    }
}

impl SessionPolicy {
    /// Alive and named by us
    pub fn recognizes(&self, terminal: &Terminal) -> bool {
        terminal.is_alive() && terminal.name.starts_with(&self.prefix)
    }

    pub fn launch_spec(&self, cmds: &[String]) -> LaunchSpec {
        let mut args = self.launcher_args.clone();
        args.extend(cmds.iter().cloned());
        LaunchSpec {
            name: format!("{}{}", self.prefix, cmds.join(" ")),
            program: self.launcher.clone(),
            args,
        }
    }
}

/// Split a command line on whitespace. Quotes are not honored.
pub fn split_command_line(cmdl: &str) -> Vec<String> {
    cmdl.split_whitespace().map(str::to_string).collect()
}

/// One entry offered by the command picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCandidate {
    pub command: String,
    pub description: Option<String>,
}

impl CommandCandidate {
    pub fn new(command: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            command: command.into(),
            description: description.map(str::to_string),
        }
    }
}

/// What the picker is asked to choose from
#[derive(Debug, Clone)]
pub struct ChoiceRequest {
    pub title: String,
    /// Used when an empty value is accepted
    pub default_command: String,
    /// Launcher shown in item descriptions, e.g. `epm x`
    pub launcher_hint: String,
    pub candidates: Vec<CommandCandidate>,
}

/// Result of one interactive choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Accepted(String),
    Cancelled,
}

/// Interactive source of a command line.
///
/// `choose` returns exactly once per call, with either an accepted value or
/// a cancellation.
pub trait CommandChooser {
    fn choose(&mut self, request: &ChoiceRequest) -> io::Result<PickOutcome>;
}

/// Outcome of resolving a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Session(Terminal),
    Cancelled,
}

/// The framed message pasted into a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteFrame {
    pub line_count: usize,
    /// 1-based number of the first line
    pub line_no: usize,
    pub source_name: String,
    pub text: String,
}

impl PasteFrame {
    /// Frame an excerpt of a document with `total_lines` lines.
    ///
    /// A range reaching the end of the document counts one line fewer: its
    /// upper bound is the empty line after the last terminator. Returns
    /// `None` when fewer than one line would be sent.
    pub fn plan(excerpt: &Excerpt, total_lines: usize, source_name: &str) -> Option<Self> {
        let since = excerpt.since as i64;
        let before = excerpt.before as i64;
        let line_count = if excerpt.before >= total_lines {
            before - since - 1
        } else {
            before - since
        };
        if line_count < 1 {
            return None;
        }
        Some(Self {
            line_count: line_count as usize,
            line_no: excerpt.since + 1,
            source_name: source_name.to_string(),
            text: excerpt.text.clone(),
        })
    }

    pub fn header(&self) -> String {
        format!(
            "%%paste {} {} {}",
            self.line_count, self.line_no, self.source_name
        )
    }

    /// Header line followed by the raw text
    pub fn render(&self) -> String {
        format!("{}\n{}", self.header(), self.text)
    }
}

/// Outcome of a send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { session: Terminal, frame: PasteFrame },
    Empty,
    Cancelled,
}

/// Resolves sessions and delivers source into them
pub struct SessionManager {
    policy: SessionPolicy,
    /// Commands from project config; the first one is the default
    project_commands: Vec<String>,
    templates: Vec<CommandCandidate>,
}

impl SessionManager {
    pub fn new(
        policy: SessionPolicy,
        project_commands: Vec<String>,
        templates: Vec<CommandCandidate>,
    ) -> Self {
        Self {
            policy,
            project_commands,
            templates,
        }
    }

    pub fn default_command(&self) -> &str {
        self.project_commands
            .first()
            .map(String::as_str)
            .unwrap_or(self.policy.default_command.as_str())
    }

    /// Live sessions carrying our prefix, in host order
    pub fn sessions(&self, host: &dyn TerminalHost) -> Result<Vec<Terminal>, HostError> {
        Ok(host
            .terminals()?
            .into_iter()
            .filter(|t| self.policy.recognizes(t))
            .collect())
    }

    /// The focused session if recognized, else the first recognized one
    pub fn find_session(&self, host: &dyn TerminalHost) -> Result<Option<Terminal>, HostError> {
        if let Some(active) = host.active_terminal()? {
            if self.policy.recognizes(&active) {
                debug!("Using focused session {}", active.name);
                return Ok(Some(active));
            }
        }
        Ok(host
            .terminals()?
            .into_iter()
            .find(|t| self.policy.recognizes(t)))
    }

    pub fn choice_request(&self) -> ChoiceRequest {
        let mut candidates: Vec<CommandCandidate> = self
            .project_commands
            .iter()
            .map(|cmd| CommandCandidate::new(cmd.as_str(), Some("From haskit.json")))
            .collect();
        candidates.extend(self.templates.iter().cloned());
        ChoiceRequest {
            title: "New Đ Terminal running command:".to_string(),
            default_command: self.default_command().to_string(),
            launcher_hint: self.policy.launcher_args.join(" "),
            candidates,
        }
    }

    /// Start a session running `cmds` and show it
    pub fn create_session(
        &self,
        host: &mut dyn TerminalHost,
        cmds: &[String],
    ) -> Result<Terminal, HostError> {
        let spec = self.policy.launch_spec(cmds);
        let terminal = host.create_terminal(&spec)?;
        host.show(&terminal)?;
        info!("Created session {} ({})", terminal.name, terminal.id);
        Ok(terminal)
    }

    /// Always start a new session.
    ///
    /// Without a command the user is asked for one; cancelling creates
    /// nothing.
    pub fn open_session(
        &self,
        host: &mut dyn TerminalHost,
        chooser: &mut dyn CommandChooser,
        desired: Option<&str>,
    ) -> Result<Resolution, SessionError> {
        match self.obtain_command(chooser, desired)? {
            Some(cmds) => Ok(Resolution::Session(self.create_session(host, &cmds)?)),
            None => Ok(Resolution::Cancelled),
        }
    }

    /// Reuse a recognized live session, or create one
    pub fn resolve_or_create(
        &self,
        host: &mut dyn TerminalHost,
        chooser: &mut dyn CommandChooser,
        desired: Option<&str>,
    ) -> Result<Resolution, SessionError> {
        if let Some(session) = self.find_session(host)? {
            info!("Reusing session {}", session.name);
            return Ok(Resolution::Session(session));
        }
        self.open_session(host, chooser, desired)
    }

    /// Paste a frame into a session and submit it
    pub fn send(
        &self,
        host: &mut dyn TerminalHost,
        session: &Terminal,
        frame: &PasteFrame,
    ) -> Result<(), HostError> {
        debug!("Sending {} to {}", frame.header(), session.name);
        host.send_text(session, &frame.render(), true)
    }

    /// Frame an excerpt, resolve a session, and send.
    ///
    /// Empty ranges and cancelled pickers are silent no-ops.
    pub fn send_excerpt(
        &self,
        host: &mut dyn TerminalHost,
        chooser: &mut dyn CommandChooser,
        source_name: &str,
        total_lines: usize,
        excerpt: &Excerpt,
        desired: Option<&str>,
    ) -> Result<SendOutcome, SessionError> {
        let Some(frame) = PasteFrame::plan(excerpt, total_lines, source_name) else {
            warn!(
                "No Edh source to send from {} [{}, {})",
                source_name, excerpt.since, excerpt.before
            );
            return Ok(SendOutcome::Empty);
        };

        let session = match self.resolve_or_create(host, chooser, desired)? {
            Resolution::Session(session) => session,
            Resolution::Cancelled => {
                debug!("Session choice cancelled, nothing sent");
                return Ok(SendOutcome::Cancelled);
            }
        };

        self.send(host, &session, &frame)?;
        Ok(SendOutcome::Sent { session, frame })
    }

    fn obtain_command(
        &self,
        chooser: &mut dyn CommandChooser,
        desired: Option<&str>,
    ) -> Result<Option<Vec<String>>, SessionError> {
        let cmdl = match desired {
            Some(cmdl) => cmdl.to_string(),
            None => match chooser.choose(&self.choice_request())? {
                PickOutcome::Accepted(cmdl) => cmdl,
                PickOutcome::Cancelled => return Ok(None),
            },
        };
        let cmds = split_command_line(&cmdl);
        if cmds.is_empty() {
            return Ok(Some(split_command_line(self.default_command())));
        }
        Ok(Some(cmds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{RecordingHost, Scripted};

    fn term(id: &str, name: &str, exit_status: Option<i32>) -> Terminal {
        Terminal {
            id: id.to_string(),
            name: name.to_string(),
            exit_status,
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(SessionPolicy::default(), Vec::new(), Vec::new())
    }

    fn excerpt(since: usize, before: usize, text: &str) -> Excerpt {
        Excerpt {
            since,
            before,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_split_command_line() {
        assert_eq!(
            split_command_line("  stack   run\thski "),
            vec!["stack", "run", "hski"]
        );
        assert!(split_command_line("   ").is_empty());
        // Quotes are kept as plain characters
        assert_eq!(split_command_line("a \"b c\""), vec!["a", "\"b", "c\""]);
    }

    #[test]
    fn test_plan_line_counts() {
        let frame = PasteFrame::plan(&excerpt(2, 10, "x"), 10, "a.edh").unwrap();
        assert_eq!(frame.line_count, 7);
        assert_eq!(frame.line_no, 3);

        let frame = PasteFrame::plan(&excerpt(2, 5, "x"), 10, "a.edh").unwrap();
        assert_eq!(frame.line_count, 3);

        assert!(PasteFrame::plan(&excerpt(0, 0, ""), 10, "a.edh").is_none());
        assert!(PasteFrame::plan(&excerpt(9, 10, ""), 10, "a.edh").is_none());
        assert!(PasteFrame::plan(&excerpt(5, 3, ""), 10, "a.edh").is_none());
    }

    #[test]
    fn test_render_frame() {
        let frame = PasteFrame::plan(&excerpt(1, 3, "  a = 1\nb = 2\n"), 6, "/w/x.edh").unwrap();
        assert_eq!(frame.render(), "%%paste 2 2 /w/x.edh\n  a = 1\nb = 2\n");
    }

    #[test]
    fn test_focused_session_is_reused() {
        let mut host = RecordingHost::with(
            vec![
                term("@1", "Đ Session - other", None),
                term("@2", "Đ Session - hski", None),
            ],
            Some(1),
        );
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let res = manager()
            .resolve_or_create(&mut host, &mut chooser, None)
            .unwrap();
        assert_eq!(res, Resolution::Session(host.terminals[1].clone()));
        assert!(host.created.is_empty());
        assert_eq!(chooser.calls, 0);
    }

    #[test]
    fn test_first_recognized_session_when_focus_elsewhere() {
        let mut host = RecordingHost::with(
            vec![
                term("@1", "bash", None),
                term("@2", "Đ Session - dead", Some(1)),
                term("@3", "Đ Session - hski", None),
                term("@4", "Đ Session - later", None),
            ],
            Some(0),
        );
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let res = manager()
            .resolve_or_create(&mut host, &mut chooser, None)
            .unwrap();
        assert_eq!(res, Resolution::Session(host.terminals[2].clone()));
        assert!(host.created.is_empty());
    }

    #[test]
    fn test_create_with_supplied_command() {
        let mut host = RecordingHost::default();
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let res = manager()
            .resolve_or_create(&mut host, &mut chooser, Some("foo bar"))
            .unwrap();

        assert_eq!(host.created.len(), 1);
        let spec = &host.created[0];
        assert_eq!(spec.name, "Đ Session - foo bar");
        assert_eq!(spec.program, "/usr/bin/env");
        assert_eq!(spec.args, vec!["epm", "x", "foo", "bar"]);
        assert!(spec.args.ends_with(&["foo".to_string(), "bar".to_string()]));
        assert_eq!(host.shown, vec!["@1"]);
        assert!(matches!(res, Resolution::Session(t) if t.id == "@1"));
        assert_eq!(chooser.calls, 0);
    }

    #[test]
    fn test_cancelled_picker_creates_nothing() {
        let mut host = RecordingHost::default();
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let res = manager()
            .resolve_or_create(&mut host, &mut chooser, None)
            .unwrap();
        assert_eq!(res, Resolution::Cancelled);
        assert!(host.created.is_empty());
        assert_eq!(chooser.calls, 1);
    }

    #[test]
    fn test_empty_accept_uses_project_default() {
        let mut host = RecordingHost::default();
        let mut chooser = Scripted::new(PickOutcome::Accepted("  ".to_string()));
        let mgr = SessionManager::new(
            SessionPolicy::default(),
            vec!["cabal run hski".to_string()],
            Vec::new(),
        );
        mgr.open_session(&mut host, &mut chooser, None).unwrap();
        assert_eq!(host.created[0].args, vec!["epm", "x", "cabal", "run", "hski"]);
    }

    #[test]
    fn test_open_session_ignores_existing() {
        let mut host = RecordingHost::with(vec![term("@1", "Đ Session - hski", None)], Some(0));
        let mut chooser = Scripted::new(PickOutcome::Accepted("hski".to_string()));
        manager()
            .open_session(&mut host, &mut chooser, None)
            .unwrap();
        assert_eq!(host.created.len(), 1);
    }

    #[test]
    fn test_send_excerpt_empty_range_is_noop() {
        let mut host = RecordingHost::default();
        let mut chooser = Scripted::new(PickOutcome::Accepted("hski".to_string()));
        let out = manager()
            .send_excerpt(&mut host, &mut chooser, "a.edh", 10, &excerpt(0, 0, ""), None)
            .unwrap();
        assert_eq!(out, SendOutcome::Empty);
        assert_eq!(chooser.calls, 0);
        assert!(host.created.is_empty());
        assert!(host.sent.is_empty());
    }

    #[test]
    fn test_send_excerpt_cancelled_sends_nothing() {
        let mut host = RecordingHost::default();
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let out = manager()
            .send_excerpt(&mut host, &mut chooser, "a.edh", 10, &excerpt(2, 5, "a\nb\nc\n"), None)
            .unwrap();
        assert_eq!(out, SendOutcome::Cancelled);
        assert!(host.sent.is_empty());
    }

    #[test]
    fn test_send_excerpt_delivers_frame() {
        let mut host = RecordingHost::with(vec![term("@7", "Đ Session - hski", None)], None);
        let mut chooser = Scripted::new(PickOutcome::Cancelled);
        let out = manager()
            .send_excerpt(&mut host, &mut chooser, "a.edh", 10, &excerpt(2, 5, "a\nb\nc\n"), None)
            .unwrap();
        assert!(matches!(out, SendOutcome::Sent { .. }));
        assert_eq!(
            host.sent,
            vec![(
                "@7".to_string(),
                "%%paste 3 3 a.edh\na\nb\nc\n".to_string(),
                true
            )]
        );
    }

    #[test]
    fn test_choice_request_lists_project_commands_first() {
        let mgr = SessionManager::new(
            SessionPolicy::default(),
            vec!["stack run hski".to_string()],
            vec![CommandCandidate::new("cabal run hski", Some("Build & Run with Cabal"))],
        );
        let req = mgr.choice_request();
        assert_eq!(req.default_command, "stack run hski");
        assert_eq!(req.launcher_hint, "epm x");
        let cmds: Vec<&str> = req.candidates.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(cmds, vec!["stack run hski", "cabal run hski"]);
    }
}
