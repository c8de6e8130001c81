//! User-facing commands
//!
//! Glue between the command line, the document model and the session
//! manager. Expected conditions (cancelled picker, empty range) come back as
//! values; only host and I/O failures are errors.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::{discover_project_commands, Config};
use crate::core::cells::{self, LensRecord, LineRange, RangeEnd};
use crate::core::document::{Document, Selection};
use crate::core::host::{Terminal, TerminalHost};
use crate::core::session::{CommandChooser, Resolution, SendOutcome, SessionManager};

/// A request to send part of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub path: PathBuf,
    pub range: Option<LineRange>,
    pub selection: Option<Selection>,
    pub command: Option<String>,
}

/// Format affordances for display, or as JSON records
pub fn render_lenses(doc: &Document, json: bool) -> Result<String> {
    let affordances = cells::scan(&doc.lines());
    debug!("{}: {} affordances", doc.name(), affordances.len());

    if json {
        let records: Vec<LensRecord> = affordances.iter().map(LensRecord::from).collect();
        return serde_json::to_string_pretty(&records).context("Failed to encode affordances");
    }

    let mut out = String::new();
    for aff in &affordances {
        let before = match aff.range.before {
            RangeEnd::Line(before) => before.to_string(),
            RangeEnd::EndOfDocument => "end".to_string(),
        };
        out.push_str(&format!(
            "L{:<5} {:<10} --since {} --before {}\n",
            aff.anchor + 1,
            aff.action.label(),
            aff.range.since,
            before
        ));
    }
    Ok(out)
}

/// Commands bound to a host and a chooser
pub struct Commands<H: TerminalHost, C: CommandChooser> {
    manager: SessionManager,
    host: H,
    chooser: C,
}

impl<H: TerminalHost, C: CommandChooser> Commands<H, C> {
    pub fn new(manager: SessionManager, host: H, chooser: C) -> Self {
        Self {
            manager,
            host,
            chooser,
        }
    }

    /// Build the session manager from user config and workspace files
    pub fn from_config(config: &Config, workspace: &Path, host: H, chooser: C) -> Self {
        let project_commands = discover_project_commands(workspace);
        let manager =
            SessionManager::new(config.session_policy(), project_commands, config.candidates());
        Self::new(manager, host, chooser)
    }

    /// Open a new session. `None` when the picker was dismissed.
    pub fn new_session(&mut self, command: Option<&str>) -> Result<Option<Terminal>> {
        let resolution = self
            .manager
            .open_session(&mut self.host, &mut self.chooser, command)
            .context("Failed to open session")?;
        Ok(match resolution {
            Resolution::Session(session) => Some(session),
            Resolution::Cancelled => None,
        })
    }

    /// Send the requested part of a file to the best session
    pub fn send(&mut self, request: &SendRequest) -> Result<SendOutcome> {
        let doc = Document::open(&request.path)?;
        let excerpt = doc.excerpt(request.range, request.selection.as_ref());
        let outcome = self
            .manager
            .send_excerpt(
                &mut self.host,
                &mut self.chooser,
                doc.name(),
                doc.line_count(),
                &excerpt,
                request.command.as_deref(),
            )
            .context("Failed to send source")?;

        if let SendOutcome::Sent { session, frame } = &outcome {
            info!(
                "Sent {} lines of {} from line {} to {}",
                frame.line_count, frame.source_name, frame.line_no, session.name
            );
        }
        Ok(outcome)
    }

    /// Recognized live sessions
    pub fn sessions(&self) -> Result<Vec<Terminal>> {
        self.manager
            .sessions(&self.host)
            .context("Failed to list sessions")
    }

    #[cfg(test)]
    fn host(&self) -> &H {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Position;
    use crate::core::session::{PickOutcome, SessionPolicy};
    use crate::core::testing::{RecordingHost, Scripted};
    use std::fs;

    const SOURCE: &str = "import * 'batteries'\n# %%\nx = 1\ny = 2\n# %%\nz = 3\n";

    fn commands(outcome: PickOutcome) -> Commands<RecordingHost, Scripted> {
        let manager = SessionManager::new(SessionPolicy::default(), Vec::new(), Vec::new());
        Commands::new(manager, RecordingHost::default(), Scripted::new(outcome))
    }

    fn source_file(dir: &Path) -> PathBuf {
        let path = dir.join("demo.edh");
        fs::write(&path, SOURCE).unwrap();
        path
    }

    #[test]
    fn test_render_lenses_text() {
        let doc = Document::from_text("demo.edh", SOURCE);
        let out = render_lenses(&doc, false).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "L5     Run Cell   --since 4 --before 7");
        assert_eq!(lines[2], "L5     Run Below  --since 4 --before end");
        assert_eq!(lines[7], "L1     Run All    --since 0 --before end");
    }

    #[test]
    fn test_render_lenses_json() {
        let doc = Document::from_text("demo.edh", SOURCE);
        let out = render_lenses(&doc, true).unwrap();
        let records: serde_json::Value = serde_json::from_str(&out).unwrap();
        let records = records.as_array().unwrap();
        // Two markers with Cell/Above/Below each, plus trailing Cell and All
        assert_eq!(records.len(), 8);
        assert_eq!(records[7]["title"], "Run All");
        assert_eq!(records[7]["before"], -1);
    }

    #[test]
    fn test_render_lenses_without_markers() {
        let doc = Document::from_text("plain.edh", "x = 1\n");
        assert_eq!(render_lenses(&doc, false).unwrap(), "");
        assert_eq!(render_lenses(&doc, true).unwrap(), "[]");
    }

    #[test]
    fn test_send_cell_creates_session_and_pastes() {
        let dir = tempfile::tempdir().unwrap();
        let path = source_file(dir.path());
        let mut cmds = commands(PickOutcome::Accepted("hski".to_string()));

        let outcome = cmds
            .send(&SendRequest {
                path: path.clone(),
                range: Some(LineRange::lines(1, 4)),
                selection: None,
                command: None,
            })
            .unwrap();

        assert!(matches!(outcome, SendOutcome::Sent { .. }));
        let host = cmds.host();
        assert_eq!(host.created.len(), 1);
        let expected = format!("%%paste 3 2 {}\n# %%\nx = 1\ny = 2\n", path.display());
        assert_eq!(host.sent[0].1, expected);
    }

    #[test]
    fn test_send_whole_document_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = source_file(dir.path());
        let mut cmds = commands(PickOutcome::Accepted(String::new()));

        cmds.send(&SendRequest {
            path: path.clone(),
            range: None,
            selection: None,
            command: None,
        })
        .unwrap();

        let host = cmds.host();
        assert_eq!(host.created[0].args, vec!["epm", "x", "hski"]);
        let expected = format!("%%paste 6 1 {}\n{}", path.display(), SOURCE);
        assert_eq!(host.sent[0].1, expected);
    }

    #[test]
    fn test_send_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = source_file(dir.path());
        let mut cmds = commands(PickOutcome::Cancelled);

        cmds.send(&SendRequest {
            path: path.clone(),
            range: None,
            selection: Some(Selection::new(Position::new(2, 0), Position::new(3, 5))),
            command: Some("hski".to_string()),
        })
        .unwrap();

        let host = cmds.host();
        let expected = format!("%%paste 2 3 {}\nx = 1\ny = 2", path.display());
        assert_eq!(host.sent[0].1, expected);
    }

    #[test]
    fn test_send_empty_range_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = source_file(dir.path());
        let mut cmds = commands(PickOutcome::Accepted("hski".to_string()));

        let outcome = cmds
            .send(&SendRequest {
                path,
                range: Some(LineRange::lines(3, 3)),
                selection: None,
                command: None,
            })
            .unwrap();

        assert_eq!(outcome, SendOutcome::Empty);
        assert!(cmds.host().created.is_empty());
        assert!(cmds.host().sent.is_empty());
    }

    #[test]
    fn test_send_missing_file_is_error() {
        let mut cmds = commands(PickOutcome::Cancelled);
        let err = cmds
            .send(&SendRequest {
                path: PathBuf::from("/nonexistent/demo.edh"),
                range: None,
                selection: None,
                command: None,
            })
            .unwrap_err();
        assert!(format!("{:#}", err).contains("demo.edh"));
    }

    #[test]
    fn test_new_session_cancelled() {
        let mut cmds = commands(PickOutcome::Cancelled);
        assert_eq!(cmds.new_session(None).unwrap(), None);
        assert!(cmds.host().created.is_empty());
    }

    #[test]
    fn test_sessions_lists_recognized_only() {
        let manager = SessionManager::new(SessionPolicy::default(), Vec::new(), Vec::new());
        let host = RecordingHost::with(
            vec![
                Terminal {
                    id: "@1".to_string(),
                    name: "bash".to_string(),
                    exit_status: None,
                },
                Terminal {
                    id: "@2".to_string(),
                    name: "Đ Session - hski".to_string(),
                    exit_status: None,
                },
            ],
            None,
        );
        let cmds = Commands::new(manager, host, Scripted::new(PickOutcome::Cancelled));
        let sessions = cmds.sessions().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "@2");
    }
}
