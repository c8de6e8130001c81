//! tmux terminal host
//!
//! Each session is a tmux window. Windows are created with `remain-on-exit`
//! so an exited interpreter keeps its exit status and reads as dead instead
//! of vanishing.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::host::{HostError, LaunchSpec, Result, Terminal, TerminalHost};

/// Fields reported for every window, separated by tabs
const WINDOW_FORMAT: &str =
    "#{window_id}\t#{pane_dead}\t#{pane_dead_status}\t#{window_active}\t#{window_name}";

/// tmux session that receives windows when no server is running yet
const DEFAULT_SESSION: &str = "haskit";

/// Paste buffer used for sends
const PASTE_BUFFER: &str = "haskit";

/// A window as listed by tmux
#[derive(Debug, Clone, PartialEq, Eq)]
struct WindowRecord {
    terminal: Terminal,
    active: bool,
}

/// Parse one line of `WINDOW_FORMAT` output
fn parse_window_line(line: &str) -> Result<WindowRecord> {
    // The name goes last so tabs inside it survive
    let mut fields = line.splitn(5, '\t');
    let (Some(id), Some(dead), Some(status), Some(active), Some(name)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(HostError::Parse(line.to_string()));
    };

    if !id.starts_with('@') {
        return Err(HostError::Parse(line.to_string()));
    }

    let exit_status = if dead == "1" {
        // A dead pane always has a status; killed-by-signal leaves it blank
        Some(status.trim().parse::<i32>().unwrap_or(-1))
    } else {
        None
    };

    Ok(WindowRecord {
        terminal: Terminal {
            id: id.to_string(),
            name: name.to_string(),
            exit_status,
        },
        active: active == "1",
    })
}

fn parse_window_list(output: &str) -> Result<Vec<WindowRecord>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_window_line)
        .collect()
}

fn is_no_server(stderr: &str) -> bool {
    stderr.contains("no server running")
        || stderr.contains("error connecting to")
        || stderr.contains("no current")
}

/// Terminal host driving a tmux server
pub struct TmuxHost {
    program: String,
}

impl TmuxHost {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run tmux and return its stdout
    fn run(&self, args: &[&str], stdin: Option<&str>) -> Result<String> {
        debug!("{} {}", self.program, args.join(" "));
        let spawn_err = |source| HostError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).map_err(spawn_err)?;
        }

        let output = child.wait_with_output().map_err(spawn_err)?;
        if !output.status.success() {
            return Err(HostError::CommandFailed {
                command: format!("{} {}", self.program, args.first().unwrap_or(&"")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like `run`, but a missing server yields `None`
    fn run_if_server(&self, args: &[&str]) -> Result<Option<String>> {
        match self.run(args, None) {
            Ok(out) => Ok(Some(out)),
            Err(HostError::CommandFailed { stderr, .. }) if is_no_server(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn server_running(&self) -> Result<bool> {
        Ok(self.run_if_server(&["list-sessions"])?.is_some())
    }
}

impl TerminalHost for TmuxHost {
    fn terminals(&self) -> Result<Vec<Terminal>> {
        let Some(out) = self.run_if_server(&["list-windows", "-a", "-F", WINDOW_FORMAT])? else {
            return Ok(Vec::new());
        };
        Ok(parse_window_list(&out)?
            .into_iter()
            .map(|w| w.terminal)
            .collect())
    }

    fn active_terminal(&self) -> Result<Option<Terminal>> {
        let Some(out) = self.run_if_server(&["display-message", "-p", WINDOW_FORMAT])? else {
            return Ok(None);
        };
        let records = parse_window_list(&out)?;
        Ok(records.into_iter().find(|w| w.active).map(|w| w.terminal))
    }

    fn create_terminal(&mut self, spec: &LaunchSpec) -> Result<Terminal> {
        let mut args: Vec<&str> = if self.server_running()? {
            vec!["new-window", "-d"]
        } else {
            vec!["new-session", "-d", "-s", DEFAULT_SESSION]
        };
        args.extend(["-P", "-F", WINDOW_FORMAT, "-n", spec.name.as_str(), "--"]);
        args.push(spec.program.as_str());
        args.extend(spec.args.iter().map(String::as_str));

        let out = self.run(&args, None)?;
        let record = parse_window_list(&out)?
            .into_iter()
            .next()
            .ok_or_else(|| HostError::Parse(out.clone()))?;

        let id = record.terminal.id.as_str();
        self.run(&["set-option", "-w", "-t", id, "remain-on-exit", "on"], None)?;
        // Keep the name we gave; the shell would otherwise retitle the window
        self.run(&["set-option", "-w", "-t", id, "automatic-rename", "off"], None)?;

        Ok(record.terminal)
    }

    fn show(&mut self, terminal: &Terminal) -> Result<()> {
        self.run(&["select-window", "-t", &terminal.id], None)?;
        Ok(())
    }

    fn send_text(&mut self, terminal: &Terminal, text: &str, submit: bool) -> Result<()> {
        self.run(&["load-buffer", "-b", PASTE_BUFFER, "-"], Some(text))?;
        self.run(
            &["paste-buffer", "-d", "-b", PASTE_BUFFER, "-t", &terminal.id],
            None,
        )?;
        if submit {
            self.run(&["send-keys", "-t", &terminal.id, "Enter"], None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_live_window() {
        let rec = parse_window_line("@3\t0\t\t1\tĐ Session - hski").unwrap();
        assert_eq!(rec.terminal.id, "@3");
        assert_eq!(rec.terminal.name, "Đ Session - hski");
        assert!(rec.terminal.is_alive());
        assert!(rec.active);
    }

    #[test]
    fn test_parse_dead_window() {
        let rec = parse_window_line("@4\t1\t2\t0\tĐ Session - stack run").unwrap();
        assert_eq!(rec.terminal.exit_status, Some(2));
        assert!(!rec.active);

        let rec = parse_window_line("@5\t1\t\t0\tbash").unwrap();
        assert_eq!(rec.terminal.exit_status, Some(-1));
    }

    #[test]
    fn test_parse_name_with_tab() {
        let rec = parse_window_line("@1\t0\t\t0\ta\tb").unwrap();
        assert_eq!(rec.terminal.name, "a\tb");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_window_line("no server").is_err());
        assert!(parse_window_line("x\t0\t\t0\tname").is_err());
    }

    #[test]
    fn test_parse_window_list_skips_blank_lines() {
        let out = "@1\t0\t\t1\tbash\n\n@2\t0\t\t0\tĐ Session - hski\n";
        let windows = parse_window_list(out).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].terminal.id, "@2");
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let host = TmuxHost::new("/nonexistent/haskit-tmux");
        assert!(matches!(host.terminals(), Err(HostError::Spawn { .. })));
    }
}
