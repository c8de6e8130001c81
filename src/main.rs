//! haskit - run Edh source cells in interpreter terminal sessions
//!
//! haskit finds cell markers in Edh source files and pastes the chosen
//! range into an interpreter running in a tmux window, reusing a live
//! session when one exists.
//!
//! # Cell Markers
//!
//! | Line prefix       | Meaning      |
//! |-------------------|--------------|
//! | `# %%`, `# In[`   | cell         |
//! | `# %{`            | block start  |
//! | `# %}`            | block end    |
//!
//! # Quick Start
//!
//! ```text
//! haskit lenses demo.edh                  # list runnable ranges
//! haskit send demo.edh --since 4 --before end
//! haskit new stack run hski               # open a session explicitly
//! ```

mod commands;
mod config;
mod core;
mod ui;

use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::commands::{render_lenses, Commands, SendRequest};
use crate::config::Config;
use crate::core::cells::{LineRange, RangeEnd};
use crate::core::document::{Document, Position, Selection};
use crate::core::session::SendOutcome;
use crate::core::tmux::TmuxHost;
use crate::ui::TerminalChooser;

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Error, Debug, PartialEq, Eq)]
enum ArgsError {
    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("Invalid value for {flag}: {value}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("--since and --before must be given together")]
    IncompleteRange,

    #[error("Use either a line range or --selection, not both")]
    ConflictingRange,

    #[error("Unknown argument: {0}. Use -h for help.")]
    Unknown(String),
}

/// Parsed subcommand
#[derive(Debug, PartialEq, Eq)]
enum CliCommand {
    Lenses { path: PathBuf, json: bool },
    New { command: Option<String> },
    Send(SendRequest),
    Sessions,
    Help,
    Version,
}

/// Application configuration from the command line
#[derive(Debug, PartialEq, Eq)]
struct Cli {
    workspace: Option<PathBuf>,
    log_level: Option<String>,
    command: CliCommand,
}

fn print_help() {
    eprintln!("haskit {} - Run Edh source cells in interpreter sessions", VERSION);
    eprintln!();
    eprintln!("Usage: haskit [OPTIONS] <COMMAND>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  lenses <FILE> [--json]      List runnable ranges at cell markers");
    eprintln!("  new [COMMAND...]            Open a new session (asks when no command)");
    eprintln!("  send <FILE> [RANGE] [--cmd <COMMAND>]");
    eprintln!("                              Paste source into the best live session");
    eprintln!("  sessions                    List live sessions");
    eprintln!();
    eprintln!("Send ranges (zero-based, end exclusive):");
    eprintln!("  --since <N> --before <M>    Lines N..M; M may be 'end' or -1");
    eprintln!("  --selection <L:C-L:C>       Exact selection, line:character");
    eprintln!("  (none)                      Whole file");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -w, --workspace <DIR>       Where to look for haskit.json (default: .)");
    eprintln!("  --log-level <LEVEL>         error, warn, info, debug, trace");
    eprintln!("  -v, --version               Show version");
    eprintln!("  -h, --help                  Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.haskit/config.toml");
    eprintln!("Log file:      ~/.haskit/haskit.log (filter via HASKIT_LOG)");
}

fn parse_line(flag: &'static str, value: &str) -> Result<usize, ArgsError> {
    value.parse().map_err(|_| ArgsError::InvalidValue {
        flag,
        value: value.to_string(),
    })
}

fn parse_range_end(value: &str) -> Result<RangeEnd, ArgsError> {
    match value {
        "end" | "-1" => Ok(RangeEnd::EndOfDocument),
        _ => parse_line("--before", value).map(RangeEnd::Line),
    }
}

fn parse_position(value: &str) -> Option<Position> {
    let (line, character) = value.split_once(':')?;
    Some(Position::new(line.parse().ok()?, character.parse().ok()?))
}

fn parse_selection(value: &str) -> Result<Selection, ArgsError> {
    let invalid = || ArgsError::InvalidValue {
        flag: "--selection",
        value: value.to_string(),
    };
    let (start, end) = value.split_once('-').ok_or_else(invalid)?;
    let start = parse_position(start).ok_or_else(invalid)?;
    let end = parse_position(end).ok_or_else(invalid)?;
    Ok(Selection::new(start, end))
}

/// Advance past a flag and return its value
fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &'static str) -> Result<&'a str, ArgsError> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or(ArgsError::Missing(flag))
}

fn parse_send(args: &[String]) -> Result<SendRequest, ArgsError> {
    let mut path = None;
    let mut since = None;
    let mut before = None;
    let mut selection = None;
    let mut command = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--since" => since = Some(parse_line("--since", flag_value(args, &mut i, "--since")?)?),
            "--before" => before = Some(parse_range_end(flag_value(args, &mut i, "--before")?)?),
            "--selection" => {
                selection = Some(parse_selection(flag_value(args, &mut i, "--selection")?)?)
            }
            "--cmd" => command = Some(flag_value(args, &mut i, "--cmd")?.to_string()),
            other if other.starts_with("--") => return Err(ArgsError::Unknown(other.to_string())),
            other if path.is_none() => path = Some(PathBuf::from(other)),
            other => return Err(ArgsError::Unknown(other.to_string())),
        }
        i += 1;
    }

    let range = match (since, before) {
        (Some(since), Some(before)) => Some(LineRange::new(since, before)),
        (None, None) => None,
        _ => return Err(ArgsError::IncompleteRange),
    };
    if range.is_some() && selection.is_some() {
        return Err(ArgsError::ConflictingRange);
    }

    Ok(SendRequest {
        path: path.ok_or(ArgsError::Missing("source file"))?,
        range,
        selection,
        command,
    })
}

fn parse_args(args: &[String]) -> Result<Cli, ArgsError> {
    let mut workspace = None;
    let mut log_level = None;
    let mut i = 0;

    // Global options come before the subcommand
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                return Ok(Cli {
                    workspace,
                    log_level,
                    command: CliCommand::Help,
                })
            }
            "-v" | "--version" => {
                return Ok(Cli {
                    workspace,
                    log_level,
                    command: CliCommand::Version,
                })
            }
            "-w" | "--workspace" => {
                i += 1;
                let dir = args.get(i).ok_or(ArgsError::Missing("workspace directory"))?;
                workspace = Some(PathBuf::from(dir));
            }
            "--log-level" => {
                i += 1;
                let level = args.get(i).ok_or(ArgsError::Missing("log level"))?;
                log_level = Some(level.clone());
            }
            _ => break,
        }
        i += 1;
    }

    let Some(sub) = args.get(i) else {
        return Ok(Cli {
            workspace,
            log_level,
            command: CliCommand::Help,
        });
    };
    let rest = &args[i + 1..];

    let command = match sub.as_str() {
        "lenses" => {
            let mut path = None;
            let mut json = false;
            for arg in rest {
                match arg.as_str() {
                    "--json" => json = true,
                    other if other.starts_with("--") || path.is_some() => {
                        return Err(ArgsError::Unknown(other.to_string()))
                    }
                    other => path = Some(PathBuf::from(other)),
                }
            }
            CliCommand::Lenses {
                path: path.ok_or(ArgsError::Missing("source file"))?,
                json,
            }
        }
        "new" => CliCommand::New {
            command: if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            },
        },
        "send" => CliCommand::Send(parse_send(rest)?),
        "sessions" => {
            if let Some(extra) = rest.first() {
                return Err(ArgsError::Unknown(extra.clone()));
            }
            CliCommand::Sessions
        }
        other => return Err(ArgsError::Unknown(other.to_string())),
    };

    Ok(Cli {
        workspace,
        log_level,
        command,
    })
}

/// Log to `~/.haskit/haskit.log`, keeping the terminal clean
fn init_logging(level: Option<&str>) {
    let log_path = Config::config_dir()
        .map(|dir| dir.join("haskit.log"))
        .unwrap_or_else(|| PathBuf::from("haskit.log"));

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env("HASKIT_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // Open log file (append mode)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let workspace = match cli.workspace {
        Some(dir) => dir,
        None => env::current_dir()?,
    };
    info!("Workspace: {}", workspace.display());

    let mut commands = Commands::from_config(
        &config,
        &workspace,
        TmuxHost::new(config.tmux.clone()),
        TerminalChooser,
    );

    match cli.command {
        CliCommand::Lenses { path, json } => {
            let doc = Document::open(&path)?;
            print!("{}", render_lenses(&doc, json)?);
        }
        CliCommand::New { command } => match commands.new_session(command.as_deref())? {
            Some(session) => println!("{}\t{}", session.id, session.name),
            None => info!("Session creation cancelled"),
        },
        CliCommand::Send(request) => match commands.send(&request)? {
            SendOutcome::Sent { session, frame } => {
                eprintln!("Sent {} line(s) to {}", frame.line_count, session.name)
            }
            SendOutcome::Empty => eprintln!("No Edh source to send."),
            SendOutcome::Cancelled => {}
        },
        CliCommand::Sessions => {
            for session in commands.sessions()? {
                println!("{}\t{}", session.id, session.name);
            }
        }
        CliCommand::Help | CliCommand::Version => {}
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(2);
        }
    };

    match cli.command {
        CliCommand::Help => {
            print_help();
            return Ok(());
        }
        CliCommand::Version => {
            eprintln!("haskit {}", VERSION);
            return Ok(());
        }
        _ => {}
    }

    init_logging(cli.log_level.as_deref());
    info!("haskit {} starting", VERSION);

    let result = run(cli);
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
