//! Configuration for haskit.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.haskit/config.toml`
//! - Discovery of per-project `haskit.json` files in the workspace
//!
//! # Configuration File
//!
//! ```toml
//! # Prefix that marks a terminal as an interpreter session
//! session_prefix = "Đ Session - "
//!
//! # Program and leading arguments every session is launched with
//! launcher = "/usr/bin/env"
//! launcher_args = ["epm", "x"]
//!
//! # Command used when the picker is accepted empty
//! default_command = "hski"
//!
//! [[templates]]
//! command = "stack run "
//! description = "Build & Run with Stack"
//! ```
//!
//! # Project Configuration
//!
//! Any `haskit.json` below the workspace root may offer session commands:
//!
//! ```json
//! { "cmd": ["stack run hski", "cabal run hski"] }
//! ```
//!
//! `cmd` may also be a single string. The first command found becomes the
//! default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::session::{CommandCandidate, SessionPolicy, FALLBACK_COMMAND, SESSION_PREFIX};

/// Name of the per-project config file
pub const PROJECT_CONFIG_FILE: &str = "haskit.json";

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display name prefix of sessions
    pub session_prefix: String,
    /// Launcher program
    pub launcher: String,
    /// Fixed arguments placed before the session command
    pub launcher_args: Vec<String>,
    /// Fallback session command
    pub default_command: String,
    /// Command templates offered by the picker
    pub templates: Vec<TemplateConfig>,
    /// tmux binary
    pub tmux: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_prefix: SESSION_PREFIX.to_string(),
            launcher: "/usr/bin/env".to_string(),
            launcher_args: vec!["epm".to_string(), "x".to_string()],
            default_command: FALLBACK_COMMAND.to_string(),
            templates: vec![
                TemplateConfig {
                    command: "stack run ".to_string(),
                    description: Some("Build & Run with Stack".to_string()),
                },
                TemplateConfig {
                    command: "cabal run hski".to_string(),
                    description: Some("Build & Run with Cabal".to_string()),
                },
            ],
            tmux: "tmux".to_string(),
        }
    }
}

/// Picker template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    /// Load from an explicit path, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Get config directory, creating it if needed
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".haskit");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            prefix: self.session_prefix.clone(),
            launcher: self.launcher.clone(),
            launcher_args: self.launcher_args.clone(),
            default_command: self.default_command.clone(),
        }
    }

    pub fn candidates(&self) -> Vec<CommandCandidate> {
        self.templates
            .iter()
            .map(|t| CommandCandidate::new(t.command.as_str(), t.description.as_deref()))
            .collect()
    }
}

/// `cmd` value of a project config: one command or several
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CommandList {
    One(String),
    Many(Vec<String>),
}

impl CommandList {
    fn into_vec(self) -> Vec<String> {
        match self {
            CommandList::One(cmd) => vec![cmd],
            CommandList::Many(cmds) => cmds,
        }
    }
}

/// Contents of one `haskit.json`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub cmd: Option<CommandList>,
}

impl ProjectConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(content).context("Invalid JSON")?;
        if !value.is_object() {
            anyhow::bail!("Expected a JSON object");
        }
        serde_json::from_value(value).context("Unexpected haskit.json shape")
    }

    pub fn commands(self) -> Vec<String> {
        self.cmd.map(CommandList::into_vec).unwrap_or_default()
    }
}

/// Collect session commands from every `haskit.json` under `root`.
///
/// Shallower files come first. A file that cannot be read or parsed is
/// skipped with a warning; the others still count. Duplicates are dropped.
pub fn discover_project_commands(root: &Path) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();

    let mut paths: Vec<PathBuf> = WalkBuilder::new(root)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping workspace entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| entry.file_name() == PROJECT_CONFIG_FILE)
        .map(|entry| entry.into_path())
        .collect();
    paths.sort_by(|a, b| {
        a.components()
            .count()
            .cmp(&b.components().count())
            .then_with(|| a.cmp(b))
    });

    for path in paths {
        let parsed = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))
            .and_then(|content| ProjectConfig::parse(&content));
        match parsed {
            Ok(config) => {
                for cmd in config.commands() {
                    if !cmd.trim().is_empty() && !commands.contains(&cmd) {
                        commands.push(cmd);
                    }
                }
            }
            Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
        }
    }

    debug!("Project commands: {:?}", commands);
    commands
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
