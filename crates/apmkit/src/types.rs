//! Core types for apm package reconciliation.

use crate::error::{Error, Result};
use crate::validate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory searched for `apm` when none is given.
pub const DEFAULT_SEARCH_DIR: &str = "/usr/local/bin";

/// Desired state of a package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    /// Package is present, any version
    #[default]
    Installed,
    /// Package is present and not outdated
    Upgraded,
    /// Package is not present
    Absent,
}

impl PackageState {
    /// Canonical name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageState::Installed => "installed",
            PackageState::Upgraded => "upgraded",
            PackageState::Absent => "absent",
        }
    }

    /// Every spelling accepted by [`FromStr`].
    pub const ALIASES: &'static [&'static str] = &[
        "present",
        "installed",
        "latest",
        "upgraded",
        "absent",
        "removed",
        "uninstalled",
    ];
}

impl FromStr for PackageState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "present" | "installed" => Ok(PackageState::Installed),
            "latest" | "upgraded" => Ok(PackageState::Upgraded),
            "absent" | "removed" | "uninstalled" => Ok(PackageState::Absent),
            _ => Err(Error::InvalidState(s.to_string())),
        }
    }
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered directories searched for the `apm` executable.
///
/// Keeps the raw `:`-joined form so it can be validated as one string, the
/// way it was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    raw: String,
}

impl SearchPath {
    /// Create a search path from a `:`-separated list of directories.
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Create a search path from individual directories.
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let raw = dirs
            .into_iter()
            .map(|d| d.as_ref().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":");
        Self { raw }
    }

    /// The path exactly as supplied.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Individual directories, in search order. Empty segments are dropped.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.raw
            .split(':')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

impl Default for SearchPath {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_DIR)
    }
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A declarative request: what the packages should look like after the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Package names, processed left to right
    pub packages: Vec<String>,
    /// Desired state for every package in `packages`
    pub state: PackageState,
    /// Run `apm upgrade` for everything before per-package processing
    pub upgrade_all: bool,
    /// Where to look for `apm`
    pub path: SearchPath,
    /// Report what would change without mutating anything
    pub check_mode: bool,
}

impl Request {
    /// Create a request for the given packages and state.
    pub fn new<I, S>(packages: I, state: PackageState) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
            state,
            ..Default::default()
        }
    }

    /// Request only a bulk upgrade.
    pub fn upgrade_all() -> Self {
        Self {
            upgrade_all: true,
            ..Default::default()
        }
    }

    /// Also run a bulk upgrade first.
    pub fn with_upgrade_all(mut self, upgrade_all: bool) -> Self {
        self.upgrade_all = upgrade_all;
        self
    }

    /// Set the search path for `apm`.
    pub fn with_path(mut self, path: SearchPath) -> Self {
        self.path = path;
        self
    }

    /// Enable or disable check (dry-run) mode.
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Reject anything outside the accepted character classes.
    ///
    /// Runs before any external call, so a bad name late in the list still
    /// prevents earlier packages from being touched.
    pub fn validate(&self) -> Result<()> {
        validate::check_path(self.path.as_str())?;
        for package in &self.packages {
            validate::check_package(package)?;
        }
        Ok(())
    }
}

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// What the host runtime reports back to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The run stopped on an error
    pub failed: bool,
    /// Something changed, or would have in check mode
    pub changed: bool,
    /// Last individual message, or a changed/unchanged tally
    pub msg: String,
}

impl Outcome {
    /// A failed outcome carrying the error message.
    pub fn failure(error: &Error) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: error.to_string(),
        }
    }

    /// Serialize as a single-line JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Read-only view of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageStatus {
    /// Package name as requested
    pub name: String,
    /// Listed by `apm list --bare --installed`
    pub installed: bool,
    /// Mentioned by `apm outdated`
    pub outdated: bool,
}
