//! External command execution and `apm` discovery.
//!
//! The [`CommandRunner`] trait is the only place processes are spawned, so
//! everything above it can be driven by [`MockRunner`] in tests.

use crate::error::{Error, Result};
use crate::types::{CommandOutput, SearchPath};
use crate::validate;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Name of the Atom package manager executable.
pub const APM: &str = "apm";

/// Runs an external program and captures its output.
///
/// A non-zero exit is not an error at this level; only failing to start the
/// process is.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it to finish.
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput>;
}

/// Runner that spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput> {
        log::debug!("Running {} {}", program.display(), args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| Error::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let output = CommandOutput::from(output);
        log::trace!(
            "{} exited with {:?}\nstdout: {}\nstderr: {}",
            program.display(),
            output.code,
            output.stdout.trim(),
            output.stderr.trim()
        );
        Ok(output)
    }
}

/// Resolve the `apm` executable.
///
/// Directories from `search_path` are tried first, then `$PATH`. The result
/// is checked against the apm-path character class.
pub fn locate_apm(search_path: &SearchPath) -> Result<PathBuf> {
    let mut dirs = search_path.dirs();
    if let Some(env_path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&env_path));
    }
    locate_in(APM, &dirs)
}

/// Resolve `binary` in exactly the given directories.
pub fn locate_in(binary: &str, dirs: &[PathBuf]) -> Result<PathBuf> {
    let joined: OsString = std::env::join_paths(dirs)
        .map_err(|e| Error::InvalidPath(e.to_string()))?;
    let cwd = working_dir(std::env::current_dir());

    let found = which::which_in(binary, Some(joined), cwd).map_err(|e| {
        log::debug!("{binary} not found in {dirs:?}: {e}");
        Error::ApmNotFound
    })?;

    validate::check_apm_path(&found.to_string_lossy())?;
    log::debug!("Using {}", found.display());
    Ok(found)
}

/// Base for resolving relative entries; a deleted working directory falls
/// back to the filesystem root so absolute entries still resolve.
fn working_dir(current: std::io::Result<PathBuf>) -> PathBuf {
    current.unwrap_or_else(|e| {
        log::debug!("No usable working directory ({e}), resolving from /");
        PathBuf::from("/")
    })
}

// =============================================================================
// Mock runner
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    /// name -> installed version
    installed: BTreeMap<String, String>,
    /// name -> latest available version
    outdated: BTreeMap<String, String>,
    /// name -> stderr printed when installing it
    broken: BTreeMap<String, String>,
    /// name -> stderr printed when upgrading it; the package stays outdated
    stuck: BTreeMap<String, String>,
    /// name -> stderr printed when uninstalling it; the package stays installed
    locked: BTreeMap<String, String>,
    /// stderr printed by `apm list` when set
    failing_list: Option<String>,
    /// stderr printed by `apm upgrade --no-confirm` when set
    failing_upgrade_all: Option<String>,
    /// Every invocation, arguments joined by spaces
    calls: Vec<String>,
}

/// In-memory stand-in for `apm`.
///
/// Answers the same commands the real backend issues with text shaped like
/// apm's own output, and mutates its package set accordingly. Clones share
/// state, so a test can keep a handle after giving one to a backend.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    state: Arc<Mutex<MockState>>,
}

impl MockRunner {
    /// Create a mock with no packages installed.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a package as installed at `version`.
    pub fn with_installed(self, name: &str, version: &str) -> Self {
        self.lock()
            .installed
            .insert(name.to_string(), version.to_string());
        self
    }

    /// Make `latest` available for a package.
    pub fn with_outdated(self, name: &str, latest: &str) -> Self {
        self.lock()
            .outdated
            .insert(name.to_string(), latest.to_string());
        self
    }

    /// Make installing `name` fail with `stderr`.
    pub fn with_broken(self, name: &str, stderr: &str) -> Self {
        self.lock()
            .broken
            .insert(name.to_string(), stderr.to_string());
        self
    }

    /// Make upgrading `name` fail with `stderr`, leaving it outdated.
    pub fn with_stuck(self, name: &str, stderr: &str) -> Self {
        self.lock()
            .stuck
            .insert(name.to_string(), stderr.to_string());
        self
    }

    /// Make uninstalling `name` fail with `stderr`, leaving it installed.
    pub fn with_locked(self, name: &str, stderr: &str) -> Self {
        self.lock()
            .locked
            .insert(name.to_string(), stderr.to_string());
        self
    }

    /// Make the bulk `apm upgrade --no-confirm` fail with `stderr`.
    pub fn with_failing_upgrade_all(self, stderr: &str) -> Self {
        self.lock().failing_upgrade_all = Some(stderr.to_string());
        self
    }

    /// Make `apm list` fail with `stderr`.
    pub fn with_failing_list(self, stderr: &str) -> Self {
        self.lock().failing_list = Some(stderr.to_string());
        self
    }

    /// Every invocation so far, arguments joined by spaces.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Invocations that would change package state.
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("install") || c.starts_with("uninstall") || c.starts_with("upgrade")
            })
            .collect()
    }

    /// Whether the mock currently has `name` installed.
    pub fn has_installed(&self, name: &str) -> bool {
        self.lock().installed.contains_key(name)
    }

    /// Installed version of `name`.
    pub fn version_of(&self, name: &str) -> Option<String> {
        self.lock().installed.get(name).cloned()
    }
}

impl MockState {
    fn list(&self) -> CommandOutput {
        if let Some(stderr) = &self.failing_list {
            return CommandOutput::failed(1, stderr.clone());
        }
        let stdout: String = self
            .installed
            .iter()
            .map(|(name, version)| format!("{name}@{version}\n"))
            .collect();
        CommandOutput::ok(stdout)
    }

    fn pending(&self, only: Option<&str>) -> Vec<(String, String, String)> {
        self.outdated
            .iter()
            .filter(|(name, _)| only.is_none_or(|o| o == name.as_str()))
            .filter_map(|(name, latest)| {
                self.installed
                    .get(name)
                    .map(|current| (name.clone(), current.clone(), latest.clone()))
            })
            .collect()
    }

    fn apply_upgrades(&mut self, pending: &[(String, String, String)]) {
        for (name, _, latest) in pending {
            self.installed.insert(name.clone(), latest.clone());
            self.outdated.remove(name);
        }
    }

    fn install(&mut self, name: &str) -> CommandOutput {
        if let Some(stderr) = self.broken.get(name) {
            return CommandOutput::failed(1, stderr.clone());
        }
        let version = self
            .outdated
            .remove(name)
            .unwrap_or_else(|| "1.0.0".to_string());
        self.installed.insert(name.to_string(), version.clone());
        CommandOutput::ok(format!("Installing {name}@{version} to ~/.atom/packages done\n"))
    }

    fn upgrade(&mut self, name: Option<&str>) -> CommandOutput {
        let failure = match name {
            Some(name) => self.stuck.get(name),
            None => self.failing_upgrade_all.as_ref(),
        };
        if let Some(stderr) = failure {
            return CommandOutput::failed(1, stderr.clone());
        }
        let pending = self.pending(name);
        self.apply_upgrades(&pending);
        CommandOutput::ok(render_updates(&pending))
    }

    fn uninstall(&mut self, name: &str) -> CommandOutput {
        if let Some(stderr) = self.locked.get(name) {
            return CommandOutput::failed(1, stderr.clone());
        }
        if self.installed.remove(name).is_some() {
            CommandOutput::ok(format!("Uninstalling {name} done\n"))
        } else {
            CommandOutput::failed(1, format!("Failed to delete {name}: Does not exist\n"))
        }
    }
}

/// Render a pending-upgrade tree the way `apm outdated` and `apm upgrade` do.
fn render_updates(pending: &[(String, String, String)]) -> String {
    let mut out = format!("Package Updates Available ({})\n", pending.len());
    if pending.is_empty() {
        out.push_str("└── (empty)\n");
        return out;
    }
    for (i, (name, current, latest)) in pending.iter().enumerate() {
        let branch = if i + 1 == pending.len() { "└──" } else { "├──" };
        out.push_str(&format!("{branch} {name} {current} -> {latest}\n"));
    }
    out
}

impl CommandRunner for MockRunner {
    fn run(&self, _program: &Path, args: &[&str]) -> Result<CommandOutput> {
        let mut state = self.lock();
        state.calls.push(args.join(" "));

        let output = match args {
            ["list", "--bare", "--installed"] => state.list(),
            ["outdated"] => CommandOutput::ok(render_updates(&state.pending(None))),
            ["outdated", name] => CommandOutput::ok(render_updates(&state.pending(Some(*name)))),
            ["install", name] => state.install(name),
            ["uninstall", name] => state.uninstall(name),
            ["upgrade", "--no-confirm"] => state.upgrade(None),
            ["upgrade", "--no-confirm", name] => state.upgrade(Some(*name)),
            _ => CommandOutput::failed(1, format!("Unrecognized command: {}", args.join(" "))),
        };
        Ok(output)
    }
}
