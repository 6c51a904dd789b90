//! Real apm CLI backend.

use crate::backend::{Backend, BulkUpgrade};
use crate::error::{Error, Result};
use crate::runner::{CommandRunner, SystemRunner, locate_apm};
use crate::types::{CommandOutput, SearchPath};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Marker apm prints in place of an empty update tree.
const EMPTY_MARKER: &str = "(empty)";

/// Header line of `apm outdated` and `apm upgrade` reports.
const UPDATES_HEADER: &str = "package updates available";

static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("ANSI pattern is a valid regex"));

/// Backend that executes `apm` through a [`CommandRunner`].
pub struct ApmBackend<R: CommandRunner = SystemRunner> {
    /// Path to the apm executable
    apm_path: PathBuf,
    runner: R,
}

impl ApmBackend<SystemRunner> {
    /// Resolve apm on `search_path` (then `$PATH`) and run it for real.
    pub fn locate(search_path: &SearchPath) -> Result<Self> {
        let apm_path = locate_apm(search_path)?;
        Ok(Self::with_runner(apm_path, SystemRunner))
    }
}

impl<R: CommandRunner> ApmBackend<R> {
    /// Create a backend for an already-resolved apm path.
    pub fn with_runner(apm_path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            apm_path: apm_path.into(),
            runner,
        }
    }

    /// Path of the apm executable in use.
    pub fn apm_path(&self) -> &Path {
        &self.apm_path
    }

    /// Run apm and return its output regardless of exit status.
    fn run_apm(&self, args: &[&str]) -> Result<CommandOutput> {
        let mut output = self.runner.run(&self.apm_path, args)?;
        output.stdout = strip_ansi(&output.stdout);
        output.stderr = strip_ansi(&output.stderr);
        Ok(output)
    }

    /// Run apm and fail with its stderr unless it exits 0.
    fn run_apm_checked(&self, args: &[&str]) -> Result<String> {
        let output = self.run_apm(args)?;
        if !output.success() {
            return Err(Error::from_apm_output(args, &output.stderr, output.code));
        }
        Ok(output.stdout)
    }
}

impl<R: CommandRunner> Backend for ApmBackend<R> {
    fn is_installed(&self, name: &str) -> Result<bool> {
        let stdout = self.run_apm_checked(&["list", "--bare", "--installed"])?;
        Ok(lists_package(&stdout, name))
    }

    fn is_outdated(&self, name: &str) -> Result<bool> {
        let stdout = self.run_apm_checked(&["outdated", name])?;
        Ok(mentions_package(&stdout, name))
    }

    fn install(&self, name: &str) -> Result<CommandOutput> {
        self.run_apm(&["install", name])
    }

    fn upgrade(&self, name: &str) -> Result<CommandOutput> {
        self.run_apm(&["upgrade", "--no-confirm", name])
    }

    fn uninstall(&self, name: &str) -> Result<CommandOutput> {
        self.run_apm(&["uninstall", name])
    }

    fn upgrade_all(&self) -> Result<BulkUpgrade> {
        let stdout = self.run_apm_checked(&["upgrade", "--no-confirm"])?;
        Ok(bulk_result(&stdout))
    }

    fn pending_upgrades(&self) -> Result<BulkUpgrade> {
        let stdout = self.run_apm_checked(&["outdated"])?;
        Ok(bulk_result(&stdout))
    }
}

/// Remove terminal color sequences apm emits even when piped.
fn strip_ansi(s: &str) -> String {
    ANSI_ESCAPE.replace_all(s, "").into_owned()
}

/// Whether `apm list --bare` output has a `name@version` line for `name`.
fn lists_package(bare_list: &str, name: &str) -> bool {
    bare_list.lines().any(|line| {
        line.trim()
            .split_once('@')
            .is_some_and(|(listed, _)| listed.eq_ignore_ascii_case(name))
    })
}

/// Whether an update report mentions `name` as a whole token.
fn mentions_package(report: &str, name: &str) -> bool {
    report
        .lines()
        .filter(|line| !line.trim().to_lowercase().starts_with(UPDATES_HEADER))
        .flat_map(str::split_whitespace)
        .any(|token| token.eq_ignore_ascii_case(name))
}

fn bulk_result(stdout: &str) -> BulkUpgrade {
    if stdout.to_lowercase().contains(EMPTY_MARKER) {
        BulkUpgrade::NothingToDo
    } else {
        BulkUpgrade::Upgraded
    }
}
