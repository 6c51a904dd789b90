//! Idempotent reconciliation of a [`Request`] against a [`Backend`].
//!
//! Packages are processed left to right. The first failure stops the run and
//! becomes the reported message; nothing already done is rolled back. In
//! check mode the first package that would change stops the run as well, and
//! no mutating command is ever issued.

use crate::backend::{Backend, BulkUpgrade};
use crate::error::{Error, Result};
use crate::types::{CommandOutput, Outcome, PackageState, Request};

/// What happened to one package (or to the bulk upgrade).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// Already in the desired state
    Unchanged(String),
    /// Brought into the desired state
    Changed(String),
    /// Check mode: would have changed, run stops here
    WouldChange(String),
}

/// Running tally for one reconciliation.
#[derive(Debug, Default)]
struct Tally {
    changed: bool,
    changed_count: usize,
    unchanged_count: usize,
    message: String,
}

/// Applies one request through a backend.
pub struct Reconciler<'a> {
    backend: &'a dyn Backend,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler. `check_mode` forbids mutating commands.
    pub fn new(backend: &'a dyn Backend, check_mode: bool) -> Self {
        Self {
            backend,
            check_mode,
        }
    }

    /// Reconcile `request` and report the outcome.
    ///
    /// Errors never escape; they become a failed [`Outcome`].
    pub fn run(&self, request: &Request) -> Outcome {
        let mut tally = Tally::default();

        if let Err(e) = self.run_steps(request, &mut tally) {
            log::debug!("Reconciliation stopped: {e}");
            return Outcome {
                failed: true,
                changed: tally.changed,
                msg: e.to_string(),
            };
        }

        if tally.changed_count + tally.unchanged_count > 1 {
            tally.message = format!(
                "Changed: {}, Unchanged: {}",
                tally.changed_count, tally.unchanged_count
            );
        }

        Outcome {
            failed: false,
            changed: tally.changed,
            msg: tally.message,
        }
    }

    fn run_steps(&self, request: &Request, tally: &mut Tally) -> Result<()> {
        if request.upgrade_all {
            match self.upgrade_all()? {
                Step::Unchanged(msg) => tally.message = msg,
                Step::Changed(msg) | Step::WouldChange(msg) => {
                    tally.changed = true;
                    tally.message = msg;
                }
            }
        }

        for package in &request.packages {
            let step = match request.state {
                PackageState::Installed => self.install(package)?,
                PackageState::Upgraded => self.upgrade(package)?,
                PackageState::Absent => self.uninstall(package)?,
            };
            log::info!("{package}: {step:?}");

            match step {
                Step::Unchanged(msg) => {
                    tally.unchanged_count += 1;
                    tally.message = msg;
                }
                Step::Changed(msg) => {
                    tally.changed = true;
                    tally.changed_count += 1;
                    tally.message = msg;
                }
                Step::WouldChange(msg) => {
                    tally.changed = true;
                    tally.message = msg;
                    break;
                }
            }
        }

        Ok(())
    }

    fn upgrade_all(&self) -> Result<Step> {
        let already = || Step::Unchanged("Atom packages already upgraded.".to_string());

        if self.check_mode {
            return Ok(match self.backend.pending_upgrades()? {
                BulkUpgrade::NothingToDo => already(),
                BulkUpgrade::Upgraded => {
                    Step::WouldChange("Atom packages would be upgraded.".to_string())
                }
            });
        }

        Ok(match self.backend.upgrade_all()? {
            BulkUpgrade::NothingToDo => already(),
            BulkUpgrade::Upgraded => Step::Changed("Atom upgraded.".to_string()),
        })
    }

    fn install(&self, package: &str) -> Result<Step> {
        if self.backend.is_installed(package)? {
            return Ok(Step::Unchanged(format!("Package already installed: {package}")));
        }

        if self.check_mode {
            return Ok(Step::WouldChange(format!("Package would be installed: {package}")));
        }

        let output = self.backend.install(package)?;

        if self.backend.is_installed(package)? {
            Ok(Step::Changed(format!("Package installed: {package}")))
        } else {
            Err(not_reached(&["install", package], &output))
        }
    }

    fn upgrade(&self, package: &str) -> Result<Step> {
        let installed = self.backend.is_installed(package)?;

        if installed && !self.backend.is_outdated(package)? {
            return Ok(Step::Unchanged(format!("Package is already upgraded: {package}")));
        }

        if self.check_mode {
            return Ok(Step::WouldChange(format!("Package would be upgraded: {package}")));
        }

        let (args, output) = if installed {
            (
                ["upgrade", "--no-confirm", package].to_vec(),
                self.backend.upgrade(package)?,
            )
        } else {
            (["install", package].to_vec(), self.backend.install(package)?)
        };

        if self.backend.is_installed(package)? && !self.backend.is_outdated(package)? {
            Ok(Step::Changed(format!("Package upgraded: {package}")))
        } else {
            Err(not_reached(&args, &output))
        }
    }

    fn uninstall(&self, package: &str) -> Result<Step> {
        if !self.backend.is_installed(package)? {
            return Ok(Step::Unchanged(format!("Package already uninstalled: {package}")));
        }

        if self.check_mode {
            return Ok(Step::WouldChange(format!(
                "Package would be uninstalled: {package}"
            )));
        }

        let output = self.backend.uninstall(package)?;

        if self.backend.is_installed(package)? {
            Err(not_reached(&["uninstall", package], &output))
        } else {
            Ok(Step::Changed(format!("Package uninstalled: {package}")))
        }
    }
}

/// The mutation ran but the package is still not in the desired state.
fn not_reached(args: &[&str], output: &CommandOutput) -> Error {
    Error::from_apm_output(args, &output.stderr, output.code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::apm::ApmBackend;
    use crate::runner::MockRunner;

    fn reconcile(mock: &MockRunner, request: &Request) -> Outcome {
        let backend = ApmBackend::with_runner("/usr/local/bin/apm", mock.clone());
        Reconciler::new(&backend, request.check_mode).run(request)
    }

    fn request(packages: &[&str], state: PackageState) -> Request {
        Request::new(packages.iter().copied(), state)
    }

    // -------------------------------------------------------------------------
    // installed
    // -------------------------------------------------------------------------

    #[test]
    fn test_install_already_installed_is_noop() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let outcome = reconcile(&mock, &request(&["minimap"], PackageState::Installed));

        assert!(!outcome.failed);
        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Package already installed: minimap");
        assert!(mock.mutating_calls().is_empty());
    }

    #[test]
    fn test_install_missing_package() {
        let mock = MockRunner::new();
        let outcome = reconcile(&mock, &request(&["minimap"], PackageState::Installed));

        assert!(!outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package installed: minimap");
        assert_eq!(mock.mutating_calls(), vec!["install minimap"]);
        assert!(mock.has_installed("minimap"));
    }

    #[test]
    fn test_install_is_idempotent() {
        let mock = MockRunner::new();
        let req = request(&["minimap"], PackageState::Installed);

        assert!(reconcile(&mock, &req).changed);
        let second = reconcile(&mock, &req);
        assert!(!second.changed);
        assert_eq!(mock.mutating_calls().len(), 1);
    }

    #[test]
    fn test_install_failure_uses_stderr_and_stops() {
        let mock = MockRunner::new().with_broken(
            "not-a-package",
            "Request for package information failed: Not Found\n",
        );
        let outcome = reconcile(
            &mock,
            &request(&["minimap", "not-a-package", "linter"], PackageState::Installed),
        );

        assert!(outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Request for package information failed: Not Found");
        assert!(mock.has_installed("minimap"));
        assert!(!mock.has_installed("linter"));
    }

    #[test]
    fn test_install_check_mode_reports_and_stops() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let req = request(&["minimap", "linter", "pigments"], PackageState::Installed)
            .with_check_mode(true);
        let outcome = reconcile(&mock, &req);

        assert!(!outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package would be installed: linter");
        assert!(mock.mutating_calls().is_empty());
        assert!(!mock.calls().iter().any(|c| c.contains("pigments")));
    }

    // -------------------------------------------------------------------------
    // upgraded
    // -------------------------------------------------------------------------

    #[test]
    fn test_upgrade_current_package_is_noop() {
        let mock = MockRunner::new().with_installed("linter", "2.3.1");
        let outcome = reconcile(&mock, &request(&["linter"], PackageState::Upgraded));

        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Package is already upgraded: linter");
        assert!(mock.mutating_calls().is_empty());
    }

    #[test]
    fn test_upgrade_outdated_package() {
        let mock = MockRunner::new()
            .with_installed("linter", "2.0.0")
            .with_outdated("linter", "2.3.1");
        let outcome = reconcile(&mock, &request(&["linter"], PackageState::Upgraded));

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package upgraded: linter");
        assert_eq!(mock.mutating_calls(), vec!["upgrade --no-confirm linter"]);
        assert_eq!(mock.version_of("linter").as_deref(), Some("2.3.1"));
    }

    #[test]
    fn test_upgrade_missing_package_installs() {
        let mock = MockRunner::new();
        let outcome = reconcile(&mock, &request(&["linter"], PackageState::Upgraded));

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package upgraded: linter");
        assert_eq!(mock.mutating_calls(), vec!["install linter"]);
    }

    #[test]
    fn test_upgrade_still_outdated_fails_and_stops() {
        let mock = MockRunner::new()
            .with_installed("linter", "2.0.0")
            .with_outdated("linter", "2.3.1")
            .with_installed("minimap", "4.29.0")
            .with_outdated("minimap", "4.29.9")
            .with_stuck("linter", "EBUSY: resource busy or locked\n");
        let outcome = reconcile(
            &mock,
            &request(&["linter", "minimap"], PackageState::Upgraded),
        );

        assert!(outcome.failed);
        assert_eq!(outcome.msg, "EBUSY: resource busy or locked");
        assert_eq!(mock.mutating_calls(), vec!["upgrade --no-confirm linter"]);
        assert_eq!(mock.version_of("minimap").as_deref(), Some("4.29.0"));
    }

    #[test]
    fn test_upgrade_check_mode() {
        let mock = MockRunner::new()
            .with_installed("linter", "2.0.0")
            .with_outdated("linter", "2.3.1");
        let req = request(&["linter"], PackageState::Upgraded).with_check_mode(true);
        let outcome = reconcile(&mock, &req);

        assert!(!outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package would be upgraded: linter");
        assert!(mock.mutating_calls().is_empty());
    }

    // -------------------------------------------------------------------------
    // absent
    // -------------------------------------------------------------------------

    #[test]
    fn test_uninstall_missing_package_is_noop() {
        let mock = MockRunner::new();
        let outcome = reconcile(&mock, &request(&["minimap"], PackageState::Absent));

        assert!(!outcome.failed);
        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Package already uninstalled: minimap");
        assert!(mock.mutating_calls().is_empty());
    }

    #[test]
    fn test_uninstall_installed_package() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let outcome = reconcile(&mock, &request(&["minimap"], PackageState::Absent));

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package uninstalled: minimap");
        assert!(!mock.has_installed("minimap"));
    }

    #[test]
    fn test_uninstall_still_installed_fails_and_stops() {
        let mock = MockRunner::new()
            .with_installed("minimap", "4.29.9")
            .with_installed("linter", "2.3.1")
            .with_locked("minimap", "EPERM: operation not permitted\n");
        let outcome = reconcile(&mock, &request(&["minimap", "linter"], PackageState::Absent));

        assert!(outcome.failed);
        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "EPERM: operation not permitted");
        assert_eq!(mock.mutating_calls(), vec!["uninstall minimap"]);
        assert!(mock.has_installed("linter"));
    }

    #[test]
    fn test_uninstall_check_mode() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let req = request(&["minimap"], PackageState::Absent).with_check_mode(true);
        let outcome = reconcile(&mock, &req);

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package would be uninstalled: minimap");
        assert!(mock.has_installed("minimap"));
        assert!(mock.mutating_calls().is_empty());
    }

    // -------------------------------------------------------------------------
    // upgrade_all and aggregation
    // -------------------------------------------------------------------------

    #[test]
    fn test_upgrade_all_nothing_to_do() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let outcome = reconcile(&mock, &Request::upgrade_all());

        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Atom packages already upgraded.");
    }

    #[test]
    fn test_upgrade_all_upgrades() {
        let mock = MockRunner::new()
            .with_installed("minimap", "4.29.0")
            .with_outdated("minimap", "4.29.9");
        let outcome = reconcile(&mock, &Request::upgrade_all());

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Atom upgraded.");
        assert_eq!(mock.version_of("minimap").as_deref(), Some("4.29.9"));
    }

    #[test]
    fn test_upgrade_all_failure_uses_stderr_and_skips_packages() {
        let mock = MockRunner::new()
            .with_installed("minimap", "4.29.0")
            .with_outdated("minimap", "4.29.9")
            .with_failing_upgrade_all("Unable to reach atom.io\n");
        let req = request(&["linter"], PackageState::Installed).with_upgrade_all(true);
        let outcome = reconcile(&mock, &req);

        assert!(outcome.failed);
        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Unable to reach atom.io");
        assert_eq!(mock.calls(), vec!["upgrade --no-confirm"]);
        assert!(!mock.has_installed("linter"));
    }

    #[test]
    fn test_upgrade_all_check_mode_never_mutates() {
        let mock = MockRunner::new()
            .with_installed("minimap", "4.29.0")
            .with_outdated("minimap", "4.29.9");
        let outcome = reconcile(&mock, &Request::upgrade_all().with_check_mode(true));

        assert!(!outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Atom packages would be upgraded.");
        assert!(mock.mutating_calls().is_empty());
    }

    #[test]
    fn test_upgrade_all_runs_before_packages() {
        let mock = MockRunner::new()
            .with_installed("minimap", "4.29.0")
            .with_outdated("minimap", "4.29.9");
        let req = request(&["minimap"], PackageState::Upgraded).with_upgrade_all(true);
        let outcome = reconcile(&mock, &req);

        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Package is already upgraded: minimap");
        assert_eq!(mock.calls()[0], "upgrade --no-confirm");
    }

    #[test]
    fn test_multiple_packages_report_counts() {
        let mock = MockRunner::new().with_installed("minimap", "4.29.9");
        let outcome = reconcile(
            &mock,
            &request(&["minimap", "linter", "pigments"], PackageState::Installed),
        );

        assert!(!outcome.failed);
        assert!(outcome.changed);
        assert_eq!(outcome.msg, "Changed: 2, Unchanged: 1");
    }

    #[test]
    fn test_multiple_unchanged_packages() {
        let mock = MockRunner::new();
        let outcome = reconcile(&mock, &request(&["minimap", "linter"], PackageState::Absent));

        assert!(!outcome.changed);
        assert_eq!(outcome.msg, "Changed: 0, Unchanged: 2");
    }

    #[test]
    fn test_status_check_failure_fails_run() {
        let mock = MockRunner::new().with_failing_list("EACCES: permission denied\n");
        let outcome = reconcile(&mock, &request(&["minimap"], PackageState::Installed));

        assert!(outcome.failed);
        assert_eq!(outcome.msg, "EACCES: permission denied");
        assert!(mock.mutating_calls().is_empty());
    }
}
