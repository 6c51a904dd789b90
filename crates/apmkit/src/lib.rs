//! # apmkit
//!
//! Pure Rust library for idempotent Atom package management via `apm`.
//!
//! This crate provides functionality for:
//! - Validating package names and search paths before anything runs
//! - Locating the `apm` executable
//! - Checking whether packages are installed or outdated
//! - Reconciling a desired state (installed, upgraded, absent) with the
//!   minimal set of `apm` invocations, with a check (dry-run) mode
//!
//! ## Example
//!
//! ```no_run
//! use apmkit::{PackageState, Request};
//!
//! let request = Request::new(["minimap", "linter"], PackageState::Installed);
//! let outcome = apmkit::run(&request);
//!
//! if outcome.failed {
//!     eprintln!("{}", outcome.msg);
//! } else if outcome.changed {
//!     println!("{}", outcome.msg);
//! }
//! ```
//!
//! ## Testing
//!
//! Every process goes through [`runner::CommandRunner`]. [`runner::MockRunner`]
//! answers like `apm` does, so reconciliation can be exercised without Atom:
//!
//! ```
//! use apmkit::backend::apm::ApmBackend;
//! use apmkit::runner::MockRunner;
//! use apmkit::{Client, PackageState, Request};
//!
//! let mock = MockRunner::new().with_installed("minimap", "4.29.9");
//! let client = Client::with_backend(Box::new(ApmBackend::with_runner("apm", mock.clone())));
//!
//! let outcome = client.reconcile(&Request::new(["minimap"], PackageState::Installed));
//! assert!(!outcome.changed);
//! assert!(mock.mutating_calls().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod reconcile;
pub mod runner;
pub mod types;
pub mod validate;

pub use error::{Error, ErrorCategory, Result};
pub use types::{
    CommandOutput, DEFAULT_SEARCH_DIR, Outcome, PackageState, PackageStatus, Request, SearchPath,
};

use backend::{Backend, BulkUpgrade, apm::ApmBackend};
use reconcile::Reconciler;
use std::path::PathBuf;

/// High-level client for apm operations.
///
/// Wraps a backend and exposes read-only status checks plus reconciliation.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client that runs the `apm` found on `search_path` or `$PATH`.
    ///
    /// The search path is validated first; returns an error if it is
    /// malformed or apm cannot be found.
    pub fn locate(search_path: &SearchPath) -> Result<Self> {
        validate::check_path(search_path.as_str())?;
        let backend = ApmBackend::locate(search_path)?;
        Ok(Self {
            backend: Box::new(backend),
        })
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Check if a package is installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        validate::check_package(name)?;
        self.backend.is_installed(name)
    }

    /// Check if a package has a newer version available.
    pub fn is_outdated(&self, name: &str) -> Result<bool> {
        validate::check_package(name)?;
        self.backend.is_outdated(name)
    }

    /// Installed and outdated status for each package, in order.
    pub fn status<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<PackageStatus>> {
        for name in names {
            validate::check_package(name.as_ref())?;
        }
        names
            .iter()
            .map(|name| self.backend.status(name.as_ref()))
            .collect()
    }

    /// Whether `apm upgrade` would upgrade anything right now.
    pub fn has_pending_upgrades(&self) -> Result<bool> {
        Ok(self.backend.pending_upgrades()? == BulkUpgrade::Upgraded)
    }

    /// Validate and reconcile `request` through this client's backend.
    pub fn reconcile(&self, request: &Request) -> Outcome {
        if let Err(e) = request.validate() {
            return Outcome::failure(&e);
        }
        Reconciler::new(self.backend.as_ref(), request.check_mode).run(request)
    }
}

/// Validate `request`, locate `apm`, and reconcile.
///
/// Input errors and a missing `apm` fail before any package is processed.
pub fn run(request: &Request) -> Outcome {
    run_with(request, runner::locate_apm, runner::SystemRunner)
}

fn run_with<L, R>(request: &Request, locate: L, runner: R) -> Outcome
where
    L: FnOnce(&SearchPath) -> Result<PathBuf>,
    R: runner::CommandRunner + 'static,
{
    if let Err(e) = request.validate() {
        return Outcome::failure(&e);
    }

    match locate(&request.path) {
        Ok(apm_path) => {
            Client::with_backend(Box::new(ApmBackend::with_runner(apm_path, runner)))
                .reconcile(request)
        }
        Err(e) => Outcome::failure(&e),
    }
}
