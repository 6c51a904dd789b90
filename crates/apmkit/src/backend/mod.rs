//! Backend abstraction for apm operations.
//!
//! The [`Backend`] trait is what the reconciler talks to. Status checks
//! return booleans; mutations return the raw command output so the caller
//! can verify the post-condition itself and surface apm's stderr when it
//! was not reached.

pub mod apm;

use crate::error::Result;
use crate::types::{CommandOutput, PackageStatus};

/// Result of a bulk operation that reports an "(empty)" marker when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkUpgrade {
    /// apm reported nothing to upgrade
    NothingToDo,
    /// At least one package was (or would be) upgraded
    Upgraded,
}

/// Backend trait for apm operations.
pub trait Backend: Send + Sync {
    /// Check if a package is installed.
    fn is_installed(&self, name: &str) -> Result<bool>;

    /// Check if an installed package has a newer version available.
    fn is_outdated(&self, name: &str) -> Result<bool>;

    /// Install a package.
    fn install(&self, name: &str) -> Result<CommandOutput>;

    /// Upgrade a single package.
    fn upgrade(&self, name: &str) -> Result<CommandOutput>;

    /// Uninstall a package.
    fn uninstall(&self, name: &str) -> Result<CommandOutput>;

    /// Upgrade every installed package.
    fn upgrade_all(&self) -> Result<BulkUpgrade>;

    /// Report whether [`Backend::upgrade_all`] would do anything, without
    /// changing state.
    fn pending_upgrades(&self) -> Result<BulkUpgrade>;

    /// Installed and outdated status of one package.
    fn status(&self, name: &str) -> Result<PackageStatus> {
        let installed = self.is_installed(name)?;
        let outdated = installed && self.is_outdated(name)?;
        Ok(PackageStatus {
            name: name.to_string(),
            installed,
            outdated,
        })
    }
}
