//! Input validation for package names and paths.
//!
//! Every value that ends up on an `apm` command line is checked against a
//! conservative character class first. Validation never touches the
//! filesystem or spawns anything.

use crate::error::{Error, Result};
use regex::Regex;
use std::path::MAIN_SEPARATOR;
use std::sync::LazyLock;

/// Letters, digits, underscores and dashes.
static INVALID_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("package class is a valid regex"));

/// Word characters, whitespace, colons, the path separator, dots and dashes.
static INVALID_PATH: LazyLock<Regex> = LazyLock::new(|| {
    let sep = regex::escape(&MAIN_SEPARATOR.to_string());
    Regex::new(&format!(r"[^A-Za-z0-9_\s:{sep}.-]")).expect("path class is a valid regex")
});

/// Same as [`INVALID_PATH`] without colons: a single executable path.
static INVALID_APM_PATH: LazyLock<Regex> = LazyLock::new(|| {
    let sep = regex::escape(&MAIN_SEPARATOR.to_string());
    Regex::new(&format!(r"[^A-Za-z0-9_\s{sep}.-]")).expect("apm path class is a valid regex")
});

/// Whether `package` is a non-empty name of ASCII word characters and dashes.
pub fn valid_package(package: &str) -> bool {
    !package.is_empty() && !INVALID_PACKAGE.is_match(package)
}

/// Whether `path` is a usable `:`-separated search path.
pub fn valid_path(path: &str) -> bool {
    !INVALID_PATH.is_match(path)
}

/// Whether `apm_path` is a usable executable path.
pub fn valid_apm_path(apm_path: &str) -> bool {
    !INVALID_APM_PATH.is_match(apm_path)
}

/// Validate a package name.
pub fn check_package(package: &str) -> Result<()> {
    if valid_package(package) {
        Ok(())
    } else {
        Err(Error::InvalidPackage(package.to_string()))
    }
}

/// Validate a search path.
pub fn check_path(path: &str) -> Result<()> {
    if valid_path(path) {
        Ok(())
    } else {
        Err(Error::InvalidPath(path.to_string()))
    }
}

/// Validate a resolved apm executable path.
pub fn check_apm_path(apm_path: &str) -> Result<()> {
    if valid_apm_path(apm_path) {
        Ok(())
    } else {
        Err(Error::InvalidApmPath(apm_path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_package() {
        assert!(valid_package("minimap"));
        assert!(valid_package("atom-beautify"));
        assert!(valid_package("linter_eslint2"));
    }

    #[test]
    fn test_invalid_package() {
        assert!(!valid_package(""));
        assert!(!valid_package("foo bar"));
        assert!(!valid_package("foo;rm -rf /"));
        assert!(!valid_package("../foo"));
        assert!(!valid_package("foo@1.0.0"));
        assert!(!valid_package("$(whoami)"));
        assert!(!valid_package("café"));
    }

    #[test]
    fn test_valid_path() {
        assert!(valid_path("/usr/local/bin"));
        assert!(valid_path("/usr/local/bin:/opt/atom/bin"));
        assert!(valid_path("/Applications/Atom Beta.app/Contents/Resources/app/apm/bin"));
    }

    #[test]
    fn test_invalid_path() {
        assert!(!valid_path("/usr/bin;reboot"));
        assert!(!valid_path("~/bin"));
        assert!(!valid_path("/usr/$HOME"));
    }

    #[test]
    fn test_apm_path_rejects_colon() {
        assert!(valid_apm_path("/usr/local/bin/apm"));
        assert!(!valid_apm_path("/usr/local/bin:/apm"));
    }

    #[test]
    fn test_check_messages() {
        assert_eq!(
            check_package("a b").unwrap_err().to_string(),
            "Invalid package: a b."
        );
        assert_eq!(
            check_path("/x|y").unwrap_err().to_string(),
            "Invalid path: /x|y."
        );
        assert_eq!(
            check_apm_path("/x:y").unwrap_err().to_string(),
            "Invalid apm_path: /x:y."
        );
    }
}
