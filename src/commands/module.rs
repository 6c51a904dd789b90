//! Automation-module protocol.
//!
//! The automation runtime writes the task arguments to a JSON file and runs
//! `apm-state module <file>`. The result goes to stdout as one JSON object:
//! `{"changed": bool, "msg": str}` on success, `{"failed": true, "msg": str}`
//! on failure.

use anyhow::{Context, Result};
use apmkit::{Outcome, PackageState, Request};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::config::Settings;

/// Task arguments as the automation runtime passes them.
#[derive(Debug, Default, Deserialize)]
pub struct ModuleArgs {
    /// Package names, as a list or a comma-separated string
    #[serde(default, alias = "pkg", alias = "package", deserialize_with = "list_or_csv")]
    pub name: Vec<String>,

    /// Desired state, any accepted alias
    #[serde(default)]
    pub state: Option<String>,

    /// Upgrade everything first
    #[serde(default, alias = "upgrade", deserialize_with = "loose_bool")]
    pub upgrade_all: bool,

    /// Colon-separated search path for apm
    #[serde(default)]
    pub path: Option<String>,

    /// Set by the runtime when the task runs with --check
    #[serde(default, rename = "_ansible_check_mode", deserialize_with = "loose_bool")]
    pub check_mode: bool,
}

impl ModuleArgs {
    /// Parse the args file contents.
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Invalid module arguments")
    }

    /// Turn the arguments into a request. Only the state can be rejected here;
    /// names and paths are validated by the reconciler.
    pub fn into_request(self, settings: &Settings) -> apmkit::Result<Request> {
        let state = match self.state.as_deref() {
            Some(s) => s.parse()?,
            None => PackageState::Installed,
        };
        Ok(Request {
            packages: self.name,
            state,
            upgrade_all: self.upgrade_all,
            path: settings.search_path(self.path.as_deref()),
            check_mode: self.check_mode,
        })
    }
}

/// What the runtime reads back.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ModuleResult {
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed: Option<bool>,
    pub msg: String,
}

impl From<Outcome> for ModuleResult {
    fn from(outcome: Outcome) -> Self {
        if outcome.failed {
            Self {
                failed: true,
                changed: None,
                msg: outcome.msg,
            }
        } else {
            Self {
                failed: false,
                changed: Some(outcome.changed),
                msg: outcome.msg,
            }
        }
    }
}

/// Returns whether the run succeeded. A JSON result is printed even when the
/// arguments or the config cannot be read.
pub fn run(args_file: &Path) -> Result<bool> {
    let result = ModuleResult::from(outcome_for(args_file));
    println!("{}", serde_json::to_string(&result)?);
    Ok(!result.failed)
}

fn outcome_for(args_file: &Path) -> Outcome {
    match load_request(args_file) {
        Ok(request) => apmkit::run(&request),
        Err(e) => Outcome {
            failed: true,
            changed: false,
            msg: format!("{e:#}"),
        },
    }
}

fn load_request(args_file: &Path) -> Result<Request> {
    let content = fs::read_to_string(args_file)
        .with_context(|| format!("Could not read {}", args_file.display()))?;
    let args = ModuleArgs::parse(&content)?;
    let settings = Settings::load()?;
    Ok(args.into_request(&settings)?)
}

// ============================================================================
// Loose argument types
// ============================================================================

fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn list_or_csv<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(split_csv(&s)),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(de::Error::custom(format!(
                    "expected a package name, got {other}"
                ))),
            })
            .collect(),
        other => Err(de::Error::custom(format!(
            "expected a list of package names, got {other}"
        ))),
    }
}

fn loose_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(de::Error::custom(format!("expected a boolean, got {n}"))),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "on" | "true" | "1" => Ok(true),
            "no" | "n" | "off" | "false" | "0" | "" => Ok(false),
            _ => Err(de::Error::custom(format!("expected a boolean, got {s:?}"))),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {other}"))),
    }
}
