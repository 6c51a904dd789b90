//! Read-only package status report.

use anyhow::Result;
use apmkit::{Client, Outcome};
use serde::Serialize;

use crate::Context as AppContext;
use crate::cli::StatusArgs;
use crate::config::Settings;
use crate::ui;

#[derive(Debug, Serialize)]
struct StatusReport {
    search_path: String,
    packages: Vec<apmkit::PackageStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending_upgrades: Option<bool>,
}

pub fn run(ctx: &AppContext, args: StatusArgs) -> Result<bool> {
    let settings = Settings::load()?;
    let search_path = settings.search_path(args.path.as_deref());

    let checked = Client::locate(&search_path).and_then(|client| {
        let packages = client.status(args.names.as_slice())?;
        let pending_upgrades = if args.pending {
            Some(client.has_pending_upgrades()?)
        } else {
            None
        };
        Ok((packages, pending_upgrades))
    });

    let (packages, pending_upgrades) = match checked {
        Ok(found) => found,
        Err(e) => {
            if args.json {
                println!("{}", Outcome::failure(&e).to_json()?);
            } else {
                ui::apm_error(&e);
            }
            return Ok(false);
        }
    };

    let report = StatusReport {
        search_path: search_path.to_string(),
        packages,
        pending_upgrades,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(true);
    }

    if !ctx.quiet {
        ui::header("Atom packages");
        ui::kv("search path", &report.search_path);
        println!();
    }
    for status in &report.packages {
        println!("  {}", ui::status_line(status));
    }
    if let Some(pending) = report.pending_upgrades {
        println!();
        ui::kv(
            "apm upgrade",
            if pending {
                "upgrades available"
            } else {
                "nothing to upgrade"
            },
        );
    }

    Ok(true)
}
