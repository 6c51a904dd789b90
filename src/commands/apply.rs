//! Reconcile packages from command-line flags.

use anyhow::Result;
use apmkit::Request;

use crate::Context as AppContext;
use crate::cli::ApplyArgs;
use crate::config::Settings;
use crate::ui;

/// Build the request for `args`, filling gaps from the config file.
pub fn build_request(args: ApplyArgs, settings: &Settings) -> Request {
    Request {
        packages: args.names,
        state: args.state,
        upgrade_all: args.upgrade_all,
        path: settings.search_path(args.path.as_deref()),
        check_mode: args.check || settings.check_mode,
    }
}

/// Returns whether the run succeeded.
pub fn run(ctx: &AppContext, args: ApplyArgs) -> Result<bool> {
    let settings = Settings::load()?;
    let json = args.json;
    let request = build_request(args, &settings);

    if request.packages.is_empty() && !request.upgrade_all && !ctx.quiet && !json {
        ui::warn("No packages given and --upgrade-all not set; nothing to reconcile");
    }

    log::info!(
        "Reconciling {} package(s) to {} (upgrade_all={}, check={}, path={})",
        request.packages.len(),
        request.state,
        request.upgrade_all,
        request.check_mode,
        request.path
    );

    if request.check_mode && !ctx.quiet && !json {
        ui::info("Check mode: no changes will be made");
    }

    let outcome = apmkit::run(&request);

    if json {
        println!("{}", outcome.to_json()?);
    } else if !ctx.quiet || outcome.failed {
        ui::outcome(&outcome, request.check_mode);
        if ctx.verbose > 0 && !request.packages.is_empty() {
            ui::dim(&format!("packages: {}", request.packages.join(", ")));
        }
    }

    Ok(!outcome.failed)
}
