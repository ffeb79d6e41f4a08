// ABOUTME: Deploy command implementation.
// ABOUTME: Resolves the config, wires the collaborators, runs the pipeline, reports.

use crate::cli::DeployArgs;
use outrider::backend;
use outrider::config::{Config, ResolveOptions};
use outrider::error::Result;
use outrider::output::Output;
use outrider::pipeline::{Completion, Orchestrator, RunReport, StageReport};
use outrider::store::StateDir;
use outrider::transport::SshConnector;
use std::sync::Arc;

/// Run the full pipeline. Returns whether every target succeeded.
pub async fn deploy(args: DeployArgs, state: &StateDir, mut output: Output) -> Result<bool> {
    output.start_timer();

    let config = Config::load(&args.config)?.resolve(&ResolveOptions {
        skip_host_verification: args.skip_host_verification,
        max_concurrent_uploads: Some(args.max_concurrent_uploads),
        no_cache: args.no_cache,
        skip_if_exists: args.skip_if_exists,
    })?;

    output.progress(&format!(
        "Shipping {} image(s) to {} target(s)",
        config.images.len(),
        config.targets.len()
    ));

    let backend = backend::connect_local(&config.runtime)?;
    let connector = SshConnector::new(config.command_timeout)
        .known_hosts_path(config.known_hosts_path.clone());

    let orchestrator = Orchestrator::new(
        config,
        Arc::new(backend),
        Arc::new(connector),
        state.open_cache(),
        state.open_ledger(),
    );
    let report = orchestrator.run().await;

    print_report(&report, &output);

    if report.success() {
        output.success("Deployment complete!");
    } else if let Err(e) = &report.result {
        output.error(&e.to_string());
    } else {
        output.error("one or more targets failed");
    }
    Ok(report.success())
}

fn print_report(report: &RunReport, output: &Output) {
    if report.archive_reused() {
        output.progress("Reused cached archive");
    }
    if let Some(transfer) = report.transfer() {
        print_stage(transfer, output);
    }
    if let Some(post) = report.post_placement() {
        print_stage(post, output);
    }
    for warning in &report.warnings {
        output.warning(&warning.message);
    }
}

fn print_stage(stage: &StageReport, output: &Output) {
    let name = stage.stage.to_string();
    for outcome in &stage.outcomes {
        match &outcome.result {
            Ok(Completion::Done) => output.target_result(&name, &outcome.target, true, None),
            Ok(Completion::Skipped(reason)) => {
                output.target_result(&name, &outcome.target, true, Some(reason.as_str()))
            }
            Err(failure) => {
                let detail = failure.to_string();
                output.target_result(&name, &outcome.target, false, Some(detail.as_str()))
            }
        }
    }
}
