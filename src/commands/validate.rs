// ABOUTME: Validate command implementation.
// ABOUTME: Loads and resolves a config, then lists what a deploy would do.

use outrider::actions::ActionRegistry;
use outrider::config::{Config, ResolveOptions};
use outrider::error::Result;
use outrider::output::Output;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Summary {
    images: Vec<String>,
    targets: Vec<TargetSummary>,
    output_tar: String,
    remote_tar_path: String,
}

#[derive(Serialize)]
struct TargetSummary {
    name: String,
    address: String,
    action: Option<String>,
}

pub fn validate(path: &Path, output: &Output) -> Result<bool> {
    let config = Config::load(path)?.resolve(&ResolveOptions::default())?;
    let registry = ActionRegistry::new();

    let mut targets = Vec::with_capacity(config.targets.len());
    for target in config.targets.iter() {
        let action = config
            .action_for(&registry, target)
            .map_err(|source| outrider::error::Error::InvalidAction {
                target: target.name.clone(),
                source,
            })?;
        targets.push(TargetSummary {
            name: target.name.clone(),
            address: format!("{}@{}:{}", target.user, target.hostname, target.port),
            action: action.map(|a| a.kind.to_string()),
        });
    }

    let summary = Summary {
        images: config.image_names(),
        targets,
        output_tar: config.output_path.display().to_string(),
        remote_tar_path: config.remote_path.clone(),
    };

    output.data("config", &summary, || {
        let mut text = format!("{} is valid\n", path.display());
        text.push_str(&format!("Images ({}):\n", summary.images.len()));
        for image in &summary.images {
            text.push_str(&format!("  {image}\n"));
        }
        text.push_str(&format!("Targets ({}):\n", summary.targets.len()));
        for t in &summary.targets {
            let action = t.action.as_deref().unwrap_or("none");
            text.push_str(&format!("  {} ({}) action: {}\n", t.name, t.address, action));
        }
        text.push_str(&format!(
            "Archive: {} -> {}",
            summary.output_tar, summary.remote_tar_path
        ));
        text
    });
    Ok(true)
}
