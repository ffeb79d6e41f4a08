// ABOUTME: Stage transitions for a run: acquire, package, transfer, post-place.
// ABOUTME: Each method consumes the pipeline and returns it in the next state.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Orchestrator;
use super::error::PipelineError;
use super::fanout::fan_out;
use super::outcome::{Stage, StageReport, TargetFailure, TargetOutcome};
use super::state::{Acquired, Completed, Configured, Packaged, Transferred};
use crate::config::Target;
use crate::diagnostics::Warning;
use crate::ssh::ProgressFn;
use crate::store::{ContentCache, Fingerprint, file_sha256_blocking};

/// A run in state `S`, borrowing the orchestrator's collaborators.
pub struct Pipeline<'a, S> {
    run: &'a Orchestrator,
    state: S,
}

impl<'a> Pipeline<'a, Configured> {
    pub fn new(run: &'a Orchestrator) -> Self {
        Self {
            run,
            state: Configured,
        }
    }
}

impl<S> Pipeline<'_, S> {
    pub fn into_state(self) -> S {
        self.state
    }
}

// =============================================================================
// Acquisition
// =============================================================================

impl<'a> Pipeline<'a, Configured> {
    /// Pull every configured image, in order. The first failure aborts the run.
    pub async fn acquire(self) -> Result<Pipeline<'a, Acquired>, PipelineError> {
        let images = &self.run.config.images;
        tracing::info!("Acquiring {} image(s)", images.len());

        for image in images {
            self.run
                .backend
                .pull(image)
                .await
                .map_err(|source| PipelineError::Acquire {
                    image: image.to_string(),
                    source,
                })?;
        }

        Ok(Pipeline {
            run: self.run,
            state: Acquired,
        })
    }
}

// =============================================================================
// Packaging
// =============================================================================

impl<'a> Pipeline<'a, Acquired> {
    /// Produce the archive, reusing a cached one when its recorded content
    /// still matches. A freshly packaged archive is always recorded.
    pub async fn package(self) -> Result<Pipeline<'a, Packaged>, PipelineError> {
        let config = &self.run.config;
        let output = config.output_path.clone();

        let reused = !config.no_cache && self.cached_archive_matches(&output).await;

        if reused {
            tracing::info!(
                "{} is cached and matches the requested images, skipping packaging",
                output.display()
            );
        } else {
            if config.no_cache {
                tracing::info!("Cache lookup disabled, packaging {}", output.display());
            }
            let size = self
                .run
                .backend
                .package(&config.images, &output)
                .await
                .map_err(|source| PipelineError::Package {
                    path: output.clone(),
                    source,
                })?;
            tracing::info!("Packaged {} bytes into {}", size, output.display());

            let recorded = Fingerprint::of_blocking(&output)
                .await
                .and_then(|fingerprint| self.run.cache.lock().record(fingerprint, &config.images));
            if let Err(e) = recorded {
                self.run.diagnostics.warn(Warning::cache_write(format!(
                    "failed to record {} in the cache: {}",
                    output.display(),
                    e
                )));
            }
        }

        Ok(Pipeline {
            run: self.run,
            state: Packaged {
                archive: output,
                reused,
            },
        })
    }
}

impl Pipeline<'_, Acquired> {
    /// Cheap checks under the cache lock, then the re-hash on the blocking pool.
    async fn cached_archive_matches(&self, output: &Path) -> bool {
        let recorded = self
            .run
            .cache
            .lock()
            .recorded_digest(output, &self.run.config.images);
        match recorded {
            Some(expected) => {
                ContentCache::confirm(output, &expected, file_sha256_blocking(output).await)
            }
            None => false,
        }
    }
}

// =============================================================================
// Transfer
// =============================================================================

impl<'a> Pipeline<'a, Packaged> {
    /// Place the archive on every target with bounded concurrency.
    ///
    /// Per-target failures are recorded in the report and never stop the
    /// other targets.
    pub async fn transfer(self) -> Result<Pipeline<'a, Transferred>, PipelineError> {
        let Packaged { archive, reused } = self.state;
        let run = self.run;
        let config = &run.config;
        let remote = config.remote_path.as_str();

        let total = std::fs::metadata(&archive)
            .map_err(|source| PipelineError::ArchiveUnreadable {
                path: archive.clone(),
                source,
            })?
            .len();

        let targets: Vec<&Target> = config.targets.iter().collect();
        note_previous_attempts(run, &archive, &targets, remote);

        tracing::info!(
            "Transferring {} to {} target(s), {} at a time",
            archive.display(),
            targets.len(),
            config.concurrency
        );

        let counters: Vec<AtomicU64> = targets.iter().map(|_| AtomicU64::new(0)).collect();
        let counters = &counters;
        let transport = &run.transport;
        let local = archive.as_path();
        let skip_if_exists = config.skip_if_exists;

        let work: Vec<(usize, &Target)> = targets.iter().copied().enumerate().collect();
        let outcomes = fan_out(
            work,
            config.concurrency,
            |(index, target)| async move {
                let counter = &counters[index];
                let report: &ProgressFn = &move |sent: u64, _total: u64| {
                    counter.store(sent, Ordering::Relaxed);
                };
                match transport
                    .try_upload(local, target, remote, skip_if_exists, Some(report))
                    .await
                {
                    Ok(()) => TargetOutcome::done(target.label()),
                    Err(e) => {
                        tracing::error!(
                            "Failed to transfer {} to {}:{}: {}",
                            local.display(),
                            target.label(),
                            remote,
                            e
                        );
                        TargetOutcome::failed(target.label(), TargetFailure::Transfer(e))
                    }
                }
            },
        )
        .await;

        // Workers only fill counters; the ledger has a single writer.
        {
            let mut ledger = run.ledger.lock();
            for ((target, outcome), counter) in targets.iter().zip(&outcomes).zip(counters) {
                let sent = if outcome.succeeded() {
                    total
                } else {
                    counter.load(Ordering::Relaxed)
                };
                let label = target.label();
                if let Err(e) = ledger.save_progress(&archive, &label, remote, sent, total) {
                    run.diagnostics.warn(Warning::ledger_write(format!(
                        "failed to record transfer progress for {}: {}",
                        label, e
                    )));
                }
            }
        }

        let report = StageReport::new(Stage::Transfer, outcomes);
        tracing::info!(
            "Transfer finished: {}/{} target(s) succeeded",
            report.succeeded_targets().count(),
            report.outcomes.len()
        );

        Ok(Pipeline {
            run,
            state: Transferred {
                archive,
                reused,
                report,
            },
        })
    }
}

/// Log what the ledger remembers of earlier attempts. Transfers always
/// restart from the beginning; the ledger only explains what happened.
fn note_previous_attempts(run: &Orchestrator, archive: &Path, targets: &[&Target], remote: &str) {
    let mut ledger = run.ledger.lock();
    for target in targets {
        let label = target.label();
        match ledger.get_progress(archive, &label, remote) {
            Some(entry) if !entry.is_complete() => tracing::info!(
                "Previous transfer to {} stopped at {}%, restarting from the beginning",
                label,
                entry.percentage
            ),
            Some(_) => tracing::debug!("{} already received this archive once", label),
            None => {}
        }
    }
}

// =============================================================================
// Post-placement
// =============================================================================

impl<'a> Pipeline<'a, Transferred> {
    /// Run each target's post-placement action. Targets whose transfer
    /// failed are left out; targets without an action are skipped.
    pub async fn post_place(self) -> Pipeline<'a, Completed> {
        let Transferred {
            archive,
            reused,
            report: transfer,
        } = self.state;
        let run = self.run;
        let config = &run.config;

        let eligible: Vec<&Target> = config
            .targets
            .iter()
            .zip(&transfer.outcomes)
            .filter(|(_, outcome)| outcome.succeeded())
            .map(|(target, _)| target)
            .collect();

        let remote = config.remote_path.as_str();
        let outcomes = fan_out(eligible, config.concurrency, |target| async move {
            let action = match config.action_for(&run.registry, target) {
                Ok(Some(action)) => action,
                Ok(None) => return TargetOutcome::skipped(target.label(), "no post-placement action"),
                Err(e) => return TargetOutcome::failed(target.label(), e.into()),
            };
            match run
                .registry
                .execute(&run.transport, target, &action, remote, &run.diagnostics)
                .await
            {
                Ok(()) => TargetOutcome::done(target.label()),
                Err(e) => {
                    tracing::error!("{} failed on {}: {}", action.kind, target.label(), e);
                    TargetOutcome::failed(target.label(), e.into())
                }
            }
        })
        .await;

        Pipeline {
            run,
            state: Completed {
                archive,
                reused,
                transfer,
                post_placement: StageReport::new(Stage::PostPlacement, outcomes),
            },
        }
    }
}
