// ABOUTME: Orchestration of a full run over every configured target.
// ABOUTME: Owns the collaborators, drives the stages, always releases sessions.

mod error;
mod fanout;
mod outcome;
mod stages;
mod state;

pub use error::PipelineError;
pub use fanout::fan_out;
pub use outcome::{Completion, Stage, StageReport, TargetFailure, TargetOutcome};
pub use stages::Pipeline;
pub use state::{Acquired, Completed, Configured, Packaged, Transferred};

use crate::actions::ActionRegistry;
use crate::backend::ArtifactBackend;
use crate::config::ResolvedConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::store::{ContentCache, TransferLedger};
use crate::transport::{Connector, Transport};
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Drives acquire → package → transfer → post-place for one resolved config.
///
/// The orchestrator is the only writer of the cache and the ledger. Workers
/// share the transport and the diagnostics sink.
pub struct Orchestrator {
    config: ResolvedConfig,
    backend: Arc<dyn ArtifactBackend>,
    transport: Transport,
    registry: ActionRegistry,
    cache: Mutex<ContentCache>,
    ledger: Mutex<TransferLedger>,
    diagnostics: Diagnostics,
}

impl Orchestrator {
    pub fn new(
        config: ResolvedConfig,
        backend: Arc<dyn ArtifactBackend>,
        connector: Arc<dyn Connector>,
        cache: ContentCache,
        ledger: TransferLedger,
    ) -> Self {
        Self {
            config,
            backend,
            transport: Transport::new(connector),
            registry: ActionRegistry::new(),
            cache: Mutex::new(cache),
            ledger: Mutex::new(ledger),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Run every stage. Sessions are closed on every exit path, including
    /// an abort and a panicking worker; the panic then continues unwinding.
    pub async fn run(self) -> RunReport {
        if self.config.host_verification_disabled {
            tracing::warn!(
                "Host key verification is disabled; connections are open to interception"
            );
        }

        let outcome = AssertUnwindSafe(self.stages()).catch_unwind().await;
        let sessions_closed = self.transport.close(&self.diagnostics).await;
        tracing::debug!("Closed {} session(s)", sessions_closed);

        match outcome {
            Ok(result) => {
                if let Err(e) = &result {
                    tracing::error!("Run aborted: {}", e);
                }
                RunReport {
                    result,
                    warnings: self.diagnostics.into_warnings(),
                }
            }
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn stages(&self) -> Result<Completed, PipelineError> {
        let completed = Pipeline::new(self)
            .acquire()
            .await?
            .package()
            .await?
            .transfer()
            .await?
            .post_place()
            .await;
        Ok(completed.into_state())
    }
}

/// What a run did, or why it stopped early.
#[derive(Debug)]
pub struct RunReport {
    pub result: Result<Completed, PipelineError>,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    /// True only when every target transferred and every action succeeded.
    pub fn success(&self) -> bool {
        match &self.result {
            Ok(done) => done.transfer.all_succeeded() && done.post_placement.all_succeeded(),
            Err(_) => false,
        }
    }

    pub fn transfer(&self) -> Option<&StageReport> {
        self.result.as_ref().ok().map(|done| &done.transfer)
    }

    pub fn post_placement(&self) -> Option<&StageReport> {
        self.result.as_ref().ok().map(|done| &done.post_placement)
    }

    pub fn archive_reused(&self) -> bool {
        self.result.as_ref().is_ok_and(|done| done.reused)
    }
}
