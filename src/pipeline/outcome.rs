// ABOUTME: Per-target results of the fan-out stages and their aggregation.
// ABOUTME: Workers return typed outcomes; a stage succeeds only if every target did.

use crate::actions::ActionError;
use crate::transport::TransportError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transfer,
    PostPlacement,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Transfer => f.write_str("transfer"),
            Stage::PostPlacement => f.write_str("post-placement"),
        }
    }
}

/// Why one target failed a stage.
#[derive(Debug, Clone, Error)]
pub enum TargetFailure {
    #[error("archive transfer failed: {0}")]
    Transfer(TransportError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

/// How a target finished a stage without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Done,
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub result: Result<Completion, TargetFailure>,
}

impl TargetOutcome {
    pub fn done(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            result: Ok(Completion::Done),
        }
    }

    pub fn skipped(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            result: Ok(Completion::Skipped(reason.into())),
        }
    }

    pub fn failed(target: impl Into<String>, failure: TargetFailure) -> Self {
        Self {
            target: target.into(),
            result: Err(failure),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every target's outcome for one fan-out stage, in configuration order.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub outcomes: Vec<TargetOutcome>,
}

impl StageReport {
    pub fn new(stage: Stage, outcomes: Vec<TargetOutcome>) -> Self {
        Self { stage, outcomes }
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn succeeded_targets(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(|o| o.target.as_str())
    }

    pub fn outcome(&self, target: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_failure_fails_the_stage() {
        let report = StageReport::new(
            Stage::Transfer,
            vec![
                TargetOutcome::done("a"),
                TargetOutcome::failed("b", TargetFailure::Transfer(TransportError::Closed)),
                TargetOutcome::skipped("c", "no action"),
            ],
        );
        assert!(!report.all_succeeded());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.succeeded_targets().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn transfer_failure_keeps_its_cause() {
        let failure = TargetFailure::Transfer(TransportError::Closed);
        assert_eq!(
            failure.to_string(),
            "archive transfer failed: transport already closed"
        );
    }

    #[test]
    fn empty_stage_succeeds() {
        assert!(StageReport::new(Stage::PostPlacement, vec![]).all_succeeded());
    }
}
