// ABOUTME: Pipeline state marker types for the type state pattern.
// ABOUTME: Each state carries what the previous stage produced.

use super::outcome::StageReport;
use std::path::PathBuf;

/// Configuration resolved, nothing done yet.
/// Available actions: `acquire()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Configured;

/// Every image is present in the local runtime.
/// Available actions: `package()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Acquired;

/// The archive exists locally.
/// Available actions: `transfer()`
#[derive(Debug, Clone)]
pub struct Packaged {
    pub archive: PathBuf,
    /// True when a cached archive was reused instead of repackaging.
    pub reused: bool,
}

/// The archive has been fanned out to the targets.
/// Available actions: `post_place()`
#[derive(Debug, Clone)]
pub struct Transferred {
    pub archive: PathBuf,
    pub reused: bool,
    pub report: StageReport,
}

/// Every stage has run.
#[derive(Debug, Clone)]
pub struct Completed {
    pub archive: PathBuf,
    pub reused: bool,
    pub transfer: StageReport,
    pub post_placement: StageReport,
}
