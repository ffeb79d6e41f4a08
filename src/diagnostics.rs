// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects warnings that shouldn't fail a run but should be shown to users.

use parking_lot::Mutex;

/// Collects non-fatal warnings; shared by concurrent target workers.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.lock().push(warning);
    }

    /// Snapshot of all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings.into_inner()
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Removing the archive on a target failed after the action succeeded.
    pub fn remote_cleanup(message: impl Into<String>) -> Self {
        Self::new(WarningKind::RemoteCleanup, message)
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self::new(WarningKind::SshDisconnect, message)
    }

    pub fn cache_write(message: impl Into<String>) -> Self {
        Self::new(WarningKind::CacheWrite, message)
    }

    pub fn ledger_write(message: impl Into<String>) -> Self {
        Self::new(WarningKind::LedgerWrite, message)
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    RemoteCleanup,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
    /// Cache metadata could not be persisted.
    CacheWrite,
    /// Transfer ledger could not be persisted.
    LedgerWrite,
}
