// ABOUTME: Worker pool size for the fan-out stages.
// ABOUTME: Always clamped into the supported 1..=10 range.

use std::fmt;
use std::num::NonZeroUsize;

/// Upper bound on simultaneous per-target workers.
pub const MAX_CONCURRENCY: usize = 10;

/// Default number of concurrent uploads when none is requested.
pub const DEFAULT_CONCURRENCY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    /// Clamp any requested value into `1..=MAX_CONCURRENCY`.
    pub fn clamped(requested: usize) -> Self {
        let value = requested.clamp(1, MAX_CONCURRENCY);
        Self(NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::clamped(DEFAULT_CONCURRENCY)
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
