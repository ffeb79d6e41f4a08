// ABOUTME: Command module aggregator for the outrider CLI.
// ABOUTME: Re-exports one handler per subcommand.

mod cache;
mod deploy;
mod load;
mod resume;
mod validate;

pub use cache::{cache_clear, cache_stats};
pub use deploy::deploy;
pub use load::load;
pub use resume::{resume_cleanup, resume_stats};
pub use validate::validate;
