// ABOUTME: Resume ledger maintenance commands.
// ABOUTME: Shows recorded transfer progress or prunes old entries.

use outrider::error::Result;
use outrider::output::Output;
use outrider::store::StateDir;
use std::time::Duration;

pub fn resume_stats(state: &StateDir, output: &Output) -> Result<bool> {
    let stats = state.open_ledger().stats();
    output.data("resume_stats", &stats, || {
        let mut text = format!(
            "Ledger: {}\nPending: {}\nCompleted: {}",
            stats.ledger_file.display(),
            stats.pending_transfers,
            stats.completed_transfers
        );
        for entry in &stats.entries {
            text.push_str(&format!(
                "\n  {} -> {}:{} {}% ({}/{} bytes)",
                entry.local_path.display(),
                entry.remote_host,
                entry.remote_path,
                entry.percentage,
                entry.transferred_bytes,
                entry.total_bytes
            ));
        }
        text
    });
    Ok(true)
}

pub fn resume_cleanup(state: &StateDir, max_age: Duration, output: &Output) -> Result<bool> {
    let removed = state.open_ledger().cleanup(max_age)?;
    output.success(&format!(
        "Removed {removed} ledger entr{} older than {}",
        if removed == 1 { "y" } else { "ies" },
        humantime::format_duration(max_age)
    ));
    Ok(true)
}
