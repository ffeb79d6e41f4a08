// ABOUTME: Cache maintenance commands.
// ABOUTME: Shows or clears recorded archive digests.

use outrider::error::Result;
use outrider::output::Output;
use outrider::store::StateDir;
use std::path::Path;

pub fn cache_stats(state: &StateDir, output: &Output) -> Result<bool> {
    let stats = state.open_cache().stats();
    output.data("cache_stats", &stats, || {
        let mut text = format!(
            "Cache: {}\nEntries: {}\nTotal size: {} bytes",
            stats.cache_file.display(),
            stats.num_entries,
            stats.total_size_bytes
        );
        for entry in &stats.entries {
            text.push_str(&format!(
                "\n  {} ({} bytes, {} image(s), recorded {})",
                entry.file_path.display(),
                entry.file_size,
                entry.images.len(),
                entry.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        }
        text
    });
    Ok(true)
}

pub fn cache_clear(state: &StateDir, file: Option<&Path>, output: &Output) -> Result<bool> {
    let removed = state.open_cache().clear(file)?;
    output.success(&format!("Removed {removed} cache entr{}", if removed == 1 { "y" } else { "ies" }));
    Ok(true)
}
