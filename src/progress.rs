//! Progress bar for batch package analysis.

use std::io::{self, IsTerminal};

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a bar counting finished request chunks.
///
/// Hidden when `quiet` is set or stderr is not a terminal, so piped output
/// stays clean.
pub(crate) fn chunk_progress(quiet: bool, chunks: u64) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(chunks);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_bar} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("analyzing packages");
    bar
}

/// Number of requests `components` package URLs are split into.
pub(crate) fn chunk_count(components: usize, chunk_size: usize) -> u64 {
    u64::try_from(components.div_ceil(chunk_size.max(1))).unwrap_or(u64::MAX)
}
