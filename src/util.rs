use std::future::Future;

use futures_util::StreamExt;
use futures_util::stream;

/// Render a human-friendly transfer speed string.
#[must_use]
pub fn format_speed(bytes_per_sec: f32) -> String {
    const KIB: f32 = 1024.0;
    const MIB: f32 = KIB * 1024.0;

    if bytes_per_sec < KIB {
        format!("{bytes_per_sec:.0} B/s")
    } else if bytes_per_sec < MIB {
        format!("{:.1} KB/s", bytes_per_sec / KIB)
    } else {
        format!("{:.1} MB/s", bytes_per_sec / MIB)
    }
}

/// Compute download progress as a percentage.
#[must_use]
pub fn progress_percent(downloaded: u64, total: Option<u64>) -> f32 {
    match total {
        Some(total) if total > 0 => (downloaded as f32 / total as f32) * 100.0,
        _ => 0.0,
    }
}

/// Run `task` over `items` with at most `limit` futures in flight and collect
/// the results in completion order.
///
/// Returns on the first error. The remaining in-flight futures are dropped
/// with the stream, so their results never reach the caller.
pub async fn run_bounded<I, F, Fut, T, E>(items: I, limit: usize, task: F) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut pending = stream::iter(items).map(task).buffer_unordered(limit.max(1));
    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        results.push(result?);
    }
    Ok(results)
}
