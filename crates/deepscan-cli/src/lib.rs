use deepscan_core::models::{AnalysisId, HistoryPage};
use deepscan_core::presentation::{format_confidence, VerdictDisplay};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// File size in megabytes with two decimals, e.g. `"15.00 MB"`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Confirmation line for `history delete`.
pub fn format_deleted(id: AnalysisId) -> String {
    format!("Analysis {} deleted", id)
}

const FILENAME_WIDTH: usize = 28;

/// Fixed-width table of one history page, followed by a page footer.
pub fn format_history_table(page: &HistoryPage) -> String {
    if page.results.is_empty() {
        return format!(
            "No analyses on page {} ({} total)\n",
            page.page, page.total
        );
    }

    let mut out = format!(
        "{:<6} {:<w$} {:<18} {:>10} {:>11}  {}\n",
        "ID",
        "FILE",
        "VERDICT",
        "CONFIDENCE",
        "SIZE",
        "ANALYZED",
        w = FILENAME_WIDTH
    );
    for item in &page.results {
        out.push_str(&format!(
            "{:<6} {:<w$} {:<18} {:>10} {:>11}  {}\n",
            item.id.to_string(),
            truncate_string(&item.filename, FILENAME_WIDTH),
            VerdictDisplay::for_prediction(item.prediction).label,
            format_confidence(item.confidence),
            format_megabytes(item.file_size),
            item.timestamp.format("%Y-%m-%d %H:%M"),
            w = FILENAME_WIDTH
        ));
    }
    out.push_str(&format!(
        "\nPage {} of {} ({} total)\n",
        page.page,
        page.total_pages.max(1),
        page.total
    ));
    out
}

/// Initialize tracing for the CLI. Logs go to stderr so stdout stays parseable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}
