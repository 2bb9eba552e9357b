use export_host_application::{ExportOutcome, PluginRecord};
use export_host_domain::{AlbumRecord, ExportProgress, ExportState, ImageRecord, ImportReport};

pub fn present_image_row(image: &ImageRecord) -> String {
    let size = image.display_size();
    format!(
        "{}\t{}\t{}x{}\t{}\t{}\t{}",
        image.id.get(),
        image.format,
        size.width,
        size.height,
        image.rating,
        image.date().format("%Y-%m-%d %H:%M"),
        image.file_path
    )
}

pub fn present_album_row(album: &AlbumRecord) -> String {
    format!(
        "{}\t{}\t{} images",
        album.id.get(),
        album.name,
        album.image_ids.len()
    )
}

pub fn present_plugin_row(index: usize, record: &PluginRecord) -> String {
    let source = if record.source.as_os_str().is_empty() {
        "builtin".to_string()
    } else {
        record.source.display().to_string()
    };
    format!(
        "{index}\t{}\t{}\t{}\t{source}",
        record.id, record.name, record.kind
    )
}

pub fn present_import_report(report: &ImportReport) -> String {
    format!(
        "scanned={} supported={} imported={}",
        report.scanned_files, report.supported_files, report.newly_imported
    )
}

pub fn present_progress(progress: &ExportProgress) -> String {
    format!(
        "[{:>3}%] {}/{} {}",
        (progress.fraction() * 100.0).round() as u32,
        progress.current_item,
        progress.total_items,
        progress.message
    )
}

pub fn present_outcome(outcome: &ExportOutcome) -> String {
    let state = match outcome.state {
        ExportState::Idle => "idle",
        ExportState::Exporting => "exporting",
        ExportState::Completed => "completed",
        ExportState::Cancelled => "cancelled",
    };
    let mut line = format!("session {} {state}", outcome.session_id);
    if let Some(summary) = outcome.summary {
        line.push_str(&format!(
            ": exported={} skipped={} failed={}",
            summary.exported, summary.skipped, summary.failed
        ));
    }
    if let Some(error) = &outcome.error {
        line.push_str(&format!(" error: {error}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use export_host_domain::ExportSummary;

    use super::*;

    #[test]
    fn progress_line_shows_percentage() {
        let progress = ExportProgress {
            current_item: 1,
            total_items: 4,
            message: "beach.png".to_string(),
            finished: false,
        };
        assert_eq!(present_progress(&progress), "[ 25%] 1/4 beach.png");
    }

    #[test]
    fn outcome_line_includes_summary_and_error() {
        let outcome = ExportOutcome {
            session_id: 3,
            state: ExportState::Completed,
            summary: Some(ExportSummary {
                exported: 2,
                skipped: 1,
                failed: 0,
            }),
            error: None,
        };
        assert_eq!(
            present_outcome(&outcome),
            "session 3 completed: exported=2 skipped=1 failed=0"
        );

        let failed = ExportOutcome {
            session_id: 4,
            state: ExportState::Completed,
            summary: None,
            error: Some("disk full".to_string()),
        };
        assert_eq!(present_outcome(&failed), "session 4 completed error: disk full");
    }
}
