use std::sync::{Mutex, PoisonError};

use export_host_adapters::present_progress;
use export_host_application::ExportWindow;
use export_host_domain::ExportProgress;
use tracing::{debug, info};

/// Terminal stand-in for the export window: progress goes to stderr.
#[derive(Debug, Default)]
pub struct ConsoleWindow {
    last: Mutex<Option<ExportProgress>>,
}

impl ConsoleWindow {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExportWindow for ConsoleWindow {
    fn set_controls_enabled(&self, enabled: bool) {
        debug!(enabled, "export controls");
    }

    fn present_view(&self, plugin_name: &str) {
        info!(plugin = plugin_name, "exporter selected");
    }

    fn show_progress(&self, progress: &ExportProgress) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.as_ref() == Some(progress) {
            return;
        }
        eprintln!("{}", present_progress(progress));
        *last = Some(progress.clone());
    }
}
