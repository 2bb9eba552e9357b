use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use export_host_domain::{ExportProgress, ExportState, ExportSummary};
use tracing::{debug, error, info, warn};

use crate::{
    ApplicationError, CancellationToken, ExportHost, ExportManager, ExportWindow, PluginRecord,
    SharedProgress,
};

/// GUI calls a plugin makes through [`ExportHost`]; queued and handled on the
/// controller's thread at the next `poll_progress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRequest {
    ClickExport,
    StartExport,
}

/// State shared between the controller, the manager and the export thread.
pub struct ControllerLink {
    state: Mutex<ExportState>,
    cancel: Mutex<CancellationToken>,
    progress: SharedProgress,
    directory: RwLock<Option<PathBuf>>,
    session_id: AtomicU32,
    controls_enabled: AtomicBool,
    requests: Mutex<VecDeque<ControllerRequest>>,
    window: Arc<dyn ExportWindow>,
}

impl ControllerLink {
    fn new(window: Arc<dyn ExportWindow>) -> Self {
        Self {
            state: Mutex::new(ExportState::Idle),
            cancel: Mutex::new(CancellationToken::new()),
            progress: SharedProgress::new(),
            directory: RwLock::new(None),
            session_id: AtomicU32::new(0),
            controls_enabled: AtomicBool::new(true),
            requests: Mutex::new(VecDeque::new()),
            window,
        }
    }

    pub fn state(&self) -> ExportState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(
        &self,
        step: impl FnOnce(ExportState) -> Result<ExportState, export_host_domain::DomainError>,
    ) -> Result<ExportState, ApplicationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ApplicationError::lock_poisoned("export state"))?;
        let next = step(*state)?;
        debug!(from = ?*state, to = ?next, "export state changed");
        *state = next;
        Ok(next)
    }

    pub fn enable_controls(&self) {
        self.controls_enabled.store(true, Ordering::SeqCst);
        self.window.set_controls_enabled(true);
    }

    pub fn disable_controls(&self) {
        self.controls_enabled.store(false, Ordering::SeqCst);
        self.window.set_controls_enabled(false);
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled.load(Ordering::SeqCst)
    }

    pub fn request(&self, request: ControllerRequest) {
        debug!(?request, "controller request queued");
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(request);
    }

    fn take_requests(&self) -> Vec<ControllerRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Abandons a session that never started. Only valid while idle.
    pub fn cancel_before_beginning(&self) -> Result<(), ApplicationError> {
        self.transition(ExportState::cancel_before_beginning)?;
        self.enable_controls();
        info!(session_id = self.session_id(), "export cancelled before beginning");
        Ok(())
    }

    pub fn directory_path(&self) -> Option<PathBuf> {
        self.directory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_directory_path(&self, directory: Option<PathBuf>) {
        *self.directory.write().unwrap_or_else(PoisonError::into_inner) = directory;
    }

    pub fn session_id(&self) -> u32 {
        self.session_id.load(Ordering::SeqCst)
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fresh_cancel_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    pub fn progress(&self) -> ExportProgress {
        self.progress.snapshot()
    }
}

impl Debug for ControllerLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerLink")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("directory", &self.directory_path())
            .finish_non_exhaustive()
    }
}

/// Result of one export session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub session_id: u32,
    pub state: ExportState,
    pub summary: Option<ExportSummary>,
    pub error: Option<String>,
}

type CompletionListener = Box<dyn FnMut(&ExportOutcome) + Send>;

struct Worker {
    handle: JoinHandle<()>,
    done: Receiver<Result<ExportSummary, ApplicationError>>,
}

/// Drives one plugin's export sessions: selection of the plugin, destination
/// checks, the background export thread and the progress timer.
pub struct ExportController {
    manager: Arc<ExportManager>,
    link: Arc<ControllerLink>,
    current: Option<PluginRecord>,
    listener: Option<CompletionListener>,
    worker: Option<Worker>,
    last_outcome: Option<ExportOutcome>,
}

impl ExportController {
    pub fn new(manager: Arc<ExportManager>, window: Arc<dyn ExportWindow>) -> Self {
        let link = Arc::new(ControllerLink::new(window));
        manager.set_export_controller(Arc::clone(&link));
        Self {
            manager,
            link,
            current: None,
            listener: None,
            worker: None,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> ExportState {
        self.link.state()
    }

    pub fn link(&self) -> Arc<ControllerLink> {
        Arc::clone(&self.link)
    }

    pub fn has_plugins(&self) -> bool {
        self.manager.plugin_count() > 0
    }

    pub fn image_count(&self) -> usize {
        self.manager.image_count()
    }

    /// Activates the exporter at `index`, deactivating the previous one.
    pub fn select_exporter(&mut self, index: usize) -> Result<(), ApplicationError> {
        if self.state() == ExportState::Exporting {
            return Err(ApplicationError::State(
                "cannot switch exporters while exporting".to_string(),
            ));
        }
        let record = self.manager.plugin_record_at(index)?;
        if let Some(previous) = self.current.take() {
            previous.plugin.view_will_be_deactivated();
        }

        record.plugin.view_will_be_activated(self.manager.as_ref());
        self.link.window.present_view(&record.name);
        info!(id = %record.id, name = %record.name, "exporter selected");
        self.current = Some(record);
        Ok(())
    }

    pub fn select_exporter_by_id(&mut self, id: &str) -> Result<(), ApplicationError> {
        let (index, _) = self
            .manager
            .find_plugin(id)
            .ok_or_else(|| ApplicationError::NotFound(format!("exporter not found: {id}")))?;
        self.select_exporter(index)
    }

    pub fn current_plugin(&self) -> Option<&PluginRecord> {
        self.current.as_ref()
    }

    pub fn set_directory_path(&self, directory: Option<PathBuf>) {
        self.link.set_directory_path(directory);
    }

    pub fn directory_path(&self) -> Option<PathBuf> {
        self.link.directory_path()
    }

    /// Compares free space at the destination with the source sizes of the
    /// pending selection. A running session keeps its snapshot.
    pub fn files_will_fit_on_disk(&self) -> Result<bool, ApplicationError> {
        let directory = self.directory_path().ok_or_else(|| {
            ApplicationError::InvalidInput("no destination directory set".to_string())
        })?;
        if self.state() == ExportState::Idle {
            self.manager.update_selection()?;
        }
        let needed = self.manager.estimated_export_bytes();
        let available = self.manager.available_space(&directory)?;
        debug!(needed, available, "disk space check");
        Ok(available >= needed)
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&ExportOutcome) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    /// Validates the plugin and destination, then starts the export.
    pub fn click_export(&mut self) -> Result<(), ApplicationError> {
        let record = self
            .current
            .clone()
            .ok_or_else(|| ApplicationError::State("no exporter selected".to_string()))?;

        if record.plugin.wants_destination_prompt() {
            let directory = self.directory_path().ok_or_else(|| {
                ApplicationError::InvalidInput("no destination directory set".to_string())
            })?;
            if !self.manager.does_directory_exist(&directory) {
                return Err(ApplicationError::NotFound(format!(
                    "destination directory does not exist: {}",
                    directory.display()
                )));
            }
            record.plugin.validate_destination(&directory)?;
        }
        self.start_export()
    }

    /// Snapshots the selection and runs the plugin on a background thread.
    pub fn start_export(&mut self) -> Result<(), ApplicationError> {
        let record = self
            .current
            .clone()
            .ok_or_else(|| ApplicationError::State("no exporter selected".to_string()))?;
        if self.worker.is_some() {
            return Err(ApplicationError::State(
                "an export is already running".to_string(),
            ));
        }
        let directory = match self.directory_path() {
            Some(directory) => directory,
            None if !record.plugin.wants_destination_prompt() => {
                let directory = self.manager.temporary_directory();
                self.link.set_directory_path(Some(directory.clone()));
                directory
            }
            None => {
                return Err(ApplicationError::InvalidInput(
                    "no destination directory set".to_string(),
                ))
            }
        };

        self.link.transition(ExportState::start)?;
        let total = match self.manager.update_selection() {
            Ok(total) => total,
            Err(error) => {
                self.link.transition(ExportState::cancel)?;
                return Err(error);
            }
        };

        let session_id = self.manager.next_session_id();
        self.link.session_id.store(session_id, Ordering::SeqCst);
        let cancel = self.link.fresh_cancel_token();
        let progress = self.link.progress.clone();
        progress.begin(total, format!("exporting {total} images"));
        self.link.disable_controls();
        self.last_outcome = None;

        let (sender, done) = mpsc::channel();
        let manager = Arc::clone(&self.manager);
        let plugin = Arc::clone(&record.plugin);
        let spawned = thread::Builder::new()
            .name(format!("export-{session_id}"))
            .spawn(move || {
                let result = plugin.perform_export(manager.as_ref(), &directory, &progress, &cancel);
                let _ = sender.send(result);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(error) => {
                self.link.transition(ExportState::cancel)?;
                self.link.enable_controls();
                return Err(ApplicationError::Io(format!(
                    "failed to spawn export thread: {error}"
                )));
            }
        };

        info!(session_id, plugin = %record.id, images = total, "export started");
        self.worker = Some(Worker { handle, done });
        Ok(())
    }

    /// Requests cooperative cancellation of the running export.
    pub fn cancel_export(&self) -> Result<(), ApplicationError> {
        if self.state() != ExportState::Exporting {
            return Err(ApplicationError::State(format!(
                "cannot cancel export in state {:?}",
                self.state()
            )));
        }
        self.link.cancel_token().cancel();
        info!(session_id = self.link.session_id(), "export cancellation requested");
        Ok(())
    }

    pub fn cancel_export_before_beginning(&mut self) -> Result<(), ApplicationError> {
        self.link.cancel_before_beginning()?;
        self.last_outcome = Some(ExportOutcome {
            session_id: self.link.session_id(),
            state: ExportState::Cancelled,
            summary: None,
            error: None,
        });
        Ok(())
    }

    /// Timer tick: handles queued plugin requests, publishes progress and
    /// finishes the session once the export thread reports back.
    pub fn poll_progress(&mut self) -> Result<Option<ExportOutcome>, ApplicationError> {
        for request in self.link.take_requests() {
            let result = match request {
                ControllerRequest::ClickExport => self.click_export(),
                ControllerRequest::StartExport => self.start_export(),
            };
            if let Err(error) = result {
                warn!(?request, %error, "controller request failed");
            }
        }

        let Some(worker) = self.worker.as_ref() else {
            return Ok(None);
        };
        self.link.window.show_progress(&self.link.progress());

        let result = match worker.done.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return Ok(None),
            Err(TryRecvError::Disconnected) => Err(ApplicationError::Plugin(
                "export thread exited without a result".to_string(),
            )),
        };
        self.finish_export(result).map(Some)
    }

    fn finish_export(
        &mut self,
        result: Result<ExportSummary, ApplicationError>,
    ) -> Result<ExportOutcome, ApplicationError> {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                error!(session_id = self.link.session_id(), "export thread panicked");
            }
        }

        let cancelled = self.link.cancel_token().is_cancelled()
            || matches!(result, Err(ApplicationError::Cancelled));
        let state = if cancelled {
            self.link.transition(ExportState::cancel)?
        } else {
            self.link.transition(ExportState::complete)?
        };
        self.link.progress.finish();
        self.link.window.show_progress(&self.link.progress());
        self.link.enable_controls();

        let (summary, error) = match result {
            Ok(summary) => (Some(summary), None),
            Err(ApplicationError::Cancelled) => (None, None),
            Err(error) => (None, Some(error.to_string())),
        };
        let outcome = ExportOutcome {
            session_id: self.link.session_id(),
            state,
            summary,
            error,
        };
        match (&outcome.summary, &outcome.error) {
            (_, Some(error)) => warn!(session_id = outcome.session_id, %error, "export failed"),
            (Some(summary), None) => info!(
                session_id = outcome.session_id,
                state = ?state,
                exported = summary.exported,
                skipped = summary.skipped,
                failed = summary.failed,
                "export finished"
            ),
            (None, None) => info!(session_id = outcome.session_id, "export cancelled"),
        }

        if state == ExportState::Completed {
            if let Some(listener) = self.listener.as_mut() {
                listener(&outcome);
            }
        }
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Runs the progress timer until the session reaches a terminal state.
    pub fn wait(&mut self, interval: Duration) -> Result<ExportOutcome, ApplicationError> {
        loop {
            if let Some(outcome) = self.poll_progress()? {
                return Ok(outcome);
            }
            if self.worker.is_none() {
                if self.state().is_terminal() {
                    if let Some(outcome) = self.last_outcome.clone() {
                        return Ok(outcome);
                    }
                }
                if self.state() == ExportState::Idle {
                    return Err(ApplicationError::State(
                        "no export is running".to_string(),
                    ));
                }
            }
            thread::sleep(interval);
        }
    }

    /// Returns a finished controller to `Idle` for the next session.
    pub fn reset(&mut self) -> Result<(), ApplicationError> {
        if self.worker.is_some() {
            return Err(ApplicationError::State(
                "cannot reset while exporting".to_string(),
            ));
        }
        self.link.transition(ExportState::reset)?;
        self.link.progress.reset();
        self.link.fresh_cancel_token();
        Ok(())
    }

    pub fn last_outcome(&self) -> Option<&ExportOutcome> {
        self.last_outcome.as_ref()
    }
}

impl Drop for ExportController {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.link.cancel_token().cancel();
            if worker.handle.join().is_err() {
                error!("export thread panicked during shutdown");
            }
        }
        if let Some(record) = self.current.take() {
            record.plugin.view_will_be_deactivated();
        }
    }
}
