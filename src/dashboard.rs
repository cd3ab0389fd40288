//! All client-side state, mutated from a single event loop.
//!
//! Each inbound event, poll result, timer tick and user command is one
//! `&mut self` call that runs to completion before the next.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::capture::{CaptureOutcome, CaptureState, CaptureWorkflow, Draft, DraftId};
use crate::command_log::{CommandLog, COMMAND_LOG_CAPACITY};
use crate::error::{Error, Result, ValidationError};
use crate::pose::{CameraType, KeypointMap, KeypointName, PoseTemplate};
use crate::store::PoseTemplateStore;
use crate::sync::event::{ClientIntent, ConfigPatch, FrameUpdate, LiveConfig, Stats, StatsPatch, SyncEvent};
use crate::sync::ChannelEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Dashboard {
    backend: Arc<dyn Backend>,
    connected: bool,
    stats: Stats,
    config: LiveConfig,
    /// Latest preview frame (JPEG)
    preview: Option<Vec<u8>>,
    instructions: Vec<String>,
    actions: Vec<String>,
    log: CommandLog,
    store: PoseTemplateStore,
    draft: Option<Draft>,
    capture: CaptureWorkflow,
    notifications: Vec<Notification>,
}

impl Dashboard {
    pub fn new(backend: Arc<dyn Backend>, countdown_secs: u32) -> Self {
        Self {
            backend,
            connected: false,
            stats: Stats::default(),
            config: LiveConfig::default(),
            preview: None,
            instructions: Vec::new(),
            actions: Vec::new(),
            log: CommandLog::default(),
            store: PoseTemplateStore::new(),
            draft: None,
            capture: CaptureWorkflow::new(countdown_secs),
            notifications: Vec::new(),
        }
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    pub fn preview(&self) -> Option<&[u8]> {
        self.preview.as_deref()
    }

    pub fn instructions(&self) -> &[String] {
        &self.instructions
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    pub fn templates(&self) -> &[PoseTemplate] {
        self.store.templates()
    }

    pub fn template(&self, index: u32) -> Option<&PoseTemplate> {
        self.store.get(index)
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    /// Detection is running on the backend.
    pub fn session_active(&self) -> bool {
        self.stats.is_running
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notifications.push(Notification {
            level,
            message: message.into(),
        });
    }

    /// Surface `e` to the user and hand it back.
    fn fail<T>(&mut self, e: impl Into<Error>) -> Result<T> {
        let e = e.into();
        let level = if e.is_refusal() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        self.notify(level, e.to_string());
        Err(e)
    }

    // ---------------------------------------------------------------
    // Live sync
    // ---------------------------------------------------------------

    pub fn handle_channel(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.connected = true;
                self.notify(NoticeLevel::Info, "connected to backend");
            }
            ChannelEvent::Disconnected(reason) => {
                self.connected = false;
                self.notify(NoticeLevel::Warning, format!("backend disconnected: {reason}"));
            }
            ChannelEvent::Event(event) => self.handle_event(event),
        }
    }

    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::FrameUpdate(frame) => self.apply_frame(frame),
            SyncEvent::Stats(patch) => self.stats.merge(&patch),
            SyncEvent::ConfigUpdated(patch) => {
                info!("config updated by backend");
                self.config.merge(&patch);
            }
            SyncEvent::NewCommand(entry) => self.log.push(entry),
            SyncEvent::Error(notice) => self.notify(NoticeLevel::Error, notice.message),
            SyncEvent::Status(notice) => self.notify(NoticeLevel::Info, notice.message),
        }
    }

    fn apply_frame(&mut self, frame: FrameUpdate) {
        if let Some(image) = frame.image {
            // Accept both bare base64 and data URLs
            let encoded = image.rsplit_once(',').map_or(image.as_str(), |(_, data)| data);
            match STANDARD.decode(encoded) {
                Ok(jpeg) => self.preview = Some(jpeg),
                Err(e) => warn!("dropping undecodable preview frame: {}", e),
            }
        }
        if let Some(fps) = frame.fps {
            self.stats.fps = fps;
        }
        if let Some(ms) = frame.inference_time {
            self.stats.inference_time = ms;
        }
        self.instructions = frame.instruction;
        self.actions = frame.state;
    }

    pub fn merge_polled_stats(&mut self, patch: StatsPatch) {
        debug!("polled stats: {:?}", patch);
        self.stats.merge(&patch);
    }

    /// Load catalog and live config. Failures are reported, not fatal.
    pub async fn refresh(&mut self) {
        let backend = self.backend();
        if let Err(e) = self.store.list(backend.as_ref()).await {
            let _ = self.fail::<()>(e);
        }
        match backend.fetch_config().await {
            Ok(config) => self.config = config,
            Err(e) => {
                let _ = self.fail::<()>(e);
            }
        }
        // Live entries already in the log are newer than any history.
        if self.log.is_empty() {
            match backend.recent_commands(COMMAND_LOG_CAPACITY).await {
                Ok(history) => {
                    debug!("seeded command log with {} entries", history.len());
                    for entry in history {
                        self.log.push(entry);
                    }
                }
                Err(e) => debug!("command history unavailable: {}", e),
            }
        }
    }

    /// Optimistic update; the previous config is restored if the backend
    /// does not acknowledge.
    pub async fn update_config(&mut self, patch: ConfigPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        if let Err(e) = patch.validate() {
            return self.fail(e);
        }
        let previous = self.config.clone();
        self.config.merge(&patch);
        let backend = self.backend();
        match backend.update_config(&patch).await {
            Ok(()) => {
                info!("config updated: {:?}", patch);
                Ok(())
            }
            Err(e) => {
                warn!("config update failed, rolling back: {}", e);
                self.config = previous;
                self.fail(e)
            }
        }
    }

    /// The intent to send, or `None` when there is no connection to send it on.
    pub fn request_session(&mut self, start: bool) -> Option<ClientIntent> {
        if !self.connected {
            self.notify(NoticeLevel::Warning, "not connected to backend");
            return None;
        }
        Some(if start {
            ClientIntent::StartCamera
        } else {
            ClientIntent::StopCamera
        })
    }

    // ---------------------------------------------------------------
    // Templates
    // ---------------------------------------------------------------

    pub async fn reload_templates(&mut self) -> Result<()> {
        let backend = self.backend();
        match self.store.list(backend.as_ref()).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Loads the catalog first if it never loaded, so the new index
    /// cannot collide with a stored one.
    pub async fn new_draft(&mut self, name: &str) -> Result<&Draft> {
        if !self.store.is_loaded() {
            self.reload_templates().await?;
        }
        let template = match self.store.new_draft(name) {
            Ok(template) => template,
            Err(e) => return self.fail(e),
        };
        Ok(self.open(Draft::new(template, true)))
    }

    /// Open a working copy of a stored template.
    pub fn edit(&mut self, index: u32) -> Result<&Draft> {
        let Some(template) = self.store.get(index).cloned() else {
            return self.fail(Error::UnknownTemplate(index));
        };
        Ok(self.open(Draft::new(template, false)))
    }

    fn open(&mut self, draft: Draft) -> &Draft {
        self.capture.cancel();
        self.draft.insert(draft)
    }

    /// Discard the open draft without saving.
    pub fn close_draft(&mut self) -> bool {
        self.capture.cancel();
        self.draft.take().is_some()
    }

    fn draft_mut(&mut self) -> Result<&mut Draft> {
        if self.draft.is_none() {
            return self.fail(Error::NoDraft);
        }
        self.draft.as_mut().ok_or(Error::NoDraft)
    }

    /// Apply an in-place edit to the open draft's template.
    fn edit_draft<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PoseTemplate) -> std::result::Result<(), ValidationError>,
    {
        let result = f(&mut self.draft_mut()?.template);
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.edit_draft(|t| {
            t.name = name.to_string();
            Ok(())
        })
    }

    /// Only after a capture; a fresh draft has no structure to edit.
    pub fn set_base(&mut self, base: KeypointName) -> Result<()> {
        self.edit_draft(|t| t.set_base(base))
    }

    pub fn set_core(&mut self, core: Vec<KeypointName>) -> Result<()> {
        self.edit_draft(|t| t.set_core(core))
    }

    /// Placeholders and unknown tokens are kept until save.
    pub fn set_keys(&mut self, keys: Vec<String>) -> Result<()> {
        self.edit_draft(|t| {
            t.keys = keys;
            Ok(())
        })
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        self.edit_draft(|t| {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ValidationError::ThresholdOutOfRange(threshold));
            }
            t.similarity_threshold = threshold;
            Ok(())
        })
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.edit_draft(|t| {
            t.enabled = enabled;
            Ok(())
        })
    }

    pub fn set_camera_type(&mut self, camera_type: CameraType) -> Result<()> {
        self.edit_draft(|t| {
            t.camera_type = camera_type;
            Ok(())
        })
    }

    /// Persist the open draft. It stays open if the save fails.
    pub async fn save_draft(&mut self) -> Result<()> {
        let template = self.draft_mut()?.template.clone();
        let backend = self.backend();
        if let Err(e) = self.store.save(backend.as_ref(), template).await {
            return self.fail(e);
        }
        self.close_draft();
        self.notify(NoticeLevel::Info, "template saved");
        Ok(())
    }

    pub async fn delete_template(&mut self, index: u32) -> Result<()> {
        let backend = self.backend();
        if let Err(e) = self.store.delete(backend.as_ref(), index).await {
            return self.fail(e);
        }
        if self.draft.as_ref().is_some_and(|d| d.template.index == index) {
            self.close_draft();
        }
        self.notify(NoticeLevel::Info, format!("template {index} deleted"));
        Ok(())
    }

    // ---------------------------------------------------------------
    // Capture
    // ---------------------------------------------------------------

    pub fn start_capture(&mut self) -> Result<()> {
        let id = self.draft_mut()?.id();
        let active = self.session_active();
        match self.capture.start(active, id) {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    pub fn cancel_capture(&mut self) -> bool {
        self.capture.cancel()
    }

    pub fn capture_armed(&self) -> bool {
        self.capture.is_armed()
    }

    /// One-second tick. Returns the draft to fetch a snapshot for.
    pub fn tick_capture(&mut self) -> Option<DraftId> {
        self.capture.tick()
    }

    pub fn complete_capture(&mut self, id: DraftId, result: Result<Option<KeypointMap>>) -> CaptureOutcome {
        let outcome = self.capture.complete(self.draft.as_mut(), id, result);
        match &outcome {
            CaptureOutcome::Captured => self.notify(NoticeLevel::Info, "pose captured"),
            CaptureOutcome::Failed(reason) => {
                self.notify(NoticeLevel::Error, format!("capture failed: {reason}"))
            }
            CaptureOutcome::Discarded => {}
        }
        outcome
    }
}
