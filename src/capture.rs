//! Countdown capture of a pose snapshot into the open draft.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::pose::{KeypointMap, PoseTemplate};

pub const COUNTDOWN_SECS: u32 = 5;
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(4000);

static NEXT_DRAFT_ID: AtomicU64 = AtomicU64::new(1);

/// Session-local identity of an open draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftId(u64);

impl DraftId {
    fn next() -> Self {
        Self(NEXT_DRAFT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A template open for editing. Not `Clone`: each draft owns its id.
#[derive(Debug)]
pub struct Draft {
    id: DraftId,
    pub template: PoseTemplate,
    /// true when the draft was never saved
    pub is_new: bool,
}

impl Draft {
    pub fn new(template: PoseTemplate, is_new: bool) -> Self {
        Self {
            id: DraftId::next(),
            template,
            is_new,
        }
    }

    pub fn id(&self) -> DraftId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    /// Seconds remaining
    ArmedCountdown(u32),
    Fetching,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured,
    Failed(String),
    /// The draft was closed or replaced while the snapshot was in flight
    Discarded,
}

#[derive(Debug)]
pub struct CaptureWorkflow {
    state: CaptureState,
    countdown_secs: u32,
    target: Option<DraftId>,
}

impl Default for CaptureWorkflow {
    fn default() -> Self {
        Self::new(COUNTDOWN_SECS)
    }
}

impl CaptureWorkflow {
    pub fn new(countdown_secs: u32) -> Self {
        Self {
            state: CaptureState::Idle,
            countdown_secs: countdown_secs.max(1),
            target: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, CaptureState::ArmedCountdown(_))
    }

    /// Arm the countdown for `draft`. Refused while detection is stopped
    /// or another capture is running.
    pub fn start(&mut self, session_active: bool, draft: DraftId) -> Result<()> {
        if self.state != CaptureState::Idle {
            return Err(Error::CaptureRefused("a capture is already in progress"));
        }
        if !session_active {
            warn!("capture refused: detection is not running");
            return Err(Error::CaptureRefused("start detection before capturing"));
        }
        self.state = CaptureState::ArmedCountdown(self.countdown_secs);
        self.target = Some(draft);
        info!("capture armed: {}s", self.countdown_secs);
        Ok(())
    }

    /// Advance one second. Returns the draft to fetch for when the
    /// countdown reaches zero.
    pub fn tick(&mut self) -> Option<DraftId> {
        match self.state {
            CaptureState::ArmedCountdown(n) if n > 1 => {
                self.state = CaptureState::ArmedCountdown(n - 1);
                None
            }
            CaptureState::ArmedCountdown(_) => {
                self.state = CaptureState::Fetching;
                self.target
            }
            _ => None,
        }
    }

    /// Only an armed countdown can be cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.is_armed() {
            self.state = CaptureState::Idle;
            self.target = None;
            info!("capture cancelled");
            true
        } else {
            false
        }
    }

    /// Apply a fetch result for `id` to the currently open draft, if it is
    /// still the same draft. Always returns to Idle.
    pub fn complete(
        &mut self,
        draft: Option<&mut Draft>,
        id: DraftId,
        result: Result<Option<KeypointMap>>,
    ) -> CaptureOutcome {
        let expected = self.state == CaptureState::Fetching && self.target == Some(id);
        if self.target == Some(id) {
            self.state = CaptureState::Idle;
            self.target = None;
        }

        let draft = match draft {
            Some(d) if expected && d.id == id => d,
            _ => {
                info!("stale capture result discarded");
                return CaptureOutcome::Discarded;
            }
        };

        match result {
            Ok(Some(raw)) => match draft.template.record(raw) {
                Ok(()) => CaptureOutcome::Captured,
                Err(e) => CaptureOutcome::Failed(e.to_string()),
            },
            Ok(None) => CaptureOutcome::Failed("no person detected".into()),
            Err(e) => CaptureOutcome::Failed(e.to_string()),
        }
    }
}

/// Latest keypoints, bounded by `timeout`.
pub async fn fetch_snapshot(backend: &dyn Backend, timeout: Duration) -> Result<Option<KeypointMap>> {
    bounded(timeout, backend.latest_keypoints()).await
}

async fn bounded<F>(timeout: Duration, fut: F) -> Result<Option<KeypointMap>>
where
    F: Future<Output = Result<Option<KeypointMap>>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| Error::Capture(format!("snapshot timed out after {} ms", timeout.as_millis())))?
}
