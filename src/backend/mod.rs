//! REST surface of the detection backend.

mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::error::Result;
use crate::pose::{Catalog, KeypointMap, PoseTemplate};
use crate::sync::event::{CommandEntry, ConfigPatch, LiveConfig, StatsPatch};

/// Request/response operations against the backend.
///
/// Every call is a single round trip; failures are reported, never retried.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Full template catalog. Invalid entries are skipped, not fatal.
    async fn list_templates(&self) -> Result<Catalog>;

    /// Upsert by `index`. `Ok` only once the backend has committed it.
    async fn save_template(&self, template: &PoseTemplate) -> Result<()>;

    async fn delete_template(&self, index: u32) -> Result<()>;

    /// Latest detected keypoints, `None` when nobody is in frame.
    async fn latest_keypoints(&self) -> Result<Option<KeypointMap>>;

    async fn fetch_config(&self) -> Result<LiveConfig>;

    async fn update_config(&self, patch: &ConfigPatch) -> Result<()>;

    async fn fetch_stats(&self) -> Result<StatsPatch>;

    /// Up to `count` most recent sent commands, oldest first.
    async fn recent_commands(&self, count: usize) -> Result<Vec<CommandEntry>>;
}
