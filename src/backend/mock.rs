//! In-memory backend for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::Backend;
use crate::error::{Error, Result};
use crate::pose::{Catalog, KeypointMap, PoseTemplate};
use crate::sync::event::{CommandEntry, ConfigPatch, LiveConfig, StatsPatch};

#[derive(Default)]
pub struct MockBackend {
    pub templates: Mutex<Vec<PoseTemplate>>,
    /// Indices of catalog entries that fail to decode
    pub skipped: Mutex<Vec<u32>>,
    pub snapshot: Mutex<Option<KeypointMap>>,
    pub config: Mutex<LiveConfig>,
    pub stats: Mutex<StatsPatch>,
    /// Oldest first
    pub history: Mutex<Vec<CommandEntry>>,
    /// Every mutating call fails while set
    pub reject: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl MockBackend {
    pub fn with_templates(templates: Vec<PoseTemplate>) -> Self {
        Self {
            templates: Mutex::new(templates),
            ..Self::default()
        }
    }

    pub fn set_reject(&self, reject: bool) {
        *self.reject.lock().unwrap() = reject;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.reject.lock().unwrap() {
            return Err(Error::Rejected {
                operation,
                message: "mock rejection".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_templates(&self) -> Result<Catalog> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Catalog {
            templates: self.templates.lock().unwrap().clone(),
            skipped: self.skipped.lock().unwrap().clone(),
        })
    }

    async fn save_template(&self, template: &PoseTemplate) -> Result<()> {
        self.enter("save template")?;
        let mut templates = self.templates.lock().unwrap();
        match templates.iter_mut().find(|t| t.index == template.index) {
            Some(slot) => *slot = template.clone(),
            None => templates.push(template.clone()),
        }
        Ok(())
    }

    async fn delete_template(&self, index: u32) -> Result<()> {
        self.enter("delete template")?;
        self.templates.lock().unwrap().retain(|t| t.index != index);
        Ok(())
    }

    async fn latest_keypoints(&self) -> Result<Option<KeypointMap>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn fetch_config(&self) -> Result<LiveConfig> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.config.lock().unwrap().clone())
    }

    async fn update_config(&self, patch: &ConfigPatch) -> Result<()> {
        self.enter("update config")?;
        self.config.lock().unwrap().merge(patch);
        Ok(())
    }

    async fn fetch_stats(&self) -> Result<StatsPatch> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.stats.lock().unwrap().clone())
    }

    async fn recent_commands(&self, count: usize) -> Result<Vec<CommandEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let history = self.history.lock().unwrap();
        Ok(history[history.len().saturating_sub(count)..].to_vec())
    }
}
