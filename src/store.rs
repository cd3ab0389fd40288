//! Local view of the backend's template catalog.
//!
//! Mutations go through the backend first; the local list only changes
//! once the backend has confirmed.

use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{Error, Result, ValidationError};
use crate::pose::{PoseTemplate, TemplateShape};

#[derive(Debug, Default)]
pub struct PoseTemplateStore {
    templates: Vec<PoseTemplate>,
    /// Highest index ever seen this session, so deleted indices are not reused
    high_water: Option<u32>,
    /// A `list` has succeeded at least once
    loaded: bool,
}

impl PoseTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace local state with the backend's catalog.
    pub async fn list(&mut self, backend: &dyn Backend) -> Result<()> {
        let catalog = backend.list_templates().await?;
        self.observe(catalog.templates.iter().map(|t| t.index));
        self.observe(catalog.skipped.iter().copied());
        self.templates = catalog.templates;
        self.loaded = true;
        info!("catalog refreshed: {} templates", self.templates.len());
        Ok(())
    }

    pub fn templates(&self) -> &[PoseTemplate] {
        &self.templates
    }

    pub fn get(&self, index: u32) -> Option<&PoseTemplate> {
        self.templates.iter().find(|t| t.index == index)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// New draft with a fresh index. Not stored until saved.
    ///
    /// Refused until the catalog has been loaded, since the backend's
    /// indices are unknown before that.
    pub fn new_draft(&mut self, name: impl Into<String>) -> Result<PoseTemplate> {
        if !self.loaded {
            return Err(Error::CatalogNotLoaded);
        }
        let index = self.high_water.map_or(0, |i| i + 1);
        self.high_water = Some(index);
        Ok(PoseTemplate::draft(index, name))
    }

    /// Validate locally, then upsert by index once the backend commits.
    pub async fn save(&mut self, backend: &dyn Backend, template: PoseTemplate) -> Result<()> {
        if let Err(e) = self.check(&template) {
            warn!("save of template {} refused: {}", template.index, e);
            return Err(e.into());
        }
        backend.save_template(&template).await?;
        info!("template {} ({}) saved", template.index, template.name);
        self.observe([template.index]);
        match self.templates.iter_mut().find(|t| t.index == template.index) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
        Ok(())
    }

    /// Remove exactly one entry, only after the backend confirms.
    pub async fn delete(&mut self, backend: &dyn Backend, index: u32) -> Result<()> {
        backend.delete_template(index).await?;
        if let Some(pos) = self.templates.iter().position(|t| t.index == index) {
            self.templates.remove(pos);
        }
        info!("template {} deleted", index);
        Ok(())
    }

    fn check(&self, template: &PoseTemplate) -> Result<(), ValidationError> {
        template.validate()?;
        if let (TemplateShape::Legacy(_), Some(stored)) = (&template.shape, self.get(template.index)) {
            if !template.shape.same_structure(&stored.shape) {
                return Err(ValidationError::FrozenStructure { index: template.index });
            }
        }
        Ok(())
    }

    fn observe(&mut self, indices: impl IntoIterator<Item = u32>) {
        for index in indices {
            self.high_water = Some(self.high_water.map_or(index, |h| h.max(index)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::pose::template::LegacyShape;
    use crate::pose::{KeypointMap, KeypointName, RelativeVectors, Vec2};

    fn legacy(index: u32, name: &str) -> PoseTemplate {
        let mut t = PoseTemplate::draft(index, name);
        t.keys = vec!["w".into()];
        t.shape = TemplateShape::Legacy(
            LegacyShape::new(
                KeypointName::LeftShoulder,
                vec![KeypointName::LeftShoulder, KeypointName::LeftWrist],
                RelativeVectors::from([(KeypointName::LeftWrist, Vec2::new(-12.0, -90.0))]),
            )
            .unwrap(),
        );
        t
    }

    async fn loaded(backend: &MockBackend) -> PoseTemplateStore {
        let mut store = PoseTemplateStore::new();
        store.list(backend).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_list_replaces_state() {
        let backend = MockBackend::with_templates(vec![legacy(0, "a"), legacy(1, "b")]);
        let mut store = loaded(&backend).await;
        assert_eq!(store.templates().len(), 2);

        *backend.templates.lock().unwrap() = vec![legacy(7, "c")];
        store.list(&backend).await.unwrap();
        assert_eq!(store.templates().len(), 1);
        assert_eq!(store.get(7).unwrap().name, "c");
    }

    #[tokio::test]
    async fn test_new_draft_never_reuses_deleted_index() {
        let backend = MockBackend::with_templates(vec![legacy(0, "a"), legacy(4, "b")]);
        let mut store = loaded(&backend).await;
        store.delete(&backend, 4).await.unwrap();
        let draft = store.new_draft("new").unwrap();
        assert_eq!(draft.index, 5);
        assert!(draft.enabled);
        assert_eq!(store.new_draft("another").unwrap().index, 6);
    }

    #[tokio::test]
    async fn test_first_draft_in_empty_catalog() {
        let backend = MockBackend::default();
        let mut store = loaded(&backend).await;
        assert_eq!(store.new_draft("first").unwrap().index, 0);
    }

    #[tokio::test]
    async fn test_new_draft_refused_before_catalog_loads() {
        let backend = MockBackend::with_templates(vec![legacy(0, "builtin")]);
        let mut store = PoseTemplateStore::new();
        assert!(matches!(store.new_draft("mine"), Err(Error::CatalogNotLoaded)));

        store.list(&backend).await.unwrap();
        let mut draft = store.new_draft("mine").unwrap();
        assert_eq!(draft.index, 1);
        draft.keys = vec!["w".into()];
        store.save(&backend, draft).await.unwrap();
        let names: Vec<String> = backend.templates.lock().unwrap().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["builtin", "mine"]);
    }

    #[tokio::test]
    async fn test_new_draft_skips_indices_of_unreadable_entries() {
        let backend = MockBackend::with_templates(vec![legacy(2, "a")]);
        *backend.skipped.lock().unwrap() = vec![7];
        let mut store = loaded(&backend).await;
        assert_eq!(store.templates().len(), 1);
        assert_eq!(store.new_draft("new").unwrap().index, 8);
    }

    #[tokio::test]
    async fn test_legacy_structure_change_rejected_before_network() {
        let backend = MockBackend::with_templates(vec![legacy(2, "a")]);
        let mut store = loaded(&backend).await;
        let calls = backend.call_count();

        let mut edited = legacy(2, "a");
        edited.shape = TemplateShape::Legacy(
            LegacyShape::new(KeypointName::LeftShoulder, vec![KeypointName::LeftShoulder], RelativeVectors::new())
                .unwrap(),
        );
        let err = store.save(&backend, edited).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::FrozenStructure { index: 2 })
        ));
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_key_before_network() {
        let backend = MockBackend::default();
        let mut store = loaded(&backend).await;
        let calls = backend.call_count();
        let mut draft = store.new_draft("jump").unwrap();
        draft.keys = vec!["space".into(), "".into()];
        let err = store.save(&backend, draft).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test]
    async fn test_save_upserts_after_commit() {
        let backend = MockBackend::with_templates(vec![legacy(1, "old")]);
        let mut store = loaded(&backend).await;

        let mut renamed = store.get(1).unwrap().clone();
        renamed.name = "renamed".into();
        store.save(&backend, renamed).await.unwrap();
        assert_eq!(store.templates().len(), 1);
        assert_eq!(store.get(1).unwrap().name, "renamed");

        let mut draft = store.new_draft("fresh").unwrap();
        let raw = KeypointMap::from([
            (KeypointName::Nose, Vec2::new(100.0, 50.0)),
            (KeypointName::LeftShoulder, Vec2::new(80.0, 70.0)),
        ]);
        draft.record(raw).unwrap();
        store.save(&backend, draft).await.unwrap();
        assert_eq!(store.templates().len(), 2);
        assert_eq!(backend.templates.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_failure_leaves_store_unchanged() {
        let backend = MockBackend::with_templates(vec![legacy(1, "old")]);
        let mut store = loaded(&backend).await;
        backend.set_reject(true);

        let mut renamed = store.get(1).unwrap().clone();
        renamed.name = "renamed".into();
        let err = store.save(&backend, renamed).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));
        assert_eq!(store.get(1).unwrap().name, "old");
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one() {
        let backend = MockBackend::with_templates(vec![legacy(0, "a"), legacy(1, "b"), legacy(2, "c")]);
        let mut store = loaded(&backend).await;
        store.delete(&backend, 1).await.unwrap();
        let remaining: Vec<u32> = store.templates().iter().map(|t| t.index).collect();
        assert_eq!(remaining, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_list() {
        let backend = MockBackend::with_templates(vec![legacy(0, "a"), legacy(1, "b")]);
        let mut store = loaded(&backend).await;
        backend.set_reject(true);
        assert!(store.delete(&backend, 1).await.is_err());
        assert_eq!(store.templates().len(), 2);
    }
}
