//! In-memory template store, for tests and embedding.

use super::{validate_name, TemplateError, TemplateStore, DEFAULT_TEMPLATE_NAME};
use crate::watermark::WatermarkSpec;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct State {
    templates: BTreeMap<String, WatermarkSpec>,
    last_used: Option<String>,
}

/// Non-persistent [`TemplateStore`]. Starts empty.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    state: RwLock<State>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn save(&self, name: &str, spec: &WatermarkSpec) -> Result<(), TemplateError> {
        validate_name(name)?;
        let mut state = self.state.write();
        state.templates.insert(name.to_string(), spec.clone());
        state.last_used = Some(name.to_string());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<WatermarkSpec, TemplateError> {
        let mut state = self.state.write();
        let spec = state
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        state.last_used = Some(name.to_string());
        Ok(spec)
    }

    fn list(&self) -> Result<BTreeSet<String>, TemplateError> {
        Ok(self.state.read().templates.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<(), TemplateError> {
        let mut state = self.state.write();
        if state.templates.remove(name).is_some() && state.last_used.as_deref() == Some(name) {
            state.last_used = Some(DEFAULT_TEMPLATE_NAME.to_string());
        }
        Ok(())
    }

    fn last_used(&self) -> Option<String> {
        self.state.read().last_used.clone()
    }
}
