//! Template store persisted as a single JSON document.
//!
//! The whole store is rewritten on every change (temp file + rename), so a
//! crash mid-write leaves the previous document intact.

use super::{
    default_template_spec, validate_name, TemplateError, TemplateStore, DEFAULT_TEMPLATE_NAME,
};
use crate::watermark::WatermarkSpec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk layout of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreSnapshot {
    #[serde(default = "snapshot_version")]
    version: u32,
    #[serde(default)]
    templates: BTreeMap<String, WatermarkSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_used: Option<String>,
}

fn snapshot_version() -> u32 {
    1
}

impl StoreSnapshot {
    fn seeded() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(DEFAULT_TEMPLATE_NAME.to_string(), default_template_spec());
        Self {
            version: snapshot_version(),
            templates,
            last_used: Some(DEFAULT_TEMPLATE_NAME.to_string()),
        }
    }
}

/// JSON file backed [`TemplateStore`].
#[derive(Debug)]
pub struct JsonTemplateStore {
    path: PathBuf,
    state: Mutex<StoreSnapshot>,
}

impl JsonTemplateStore {
    /// Open the store at `path`, creating it with the default template when
    /// the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        let path = path.into();
        let snapshot = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str::<StoreSnapshot>(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Creating template store with default template");
                let snapshot = StoreSnapshot::seeded();
                write_atomic(&path, &snapshot)?;
                snapshot
            }
            Err(e) => return Err(e.into()),
        };

        debug!(
            path = %path.display(),
            templates = snapshot.templates.len(),
            "Opened template store"
        );
        Ok(Self {
            path,
            state: Mutex::new(snapshot),
        })
    }

    /// Default store location under the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("photomark").join("templates.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the state, persist it, then publish it.
    /// A failed write leaves the in-memory state unchanged.
    fn update<F>(&self, change: F) -> Result<(), TemplateError>
    where
        F: FnOnce(&mut StoreSnapshot),
    {
        let mut state = self.state.lock();
        commit(&self.path, &mut state, change)
    }
}

fn commit<F>(path: &Path, state: &mut StoreSnapshot, change: F) -> Result<(), TemplateError>
where
    F: FnOnce(&mut StoreSnapshot),
{
    let mut next = state.clone();
    change(&mut next);
    write_atomic(path, &next)?;
    *state = next;
    Ok(())
}

impl TemplateStore for JsonTemplateStore {
    fn save(&self, name: &str, spec: &WatermarkSpec) -> Result<(), TemplateError> {
        validate_name(name)?;
        self.update(|state| {
            state.templates.insert(name.to_string(), spec.clone());
            state.last_used = Some(name.to_string());
        })
    }

    fn load(&self, name: &str) -> Result<WatermarkSpec, TemplateError> {
        let mut state = self.state.lock();
        let spec = state
            .templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;

        if state.last_used.as_deref() != Some(name) {
            commit(&self.path, &mut state, |next| next.last_used = Some(name.to_string()))?;
        }
        Ok(spec)
    }

    fn list(&self) -> Result<BTreeSet<String>, TemplateError> {
        Ok(self.state.lock().templates.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<(), TemplateError> {
        let mut state = self.state.lock();
        if !state.templates.contains_key(name) {
            return Ok(());
        }
        commit(&self.path, &mut state, |next| {
            next.templates.remove(name);
            if next.last_used.as_deref() == Some(name) {
                next.last_used = Some(DEFAULT_TEMPLATE_NAME.to_string());
            }
        })
    }

    fn last_used(&self) -> Option<String> {
        self.state.lock().last_used.clone()
    }
}

/// Write `snapshot` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, snapshot: &StoreSnapshot) -> Result<(), TemplateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(snapshot)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
