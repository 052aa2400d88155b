use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use converge::ManagedObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const STATE_VERSION: u32 = 1;

// ============================================================================
// State File
// ============================================================================

/// Recorded state of every managed object, keyed by `kind.name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,

    /// Last time the state was written
    pub last_updated: DateTime<Utc>,

    #[serde(default)]
    pub objects: BTreeMap<String, ManagedObject>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_updated: Utc::now(),
            objects: BTreeMap::new(),
        }
    }
}

impl StateFile {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, newer than supported version {STATE_VERSION}",
                path.display(),
                state.version
            );
        }

        log::debug!("Loaded {} objects from {}", state.objects.len(), path.display());
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&mut self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        self.last_updated = Utc::now();
        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    // ========================================================================
    // Object Helpers
    // ========================================================================

    pub fn get(&self, address: &str) -> Option<&ManagedObject> {
        self.objects.get(address)
    }

    /// Record the outcome of a lifecycle step
    ///
    /// Objects that no longer exist remotely are dropped.
    pub fn record(&mut self, address: &str, object: ManagedObject) {
        if object.status().exists_remotely() {
            self.objects.insert(address.to_string(), object);
        } else {
            self.objects.remove(address);
        }
    }

    /// Forget an object; returns it if it was recorded
    pub fn remove(&mut self, address: &str) -> Option<ManagedObject> {
        self.objects.remove(address)
    }
}
