//! In-memory implementation of PresetGateway for testing and development

use crate::core::{FilterPreset, PresetGateway};
use crate::storage::wire;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Name given to auto-provisioned presets
pub const DEFAULT_PRESET_NAME: &str = "Default";

#[derive(Debug, Clone)]
struct StoredPreset {
    scene_id: String,
    /// Kept as the JSON wire document so every write exercises the codec
    document: String,
}

/// In-memory preset store
///
/// Uses RwLock for thread-safe access. Reads and writes can be made to fail
/// on demand to exercise the controller's degradation paths.
#[derive(Clone, Default)]
pub struct InMemoryPresetStore {
    presets: Arc<RwLock<IndexMap<Uuid, StoredPreset>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl InMemoryPresetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a preset for a scene
    pub fn insert(&self, scene_id: &str, preset: &FilterPreset) -> Result<()> {
        let document = wire::encode(preset)?;
        let mut presets = self
            .presets
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;
        presets.insert(
            preset.id,
            StoredPreset {
                scene_id: scene_id.to_string(),
                document,
            },
        );
        Ok(())
    }

    /// Read back the stored copy of a preset
    pub fn get(&self, id: &Uuid) -> Result<Option<FilterPreset>> {
        let presets = self
            .presets
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;
        presets
            .get(id)
            .map(|stored| wire::decode(&stored.document).map_err(Into::into))
            .transpose()
    }

    /// Make every list call fail
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every save call fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresetGateway for InMemoryPresetStore {
    async fn list_presets(&self, scene_id: &str) -> Result<Vec<FilterPreset>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("Preset backend unavailable"));
        }
        let presets = self
            .presets
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        presets
            .values()
            .filter(|stored| stored.scene_id == scene_id)
            .map(|stored| wire::decode(&stored.document).map_err(Into::into))
            .collect()
    }

    async fn create_default_preset(&self, scene_id: &str) -> Result<Uuid> {
        let preset = FilterPreset::new(Uuid::new_v4(), DEFAULT_PRESET_NAME);
        self.insert(scene_id, &preset)?;
        Ok(preset.id)
    }

    async fn save_preset(&self, preset: &FilterPreset) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("Preset backend unavailable"));
        }
        let document = wire::encode(preset)?;
        let mut presets = self
            .presets
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let stored = presets
            .get_mut(&preset.id)
            .ok_or_else(|| anyhow!("Preset not found"))?;
        stored.document = document;
        self.saves.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}
