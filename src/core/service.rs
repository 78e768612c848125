//! Service traits for the engine's external collaborators
//!
//! The engine never owns the scene graph, the selection subsystem or the
//! preset backend. It reaches them only through these traits.

use crate::core::{entity::SceneEntity, rule::FilterPreset};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Durable storage for filter presets
///
/// Implementations talk to whatever backend holds presets. The engine treats
/// every call as fallible and never retries.
#[async_trait]
pub trait PresetGateway: Send + Sync {
    /// List the presets stored for a scene
    async fn list_presets(&self, scene_id: &str) -> Result<Vec<FilterPreset>>;

    /// Create an empty preset for a scene and return its id
    async fn create_default_preset(&self, scene_id: &str) -> Result<Uuid>;

    /// Durably write a preset, replacing any previous copy
    async fn save_preset(&self, preset: &FilterPreset) -> Result<()>;
}

/// Read access to the viewer's scene graph
pub trait SceneGraph: Send + Sync {
    /// Entities at the current browsing level, used as traversal roots
    fn current_level(&self) -> Arc<[SceneEntity]>;

    /// Roots of the whole entity tree, used for property indexing
    fn all_entities(&self) -> Arc<[SceneEntity]>;

    /// The ancestor group the user has drilled into, if any
    fn active_group(&self) -> Option<Uuid>;
}

/// The selection subsystem the engine reports its results to
pub trait ScopeSink: Send + Sync {
    /// Restrict selection to these entities, or `None` for no restriction
    fn set_custom_scope(&self, scope: Option<Vec<Uuid>>);

    /// Visually enable or disable entities
    fn set_enabled(&self, ids: &[Uuid], enabled: bool);
}
