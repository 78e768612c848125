//! Reference scene-graph and selection adapters
//!
//! [`InMemoryScene`] stands in for the viewer's scene graph: it owns an
//! entity tree, tracks the drill-down level and announces changes on an
//! [`EventBus`]. [`RecordingScopeSink`] keeps whatever the engine pushes
//! out so callers (and tests) can inspect it.

use crate::core::{EventBus, SceneEntity, SceneEvent, SceneGraph, ScopeSink};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
struct SceneState {
    roots: Arc<[SceneEntity]>,
    active_group: Option<Uuid>,
}

/// In-memory scene graph
#[derive(Debug, Clone)]
pub struct InMemoryScene {
    state: Arc<RwLock<SceneState>>,
    bus: EventBus,
}

impl InMemoryScene {
    pub fn new(bus: EventBus) -> Self {
        Self {
            state: Arc::new(RwLock::new(SceneState::default())),
            bus,
        }
    }

    /// The bus this scene announces changes on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Replace the entity tree and announce it
    pub fn set_entities(&self, roots: Vec<SceneEntity>) {
        if let Ok(mut state) = self.state.write() {
            state.roots = roots.into();
        }
        self.bus.publish(SceneEvent::EntitiesChanged);
    }

    /// Drill into a group (or back to the top with `None`) and announce it
    pub fn set_active_group(&self, active_group: Option<Uuid>) {
        if let Ok(mut state) = self.state.write() {
            state.active_group = active_group;
        }
        self.bus
            .publish(SceneEvent::SelectionContextChanged { active_group });
    }
}

impl SceneGraph for InMemoryScene {
    /// Top-level entities, or the children of the active group
    fn current_level(&self) -> Arc<[SceneEntity]> {
        let Ok(state) = self.state.read() else {
            return Arc::from(Vec::new());
        };
        match state.active_group {
            None => state.roots.clone(),
            Some(group_id) => state
                .roots
                .iter()
                .find_map(|root| root.find(group_id))
                .map(|group| Arc::from(group.children.clone()))
                .unwrap_or_else(|| Arc::from(Vec::new())),
        }
    }

    fn all_entities(&self) -> Arc<[SceneEntity]> {
        self.state
            .read()
            .map(|state| state.roots.clone())
            .unwrap_or_else(|_| Arc::from(Vec::new()))
    }

    fn active_group(&self) -> Option<Uuid> {
        self.state.read().ok().and_then(|state| state.active_group)
    }
}

#[derive(Debug, Default)]
struct SinkState {
    scope: Option<Vec<Uuid>>,
    disabled: HashSet<Uuid>,
    scope_calls: usize,
}

/// Scope sink that records what it was told
#[derive(Debug, Clone, Default)]
pub struct RecordingScopeSink {
    state: Arc<RwLock<SinkState>>,
}

impl RecordingScopeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last custom scope pushed, `None` meaning unrestricted
    pub fn scope(&self) -> Option<Vec<Uuid>> {
        self.state.read().ok().and_then(|s| s.scope.clone())
    }

    /// Whether an entity is currently marked disabled
    pub fn is_disabled(&self, id: &Uuid) -> bool {
        self.state
            .read()
            .map(|s| s.disabled.contains(id))
            .unwrap_or(false)
    }

    pub fn disabled_count(&self) -> usize {
        self.state.read().map(|s| s.disabled.len()).unwrap_or(0)
    }

    /// How many times `set_custom_scope` was called
    pub fn scope_calls(&self) -> usize {
        self.state.read().map(|s| s.scope_calls).unwrap_or(0)
    }
}

impl ScopeSink for RecordingScopeSink {
    fn set_custom_scope(&self, scope: Option<Vec<Uuid>>) {
        if let Ok(mut state) = self.state.write() {
            state.scope = scope;
            state.scope_calls += 1;
        }
    }

    fn set_enabled(&self, ids: &[Uuid], enabled: bool) {
        if let Ok(mut state) = self.state.write() {
            if enabled {
                for id in ids {
                    state.disabled.remove(id);
                }
            } else {
                state.disabled.extend(ids.iter().copied());
            }
        }
    }
}
