//! Filter controller
//!
//! Owns the active preset and the property index, re-runs the cascade
//! whenever something it depends on changes, and pushes the result to the
//! scope sink and to status watchers.
//!
//! Every trigger (entity set, selection context, rule edit, enabled flags)
//! ends up in [`FilterController::reevaluate`], which runs synchronously
//! under the state lock, so evaluations never overlap. The only async work
//! is the initial [`FilterController::load`] and the preset saves spawned
//! after each edit. Saves carry a snapshot of the tree taken at send time
//! and their failures are logged, never surfaced.
//!
//! The scope sink is called while the state lock is held: sinks must not
//! call back into the controller.

mod listener;

use crate::config::FilterConfig;
use crate::core::{
    EventBus, FilterCondition, FilterError, FilterGroup, FilterPreset, PresetGateway, SceneEvent,
    SceneGraph, ScopeSink, ValueType,
};
use crate::index::PropertyIndex;
use crate::traversal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock, RwLockWriteGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Where the controller is in its evaluate/publish cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Evaluating,
    Published,
}

/// Published counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStatus {
    /// Whether a filter is currently restricting the scope
    pub active: bool,
    /// Entities admitted on their own merit
    pub scope_count: usize,
    /// Entities admitted through an admitted ancestor
    pub children_count: usize,
}

#[derive(Debug)]
struct ControllerState {
    preset: Option<FilterPreset>,
    index: PropertyIndex,
    enabled: bool,
    phase: Phase,
    unloaded: bool,
    /// Entities this controller marked disabled and must restore later
    disabled: Vec<Uuid>,
}

/// Orchestrates evaluation, publication and persistence of one scene's filter
pub struct FilterController {
    config: FilterConfig,
    gateway: Arc<dyn PresetGateway>,
    scene: Arc<dyn SceneGraph>,
    sink: Arc<dyn ScopeSink>,
    state: RwLock<ControllerState>,
    status_tx: watch::Sender<FilterStatus>,
    preset_tx: watch::Sender<Option<FilterPreset>>,
    index_tx: watch::Sender<PropertyIndex>,
    listener: Mutex<Option<JoinHandle<()>>>,
    saves: Mutex<Vec<JoinHandle<()>>>,
}

impl FilterController {
    pub fn new(
        config: FilterConfig,
        gateway: Arc<dyn PresetGateway>,
        scene: Arc<dyn SceneGraph>,
        sink: Arc<dyn ScopeSink>,
    ) -> Self {
        let state = ControllerState {
            preset: None,
            index: PropertyIndex::new(),
            enabled: config.enabled,
            phase: Phase::Idle,
            unloaded: false,
            disabled: Vec::new(),
        };
        Self {
            config,
            gateway,
            scene,
            sink,
            state: RwLock::new(state),
            status_tx: watch::Sender::new(FilterStatus::default()),
            preset_tx: watch::Sender::new(None),
            index_tx: watch::Sender::new(PropertyIndex::new()),
            listener: Mutex::new(None),
            saves: Mutex::new(Vec::new()),
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ControllerState> {
        // State is plain data; a panic elsewhere cannot leave it half-written
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_state<R>(&self, f: impl FnOnce(&ControllerState) -> R) -> R {
        match self.state.read() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fetch the scene's presets and activate the first one
    ///
    /// When the backend has none (or cannot be reached) a default preset is
    /// created and the list fetched again.
    pub async fn load(&self) -> Option<FilterPreset> {
        let scene_id = self.config.scene_id.as_str();
        let mut presets = self.fetch_presets_or_empty(scene_id).await;

        if presets.is_empty() {
            match self.create_default_preset(scene_id).await {
                Ok(id) => {
                    tracing::info!(
                        scene_id = %scene_id,
                        preset_id = %id,
                        "Provisioned default filter preset"
                    );
                    presets = self.fetch_presets_or_empty(scene_id).await;
                    if presets.is_empty() {
                        presets.push(FilterPreset::new(id, &self.config.default_preset_name));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        scene_id = %scene_id,
                        code = e.error_code(),
                        error = %e,
                        "Failed to create default filter preset"
                    );
                }
            }
        }

        let active = presets.into_iter().next();
        {
            let mut state = self.write_state();
            if state.unloaded {
                return None;
            }
            state.preset = active.clone();
        }
        if let Some(preset) = &active {
            tracing::debug!(preset_id = %preset.id, name = %preset.name, "Activated filter preset");
        }
        self.preset_tx.send_replace(active.clone());

        self.rebuild_index();
        self.reevaluate();
        active
    }

    async fn fetch_presets(&self, scene_id: &str) -> Result<Vec<FilterPreset>, FilterError> {
        self.gateway
            .list_presets(scene_id)
            .await
            .map_err(FilterError::Persistence)
    }

    async fn fetch_presets_or_empty(&self, scene_id: &str) -> Vec<FilterPreset> {
        match self.fetch_presets(scene_id).await {
            Ok(presets) => presets,
            Err(e) => {
                tracing::warn!(
                    scene_id = %scene_id,
                    code = e.error_code(),
                    error = %e,
                    "Failed to fetch filter presets"
                );
                Vec::new()
            }
        }
    }

    async fn create_default_preset(&self, scene_id: &str) -> Result<Uuid, FilterError> {
        self.gateway
            .create_default_preset(scene_id)
            .await
            .map_err(FilterError::Persistence)
    }

    /// Subscribe to scene notifications on `bus`
    ///
    /// Replaces any previous subscription. Must be called within a Tokio
    /// runtime.
    pub fn attach(self: &Arc<Self>, bus: &EventBus) {
        let rx = bus.subscribe();
        let handle = tokio::spawn(listener::run_listener(Arc::downgrade(self), rx));
        let mut listener = self.listener.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(previous) = listener.replace(handle) {
            previous.abort();
        }
    }

    /// Detach from the scene
    ///
    /// Restores every entity this controller disabled, clears the custom
    /// scope and stops listening. Nothing is evaluated afterwards.
    pub fn unload(&self) {
        {
            let mut state = self.write_state();
            if state.unloaded {
                return;
            }
            state.unloaded = true;
            state.phase = Phase::Idle;
            let disabled = std::mem::take(&mut state.disabled);
            self.sink.set_enabled(&disabled, true);
            self.sink.set_custom_scope(None);
        }
        if let Some(handle) = self.listener.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
        self.status_tx.send_replace(FilterStatus::default());
        tracing::debug!("Filter controller unloaded");
    }

    /// Wait for every preset save spawned so far
    pub async fn wait_for_saves(&self) {
        let pending = std::mem::take(&mut *self.saves.lock().unwrap_or_else(|p| p.into_inner()));
        for handle in pending {
            let _ = handle.await;
        }
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// React to one scene notification
    pub fn handle_event(&self, event: &SceneEvent) {
        match event {
            SceneEvent::EntitiesChanged => {
                self.rebuild_index();
                self.reevaluate();
            }
            SceneEvent::SelectionContextChanged { active_group } => {
                tracing::debug!(active_group = ?active_group, "Selection context changed");
                self.reevaluate();
            }
        }
    }

    /// Turn the whole engine on or off
    pub fn set_enabled(&self, enabled: bool) {
        {
            let mut state = self.write_state();
            if state.enabled == enabled {
                return;
            }
            state.enabled = enabled;
        }
        self.reevaluate();
    }

    /// Rebuild the property index from the full entity tree
    pub fn rebuild_index(&self) {
        let roots = self.scene.all_entities();
        let index = PropertyIndex::build(&roots);
        {
            let mut state = self.write_state();
            if state.unloaded {
                return;
            }
            state.index = index.clone();
        }
        self.index_tx.send_replace(index);
    }

    /// Run the cascade against the current level and publish the result
    pub fn reevaluate(&self) {
        let mut guard = self.write_state();
        let state = &mut *guard;
        if state.unloaded {
            return;
        }
        state.phase = Phase::Evaluating;

        let filtering = state.enabled && state.preset.as_ref().is_some_and(|p| p.enabled);
        let status = match state.preset.as_ref().filter(|_| filtering) {
            None => {
                let disabled = std::mem::take(&mut state.disabled);
                self.sink.set_enabled(&disabled, true);
                self.sink.set_custom_scope(None);
                FilterStatus::default()
            }
            Some(preset) => {
                let roots = self.scene.current_level();
                let outcome = traversal::run(&roots, &preset.root_group);

                let still_disabled: HashSet<&Uuid> = outcome.disabled.iter().collect();
                let restored: Vec<Uuid> = state
                    .disabled
                    .iter()
                    .filter(|id| !still_disabled.contains(id))
                    .copied()
                    .collect();
                self.sink.set_enabled(&restored, true);
                self.sink.set_enabled(&outcome.in_scope, true);
                self.sink.set_enabled(&outcome.disabled, false);
                self.sink.set_custom_scope(Some(outcome.in_scope.clone()));

                tracing::debug!(
                    preset_id = %preset.id,
                    scope_count = outcome.scope_count(),
                    children_count = outcome.children_count(),
                    evaluations = outcome.evaluations,
                    "Filter evaluated"
                );
                let status = FilterStatus {
                    active: true,
                    scope_count: outcome.scope_count(),
                    children_count: outcome.children_count(),
                };
                state.disabled = outcome.disabled;
                status
            }
        };

        state.phase = Phase::Published;
        drop(guard);
        self.status_tx.send_replace(status);
    }

    // =========================================================================
    // Rule edits
    // =========================================================================

    /// Apply an edit to the active preset, then re-evaluate and persist
    ///
    /// `edit` returns `None` when it changed nothing; so does this method
    /// when no preset is loaded.
    fn edit<R>(
        &self,
        operation: &str,
        edit: impl FnOnce(&mut FilterPreset) -> Option<R>,
    ) -> Option<R> {
        let (result, snapshot) = {
            let mut state = self.write_state();
            if state.unloaded {
                return None;
            }
            let Some(preset) = state.preset.as_mut() else {
                tracing::debug!(operation = operation, "No active filter preset, edit ignored");
                return None;
            };
            let result = edit(preset)?;
            (result, preset.clone())
        };

        tracing::debug!(operation = operation, preset_id = %snapshot.id, "Filter preset edited");
        self.preset_tx.send_replace(Some(snapshot.clone()));
        self.reevaluate();
        self.persist(snapshot);
        Some(result)
    }

    /// Spawn a durable write of `preset`; failures are logged only
    fn persist(&self, preset: FilterPreset) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(preset_id = %preset.id, "No async runtime, filter preset not saved");
            return;
        };
        let gateway = self.gateway.clone();
        let handle = runtime.spawn(async move {
            match save_preset(gateway.as_ref(), &preset).await {
                Ok(()) => tracing::debug!(preset_id = %preset.id, "Filter preset saved"),
                Err(e) => tracing::warn!(
                    preset_id = %preset.id,
                    code = e.error_code(),
                    error = %e,
                    "Failed to save filter preset"
                ),
            }
        });

        let mut saves = self.saves.lock().unwrap_or_else(|p| p.into_inner());
        saves.retain(|h| !h.is_finished());
        saves.push(handle);
    }

    /// Add a condition under the group `parent` and return its id
    pub fn add_condition(&self, parent: Uuid, key: &str, value_type: ValueType) -> Option<Uuid> {
        self.edit("add_condition", |preset| {
            preset
                .root_group
                .find_group_mut(parent)
                .map(|group| group.add_condition(key, value_type))
        })
    }

    /// Add an empty `all` group under the group `parent` and return its id
    pub fn add_group(&self, parent: Uuid) -> Option<Uuid> {
        self.edit("add_group", |preset| {
            preset
                .root_group
                .find_group_mut(parent)
                .map(FilterGroup::add_group)
        })
    }

    /// Remove the child `id` of the group `parent`
    pub fn remove_item(&self, parent: Uuid, id: Uuid) -> bool {
        self.edit("remove_item", |preset| {
            preset
                .root_group
                .find_group_mut(parent)
                .and_then(|group| group.remove_item(id))
                .map(|_| ())
        })
        .is_some()
    }

    /// Replace a condition, found by id, anywhere in the tree
    pub fn update_condition(&self, condition: FilterCondition) -> bool {
        self.edit("update_condition", |preset| {
            preset.root_group.update_condition(condition).then_some(())
        })
        .is_some()
    }

    /// Replace a group under `parent`, or the root when `parent` is `None`
    pub fn update_group(&self, parent: Option<Uuid>, group: FilterGroup) -> bool {
        self.edit("update_group", |preset| {
            preset.update_group(parent, group).then_some(())
        })
        .is_some()
    }

    pub fn rename_preset(&self, name: &str) -> bool {
        self.edit("rename_preset", |preset| {
            preset.name = name.to_string();
            Some(())
        })
        .is_some()
    }

    /// Flip the preset's master switch
    pub fn set_preset_enabled(&self, enabled: bool) -> bool {
        self.edit("set_preset_enabled", |preset| {
            preset.enabled = enabled;
            Some(())
        })
        .is_some()
    }

    // =========================================================================
    // Published values
    // =========================================================================

    pub fn preset(&self) -> Option<FilterPreset> {
        self.read_state(|s| s.preset.clone())
    }

    pub fn property_index(&self) -> PropertyIndex {
        self.read_state(|s| s.index.clone())
    }

    pub fn status(&self) -> FilterStatus {
        *self.status_tx.borrow()
    }

    pub fn phase(&self) -> Phase {
        self.read_state(|s| s.phase)
    }

    pub fn is_enabled(&self) -> bool {
        self.read_state(|s| s.enabled)
    }

    pub fn is_unloaded(&self) -> bool {
        self.read_state(|s| s.unloaded)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<FilterStatus> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_preset(&self) -> watch::Receiver<Option<FilterPreset>> {
        self.preset_tx.subscribe()
    }

    pub fn subscribe_index(&self) -> watch::Receiver<PropertyIndex> {
        self.index_tx.subscribe()
    }
}

async fn save_preset(
    gateway: &dyn PresetGateway,
    preset: &FilterPreset,
) -> Result<(), FilterError> {
    gateway
        .save_preset(preset)
        .await
        .map_err(FilterError::Persistence)
}

impl Drop for FilterController {
    fn drop(&mut self) {
        if let Ok(mut listener) = self.listener.lock() {
            if let Some(handle) = listener.take() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConditionValue, SceneEntity};
    use crate::scene::{InMemoryScene, RecordingScopeSink};
    use crate::storage::InMemoryPresetStore;

    struct Fixture {
        controller: FilterController,
        store: InMemoryPresetStore,
        scene: InMemoryScene,
        sink: RecordingScopeSink,
    }

    fn fixture() -> Fixture {
        let config = FilterConfig::default_config();
        let store = InMemoryPresetStore::new();
        let scene = InMemoryScene::new(config.event_bus());
        let sink = RecordingScopeSink::new();
        let controller = FilterController::new(
            config,
            Arc::new(store.clone()),
            Arc::new(scene.clone()),
            Arc::new(sink.clone()),
        );
        Fixture {
            controller,
            store,
            scene,
            sink,
        }
    }

    fn material(value: &str) -> SceneEntity {
        SceneEntity::new(Uuid::new_v4()).with_attribute("material", value)
    }

    #[tokio::test]
    async fn test_load_provisions_default_preset() {
        let f = fixture();

        let preset = f.controller.load().await.unwrap();

        assert_eq!(f.store.get(&preset.id).unwrap(), Some(preset.clone()));
        assert_eq!(f.controller.preset(), Some(preset));
        assert_eq!(f.controller.phase(), Phase::Published);
    }

    #[tokio::test]
    async fn test_load_falls_through_on_fetch_failure() {
        let f = fixture();
        f.store.fail_reads(true);

        let preset = f.controller.load().await.unwrap();

        assert_eq!(preset.name, f.controller.config.default_preset_name);
        assert!(preset.root_group.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failures_surface_as_persistence_errors() {
        let f = fixture();
        f.store.fail_reads(true);
        f.store.fail_writes(true);

        let err = f.controller.fetch_presets("scene-1").await.unwrap_err();
        assert_eq!(err.error_code(), "PERSISTENCE_ERROR");
        assert!(f.controller.fetch_presets_or_empty("scene-1").await.is_empty());

        let preset = FilterPreset::new(Uuid::new_v4(), "Unknown");
        let err = save_preset(f.controller.gateway.as_ref(), &preset)
            .await
            .unwrap_err();
        assert!(matches!(err, FilterError::Persistence(_)));
        assert!(err.to_string().contains("Preset backend unavailable"));
    }

    #[tokio::test]
    async fn test_edit_without_preset_is_noop() {
        let f = fixture();

        assert_eq!(f.controller.add_group(Uuid::new_v4()), None);
        assert!(!f.controller.rename_preset("Nope"));
        f.controller.wait_for_saves().await;
        assert_eq!(f.store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_reevaluates_and_persists() {
        let f = fixture();
        let wood = material("wood");
        let steel = material("steel");
        f.scene.set_entities(vec![wood.clone(), steel.clone()]);
        let preset = f.controller.load().await.unwrap();
        assert_eq!(f.controller.status().scope_count, 2);

        let id = f
            .controller
            .add_condition(preset.root_group.id, "material", ValueType::String)
            .unwrap();
        let mut condition = f
            .controller
            .preset()
            .unwrap()
            .root_group
            .find_condition(id)
            .unwrap()
            .clone();
        condition.value = ConditionValue::strings(["wood"]);
        assert!(f.controller.update_condition(condition));

        assert_eq!(f.controller.status().scope_count, 1);
        assert_eq!(f.sink.scope(), Some(vec![wood.id]));
        assert!(f.sink.is_disabled(&steel.id));

        // Saves may land in any order; both snapshots carry the condition
        f.controller.wait_for_saves().await;
        assert_eq!(f.store.save_count(), 2);
        let stored = f.store.get(&preset.id).unwrap().unwrap();
        assert!(stored.root_group.find_condition(id).is_some());
    }

    #[tokio::test]
    async fn test_disabling_engine_restores_everything() {
        let f = fixture();
        let steel = material("steel");
        f.scene.set_entities(vec![steel.clone()]);
        let preset = f.controller.load().await.unwrap();
        let id = f
            .controller
            .add_condition(preset.root_group.id, "material", ValueType::String)
            .unwrap();
        let mut condition = f
            .controller
            .preset()
            .unwrap()
            .root_group
            .find_condition(id)
            .unwrap()
            .clone();
        condition.value = ConditionValue::strings(["wood"]);
        f.controller.update_condition(condition);
        assert!(f.sink.is_disabled(&steel.id));

        f.controller.set_enabled(false);

        assert!(!f.sink.is_disabled(&steel.id));
        assert_eq!(f.sink.scope(), None);
        assert_eq!(f.controller.status(), FilterStatus::default());
    }

    #[tokio::test]
    async fn test_unload_stops_evaluation() {
        let f = fixture();
        f.scene.set_entities(vec![material("wood")]);
        f.controller.load().await.unwrap();

        f.controller.unload();
        let calls = f.sink.scope_calls();
        f.controller.reevaluate();
        f.controller.handle_event(&SceneEvent::EntitiesChanged);

        assert!(f.controller.is_unloaded());
        assert_eq!(f.sink.scope(), None);
        assert_eq!(f.sink.scope_calls(), calls);
        assert_eq!(f.controller.phase(), Phase::Idle);
    }
}
