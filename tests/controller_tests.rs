//! End-to-end tests for FilterController over the in-memory adapters
//!
//! These tests verify that:
//! - Loading activates a stored preset or provisions a default one
//! - Rule edits, entity changes and selection changes all re-publish scope
//! - Persistence failures never leak into evaluation
//! - Unloading clears the scope and stops reacting to the scene

use std::time::Duration;
use view_filter::prelude::*;

struct Harness {
    controller: Arc<FilterController>,
    store: InMemoryPresetStore,
    scene: InMemoryScene,
    sink: RecordingScopeSink,
    bus: EventBus,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness_with_store(store: InMemoryPresetStore) -> Harness {
    init_tracing();
    let config = FilterConfig::default_config();
    let bus = config.event_bus();
    let scene = InMemoryScene::new(bus.clone());
    let sink = RecordingScopeSink::new();
    let controller = Arc::new(FilterController::new(
        config,
        Arc::new(store.clone()),
        Arc::new(scene.clone()),
        Arc::new(sink.clone()),
    ));
    Harness {
        controller,
        store,
        scene,
        sink,
        bus,
    }
}

fn harness() -> Harness {
    harness_with_store(InMemoryPresetStore::new())
}

fn material(value: &str) -> SceneEntity {
    SceneEntity::new(Uuid::new_v4()).with_attribute("material", value)
}

/// Add a `material` condition accepting `values` to the root group
fn filter_material(controller: &FilterController, values: &[&str]) -> Uuid {
    let root = controller.preset().unwrap().root_group.id;
    let id = controller
        .add_condition(root, "material", ValueType::String)
        .unwrap();
    let mut condition = controller
        .preset()
        .unwrap()
        .root_group
        .find_condition(id)
        .unwrap()
        .clone();
    condition.value = ConditionValue::strings(values.iter().copied());
    assert!(controller.update_condition(condition));
    id
}

async fn wait_for_status<F>(controller: &FilterController, predicate: F) -> FilterStatus
where
    F: FnMut(&FilterStatus) -> bool,
{
    let mut rx = controller.subscribe_status();
    let status = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(predicate))
        .await
        .expect("status was not published in time")
        .expect("status channel closed");
    *status
}

// =============================================================================
// Loading
// =============================================================================

mod load_tests {
    use super::*;

    #[tokio::test]
    async fn test_first_stored_preset_becomes_active() {
        let store = InMemoryPresetStore::new();
        let mut first = FilterPreset::new(Uuid::new_v4(), "Structure");
        first.root_group.add_condition("material", ValueType::String);
        store.insert("scene-1", &first).unwrap();
        store
            .insert("scene-1", &FilterPreset::new(Uuid::new_v4(), "Finishes"))
            .unwrap();

        let h = harness_with_store(store);
        let active = h.controller.load().await.unwrap();

        assert_eq!(active, first);
        assert_eq!(h.controller.preset(), Some(first));
    }

    #[tokio::test]
    async fn test_empty_backend_gets_default_preset() {
        let h = harness();

        let active = h.controller.load().await.unwrap();

        let stored = h.store.list_presets("scene-1").await.unwrap();
        assert_eq!(stored, vec![active.clone()]);
        assert!(active.enabled);
        assert!(active.root_group.is_empty());
    }

    #[tokio::test]
    async fn test_load_publishes_preset_and_index() {
        let h = harness();
        h.scene.set_entities(vec![material("wood")]);
        let preset_rx = h.controller.subscribe_preset();
        let index_rx = h.controller.subscribe_index();

        let active = h.controller.load().await;

        assert_eq!(*preset_rx.borrow(), active);
        assert_eq!(index_rx.borrow().keys().collect::<Vec<_>>(), vec!["material"]);
    }
}

// =============================================================================
// Evaluation scenarios
// =============================================================================

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_child_matching_below_non_matching_parent_is_its_own_match() {
        let h = harness();
        let a = material("wood");
        let d = material("wood");
        let b = material("steel").with_child(d.clone());
        let c = SceneEntity::new(Uuid::new_v4());
        h.scene.set_entities(vec![a.clone(), b.clone(), c.clone()]);
        h.controller.load().await.unwrap();

        filter_material(&h.controller, &["wood"]);

        assert_eq!(h.sink.scope(), Some(vec![a.id, d.id]));
        let status = h.controller.status();
        assert_eq!(status.scope_count, 2);
        assert_eq!(status.children_count, 0);
        assert!(h.sink.is_disabled(&b.id));
        assert!(h.sink.is_disabled(&c.id));
        assert!(!h.sink.is_disabled(&d.id));
    }

    #[tokio::test]
    async fn test_disabling_sole_condition_admits_every_root() {
        let h = harness();
        let roots = vec![material("wood"), material("steel"), SceneEntity::new(Uuid::new_v4())];
        h.scene.set_entities(roots.clone());
        h.controller.load().await.unwrap();
        let id = filter_material(&h.controller, &["wood"]);
        assert_eq!(h.controller.status().scope_count, 1);

        let mut condition = h
            .controller
            .preset()
            .unwrap()
            .root_group
            .find_condition(id)
            .unwrap()
            .clone();
        condition.enabled = false;
        h.controller.update_condition(condition);

        assert_eq!(h.sink.scope(), Some(roots.iter().map(|e| e.id).collect()));
        assert_eq!(h.controller.status().children_count, 0);
        assert_eq!(h.sink.disabled_count(), 0);
    }

    #[tokio::test]
    async fn test_disabling_preset_clears_scope_and_counts() {
        let h = harness();
        let steel = material("steel");
        h.scene.set_entities(vec![material("wood"), steel.clone()]);
        h.controller.load().await.unwrap();
        filter_material(&h.controller, &["wood"]);
        assert!(h.sink.scope().is_some());

        assert!(h.controller.set_preset_enabled(false));

        assert_eq!(h.sink.scope(), None);
        assert_eq!(h.controller.status(), FilterStatus::default());
        assert!(!h.sink.is_disabled(&steel.id));

        h.controller.wait_for_saves().await;
        let stored = h.store.list_presets("scene-1").await.unwrap();
        assert!(!stored[0].enabled);
    }

    #[tokio::test]
    async fn test_any_group_with_nested_all() {
        let h = harness();
        let tall_steel = material("steel").with_attribute("height", 10.0);
        let short_steel = material("steel").with_attribute("height", 1.0);
        let glass = material("glass");
        h.scene
            .set_entities(vec![tall_steel.clone(), short_steel.clone(), glass.clone()]);
        let preset = h.controller.load().await.unwrap();

        // any(material = glass, all(height > 5))
        let mut root = preset.root_group.clone();
        root.group_type = GroupType::Any;
        assert!(h.controller.update_group(None, root));
        filter_material(&h.controller, &["glass"]);
        let nested = h.controller.add_group(preset.root_group.id).unwrap();
        let height = h
            .controller
            .add_condition(nested, "height", ValueType::Number)
            .unwrap();
        let mut condition = h
            .controller
            .preset()
            .unwrap()
            .root_group
            .find_condition(height)
            .unwrap()
            .clone();
        condition.operator = Operator::GreaterThan;
        condition.value = ConditionValue::Number(Some(5.0));
        h.controller.update_condition(condition);

        assert_eq!(h.sink.scope(), Some(vec![tall_steel.id, glass.id]));
        assert!(h.sink.is_disabled(&short_steel.id));

        assert!(h.controller.remove_item(preset.root_group.id, nested));
        assert_eq!(h.sink.scope(), Some(vec![glass.id]));
    }

    #[tokio::test]
    async fn test_update_group_under_wrong_parent_changes_nothing() {
        let h = harness();
        let preset = h.controller.load().await.unwrap();
        let root = preset.root_group.id;
        let outer = h.controller.add_group(root).unwrap();
        let inner = h.controller.add_group(outer).unwrap();
        h.controller.wait_for_saves().await;
        let saves = h.store.save_count();
        let before = h.controller.preset().unwrap();

        let mut moved = before.root_group.find_group(inner).unwrap().clone();
        moved.group_type = GroupType::Any;
        assert!(!h.controller.update_group(Some(root), moved.clone()));

        h.controller.wait_for_saves().await;
        assert_eq!(h.store.save_count(), saves);
        assert_eq!(h.controller.preset(), Some(before.clone()));

        // The correct parent still works and the stored tree stays loadable
        assert!(h.controller.update_group(Some(outer), moved));
        h.controller.wait_for_saves().await;
        let stored = h.store.list_presets("scene-1").await.unwrap();
        assert_eq!(stored[0].root_group.find_group(inner).unwrap().group_type, GroupType::Any);
        assert_eq!(stored[0].root_group.children.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_item_changes_nothing() {
        let h = harness();
        let preset = h.controller.load().await.unwrap();

        assert!(!h.controller.remove_item(preset.root_group.id, Uuid::new_v4()));
        h.controller.wait_for_saves().await;
        assert_eq!(h.store.save_count(), 0);
    }
}

// =============================================================================
// Triggers
// =============================================================================

mod trigger_tests {
    use super::*;

    #[tokio::test]
    async fn test_entity_change_reevaluates_and_reindexes() {
        let h = harness();
        h.controller.load().await.unwrap();
        h.controller.attach(&h.bus);
        filter_material(&h.controller, &["wood"]);
        assert_eq!(h.controller.status().scope_count, 0);

        h.scene
            .set_entities(vec![material("wood").with_attribute("height", 3.0), material("wood")]);

        let status = wait_for_status(&h.controller, |s| s.scope_count == 2).await;
        assert!(status.active);
        let index = h.controller.property_index();
        assert_eq!(index.entities_with("material").len(), 2);
        assert_eq!(index.entities_with("height").len(), 1);
    }

    #[tokio::test]
    async fn test_selection_context_change_uses_new_level() {
        let h = harness();
        let inner_wood = material("wood");
        let inner_steel = material("steel");
        let group = material("wood")
            .with_child(inner_wood.clone())
            .with_child(inner_steel.clone());
        h.scene.set_entities(vec![group.clone()]);
        h.controller.load().await.unwrap();
        h.controller.attach(&h.bus);
        filter_material(&h.controller, &["wood"]);
        assert_eq!(h.controller.status().scope_count, 1);
        assert_eq!(h.controller.status().children_count, 2);
        assert!(!h.sink.is_disabled(&inner_steel.id));

        h.scene.set_active_group(Some(group.id));

        wait_for_status(&h.controller, |s| s.scope_count == 1 && s.children_count == 0).await;
        assert_eq!(h.sink.scope(), Some(vec![inner_wood.id]));
        assert!(h.sink.is_disabled(&inner_steel.id));
    }

    #[tokio::test]
    async fn test_engine_toggle() {
        let h = harness();
        h.scene.set_entities(vec![material("wood"), material("steel")]);
        h.controller.load().await.unwrap();
        filter_material(&h.controller, &["wood"]);

        h.controller.set_enabled(false);
        assert!(!h.controller.is_enabled());
        assert_eq!(h.sink.scope(), None);
        assert_eq!(h.controller.status().scope_count, 0);

        h.controller.set_enabled(true);
        assert_eq!(h.controller.status().scope_count, 1);
        assert_eq!(h.controller.phase(), Phase::Published);
    }
}

// =============================================================================
// Persistence & lifecycle
// =============================================================================

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_write_failure_keeps_memory_authoritative() {
        let h = harness();
        h.scene.set_entities(vec![material("wood"), material("steel")]);
        let preset = h.controller.load().await.unwrap();
        h.store.fail_writes(true);

        filter_material(&h.controller, &["wood"]);
        h.controller.wait_for_saves().await;

        assert_eq!(h.controller.status().scope_count, 1);
        assert!(h.controller.preset().unwrap().root_group.conditions().len() == 1);
        let stored = h.store.get(&preset.id).unwrap().unwrap();
        assert!(stored.root_group.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_threshold_is_refused() {
        let h = harness();
        let preset = h.controller.load().await.unwrap();
        let id = h
            .controller
            .add_condition(preset.root_group.id, "height", ValueType::Number)
            .unwrap();
        h.controller.wait_for_saves().await;
        let saves = h.store.save_count();

        let mut condition = h
            .controller
            .preset()
            .unwrap()
            .root_group
            .find_condition(id)
            .unwrap()
            .clone();
        condition.operator = Operator::GreaterThan;
        condition.value = ConditionValue::Number(Some(f64::NAN));
        assert!(!h.controller.update_condition(condition));

        h.controller.wait_for_saves().await;
        assert_eq!(h.store.save_count(), saves);
        let stored = h.store.get(&preset.id).unwrap().unwrap();
        assert_eq!(
            stored.root_group.find_condition(id).unwrap().value,
            ConditionValue::Number(None)
        );
    }

    #[tokio::test]
    async fn test_rename_is_persisted() {
        let h = harness();
        let preset = h.controller.load().await.unwrap();

        assert!(h.controller.rename_preset("Structure only"));
        h.controller.wait_for_saves().await;

        let stored = h.store.get(&preset.id).unwrap().unwrap();
        assert_eq!(stored.name, "Structure only");
    }

    #[tokio::test]
    async fn test_unload_resets_scope_and_stops_listening() {
        let h = harness();
        let steel = material("steel");
        h.scene.set_entities(vec![material("wood"), steel.clone()]);
        h.controller.load().await.unwrap();
        h.controller.attach(&h.bus);
        filter_material(&h.controller, &["wood"]);
        assert!(h.sink.is_disabled(&steel.id));

        h.controller.unload();
        assert_eq!(h.sink.scope(), None);
        assert!(!h.sink.is_disabled(&steel.id));

        let calls = h.sink.scope_calls();
        h.scene.set_entities(vec![material("wood")]);
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.sink.scope_calls(), calls);
        assert!(h.controller.add_group(Uuid::new_v4()).is_none());
        assert_eq!(h.controller.status(), FilterStatus::default());
    }
}
