//! # view-filter
//!
//! A hierarchical attribute-filter engine for scene graphs.
//!
//! Users author a rule tree (a *preset*) of `all`/`any` groups and attribute
//! conditions. The engine evaluates it against a live entity tree and turns
//! the result into a cascading scope: an entity that matches is admitted, and
//! everything below it comes along without being tested again.
//!
//! ## Features
//!
//! - **Rule Model**: groups and conditions keyed by id, mutated in place
//! - **Pure Evaluation**: `matches(entity, item)` never fails; bad types don't match
//! - **Cascading Scope**: admitted roots vs. cascaded children, with visual enable/disable
//! - **Property Index**: attribute keys and known values for authoring pickers
//! - **Controller**: re-evaluates on scene, selection and rule changes; saves fire-and-forget
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use view_filter::prelude::*;
//!
//! let config = FilterConfig::from_yaml_str("scene_id: warehouse")?;
//! let bus = config.event_bus();
//! let scene = InMemoryScene::new(bus.clone());
//! let controller = Arc::new(FilterController::new(
//!     config,
//!     Arc::new(InMemoryPresetStore::new()),
//!     Arc::new(scene.clone()),
//!     Arc::new(RecordingScopeSink::new()),
//! ));
//!
//! let preset = controller.load().await.expect("preset");
//! controller.attach(&bus);
//!
//! let id = controller
//!     .add_condition(preset.root_group.id, "material", ValueType::String)
//!     .expect("condition");
//! ```

pub mod config;
pub mod controller;
pub mod core;
pub mod index;
pub mod scene;
pub mod storage;
pub mod traversal;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Rule model & evaluation ===
    pub use crate::core::{
        AttributeValue, ConditionValue, FilterCondition, FilterGroup, FilterItem, FilterPreset,
        GroupType, Operator, SceneEntity, ValueType, matches,
    };

    // === Collaborator traits ===
    pub use crate::core::{PresetGateway, SceneGraph, ScopeSink};

    // === Events & errors ===
    pub use crate::core::{EventBus, EventEnvelope, FilterError, SceneEvent, WireError};

    // === Engine ===
    pub use crate::controller::{FilterController, FilterStatus, Phase};
    pub use crate::index::PropertyIndex;
    pub use crate::traversal::CascadeOutcome;

    // === Adapters ===
    pub use crate::scene::{InMemoryScene, RecordingScopeSink};
    pub use crate::storage::InMemoryPresetStore;

    // === Config ===
    pub use crate::config::FilterConfig;

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
    pub use uuid::Uuid;
}
