//! Core module containing the rule model, evaluation and collaborator traits

pub mod entity;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod rule;
pub mod service;
pub mod value;

pub use entity::SceneEntity;
pub use error::{FilterError, WireError};
pub use evaluator::matches;
pub use events::{EventBus, EventEnvelope, SceneEvent};
pub use rule::{
    ConditionValue, FilterCondition, FilterGroup, FilterItem, FilterPreset, GroupType, Operator,
};
pub use service::{PresetGateway, SceneGraph, ScopeSink};
pub use value::{AttributeValue, ValueType};
