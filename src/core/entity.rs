//! Scene entities as seen by the filter engine
//!
//! The scene graph itself belongs to the viewer. The engine only ever reads
//! this shape: a stable id, optional children and an optional attribute map.

use crate::core::value::AttributeValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A node of the scene graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntity {
    /// Stable identifier assigned by the scene graph
    pub id: Uuid,

    /// Child entities, in scene order
    #[serde(default)]
    pub children: Vec<SceneEntity>,

    /// Attribute metadata, absent for entities that carry none
    #[serde(default)]
    pub attributes: Option<IndexMap<String, AttributeValue>>,
}

impl SceneEntity {
    /// Create a leaf entity without attributes
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            children: Vec::new(),
            attributes: None,
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.attributes
            .get_or_insert_with(IndexMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Builder-style child setter
    pub fn with_child(mut self, child: SceneEntity) -> Self {
        self.children.push(child);
        self
    }

    /// Read an attribute, `None` when the entity does not carry it
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(key))
    }

    /// Whether the entity carries at least one attribute
    pub fn has_attributes(&self) -> bool {
        self.attributes.as_ref().is_some_and(|attrs| !attrs.is_empty())
    }

    /// Pre-order walk over this entity and all of its descendants
    pub fn walk(&self) -> impl Iterator<Item = &SceneEntity> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Find an entity by id in this subtree
    pub fn find(&self, id: Uuid) -> Option<&SceneEntity> {
        self.walk().find(|entity| entity.id == id)
    }
}
