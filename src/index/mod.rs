//! Attribute key index over the entity tree
//!
//! Feeds the rule-authoring pickers ("which keys exist", "which values does
//! this key take"). Evaluation never reads it.

use crate::core::{AttributeValue, SceneEntity, ValueType};
use indexmap::IndexMap;
use uuid::Uuid;

/// One occurrence of a key on an entity
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedAttribute {
    pub entity_id: Uuid,
    pub value: AttributeValue,
}

/// Mapping from attribute key to the entities that carry it
///
/// Keys and entries keep first-seen order from a pre-order walk of the tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyIndex {
    by_key: IndexMap<String, Vec<IndexedAttribute>>,
}

impl PropertyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over the given roots and all their descendants
    pub fn build(roots: &[SceneEntity]) -> Self {
        let mut index = Self::new();
        index.rebuild(roots);
        index
    }

    /// Drop the previous contents and re-scan the tree
    pub fn rebuild(&mut self, roots: &[SceneEntity]) {
        self.by_key.clear();
        for entity in roots.iter().flat_map(SceneEntity::walk) {
            let Some(attributes) = &entity.attributes else {
                continue;
            };
            for (key, value) in attributes {
                self.by_key
                    .entry(key.clone())
                    .or_default()
                    .push(IndexedAttribute {
                        entity_id: entity.id,
                        value: value.clone(),
                    });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// All known attribute keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    /// Ids of the entities carrying `key`
    pub fn entities_with(&self, key: &str) -> Vec<Uuid> {
        self.by_key
            .get(key)
            .map(|entries| entries.iter().map(|e| e.entity_id).collect())
            .unwrap_or_default()
    }

    /// Distinct values observed for `key`
    pub fn known_values(&self, key: &str) -> Vec<AttributeValue> {
        let mut values: Vec<AttributeValue> = Vec::new();
        for entry in self.by_key.get(key).into_iter().flatten() {
            if !values.contains(&entry.value) {
                values.push(entry.value.clone());
            }
        }
        values
    }

    /// Value type a new condition on `key` should use
    ///
    /// Numbers and booleans are only suggested when every observed value
    /// has that type; anything mixed falls back to string matching.
    pub fn suggested_value_type(&self, key: &str) -> Option<ValueType> {
        let entries = self.by_key.get(key)?;
        let first = entries.first()?.value.value_type();
        if entries.iter().all(|e| e.value.value_type() == first) {
            Some(first)
        } else {
            Some(ValueType::String)
        }
    }
}
