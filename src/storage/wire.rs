//! JSON wire representation of presets
//!
//! Backends store a flat document:
//!
//! ```json
//! { "id": "…", "name": "Default", "enabled": true, "filters": [
//!   { "id": "…", "type": "group", "groupType": "all", "conditions": [
//!     { "id": "…", "type": "condition", "key": "material", "enabled": true,
//!       "valueType": "string", "operator": "EQUAL", "value": ["wood"] }
//!   ] }
//! ] }
//! ```
//!
//! `filters` holds the root group as its only element. Decoding is strict
//! about shape (value vs. `valueType`, unique ids) so a corrupt document is
//! rejected instead of silently evaluating differently.

use crate::core::{
    ConditionValue, FilterCondition, FilterGroup, FilterItem, FilterPreset, GroupType, Operator,
    ValueType, WireError,
};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

fn default_enabled() -> bool {
    true
}

/// Top-level preset document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetDocument {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub filters: Vec<ItemDocument>,
}

/// A rule-tree node on the wire, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ItemDocument {
    Group(GroupDocument),
    Condition(ConditionDocument),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDocument {
    pub id: Uuid,
    pub group_type: GroupType,
    #[serde(default)]
    pub conditions: Vec<ItemDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDocument {
    pub id: Uuid,
    pub key: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub value_type: ValueType,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// Serialize a preset to its JSON document
///
/// Fails on non-finite numbers, which JSON cannot represent.
pub fn encode(preset: &FilterPreset) -> Result<String, WireError> {
    if let Some(condition) = preset
        .root_group
        .conditions()
        .into_iter()
        .find(|condition| !condition.value.is_valid())
    {
        let value = match &condition.value {
            ConditionValue::Number(Some(n)) => n.to_string(),
            _ => String::new(),
        };
        return Err(WireError::ValueMismatch {
            id: condition.id,
            value_type: condition.value_type().to_string(),
            value,
        });
    }
    Ok(serde_json::to_string(&PresetDocument::from(preset))?)
}

/// Parse and validate a JSON preset document
pub fn decode(json: &str) -> Result<FilterPreset, WireError> {
    let document: PresetDocument = serde_json::from_str(json)?;
    FilterPreset::try_from(document)
}

impl From<&FilterPreset> for PresetDocument {
    fn from(preset: &FilterPreset) -> Self {
        Self {
            id: preset.id,
            name: preset.name.clone(),
            enabled: preset.enabled,
            filters: vec![ItemDocument::Group(GroupDocument::from(&preset.root_group))],
        }
    }
}

impl From<&FilterGroup> for GroupDocument {
    fn from(group: &FilterGroup) -> Self {
        Self {
            id: group.id,
            group_type: group.group_type,
            conditions: group.children.values().map(ItemDocument::from).collect(),
        }
    }
}

impl From<&FilterItem> for ItemDocument {
    fn from(item: &FilterItem) -> Self {
        match item {
            FilterItem::Group(group) => ItemDocument::Group(group.into()),
            FilterItem::Condition(condition) => ItemDocument::Condition(condition.into()),
        }
    }
}

impl From<&FilterCondition> for ConditionDocument {
    fn from(condition: &FilterCondition) -> Self {
        let value = match &condition.value {
            ConditionValue::Strings(set) => {
                Value::Array(set.iter().cloned().map(Value::String).collect())
            }
            ConditionValue::Number(n) => n
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ConditionValue::Boolean(b) => b.map(Value::Bool).unwrap_or(Value::Null),
        };
        Self {
            id: condition.id,
            key: condition.key.clone(),
            enabled: condition.enabled,
            value_type: condition.value_type(),
            operator: condition.operator,
            value,
        }
    }
}

impl TryFrom<PresetDocument> for FilterPreset {
    type Error = WireError;

    fn try_from(document: PresetDocument) -> Result<Self, Self::Error> {
        let PresetDocument {
            id,
            name,
            enabled,
            mut filters,
        } = document;

        let root_group = match (filters.len(), filters.pop()) {
            (0, _) => FilterGroup::default(),
            (1, Some(ItemDocument::Group(root))) => {
                let mut seen = HashSet::new();
                decode_group(root, &mut seen)?
            }
            (found, _) => {
                return Err(WireError::RootShape {
                    preset_id: id,
                    found,
                });
            }
        };

        Ok(FilterPreset {
            id,
            name,
            enabled,
            root_group,
        })
    }
}

fn claim(id: Uuid, seen: &mut HashSet<Uuid>) -> Result<(), WireError> {
    if seen.insert(id) {
        Ok(())
    } else {
        Err(WireError::DuplicateId(id))
    }
}

fn decode_group(
    document: GroupDocument,
    seen: &mut HashSet<Uuid>,
) -> Result<FilterGroup, WireError> {
    claim(document.id, seen)?;
    let mut children = IndexMap::with_capacity(document.conditions.len());
    for item in document.conditions {
        let item = match item {
            ItemDocument::Group(group) => FilterItem::Group(decode_group(group, seen)?),
            ItemDocument::Condition(condition) => {
                FilterItem::Condition(decode_condition(condition, seen)?)
            }
        };
        children.insert(item.id(), item);
    }
    Ok(FilterGroup {
        id: document.id,
        group_type: document.group_type,
        children,
    })
}

fn decode_condition(
    document: ConditionDocument,
    seen: &mut HashSet<Uuid>,
) -> Result<FilterCondition, WireError> {
    claim(document.id, seen)?;
    let mismatch = || WireError::ValueMismatch {
        id: document.id,
        value_type: document.value_type.to_string(),
        value: document.value.to_string(),
    };

    let value = match (document.value_type, &document.value) {
        (ValueType::String, Value::Null) => ConditionValue::Strings(IndexSet::new()),
        // Older documents store a single accepted string as a scalar
        (ValueType::String, Value::String(s)) => ConditionValue::strings([s.as_str()]),
        (ValueType::String, Value::Array(values)) => {
            let mut set = IndexSet::with_capacity(values.len());
            for value in values {
                set.insert(value.as_str().ok_or_else(mismatch)?.to_string());
            }
            ConditionValue::Strings(set)
        }
        (ValueType::Number, Value::Null) => ConditionValue::Number(None),
        (ValueType::Number, Value::Number(n)) => ConditionValue::Number(n.as_f64()),
        (ValueType::Boolean, Value::Null) => ConditionValue::Boolean(None),
        (ValueType::Boolean, Value::Bool(b)) => ConditionValue::Boolean(Some(*b)),
        _ => return Err(mismatch()),
    };

    Ok(FilterCondition {
        id: document.id,
        key: document.key,
        enabled: document.enabled,
        operator: document.operator,
        value,
    })
}
