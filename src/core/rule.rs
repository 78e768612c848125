//! Rule tree data model
//!
//! A [`FilterPreset`] owns a root [`FilterGroup`]. Groups combine their
//! children with `all`/`any`; [`FilterCondition`]s are the leaf predicates.
//! Children are kept in an insertion-ordered map keyed by id so the authoring
//! UI gets a stable listing while add/remove stay O(1).
//!
//! Nodes never point back at their parent. Anything that needs a parent
//! addresses it by id through [`FilterGroup::find_group_mut`].

use crate::core::value::ValueType;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Boolean combinator of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    /// Conjunction
    #[default]
    All,
    /// Disjunction
    Any,
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    #[default]
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    Defined,
}

/// The comparison value of a condition, discriminated by value type
///
/// String conditions always carry a set of accepted strings. Scalars are
/// optional: an unset scalar turns the condition into an existence check.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Strings(IndexSet<String>),
    Number(Option<f64>),
    Boolean(Option<bool>),
}

impl ConditionValue {
    /// The initial value for a freshly created condition
    pub fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::String => ConditionValue::Strings(IndexSet::new()),
            ValueType::Number => ConditionValue::Number(None),
            ValueType::Boolean => ConditionValue::Boolean(None),
        }
    }

    /// Build a string-set value
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConditionValue::Strings(values.into_iter().map(Into::into).collect())
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            ConditionValue::Strings(_) => ValueType::String,
            ConditionValue::Number(_) => ValueType::Number,
            ConditionValue::Boolean(_) => ValueType::Boolean,
        }
    }

    /// Whether the value can be stored and compared: numbers must be finite
    pub fn is_valid(&self) -> bool {
        match self {
            ConditionValue::Number(Some(n)) => n.is_finite(),
            _ => true,
        }
    }

    /// Whether the value carries nothing to compare against
    pub fn is_unset(&self) -> bool {
        match self {
            ConditionValue::Strings(set) => set.is_empty(),
            ConditionValue::Number(n) => n.is_none(),
            ConditionValue::Boolean(b) => b.is_none(),
        }
    }
}

/// A leaf predicate testing one attribute key
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub id: Uuid,
    pub key: String,
    /// Disabled conditions stay in the tree but never exclude anything
    pub enabled: bool,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl FilterCondition {
    /// Create an enabled `EQUAL` condition with an empty value
    pub fn new(key: &str, value_type: ValueType) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.to_string(),
            enabled: true,
            operator: Operator::Equal,
            value: ConditionValue::empty(value_type),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    /// The operator actually applied: `DEFINED` whenever there is no value
    pub fn effective_operator(&self) -> Operator {
        if self.value.is_unset() {
            Operator::Defined
        } else {
            self.operator
        }
    }
}

/// A boolean combinator over child items
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    pub id: Uuid,
    pub group_type: GroupType,
    pub children: IndexMap<Uuid, FilterItem>,
}

impl Default for FilterGroup {
    fn default() -> Self {
        Self::new(GroupType::All)
    }
}

impl FilterGroup {
    pub fn new(group_type: GroupType) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_type,
            children: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Append a new condition and return its id
    pub fn add_condition(&mut self, key: &str, value_type: ValueType) -> Uuid {
        let condition = FilterCondition::new(key, value_type);
        let id = condition.id;
        self.children.insert(id, FilterItem::Condition(condition));
        id
    }

    /// Append a new empty `all` group and return its id
    pub fn add_group(&mut self) -> Uuid {
        let group = FilterGroup::new(GroupType::All);
        let id = group.id;
        self.children.insert(id, FilterItem::Group(group));
        id
    }

    /// Remove a direct child, returning it if it was present
    pub fn remove_item(&mut self, id: Uuid) -> Option<FilterItem> {
        self.children.shift_remove(&id)
    }

    /// Mutable access to the direct child group `id`
    pub fn child_group_mut(&mut self, id: Uuid) -> Option<&mut FilterGroup> {
        match self.children.get_mut(&id) {
            Some(FilterItem::Group(group)) => Some(group),
            _ => None,
        }
    }

    /// Replace a condition anywhere in this subtree
    ///
    /// Returns `false` when no condition with that id exists or when its
    /// value is not valid (a non-finite number).
    pub fn update_condition(&mut self, condition: FilterCondition) -> bool {
        if !condition.value.is_valid() {
            return false;
        }
        match self.find_condition_mut(condition.id) {
            Some(existing) => {
                *existing = condition;
                true
            }
            None => false,
        }
    }

    /// Find a group by id in this subtree, including `self`
    pub fn find_group(&self, id: Uuid) -> Option<&FilterGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.values().find_map(|child| match child {
            FilterItem::Group(group) => group.find_group(id),
            FilterItem::Condition(_) => None,
        })
    }

    /// Mutable variant of [`FilterGroup::find_group`]
    pub fn find_group_mut(&mut self, id: Uuid) -> Option<&mut FilterGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.values_mut().find_map(|child| match child {
            FilterItem::Group(group) => group.find_group_mut(id),
            FilterItem::Condition(_) => None,
        })
    }

    /// Find a condition by id in this subtree
    pub fn find_condition(&self, id: Uuid) -> Option<&FilterCondition> {
        self.children.values().find_map(|child| match child {
            FilterItem::Condition(condition) if condition.id == id => Some(condition),
            FilterItem::Condition(_) => None,
            FilterItem::Group(group) => group.find_condition(id),
        })
    }

    pub fn find_condition_mut(&mut self, id: Uuid) -> Option<&mut FilterCondition> {
        self.children.values_mut().find_map(|child| match child {
            FilterItem::Condition(condition) if condition.id == id => Some(condition),
            FilterItem::Condition(_) => None,
            FilterItem::Group(group) => group.find_condition_mut(id),
        })
    }

    /// Whether any node in this subtree (including `self`) has this id
    pub fn contains(&self, id: Uuid) -> bool {
        self.id == id
            || self.children.values().any(|child| match child {
                FilterItem::Group(group) => group.contains(id),
                FilterItem::Condition(condition) => condition.id == id,
            })
    }

    /// Whether every node of this subtree (including `self`) has a distinct id
    pub fn has_unique_ids(&self) -> bool {
        self.claim_ids(&mut HashSet::new())
    }

    fn claim_ids(&self, seen: &mut HashSet<Uuid>) -> bool {
        seen.insert(self.id)
            && self.children.values().all(|child| match child {
                FilterItem::Group(group) => group.claim_ids(seen),
                FilterItem::Condition(condition) => seen.insert(condition.id),
            })
    }

    /// Every condition of this subtree, depth-first
    pub fn conditions(&self) -> Vec<&FilterCondition> {
        let mut out = Vec::new();
        for child in self.children.values() {
            match child {
                FilterItem::Condition(condition) => out.push(condition),
                FilterItem::Group(group) => out.extend(group.conditions()),
            }
        }
        out
    }
}

/// A node of the rule tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterItem {
    Group(FilterGroup),
    Condition(FilterCondition),
}

impl FilterItem {
    pub fn id(&self) -> Uuid {
        match self {
            FilterItem::Group(group) => group.id,
            FilterItem::Condition(condition) => condition.id,
        }
    }

    pub fn as_group(&self) -> Option<&FilterGroup> {
        match self {
            FilterItem::Group(group) => Some(group),
            FilterItem::Condition(_) => None,
        }
    }

    pub fn as_condition(&self) -> Option<&FilterCondition> {
        match self {
            FilterItem::Condition(condition) => Some(condition),
            FilterItem::Group(_) => None,
        }
    }
}

impl From<FilterGroup> for FilterItem {
    fn from(group: FilterGroup) -> Self {
        FilterItem::Group(group)
    }
}

impl From<FilterCondition> for FilterItem {
    fn from(condition: FilterCondition) -> Self {
        FilterItem::Condition(condition)
    }
}

/// The persisted, user-facing rule tree of a scene
#[derive(Debug, Clone, PartialEq)]
pub struct FilterPreset {
    /// Assigned by persistence
    pub id: Uuid,
    pub name: String,
    /// Master on/off switch
    pub enabled: bool,
    pub root_group: FilterGroup,
}

impl FilterPreset {
    /// Create an enabled preset with an empty `all` root
    pub fn new(id: Uuid, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            enabled: true,
            root_group: FilterGroup::default(),
        }
    }

    /// Replace a group in place
    ///
    /// With no parent the group becomes the new root. Otherwise it replaces
    /// the direct child of `parent` carrying the same id. Returns `false`,
    /// leaving the tree untouched, when there is no such child or when the
    /// result would hold two nodes with one id.
    pub fn update_group(&mut self, parent: Option<Uuid>, group: FilterGroup) -> bool {
        let Some(parent_id) = parent else {
            if !group.has_unique_ids() {
                return false;
            }
            self.root_group = group;
            return true;
        };

        let id = group.id;
        let Some(slot) = self.group_slot(parent_id, id) else {
            return false;
        };
        let previous = std::mem::replace(slot, group);
        if self.root_group.has_unique_ids() {
            return true;
        }
        if let Some(slot) = self.group_slot(parent_id, id) {
            *slot = previous;
        }
        false
    }

    fn group_slot(&mut self, parent_id: Uuid, id: Uuid) -> Option<&mut FilterGroup> {
        self.root_group
            .find_group_mut(parent_id)?
            .child_group_mut(id)
    }
}
