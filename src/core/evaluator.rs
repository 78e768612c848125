//! Rule evaluation
//!
//! [`matches`] decides whether one entity satisfies one rule-tree node. It is
//! pure: the result depends only on its two arguments and nothing here can
//! fail. Type mismatches between the entity attribute and the condition
//! value simply do not match.

use crate::core::entity::SceneEntity;
use crate::core::rule::{
    ConditionValue, FilterCondition, FilterGroup, FilterItem, GroupType, Operator,
};
use crate::core::value::AttributeValue;
use indexmap::IndexSet;

/// Whether `entity` satisfies `item`
pub fn matches(entity: &SceneEntity, item: &FilterItem) -> bool {
    match item {
        FilterItem::Group(group) => group.evaluate(entity),
        FilterItem::Condition(condition) => condition.evaluate(entity),
    }
}

impl FilterGroup {
    /// Evaluate this group against an entity
    ///
    /// An empty group is vacuously true.
    pub fn evaluate(&self, entity: &SceneEntity) -> bool {
        if self.children.is_empty() {
            return true;
        }
        let mut children = self.children.values();
        match self.group_type {
            GroupType::All => children.all(|child| matches(entity, child)),
            GroupType::Any => children.any(|child| matches(entity, child)),
        }
    }
}

impl FilterCondition {
    /// Evaluate this condition against an entity
    pub fn evaluate(&self, entity: &SceneEntity) -> bool {
        if !self.enabled {
            return true;
        }
        let actual = entity.attribute(&self.key);
        let operator = self.effective_operator();
        match &self.value {
            ConditionValue::Strings(accepted) => evaluate_set(operator, accepted, actual),
            ConditionValue::Number(expected) => {
                let expected = expected.map(AttributeValue::Number);
                evaluate_scalar(operator, expected.as_ref(), actual)
            }
            ConditionValue::Boolean(expected) => {
                let expected = expected.map(AttributeValue::Boolean);
                evaluate_scalar(operator, expected.as_ref(), actual)
            }
        }
    }
}

fn evaluate_set(
    operator: Operator,
    accepted: &IndexSet<String>,
    actual: Option<&AttributeValue>,
) -> bool {
    let contains = |value: &AttributeValue| value.as_str().is_some_and(|s| accepted.contains(s));
    match (operator, actual) {
        (Operator::Defined, actual) => actual.is_some(),
        (Operator::Equal, Some(value)) => contains(value),
        (Operator::NotEqual, Some(value)) => !contains(value),
        _ => false,
    }
}

fn evaluate_scalar(
    operator: Operator,
    expected: Option<&AttributeValue>,
    actual: Option<&AttributeValue>,
) -> bool {
    match operator {
        Operator::Defined => actual.is_some(),
        Operator::Equal => actual == expected,
        Operator::NotEqual => actual != expected,
        Operator::GreaterThan => compare_numbers(expected, actual, |a, e| a > e),
        Operator::LessThan => compare_numbers(expected, actual, |a, e| a < e),
    }
}

fn compare_numbers<F>(
    expected: Option<&AttributeValue>,
    actual: Option<&AttributeValue>,
    cmp: F,
) -> bool
where
    F: Fn(f64, f64) -> bool,
{
    match (
        actual.and_then(AttributeValue::as_number),
        expected.and_then(AttributeValue::as_number),
    ) {
        (Some(actual), Some(expected)) => cmp(actual, expected),
        _ => false,
    }
}
