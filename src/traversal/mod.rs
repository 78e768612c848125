//! Cascading scope traversal
//!
//! Walks the entity tree top-down and turns rule results into a scope. Once
//! an entity is admitted, its whole subtree is inside the filter: descendants
//! are counted as cascaded children and are not tested again.
//!
//! ```text
//! matches  ancestor_in_scope   outcome
//!   yes          no            in_scope (marked enabled)
//!   any          yes           cascaded_children
//!   no           no            disabled
//! ```

use crate::core::{FilterGroup, SceneEntity};
use uuid::Uuid;

/// Result of one traversal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeOutcome {
    /// Entities admitted on their own merit, in pre-order
    pub in_scope: Vec<Uuid>,
    /// Entities admitted only because an ancestor was admitted
    pub cascaded_children: Vec<Uuid>,
    /// Entities outside the filter
    pub disabled: Vec<Uuid>,
    /// How many times the rule tree was evaluated
    pub evaluations: usize,
}

impl CascadeOutcome {
    /// Published as the "current scope count"
    pub fn scope_count(&self) -> usize {
        self.in_scope.len()
    }

    /// Published as the "children count"
    pub fn children_count(&self) -> usize {
        self.cascaded_children.len()
    }
}

/// Run the cascade over `roots` against `root_group`
pub fn run(roots: &[SceneEntity], root_group: &FilterGroup) -> CascadeOutcome {
    let mut outcome = CascadeOutcome::default();
    for root in roots {
        visit(root, false, root_group, &mut outcome);
    }
    outcome
}

fn visit(
    entity: &SceneEntity,
    ancestor_in_scope: bool,
    root_group: &FilterGroup,
    outcome: &mut CascadeOutcome,
) {
    let in_scope = if ancestor_in_scope {
        outcome.cascaded_children.push(entity.id);
        true
    } else {
        outcome.evaluations += 1;
        if root_group.evaluate(entity) {
            outcome.in_scope.push(entity.id);
            true
        } else {
            outcome.disabled.push(entity.id);
            false
        }
    };

    for child in &entity.children {
        visit(child, in_scope, root_group, outcome);
    }
}
