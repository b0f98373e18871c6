//! Resolution of a rule and its steps against one aggregated object.
//!
//! Two phases per object:
//!
//! 1. **Override scan.** `keep` steps are checked in ascending order,
//!    independently of the root. The first one that matches blocks the
//!    object for the whole cycle.
//! 2. **Collection.** Root actions when the root matched, then each step's
//!    action in ascending order. `AND` steps need the root to have matched;
//!    `OR` steps stand alone. Nothing is de-duplicated.

use serde::{Deserialize, Serialize};

use super::{Action, MetricSource, Rule, StepLogic};
use crate::id::StepId;

/// Where a collected action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSource {
    Root,
    Step { id: StepId, order: u32 },
}

/// An action selected for execution on one object.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAction {
    pub action: Action,
    pub source: ActionSource,
}

/// Outcome of resolving a rule for one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A `keep` step matched; no action runs this cycle.
    Blocked { step_id: StepId, order: u32 },
    /// Actions to run, in order. Empty when nothing matched.
    Actions(Vec<PlannedAction>),
}

impl Resolution {
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }

    #[must_use]
    pub fn planned(&self) -> &[PlannedAction] {
        match self {
            Self::Blocked { .. } => &[],
            Self::Actions(actions) => actions,
        }
    }
}

/// Resolve `rule` against `object`.
#[must_use]
pub fn resolve(rule: &Rule, object: &impl MetricSource) -> Resolution {
    let steps = rule.sorted_steps();

    if let Some(guard) = steps
        .iter()
        .find(|step| step.action.is_keep() && step.matches(object))
    {
        return Resolution::Blocked {
            step_id: guard.id,
            order: guard.order,
        };
    }

    let root_matched = rule.root_matches(object);
    let mut planned = Vec::new();

    if root_matched {
        planned.extend(
            rule.actions
                .iter()
                .filter(|action| !action.is_keep())
                .map(|action| PlannedAction {
                    action: action.clone(),
                    source: ActionSource::Root,
                }),
        );
    }

    for step in steps {
        if step.action.is_keep() {
            continue;
        }
        if step.logic == StepLogic::And && !root_matched {
            continue;
        }
        if step.matches(object) {
            planned.push(PlannedAction {
                action: step.action.clone(),
                source: ActionSource::Step {
                    id: step.id,
                    order: step.order,
                },
            });
        }
    }

    Resolution::Actions(planned)
}
