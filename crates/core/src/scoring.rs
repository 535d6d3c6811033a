use std::collections::BTreeMap;
use types::ConstraintViolation;

use crate::assignment::PartialAssignment;
use crate::constraints::Registry;
use crate::model::Model;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scores {
    /// Summed weighted soft penalty; 0 is ideal.
    pub objective: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub violations: Vec<ConstraintViolation>,
}

pub fn compute_soft_scores(
    model: &Model<'_>,
    registry: &Registry,
    asg: &PartialAssignment,
) -> Scores {
    let mut breakdown = BTreeMap::new();
    let mut violations = Vec::new();
    let mut objective = 0.0;
    for c in registry.soft() {
        let p = c.penalty(model, asg);
        objective += p;
        breakdown.insert(c.id().to_string(), p);
        if p > 0.0 {
            violations.extend(c.violations(model, asg));
        }
    }
    Scores {
        objective,
        breakdown,
        violations,
    }
}

pub fn total_penalty(model: &Model<'_>, registry: &Registry, asg: &PartialAssignment) -> f64 {
    registry.soft().map(|c| c.penalty(model, asg)).sum()
}

pub fn broken_hard_constraints(
    model: &Model<'_>,
    registry: &Registry,
    asg: &PartialAssignment,
) -> Vec<&'static str> {
    registry
        .hard()
        .filter(|c| !c.is_satisfied(model, asg))
        .map(|c| c.id())
        .collect()
}
