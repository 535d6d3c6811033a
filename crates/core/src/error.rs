use std::fmt;
use thiserror::Error;
use types::{ClassId, SubjectId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid scheduling data: {}", .problems.join("; "))]
pub struct DataIntegrityError {
    pub problems: Vec<String>,
}

impl DataIntegrityError {
    pub fn contains(&self, needle: &str) -> bool {
        self.problems.iter().any(|p| p.contains(needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyDomain {
    NoQualifiedTeacher,
    NoSuitableRoom,
    NoFeasibleSlot,
    NoAdjacentPair,
}

impl fmt::Display for EmptyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EmptyDomain::NoQualifiedTeacher => "no qualified teacher",
            EmptyDomain::NoSuitableRoom => "no room meets capacity and equipment needs",
            EmptyDomain::NoFeasibleSlot => "no slot where class, teacher and room are all free",
            EmptyDomain::NoAdjacentPair => "no two adjacent free periods for the double period",
        })
    }
}

/// A lesson's domain was empty before search started.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("requirement {subject} for class {class} cannot be scheduled: {cause}")]
pub struct ModelInfeasibleError {
    pub class: ClassId,
    pub subject: SubjectId,
    pub cause: EmptyDomain,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("hard constraint {0} does not hold on the extracted solution")]
    HardConstraintBroken(String),
    #[error("{0} lesson units left unplaced in a complete solution")]
    Incomplete(usize),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SolveError {
    #[error(transparent)]
    DataIntegrity(#[from] DataIntegrityError),
    #[error(transparent)]
    ModelInfeasible(#[from] ModelInfeasibleError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_requirement() {
        let err = ModelInfeasibleError {
            class: ClassId::new("7a"),
            subject: SubjectId::new("chemistry"),
            cause: EmptyDomain::NoQualifiedTeacher,
        };
        assert_eq!(
            err.to_string(),
            "requirement chemistry for class 7a cannot be scheduled: no qualified teacher"
        );
        let solve: SolveError = err.into();
        assert!(matches!(solve, SolveError::ModelInfeasible(_)));
    }

    #[test]
    fn integrity_lists_all_problems() {
        let err = DataIntegrityError {
            problems: vec!["duplicate teacher id: t1".into(), "grid is empty".into()],
        };
        assert_eq!(
            err.to_string(),
            "invalid scheduling data: duplicate teacher id: t1; grid is empty"
        );
        assert!(err.contains("grid"));
    }
}
