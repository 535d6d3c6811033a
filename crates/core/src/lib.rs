pub mod assignment;
pub mod cancel;
pub mod config;
pub mod constraints;
pub mod error;
pub mod model;
pub mod provider;
pub mod scoring;
pub mod slots;
pub mod snapshot;

pub use assignment::{PartialAssignment, Placement};
pub use cancel::CancelToken;
pub use config::{BusyPolicy, ConfigError, EngineConfig, JobSettings, SolverSettings};
pub use constraints::{Constraint, Registry, Strength};
pub use error::{
    DataIntegrityError, EmptyDomain, ExtractionError, LoadError, ModelInfeasibleError, SolveError,
};
pub use model::{LessonUnit, Model, UnitIdx};
pub use provider::{DataProvider, Dataset, InMemoryProvider};
pub use scoring::{compute_soft_scores, Scores};
pub use slots::{SlotIdx, SlotSet, MAX_SLOTS};
pub use snapshot::{ClassIdx, RoomIdx, Snapshot, SnapshotParts, SubjectIdx, TeacherIdx};

pub use types::{ConstraintWeights, Schedule, ScheduleId, SolveParams, SolveResult};

/// A search strategy over a loaded snapshot. Solving is CPU-bound and
/// synchronous; callers run it on a blocking thread.
pub trait Solver: Send + Sync + 'static {
    fn solve(
        &self,
        snapshot: &Snapshot,
        weights: &ConstraintWeights,
        params: &SolveParams,
        cancel: &CancelToken,
    ) -> Result<SolveResult, SolveError>;
}
