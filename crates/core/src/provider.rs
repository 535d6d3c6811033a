use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use types::{
    Assignment, ClassGroup, ConstraintWeights, Room, ScheduleId, Subject, Teacher, WeekGrid,
};

/// Read side of the persistence collaborator. A solve only ever reads.
#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    async fn load_grid(&self) -> anyhow::Result<WeekGrid>;
    async fn load_teachers(&self) -> anyhow::Result<Vec<Teacher>>;
    async fn load_subjects(&self) -> anyhow::Result<Vec<Subject>>;
    async fn load_class_groups(&self) -> anyhow::Result<Vec<ClassGroup>>;
    async fn load_rooms(&self) -> anyhow::Result<Vec<Room>>;
    async fn load_locked_assignments(&self, schedule: &ScheduleId)
        -> anyhow::Result<Vec<Assignment>>;
    async fn load_constraint_weights(&self, schedule: &ScheduleId)
        -> anyhow::Result<ConstraintWeights>;

    /// Version of the schedule currently persisted, 0 if none.
    async fn load_schedule_version(&self, _schedule: &ScheduleId) -> anyhow::Result<u32> {
        Ok(0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub grid: WeekGrid,
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<ClassGroup>,
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub locked: Vec<Assignment>,
    #[serde(default)]
    pub weights: Option<ConstraintWeights>,
    #[serde(default)]
    pub version: u32,
}

impl Dataset {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// [`DataProvider`] over an in-memory [`Dataset`]; the same data is served
/// for every schedule id.
#[derive(Clone, Debug)]
pub struct InMemoryProvider {
    dataset: Dataset,
}

impl InMemoryProvider {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

#[async_trait]
impl DataProvider for InMemoryProvider {
    async fn load_grid(&self) -> anyhow::Result<WeekGrid> {
        Ok(self.dataset.grid.clone())
    }

    async fn load_teachers(&self) -> anyhow::Result<Vec<Teacher>> {
        Ok(self.dataset.teachers.clone())
    }

    async fn load_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        Ok(self.dataset.subjects.clone())
    }

    async fn load_class_groups(&self) -> anyhow::Result<Vec<ClassGroup>> {
        Ok(self.dataset.classes.clone())
    }

    async fn load_rooms(&self) -> anyhow::Result<Vec<Room>> {
        Ok(self.dataset.rooms.clone())
    }

    async fn load_locked_assignments(
        &self,
        _schedule: &ScheduleId,
    ) -> anyhow::Result<Vec<Assignment>> {
        Ok(self.dataset.locked.clone())
    }

    async fn load_constraint_weights(
        &self,
        _schedule: &ScheduleId,
    ) -> anyhow::Result<ConstraintWeights> {
        Ok(self.dataset.weights.clone().unwrap_or_default())
    }

    async fn load_schedule_version(&self, _schedule: &ScheduleId) -> anyhow::Result<u32> {
        Ok(self.dataset.version)
    }
}
