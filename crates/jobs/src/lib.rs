//! Background solve jobs: submit, poll, cancel.
//!
//! Solves run on tokio's blocking pool behind a semaphore of
//! `JobSettings::max_concurrent` permits. A schedule id has at most one active
//! solve; further submissions are rejected or queued per [`BusyPolicy`].
//! Finished jobs are dropped `JobSettings::retain_finished_ms` after they end.

use parking_lot::{Mutex, RwLock};
use sched_core::{BusyPolicy, CancelToken, DataProvider, JobSettings, Snapshot, Solver};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};
use types::{ScheduleId, SolveParams, SolveResult};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "job", content = "data", rename_all = "snake_case")]
pub enum SolvePoll {
    InProgress { state: JobState },
    Finished(SolveResult),
    Failed { message: String },
}

impl SolvePoll {
    pub fn is_done(&self) -> bool {
        !matches!(self, SolvePoll::InProgress { .. })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("schedule {schedule_id} already has a solve in progress")]
    Busy { schedule_id: ScheduleId },
}

struct Job {
    schedule: ScheduleId,
    status: SolvePoll,
    cancel: CancelToken,
    finished_at: Option<Instant>,
}

type ScheduleLocks = Mutex<HashMap<ScheduleId, Arc<tokio::sync::Mutex<()>>>>;

/// Frees the schedule's busy mark when the job ends, panics included.
struct ActiveGuard {
    active: Arc<Mutex<HashSet<ScheduleId>>>,
    schedule: ScheduleId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.schedule);
    }
}

pub struct SolveJobs<P: DataProvider, S: Solver> {
    provider: Arc<P>,
    solver: Arc<S>,
    settings: JobSettings,
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    active: Arc<Mutex<HashSet<ScheduleId>>>,
    schedule_locks: Arc<ScheduleLocks>,
    permits: Arc<Semaphore>,
}

impl<P: DataProvider, S: Solver> Clone for SolveJobs<P, S> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            solver: self.solver.clone(),
            settings: self.settings.clone(),
            jobs: self.jobs.clone(),
            active: self.active.clone(),
            schedule_locks: self.schedule_locks.clone(),
            permits: self.permits.clone(),
        }
    }
}

impl<P: DataProvider, S: Solver> SolveJobs<P, S> {
    pub fn new(provider: Arc<P>, solver: Arc<S>, settings: JobSettings) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent.max(1)));
        Self {
            provider,
            solver,
            settings,
            jobs: Default::default(),
            active: Default::default(),
            schedule_locks: Default::default(),
            permits,
        }
    }

    /// Starts a solve in the background and returns immediately.
    /// Must be called from within a tokio runtime.
    pub fn submit_solve(
        &self,
        schedule_id: ScheduleId,
        params: SolveParams,
    ) -> Result<JobId, SubmitError> {
        self.evict_expired();
        if self.settings.on_busy == BusyPolicy::Reject
            && !self.active.lock().insert(schedule_id.clone())
        {
            return Err(SubmitError::Busy { schedule_id });
        }
        let guard = ActiveGuard {
            active: self.active.clone(),
            schedule: schedule_id.clone(),
        };

        let id = JobId(Uuid::new_v4().to_string());
        let cancel = CancelToken::new();
        self.jobs.write().insert(
            id.clone(),
            Job {
                schedule: schedule_id.clone(),
                status: SolvePoll::InProgress {
                    state: JobState::Queued,
                },
                cancel: cancel.clone(),
                finished_at: None,
            },
        );
        info!(job = %id, schedule = %schedule_id, "solve submitted");

        let this = self.clone();
        let job = id.clone();
        tokio::spawn(async move {
            let worker = this.clone();
            let worker_job = job.clone();
            let schedule = schedule_id.clone();
            let status = match tokio::spawn(async move {
                worker.execute(&worker_job, &schedule, params, cancel).await
            })
            .await
            {
                Ok(status) => status,
                Err(e) => {
                    error!(?e, job = %job, "solve task aborted");
                    SolvePoll::Failed {
                        message: format!("solve task aborted: {e}"),
                    }
                }
            };
            drop(guard);
            this.release_schedule_lock(&schedule_id);
            this.set_status(&job, status);
        });

        Ok(id)
    }

    pub fn poll_solve(&self, id: &JobId) -> Option<SolvePoll> {
        self.evict_expired();
        self.jobs.read().get(id).map(|j| j.status.clone())
    }

    /// Requests cooperative cancellation; the job still finishes with a
    /// (timed out) result. Returns `false` for unknown or finished jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        match self.jobs.read().get(id) {
            Some(job) if !job.status.is_done() => {
                info!(job = %id, schedule = %job.schedule, "cancel requested");
                job.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Polls until the job leaves the in-progress states.
    pub async fn wait(&self, id: &JobId, every: Duration) -> Option<SolvePoll> {
        loop {
            let poll = self.poll_solve(id)?;
            if poll.is_done() {
                return Some(poll);
            }
            tokio::time::sleep(every).await;
        }
    }

    async fn execute(
        &self,
        job: &JobId,
        schedule: &ScheduleId,
        params: SolveParams,
        cancel: CancelToken,
    ) -> SolvePoll {
        let lock = self.schedule_lock(schedule);
        let _schedule = lock.lock().await;
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                return SolvePoll::Failed {
                    message: e.to_string(),
                }
            }
        };
        self.set_status(
            job,
            SolvePoll::InProgress {
                state: JobState::Running,
            },
        );
        debug!(job = %job, "solve running");
        match self.run(schedule, params, cancel).await {
            Ok(result) => {
                info!(job = %job, status = result.status(), "solve finished");
                SolvePoll::Finished(result)
            }
            Err(e) => {
                error!(?e, job = %job, "job failed");
                SolvePoll::Failed {
                    message: format!("{e:#}"),
                }
            }
        }
    }

    fn schedule_lock(&self, schedule: &ScheduleId) -> Arc<tokio::sync::Mutex<()>> {
        self.schedule_locks
            .lock()
            .entry(schedule.clone())
            .or_default()
            .clone()
    }

    /// Drops the schedule's lock once no queued or running job holds it.
    fn release_schedule_lock(&self, schedule: &ScheduleId) {
        let mut locks = self.schedule_locks.lock();
        if locks.get(schedule).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(schedule);
        }
    }

    fn set_status(&self, id: &JobId, status: SolvePoll) {
        if let Some(job) = self.jobs.write().get_mut(id) {
            if status.is_done() {
                job.finished_at = Some(Instant::now());
            }
            job.status = status;
        }
    }

    fn evict_expired(&self) {
        let ttl = Duration::from_millis(self.settings.retain_finished_ms);
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, j| j.finished_at.map_or(true, |at| at.elapsed() < ttl));
        if jobs.len() < before {
            debug!(evicted = before - jobs.len(), "finished jobs evicted");
        }
    }

    async fn run(
        &self,
        schedule: &ScheduleId,
        params: SolveParams,
        cancel: CancelToken,
    ) -> anyhow::Result<SolveResult> {
        let snapshot = Snapshot::load(self.provider.as_ref(), schedule).await?;
        let weights = self.provider.load_constraint_weights(schedule).await?;
        let solver = self.solver.clone();
        let result = tokio::task::spawn_blocking(move || {
            solver.solve(&snapshot, &weights, &params, &cancel)
        })
        .await??;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{ConstraintWeights, Dataset, InMemoryProvider, SolveError};
    use types::{ClassGroup, DayOfWeek, Requirement, Room, Subject, Teacher, WeekGrid};

    /// Spins until cancelled, then reports a timeout.
    struct UntilCancelled;

    impl Solver for UntilCancelled {
        fn solve(
            &self,
            snapshot: &Snapshot,
            _weights: &ConstraintWeights,
            params: &SolveParams,
            cancel: &CancelToken,
        ) -> Result<SolveResult, SolveError> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(SolveResult::TimedOut {
                best_partial: types::Schedule {
                    id: snapshot.schedule_id.clone(),
                    version: snapshot.next_version,
                    assignments: vec![],
                },
                violations: vec![],
                unassigned: vec![],
                stats: types::SolveStats {
                    seed: params.seed,
                    ..Default::default()
                },
            })
        }
    }

    /// Finishes at once with an empty schedule.
    struct Immediate;

    impl Solver for Immediate {
        fn solve(
            &self,
            snapshot: &Snapshot,
            _weights: &ConstraintWeights,
            _params: &SolveParams,
            _cancel: &CancelToken,
        ) -> Result<SolveResult, SolveError> {
            Ok(SolveResult::Success {
                schedule: types::Schedule {
                    id: snapshot.schedule_id.clone(),
                    version: snapshot.next_version,
                    assignments: vec![],
                },
                quality_score: 0.0,
                violations: vec![],
                stats: Default::default(),
            })
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            grid: WeekGrid::uniform(&[DayOfWeek::Mon], 4),
            teachers: vec![Teacher::new("t1").teaching("math")],
            subjects: vec![Subject::new("math", 2)],
            classes: vec![ClassGroup::new("7a", 20).needs(Requirement::new("math"))],
            rooms: vec![Room::new("r1", 30)],
            locked: vec![],
            weights: None,
            version: 6,
        }
    }

    fn jobs<S: Solver>(solver: S, on_busy: BusyPolicy) -> SolveJobs<InMemoryProvider, S> {
        SolveJobs::new(
            Arc::new(InMemoryProvider::new(dataset())),
            Arc::new(solver),
            JobSettings {
                max_concurrent: 2,
                on_busy,
                ..JobSettings::default()
            },
        )
    }

    const TICK: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn finished_job_reports_the_versioned_result() {
        let jobs = jobs(Immediate, BusyPolicy::Reject);
        let id = jobs
            .submit_solve(ScheduleId::new("term-1"), SolveParams::default())
            .unwrap();
        let Some(SolvePoll::Finished(result)) = jobs.wait(&id, TICK).await else {
            panic!("job did not finish");
        };
        assert_eq!(result.schedule().map(|s| s.version), Some(7));
        assert!(!jobs.cancel(&id));
    }

    #[tokio::test]
    async fn second_submission_for_a_busy_schedule_is_rejected() {
        let jobs = jobs(UntilCancelled, BusyPolicy::Reject);
        let schedule = ScheduleId::new("term-1");
        let first = jobs
            .submit_solve(schedule.clone(), SolveParams::default())
            .unwrap();
        assert_eq!(
            jobs.submit_solve(schedule.clone(), SolveParams::default()),
            Err(SubmitError::Busy {
                schedule_id: schedule.clone()
            })
        );
        let other = jobs
            .submit_solve(ScheduleId::new("term-2"), SolveParams::default())
            .unwrap();

        assert!(jobs.cancel(&first));
        let done = jobs.wait(&first, TICK).await.unwrap();
        assert!(matches!(done, SolvePoll::Finished(SolveResult::TimedOut { .. })));
        let again = jobs
            .submit_solve(schedule, SolveParams::default())
            .unwrap();

        for id in [other, again] {
            jobs.cancel(&id);
            assert!(jobs.wait(&id, TICK).await.unwrap().is_done());
        }
    }

    #[tokio::test]
    async fn queued_submission_waits_for_the_running_one() {
        let jobs = jobs(UntilCancelled, BusyPolicy::Queue);
        let schedule = ScheduleId::new("term-1");
        let first = jobs
            .submit_solve(schedule.clone(), SolveParams::default())
            .unwrap();
        let second = jobs.submit_solve(schedule, SolveParams::default()).unwrap();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            jobs.poll_solve(&second),
            Some(SolvePoll::InProgress {
                state: JobState::Queued
            })
        );
        jobs.cancel(&first);
        jobs.cancel(&second);
        assert!(jobs.wait(&first, TICK).await.unwrap().is_done());
        assert!(jobs.wait(&second, TICK).await.unwrap().is_done());
    }

    #[tokio::test]
    async fn broken_data_fails_the_job() {
        let mut data = dataset();
        data.teachers.push(Teacher::new("t1"));
        let jobs = SolveJobs::new(
            Arc::new(InMemoryProvider::new(data)),
            Arc::new(Immediate),
            JobSettings::default(),
        );
        let id = jobs
            .submit_solve(ScheduleId::new("term-1"), SolveParams::default())
            .unwrap();
        let Some(SolvePoll::Failed { message }) = jobs.wait(&id, TICK).await else {
            panic!("job should fail");
        };
        assert!(message.contains("duplicate teacher id: t1"), "{message}");
    }

    /// Panics inside the blocking solve.
    struct Exploding;

    impl Solver for Exploding {
        fn solve(
            &self,
            _snapshot: &Snapshot,
            _weights: &ConstraintWeights,
            _params: &SolveParams,
            _cancel: &CancelToken,
        ) -> Result<SolveResult, SolveError> {
            panic!("solver blew up")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn schedule_is_free_as_soon_as_the_result_is_visible() {
        let jobs = jobs(Immediate, BusyPolicy::Reject);
        let schedule = ScheduleId::new("term-1");
        for _ in 0..50 {
            let id = jobs
                .submit_solve(schedule.clone(), SolveParams::default())
                .unwrap();
            loop {
                if jobs.poll_solve(&id).unwrap().is_done() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            // no sleep between seeing the result and resubmitting
            let next = jobs.submit_solve(schedule.clone(), SolveParams::default());
            let next = next.expect("schedule still marked busy");
            assert!(jobs.wait(&next, TICK).await.unwrap().is_done());
        }
    }

    #[tokio::test]
    async fn panicking_solve_fails_and_frees_the_schedule() {
        let jobs = jobs(Exploding, BusyPolicy::Reject);
        let schedule = ScheduleId::new("term-1");
        let id = jobs
            .submit_solve(schedule.clone(), SolveParams::default())
            .unwrap();
        let Some(SolvePoll::Failed { .. }) = jobs.wait(&id, TICK).await else {
            panic!("job should fail");
        };
        assert!(jobs.submit_solve(schedule, SolveParams::default()).is_ok());
    }

    #[tokio::test]
    async fn finished_jobs_and_idle_locks_are_dropped() {
        let jobs = SolveJobs::new(
            Arc::new(InMemoryProvider::new(dataset())),
            Arc::new(Immediate),
            JobSettings {
                retain_finished_ms: 40,
                ..JobSettings::default()
            },
        );
        let id = jobs
            .submit_solve(ScheduleId::new("term-1"), SolveParams::default())
            .unwrap();
        assert!(matches!(
            jobs.wait(&id, TICK).await,
            Some(SolvePoll::Finished(_))
        ));
        assert!(jobs.schedule_locks.lock().is_empty());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(jobs.poll_solve(&id), None);
        assert!(jobs.jobs.read().is_empty());
    }

    #[test]
    fn unknown_job_polls_none() {
        let jobs = jobs(Immediate, BusyPolicy::Reject);
        assert_eq!(jobs.poll_solve(&JobId("nope".into())), None);
        assert!(!jobs.cancel(&JobId("nope".into())));
    }
}
