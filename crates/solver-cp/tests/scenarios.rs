use sched_core::{
    CancelToken, EmptyDomain, ModelInfeasibleError, Snapshot, SnapshotParts, SolveError, Solver,
};
use solver_cp::CpSolver;
use types::{
    Assignment, AvailabilityWindow, ClassGroup, ConstraintWeights, DayOfWeek, EntityRef, Equip,
    Requirement, Room, ScheduleId, SolveParams, SolveResult, Subject, Teacher, TimeSlot, WeekGrid,
};

const WEEK: [DayOfWeek; 5] = [
    DayOfWeek::Mon,
    DayOfWeek::Tue,
    DayOfWeek::Wed,
    DayOfWeek::Thu,
    DayOfWeek::Fri,
];

fn parts(grid: WeekGrid) -> SnapshotParts {
    SnapshotParts {
        schedule_id: ScheduleId::new("term-1"),
        version: 0,
        grid,
        teachers: vec![],
        subjects: vec![],
        classes: vec![],
        rooms: vec![Room::new("r1", 30)],
        locked: vec![],
    }
}

fn params() -> SolveParams {
    SolveParams {
        time_limit_ms: 30_000,
        workers: 1,
        ..SolveParams::default()
    }
}

fn solve(parts: SnapshotParts, weights: &ConstraintWeights) -> Result<SolveResult, SolveError> {
    solve_with(parts, weights, &params())
}

fn solve_with(
    parts: SnapshotParts,
    weights: &ConstraintWeights,
    params: &SolveParams,
) -> Result<SolveResult, SolveError> {
    let snap = Snapshot::build(parts).expect("valid snapshot");
    CpSolver::new().solve(&snap, weights, params, &CancelToken::new())
}

fn periods(schedule: &[Assignment], class: &str) -> Vec<u8> {
    schedule
        .iter()
        .filter(|a| a.class.as_str() == class)
        .map(|a| a.slot.period)
        .collect()
}

#[test]
fn single_requirement_gets_exactly_its_hours() {
    let mut p = parts(WeekGrid::uniform(&WEEK, 6));
    p.teachers = vec![Teacher::new("t1").teaching("math")];
    p.subjects = vec![Subject::new("math", 4)];
    p.classes = vec![ClassGroup::new("7a", 24).needs(Requirement::new("math"))];

    let result = solve(p, &ConstraintWeights::new()).unwrap();
    let SolveResult::Success {
        schedule,
        quality_score,
        violations,
        ..
    } = result
    else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(schedule.assignments.len(), 4);
    assert_eq!(schedule.version, 1);
    assert_eq!(quality_score, 0.0);
    assert!(violations.is_empty());
    assert!(schedule
        .assignments
        .iter()
        .all(|a| a.teacher.as_str() == "t1" && a.room.as_str() == "r1" && !a.locked));
}

#[test]
fn requirement_without_qualified_teacher_is_model_infeasible() {
    let mut p = parts(WeekGrid::uniform(&WEEK, 6));
    p.teachers = vec![Teacher::new("t1").teaching("art")];
    p.subjects = vec![Subject::new("art", 1), Subject::new("math", 4)];
    p.classes = vec![ClassGroup::new("7a", 24).needs(Requirement::new("math"))];

    let err = solve(p, &ConstraintWeights::new()).unwrap_err();
    assert_eq!(
        err,
        SolveError::ModelInfeasible(ModelInfeasibleError {
            class: "7a".into(),
            subject: "math".into(),
            cause: EmptyDomain::NoQualifiedTeacher,
        })
    );
}

fn one_teacher_two_classes() -> SnapshotParts {
    let mut p = parts(WeekGrid::uniform(&[DayOfWeek::Mon], 4));
    p.teachers = vec![Teacher::new("t1").teaching("math")];
    p.subjects = vec![Subject::new("math", 3)];
    p.classes = vec![
        ClassGroup::new("7a", 20).needs(Requirement::new("math")),
        ClassGroup::new("7b", 20).needs(Requirement::new("math")),
    ];
    p.rooms.push(Room::new("r2", 30));
    p
}

#[test]
fn overloaded_teacher_is_infeasible_and_cited() {
    let result = solve(one_teacher_two_classes(), &ConstraintWeights::recommended()).unwrap();
    let SolveResult::Infeasible { conflicts, .. } = result else {
        panic!("expected infeasible, got {result:?}");
    };
    assert!(!conflicts.is_empty());
    assert!(conflicts
        .iter()
        .any(|c| c.entities.contains(&EntityRef::Teacher("t1".into()))));
}

#[test]
fn adding_a_qualified_teacher_never_breaks_feasibility() {
    let mut p = one_teacher_two_classes();
    p.teachers.push(Teacher::new("t2").teaching("math"));
    let result = solve(p, &ConstraintWeights::recommended()).unwrap();
    assert_eq!(result.status(), "success");
    let schedule = result.schedule().unwrap();
    assert_eq!(schedule.assignments.len(), 6);
}

fn double_with_teacher_windows(windows: Vec<AvailabilityWindow>) -> SnapshotParts {
    let mut p = parts(WeekGrid::uniform(&[DayOfWeek::Mon], 4));
    let mut t1 = Teacher::new("t1").teaching("math");
    t1.availability = windows;
    p.teachers = vec![t1];
    p.subjects = vec![Subject::new("math", 2)];
    p.classes = vec![ClassGroup::new("7a", 20).needs(Requirement::new("math").double())];
    p
}

#[test]
fn double_period_without_adjacent_pair_is_rejected() {
    let p = double_with_teacher_windows(vec![
        AvailabilityWindow::new(DayOfWeek::Mon, 0, 1),
        AvailabilityWindow::new(DayOfWeek::Mon, 2, 3),
    ]);
    let err = solve(p, &ConstraintWeights::new()).unwrap_err();
    assert!(matches!(
        err,
        SolveError::ModelInfeasible(ModelInfeasibleError {
            cause: EmptyDomain::NoAdjacentPair,
            ..
        })
    ));
}

#[test]
fn double_period_uses_the_only_adjacent_pair() {
    let p = double_with_teacher_windows(vec![
        AvailabilityWindow::new(DayOfWeek::Mon, 0, 2),
        AvailabilityWindow::new(DayOfWeek::Mon, 3, 4),
    ]);
    for seed in 0..4 {
        let params = SolveParams {
            seed,
            ..params()
        };
        let result = solve_with(p.clone(), &ConstraintWeights::recommended(), &params).unwrap();
        let schedule = result.schedule().expect("schedule");
        assert_eq!(result.status(), "success");
        assert_eq!(periods(&schedule.assignments, "7a"), vec![0, 1]);
    }
}

#[test]
fn double_period_losing_its_pair_to_another_lesson_is_infeasible() {
    let mut p = double_with_teacher_windows(vec![
        AvailabilityWindow::new(DayOfWeek::Mon, 0, 2),
        AvailabilityWindow::new(DayOfWeek::Mon, 3, 4),
    ]);
    p.teachers[0] = p.teachers[0].clone().teaching("english");
    p.subjects.push(Subject::new("english", 1));
    let mut class_b = ClassGroup::new("7b", 20).needs(Requirement::new("english"));
    class_b.availability = vec![AvailabilityWindow::new(DayOfWeek::Mon, 0, 2)];
    p.classes.push(class_b);
    p.rooms.push(Room::new("r2", 30));

    let result = solve(p, &ConstraintWeights::new()).unwrap();
    assert_eq!(result.status(), "infeasible");
}

#[test]
fn locked_lesson_keeps_its_slot_exclusive() {
    let mut p = parts(WeekGrid::uniform(&[DayOfWeek::Mon, DayOfWeek::Tue], 3));
    p.teachers = vec![
        Teacher::new("t1").teaching("math"),
        Teacher::new("t2").teaching("math"),
    ];
    p.subjects = vec![Subject::new("math", 3)];
    p.classes = vec![
        ClassGroup::new("7a", 20).needs(Requirement::new("math")),
        ClassGroup::new("7b", 20).needs(Requirement::new("math")),
    ];
    p.rooms.push(Room::new("r2", 30));
    let pinned = TimeSlot::new(DayOfWeek::Mon, 1);
    p.locked = vec![Assignment {
        slot: pinned,
        class: "7a".into(),
        subject: "math".into(),
        teacher: "t1".into(),
        room: "r1".into(),
        locked: true,
    }];

    let result = solve(p, &ConstraintWeights::recommended()).unwrap();
    let schedule = result.schedule().expect("schedule");
    assert_eq!(result.status(), "success");
    assert_eq!(schedule.assignments.len(), 6);
    let at_pinned: Vec<&Assignment> = schedule
        .assignments
        .iter()
        .filter(|a| a.slot == pinned)
        .collect();
    for a in at_pinned {
        if a.locked {
            assert_eq!(a.teacher.as_str(), "t1");
            continue;
        }
        assert_ne!(a.teacher.as_str(), "t1");
        assert_ne!(a.room.as_str(), "r1");
        assert_ne!(a.class.as_str(), "7a");
    }
    assert_eq!(periods(&schedule.assignments, "7a").len(), 3);
}

#[test]
fn locked_lessons_over_a_cap_name_the_teacher() {
    let mut p = parts(WeekGrid::uniform(&[DayOfWeek::Mon], 3));
    p.teachers = vec![Teacher {
        max_hours_week: Some(1),
        ..Teacher::new("t1").teaching("math")
    }];
    p.subjects = vec![Subject::new("math", 2)];
    p.classes = vec![ClassGroup::new("7a", 20).needs(Requirement::new("math"))];
    p.locked = (0..2)
        .map(|period| Assignment {
            slot: TimeSlot::new(DayOfWeek::Mon, period),
            class: "7a".into(),
            subject: "math".into(),
            teacher: "t1".into(),
            room: "r1".into(),
            locked: true,
        })
        .collect();

    let result = solve(p, &ConstraintWeights::new()).unwrap();
    let SolveResult::Infeasible { conflicts, .. } = result else {
        panic!("expected infeasible, got {result:?}");
    };
    let cap = conflicts
        .iter()
        .find(|c| c.constraint.as_str() == "teacher_weekly_cap")
        .expect("weekly cap conflict");
    assert_eq!(cap.entities, vec![EntityRef::Teacher("t1".into())]);
}

fn school() -> SnapshotParts {
    let mut p = parts(WeekGrid::uniform(&WEEK, 6).with_afternoon_from(4));
    let mut physics = Subject::new("physics", 3);
    physics.demanding = true;
    p.subjects = vec![
        Subject::new("art", 2),
        Subject::new("english", 4),
        Subject::new("math", 5),
        physics,
    ];
    p.teachers = vec![
        Teacher::new("anna").teaching("math").teaching("physics"),
        Teacher::new("ben").teaching("english"),
        Teacher::new("cleo").teaching("art").teaching("english"),
        Teacher::new("dan").teaching("math"),
    ];
    p.classes = ["7a", "7b", "8a"]
        .into_iter()
        .map(|id| {
            ClassGroup::new(id, 24)
                .needs(Requirement::new("art"))
                .needs(Requirement::new("english"))
                .needs(Requirement::new("math").double())
                .needs(Requirement::new("physics"))
        })
        .collect();
    p.rooms = vec![Room::new("r1", 30), Room::new("r2", 30), Room::new("r3", 30)];
    p
}

#[test]
fn same_seed_gives_the_same_timetable() {
    let params = SolveParams {
        seed: 11,
        workers: 2,
        repair_steps: 40,
        ..params()
    };
    let weights = ConstraintWeights::recommended();
    let first = solve_with(school(), &weights, &params).unwrap();
    let second = solve_with(school(), &weights, &params).unwrap();
    let (
        SolveResult::Success {
            schedule: a,
            quality_score: qa,
            ..
        },
        SolveResult::Success {
            schedule: b,
            quality_score: qb,
            ..
        },
    ) = (&first, &second)
    else {
        panic!("expected two successes, got {first:?} and {second:?}");
    };
    assert_eq!(a, b);
    assert_eq!(qa, qb);
    assert_eq!(a.assignments.len(), 3 * (2 + 4 + 5 + 3));
}

#[test]
fn node_budget_yields_a_timed_out_partial() {
    let mut p = parts(WeekGrid::uniform(&WEEK, 6));
    p.teachers = vec![Teacher::new("t1").teaching("math")];
    p.subjects = vec![Subject::new("math", 4)];
    p.classes = vec![ClassGroup::new("7a", 24).needs(Requirement::new("math"))];
    let params = SolveParams {
        node_limit: Some(2),
        ..params()
    };

    let result = solve_with(p, &ConstraintWeights::new(), &params).unwrap();
    let SolveResult::TimedOut {
        best_partial,
        unassigned,
        ..
    } = result
    else {
        panic!("expected timeout, got {result:?}");
    };
    assert_eq!(best_partial.assignments.len(), 1);
    assert_eq!(unassigned.len(), 1);
    assert_eq!(unassigned[0].hours, 3);
}

#[test]
fn budget_spent_while_enumerating_is_timed_out_with_a_complete_timetable() {
    let mut p = parts(WeekGrid::uniform(&WEEK, 6));
    p.teachers = vec![Teacher::new("t1").teaching("math")];
    p.subjects = vec![Subject::new("math", 4)];
    p.classes = vec![ClassGroup::new("7a", 24).needs(Requirement::new("math"))];
    let enumerate = SolveParams {
        max_solutions: 4,
        ..params()
    };
    let finished = solve_with(p.clone(), &ConstraintWeights::new(), &enumerate).unwrap();
    assert_eq!(finished.status(), "success");
    assert_eq!(finished.stats().solutions, 4);

    let starved = SolveParams {
        node_limit: Some(6),
        ..enumerate
    };
    let result = solve_with(p, &ConstraintWeights::new(), &starved).unwrap();
    let SolveResult::TimedOut {
        best_partial,
        unassigned,
        stats,
        ..
    } = result
    else {
        panic!("expected timeout, got {result:?}");
    };
    assert_eq!(best_partial.assignments.len(), 4);
    assert!(unassigned.is_empty());
    assert!(stats.solutions >= 1 && stats.solutions < 4);
}

#[test]
fn rooms_must_seat_the_class_and_carry_the_equipment() {
    let mut p = parts(WeekGrid::uniform(&WEEK[..2], 4));
    p.teachers = vec![Teacher::new("t1").teaching("physics").teaching("english")];
    let mut physics = Subject::new("physics", 2);
    physics.requires.equip = vec![Equip::ScienceLab];
    p.subjects = vec![Subject::new("english", 3), physics];
    p.classes = vec![ClassGroup::new("7a", 28)
        .needs(Requirement::new("english"))
        .needs(Requirement::new("physics"))];
    p.rooms = vec![
        Room {
            equip: vec![Equip::ScienceLab],
            ..Room::new("closet", 20)
        },
        Room::new("hall", 40),
        Room {
            equip: vec![Equip::ScienceLab],
            ..Room::new("lab", 30)
        },
    ];

    let result = solve(p, &ConstraintWeights::recommended()).unwrap();
    let SolveResult::Success { schedule, .. } = result else {
        panic!("expected success, got {result:?}");
    };
    assert_eq!(schedule.assignments.len(), 5);
    for a in &schedule.assignments {
        assert_ne!(a.room.as_str(), "closet");
        if a.subject.as_str() == "physics" {
            assert_eq!(a.room.as_str(), "lab");
        }
    }
}

#[test]
fn cancelled_solve_returns_timed_out() {
    let snap = Snapshot::build(school()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = CpSolver::new()
        .solve(&snap, &ConstraintWeights::recommended(), &params(), &cancel)
        .unwrap();
    assert_eq!(result.status(), "timed_out");
    let SolveResult::TimedOut { unassigned, .. } = result else {
        unreachable!();
    };
    assert_eq!(unassigned.iter().map(|u| u.hours).sum::<u32>(), 3 * 14);
}
