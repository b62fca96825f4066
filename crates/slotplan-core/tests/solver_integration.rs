//! Integration tests for the constraint solver.
//!
//! These tests exercise complete solves through the public API: placement
//! around fixed events, priority under scarce capacity, degraded scoring
//! and the preference-driven blocking rules.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use std::time::Instant;
use slotplan_core::{
    ConstantScorer, CoreError, FixedEvent, PreferenceScorer, Preferences, ScoreError, Solver,
    SolverConfig, SolveOptimality, Task, TimeRange, TimeSlot, ValidationError,
};

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, day, h, m, 0).unwrap()
}

/// Monday 2025-11-03
fn mon(h: u32, m: u32) -> DateTime<Utc> {
    at(3, h, m)
}

fn solver(granularity_minutes: u32) -> Solver {
    Solver::new(SolverConfig {
        granularity_minutes,
        ..SolverConfig::default()
    })
    .unwrap()
}

#[test]
fn test_task_avoids_fixed_event_and_takes_best_slot() {
    let task = Task::new("review", "Review PR", 30, mon(8, 0), mon(12, 0)).unwrap();
    let events = vec![FixedEvent::new("standup", "Standup", mon(9, 0), mon(10, 0)).unwrap()];
    let horizon = TimeRange::new(mon(8, 0), mon(12, 0)).unwrap();

    // Uniform scores: earliest free slot wins
    let schedule = solver(15)
        .solve_uniform(&[task.clone()], &events, &Preferences::default(), horizon)
        .unwrap();
    let slot = schedule.slot_of("review").unwrap();
    assert_eq!((slot.start, slot.end), (mon(8, 0), mon(8, 30)));

    // A scorer favouring 10:30 moves it past the event
    let favour = |_: &Task, slot: &TimeSlot, _: &Preferences| -> Result<f64, ScoreError> {
        Ok(if slot.start == mon(10, 30) { 0.9 } else { 0.4 })
    };
    let schedule = solver(15)
        .solve(&[task], &events, &Preferences::default(), horizon, &favour)
        .unwrap();
    let slot = schedule.slot_of("review").unwrap();
    assert_eq!((slot.start, slot.end), (mon(10, 30), mon(11, 0)));
    assert!(schedule.conflicts().is_empty());
}

#[test]
fn test_scarce_capacity_schedules_higher_priority() {
    let tasks = vec![
        Task::new("low", "Low", 60, mon(8, 0), mon(9, 30)).unwrap(),
        Task::new("high", "High", 60, mon(8, 0), mon(9, 30))
            .unwrap()
            .with_priority(2.0),
    ];
    let horizon = TimeRange::new(mon(8, 0), mon(9, 30)).unwrap();

    let schedule = solver(30)
        .solve_uniform(&tasks, &[], &Preferences::default(), horizon)
        .unwrap();

    assert!(schedule.is_scheduled("high"));
    assert!(!schedule.is_scheduled("low"));
    assert_eq!(schedule.unscheduled.iter().collect::<Vec<_>>(), vec!["low"]);
}

#[test]
fn test_oracle_down_falls_back_to_default_score() {
    let tasks = vec![
        Task::new("a", "A", 60, mon(8, 0), mon(18, 0)).unwrap(),
        Task::new("b", "B", 30, mon(8, 0), mon(18, 0)).unwrap().with_priority(3.0),
        Task::new("c", "C", 90, mon(8, 0), mon(18, 0)).unwrap(),
    ];
    let offline = |_: &Task, _: &TimeSlot, _: &Preferences| -> Result<f64, ScoreError> {
        Err(ScoreError::unavailable("model not loaded"))
    };
    let solver = Solver::new(SolverConfig {
        granularity_minutes: 30,
        default_score: 0.4,
        ..SolverConfig::default()
    })
    .unwrap();

    let schedule = solver
        .solve(
            &tasks,
            &[],
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(18, 0)).unwrap(),
            &offline,
        )
        .unwrap();

    assert_eq!(schedule.scheduled_count(), 3);
    assert!((schedule.total_utility - 0.4 * 3.0).abs() < 1e-9);
    assert!(schedule.is_degraded());
    assert!(schedule.conflicts().is_empty());
}

#[test]
fn test_identical_inputs_give_identical_schedules() {
    let tasks: Vec<Task> = (0..5)
        .map(|i| {
            Task::new(format!("t{i}"), "Task", 30 * (i % 3 + 1), mon(8, 0), mon(17, 0))
                .unwrap()
                .with_category(if i % 2 == 0 { "deep" } else { "admin" })
        })
        .collect();
    let events = vec![
        FixedEvent::new("lunch", "Lunch", mon(12, 0), mon(13, 0)).unwrap(),
        FixedEvent::new("1on1", "1:1", mon(15, 0), mon(15, 30)).unwrap(),
    ];
    let prefs = Preferences::default();
    let horizon = TimeRange::new(mon(8, 0), mon(17, 0)).unwrap();

    let first = solver(15)
        .solve(&tasks, &events, &prefs, horizon, &PreferenceScorer)
        .unwrap();
    let second = solver(15)
        .solve(&tasks, &events, &prefs, horizon, &PreferenceScorer)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_disallowed_partial_schedule_is_infeasible() {
    let tasks = vec![
        Task::new("a", "A", 60, mon(8, 0), mon(9, 0)).unwrap(),
        Task::new("b", "B", 60, mon(8, 0), mon(9, 0)).unwrap(),
    ];
    let solver = Solver::new(SolverConfig {
        granularity_minutes: 30,
        allow_partial_schedules: false,
        ..SolverConfig::default()
    })
    .unwrap();
    let err = solver
        .solve_uniform(
            &tasks,
            &[],
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(12, 0)).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Infeasible { task_ids } if task_ids == vec!["b"]));
}

#[test]
fn test_invalid_task_is_rejected_before_solving() {
    let mut task = Task::new("a", "A", 60, mon(8, 0), mon(12, 0)).unwrap();
    task.duration_minutes = 300;
    let err = solver(30)
        .solve_uniform(
            &[task],
            &[],
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(12, 0)).unwrap(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::InvalidInput(ValidationError::DurationExceedsWindow { .. })
    ));
}

#[test]
fn test_node_budget_flags_non_optimal_result() {
    let tasks: Vec<Task> = (0..8)
        .map(|i| Task::new(format!("t{i}"), "Task", 60, mon(8, 0), mon(18, 0)).unwrap())
        .collect();
    let solver = Solver::new(SolverConfig {
        granularity_minutes: 30,
        max_search_nodes: Some(2),
        ..SolverConfig::default()
    })
    .unwrap();
    let schedule = solver
        .solve_uniform(
            &tasks,
            &[],
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(18, 0)).unwrap(),
        )
        .unwrap();

    assert_eq!(schedule.optimality, SolveOptimality::BudgetExhausted);
    assert!(!schedule.is_optimal());
    assert!(schedule.conflicts().is_empty());
    assert_eq!(schedule.scheduled_count(), 8);
}

#[test]
fn test_weekend_and_day_hours_are_respected() {
    // Friday 2025-11-07 through Monday 2025-11-10
    let horizon = TimeRange::new(at(7, 0, 0), at(10, 23, 0)).unwrap();
    let task = Task::new("t", "Task", 60, at(8, 0, 0), at(10, 12, 0)).unwrap();
    let prefs = Preferences {
        weekend_ok: false,
        ..Preferences::default().with_day_hours(9, 17)
    };

    let schedule = solver(30)
        .solve_uniform(&[task], &[], &prefs, horizon)
        .unwrap();
    let slot = schedule.slot_of("t").unwrap();
    assert_eq!(slot.start, at(10, 9, 0));
}

#[test]
fn test_daily_cap_spreads_work_over_days() {
    let horizon = TimeRange::new(mon(0, 0), at(5, 0, 0)).unwrap();
    let tasks = vec![
        Task::new("a", "A", 60, mon(0, 0), at(5, 0, 0)).unwrap(),
        Task::new("b", "B", 60, mon(0, 0), at(5, 0, 0)).unwrap(),
    ];
    let prefs = Preferences {
        max_task_minutes_per_day: Some(60),
        ..Preferences::default().with_day_hours(9, 17)
    };

    let schedule = solver(60)
        .solve_uniform(&tasks, &[], &prefs, horizon)
        .unwrap();
    assert_eq!(schedule.slot_of("a").unwrap().start, mon(9, 0));
    assert_eq!(schedule.slot_of("b").unwrap().start, at(4, 9, 0));
}

#[test]
fn test_preference_scorer_prefers_mornings() {
    let task = Task::new("t", "Task", 60, mon(8, 0), at(10, 0, 0)).unwrap();
    let horizon = TimeRange::new(mon(8, 0), mon(23, 0)).unwrap();
    let schedule = solver(30)
        .solve(&[task], &[], &Preferences::default(), horizon, &PreferenceScorer)
        .unwrap();
    let start = schedule.slot_of("t").unwrap().start;
    assert!((8..=11).contains(&start.hour()), "placed at {start}");
}

#[test]
fn test_fixed_events_outside_horizon_are_not_reported() {
    let events = vec![
        FixedEvent::new("in", "In", mon(9, 0), mon(10, 0)).unwrap(),
        FixedEvent::new("out", "Out", mon(19, 0), mon(20, 0)).unwrap(),
    ];
    let schedule = solver(30)
        .solve(
            &[],
            &events,
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(12, 0)).unwrap(),
            &ConstantScorer(0.5),
        )
        .unwrap();
    let ids: Vec<&str> = schedule.fixed_events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["in"]);
}

#[test]
fn test_busy_week_is_solved_within_budget() {
    let monday = mon(0, 0);
    let events: Vec<FixedEvent> = (0..5)
        .map(|d| {
            let start = at(3 + d, 13, 0);
            FixedEvent::new(format!("meeting{d}"), "Meeting", start, start + Duration::hours(2))
                .unwrap()
        })
        .collect();
    let week_end = monday + Duration::days(7);
    let tasks: Vec<Task> = (0..16)
        .map(|i| {
            let task = Task::new(format!("t{i:02}"), "Task", 60, monday, week_end).unwrap();
            if i % 4 == 0 {
                task.with_priority(2.0)
            } else {
                task
            }
        })
        .collect();
    let prefs = Preferences::default().with_day_hours(8, 22).with_min_gap(30);
    let solver = Solver::new(SolverConfig {
        solve_time_budget_ms: 2_000,
        ..SolverConfig::default()
    })
    .unwrap();

    let started = Instant::now();
    let schedule = solver
        .solve(
            &tasks,
            &events,
            &prefs,
            TimeRange::week_starting(monday),
            &PreferenceScorer,
        )
        .unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed < std::time::Duration::from_secs(5), "took {elapsed:?}");
    assert_eq!(schedule.scheduled_count(), 16);
    assert!(schedule.conflicts().is_empty());

    let mut slots: Vec<TimeSlot> = schedule.assignments.values().map(|a| a.slot).collect();
    slots.sort_by_key(|s| s.start);
    for pair in slots.windows(2) {
        assert!(pair[1].start >= pair[0].end + Duration::minutes(30));
    }
    for slot in &slots {
        assert!(events.iter().all(|e| !e.slot.overlaps(slot)));
    }
}

#[test]
fn test_time_budget_returns_feasible_incumbent() {
    let tasks: Vec<Task> = (0..3)
        .map(|i| Task::new(format!("t{i}"), "Task", 60, mon(8, 0), mon(12, 0)).unwrap())
        .collect();
    // Scoring alone outlasts the 1 ms budget.
    let slow = |_: &Task, slot: &TimeSlot, _: &Preferences| -> Result<f64, ScoreError> {
        std::thread::sleep(std::time::Duration::from_millis(1));
        Ok(1.0 / (1.0 + f64::from(slot.start.hour())))
    };
    let solver = Solver::new(SolverConfig {
        granularity_minutes: 30,
        solve_time_budget_ms: 1,
        ..SolverConfig::default()
    })
    .unwrap();

    let schedule = solver
        .solve(
            &tasks,
            &[],
            &Preferences::default(),
            TimeRange::new(mon(8, 0), mon(12, 0)).unwrap(),
            &slow,
        )
        .unwrap();

    assert_eq!(schedule.optimality, SolveOptimality::BudgetExhausted);
    assert!(schedule.conflicts().is_empty());
    assert_eq!(schedule.scheduled_count(), 3);
    for (id, assignment) in &schedule.assignments {
        let task = tasks.iter().find(|t| &t.id == id).unwrap();
        assert!(task.window_contains(&assignment.slot));
    }
}
