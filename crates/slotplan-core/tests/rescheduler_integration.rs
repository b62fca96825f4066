//! Integration tests for the adaptive rescheduler.
//!
//! These tests drive a task pool through a simulated day: an initial plan,
//! missed and completed work, and re-plans of the residual horizon.

use chrono::{DateTime, TimeZone, Utc};
use slotplan_core::{
    Config, ConstantScorer, FixedEvent, Preferences, Rescheduler, ScoreError, SolverConfig,
    Task, TaskPool, TaskStatus, TimeRange, TimeSlot,
};

fn mon(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, h, m, 0).unwrap()
}

fn rescheduler() -> Rescheduler {
    let config = Config {
        solver: SolverConfig {
            granularity_minutes: 30,
            ..SolverConfig::default()
        },
        ..Config::default()
    };
    Rescheduler::new(&config).unwrap()
}

fn day() -> TimeRange {
    TimeRange::new(mon(8, 0), mon(18, 0)).unwrap()
}

fn uniform() -> ConstantScorer {
    ConstantScorer(0.5)
}

#[test]
fn test_missed_task_is_repaired_after_now() {
    let r = rescheduler();
    let events = vec![
        FixedEvent::new("standup", "Standup", mon(9, 0), mon(9, 30)).unwrap(),
        FixedEvent::new("review", "Design review", mon(14, 0), mon(15, 0)).unwrap(),
    ];
    let mut task = Task::new("report", "Write report", 60, mon(8, 0), mon(18, 0)).unwrap();
    task.mark_scheduled(TimeSlot::new(mon(10, 0), mon(11, 0)).unwrap())
        .unwrap();
    let mut pool = TaskPool::new(day(), vec![task]).unwrap();

    pool.mark_missed("report").unwrap();
    let outcome = r
        .reschedule(&mut pool, &events, &Preferences::default(), mon(10, 30), &uniform())
        .unwrap();

    let slot = outcome.schedule.slot_of("report").unwrap();
    assert!(slot.start >= mon(10, 30));
    // The missed interval itself is avoided
    assert!(slot.start >= mon(11, 0));
    assert_eq!(outcome.report.reentered, vec!["report"]);

    // Fixed events are carried through untouched
    assert_eq!(outcome.schedule.fixed_events, vec![events[1].clone()]);
    assert!(outcome.schedule.conflicts().is_empty());

    let task = pool.get("report").unwrap();
    assert_eq!(task.status(), TaskStatus::Scheduled);
    assert_eq!(task.missed_count(), 1);
    assert!(task.priority_weight > 1.0);
}

#[test]
fn test_day_plays_out_with_completion_and_expiry() {
    let r = rescheduler();
    let tasks = vec![
        Task::new("email", "Email", 30, mon(8, 0), mon(18, 0)).unwrap(),
        Task::new("slides", "Slides", 90, mon(8, 0), mon(18, 0)).unwrap(),
        Task::new("call", "Call vendor", 30, mon(8, 0), mon(9, 0)).unwrap(),
    ];
    let mut pool = TaskPool::new(day(), tasks).unwrap();
    let events = vec![FixedEvent::new("lunch", "Lunch", mon(12, 0), mon(13, 0)).unwrap()];
    let prefs = Preferences::default();

    let plan = r
        .reschedule(&mut pool, &events, &prefs, mon(8, 0), &uniform())
        .unwrap();
    assert_eq!(plan.schedule.scheduled_count(), 3);
    assert!(plan.schedule.conflicts().is_empty());
    assert!(plan.report.is_empty());

    // The caller never started the vendor call
    pool.mark_missed("call").unwrap();

    let later = r
        .reschedule(&mut pool, &events, &prefs, mon(13, 0), &uniform())
        .unwrap();

    // Everything that ended before 13:00 is assumed done
    for id in ["email", "slides"] {
        assert_eq!(pool.get(id).unwrap().status(), TaskStatus::Completed, "{id}");
        assert!(later.report.completed.contains(&id.to_string()));
    }
    // The call's window is gone
    assert_eq!(later.report.unschedulable, vec!["call"]);
    assert!(pool.unschedulable().contains("call"));
    assert!(later.schedule.assignments.is_empty());
}

#[test]
fn test_running_task_stays_locked() {
    let r = rescheduler();
    let mut running = Task::new("focus", "Focus block", 60, mon(8, 0), mon(18, 0)).unwrap();
    let running_slot = TimeSlot::new(mon(10, 0), mon(11, 0)).unwrap();
    running.mark_scheduled(running_slot).unwrap();
    let next = Task::new("next", "Next", 30, mon(8, 0), mon(18, 0)).unwrap();
    let mut pool = TaskPool::new(day(), vec![running, next]).unwrap();

    let outcome = r
        .reschedule(&mut pool, &[], &Preferences::default(), mon(10, 20), &uniform())
        .unwrap();

    let locked = &outcome.schedule.assignments["focus"];
    assert!(locked.locked);
    assert_eq!(locked.slot, running_slot);
    assert_eq!(outcome.schedule.slot_of("next").unwrap().start, mon(11, 0));
    assert!(outcome.schedule.conflicts().is_empty());
}

#[test]
fn test_confirmed_completion_drops_out_of_plan() {
    let r = rescheduler();
    let tasks = vec![
        Task::new("a", "A", 60, mon(8, 0), mon(18, 0)).unwrap(),
        Task::new("b", "B", 60, mon(8, 0), mon(18, 0)).unwrap(),
    ];
    let mut pool = TaskPool::new(day(), tasks).unwrap();
    r.reschedule(&mut pool, &[], &Preferences::default(), mon(8, 0), &uniform())
        .unwrap();

    pool.mark_completed("b").unwrap();
    let outcome = r
        .reschedule(&mut pool, &[], &Preferences::default(), mon(8, 0), &uniform())
        .unwrap();
    assert!(outcome.schedule.is_scheduled("a"));
    assert!(!outcome.schedule.is_scheduled("b"));
    assert_eq!(pool.get("b").unwrap().status(), TaskStatus::Completed);
}

#[test]
fn test_reschedule_with_oracle_down_is_degraded() {
    let r = rescheduler();
    let tasks = vec![Task::new("a", "A", 60, mon(8, 0), mon(18, 0)).unwrap()];
    let mut pool = TaskPool::new(day(), tasks).unwrap();
    let offline = |_: &Task, _: &TimeSlot, _: &Preferences| -> Result<f64, ScoreError> {
        Err(ScoreError::unavailable("timeout"))
    };
    let outcome = r
        .reschedule(&mut pool, &[], &Preferences::default(), mon(9, 0), &offline)
        .unwrap();
    assert!(outcome.schedule.is_degraded());
    assert_eq!(outcome.schedule.slot_of("a").unwrap().start, mon(9, 0));
    assert_eq!(pool.last_schedule(), Some(&outcome.schedule));
}

#[test]
fn test_reschedule_after_horizon_end_places_nothing() {
    let r = rescheduler();
    let tasks = vec![Task::new("a", "A", 60, mon(8, 0), mon(20, 0)).unwrap()];
    let mut pool = TaskPool::new(day(), tasks).unwrap();
    let outcome = r
        .reschedule(&mut pool, &[], &Preferences::default(), mon(18, 30), &uniform())
        .unwrap();
    assert!(outcome.schedule.assignments.is_empty());
    assert!(outcome.schedule.unscheduled.contains("a"));
    assert_eq!(pool.get("a").unwrap().status(), TaskStatus::Pending);
}

fn running_at_nine() -> Task {
    let mut running = Task::new("a", "Running", 60, mon(8, 0), mon(18, 0)).unwrap();
    running
        .mark_scheduled(TimeSlot::new(mon(9, 0), mon(10, 0)).unwrap())
        .unwrap();
    running
}

#[test]
fn test_gap_is_kept_after_running_task() {
    let r = rescheduler();
    let pending = Task::new("b", "Pending", 60, mon(8, 0), mon(18, 0)).unwrap();
    let mut pool = TaskPool::new(day(), vec![running_at_nine(), pending]).unwrap();
    let prefs = Preferences::default().with_min_gap(60);

    let outcome = r
        .reschedule(&mut pool, &[], &prefs, mon(9, 30), &uniform())
        .unwrap();

    assert!(outcome.schedule.assignments["a"].locked);
    let b = outcome.schedule.slot_of("b").unwrap();
    assert!(b.start >= mon(11, 0), "gap violated: b starts at {}", b.start);
    assert_eq!(b.start, mon(11, 0));
}

#[test]
fn test_running_task_counts_toward_daily_cap() {
    let r = rescheduler();
    let pending = Task::new("b", "Pending", 90, mon(8, 0), mon(18, 0)).unwrap();
    let mut pool = TaskPool::new(day(), vec![running_at_nine(), pending]).unwrap();
    let mut prefs = Preferences::default();
    prefs.max_task_minutes_per_day = Some(120);

    let outcome = r
        .reschedule(&mut pool, &[], &prefs, mon(9, 30), &uniform())
        .unwrap();

    // 60 running minutes leave room for 60 more today
    assert!(outcome.schedule.is_scheduled("a"));
    assert!(outcome.schedule.unscheduled.contains("b"));
    assert_eq!(pool.get("b").unwrap().status(), TaskStatus::Pending);
}
