mod support;

use anima_memory::MemoryEntry;
use anima_runtime::storage::{InMemorySnapshotStore, MemoryLogSink};
use anima_runtime::{
    telemetry, FlushError, LifeRuntime, LogRecord, PersistError, TickStage,
};
use anima_state::{LifeSnapshot, ParamTable, StateField, TrendDirection, STATUS_TREND_WINDOW};
use anima_types::{Event, ResponsePattern};

use support::{collaborators, config, GreedyLearning, Queue};

fn runtime(queue: &Queue) -> (LifeRuntime, InMemorySnapshotStore, MemoryLogSink) {
    let store = InMemorySnapshotStore::new(100);
    let sink = MemoryLogSink::new();
    let runtime = LifeRuntime::builder(config())
        .collaborators(collaborators(queue))
        .persister(store.clone())
        .flusher(sink.clone())
        .build()
        .expect("runtime should build");
    (runtime, store, sink)
}

#[test]
fn thousand_ticks_at_zero_energy_keep_running() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);
    runtime
        .state()
        .set_field(StateField::Energy, 0.0)
        .expect("energy should be settable");

    let summary = runtime.run_ticks(1000);

    assert_eq!(summary.final_tick, 1000);
    assert_eq!(runtime.state().tick(), 1000);
    runtime.state().read(|s| {
        assert!(s.is_alive(), "liveness must never be cleared");
        assert_eq!(s.vitals().energy, 0.0);
        assert_eq!(s.vitals().integrity, 0.0);
        assert_eq!(s.vitals().stability, 0.0);
    });
    assert_eq!(runtime.telemetry().counter(telemetry::WEAK_TICKS), 1000);
}

#[test]
fn events_flow_through_collaborators_into_state_and_memory() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);
    queue.push(Event::new("stress", 0.8).with_impact("energy", -10.0).with_impact("tension", 0.4));
    queue.push(Event::new("rest", 0.3).with_impact("energy", 4.0).with_impact("mood", 1.0));

    let report = runtime.tick();

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.tick, 1);
    assert_eq!(report.events_drained, 2);
    assert_eq!(report.patterns, vec![ResponsePattern::Absorb, ResponsePattern::Absorb]);
    assert_eq!(report.feedback_observed, 2);
    assert_eq!(runtime.last_pattern(), Some(ResponsePattern::Absorb));

    let vitals = runtime.state().vitals();
    assert!((vitals.energy - 94.0).abs() < 1e-9);

    // Two event memories, then two feedback memories.
    let kinds: Vec<&str> = runtime.memory().iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["stress", "rest", "feedback.absorb", "feedback.absorb"]);
    let recent: Vec<String> = runtime.state().read(|s| s.recent_events().map(str::to_string).collect());
    assert_eq!(recent, vec!["stress", "rest"]);
}

#[test]
fn internal_dynamics_trends_track_per_tick_drift() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);

    runtime.run_ticks(100);

    let status = runtime.state().status();
    let trend = |field: StateField| {
        status
            .internal_dynamics
            .iter()
            .find(|t| t.field == field)
            .cloned()
            .expect("trend present")
    };
    let fatigue = trend(StateField::Fatigue);
    assert_eq!(fatigue.samples, STATUS_TREND_WINDOW);
    assert_eq!(fatigue.direction, TrendDirection::Rising);
    assert!(fatigue.max > fatigue.min);
    assert_eq!(trend(StateField::SubjectiveTime).direction, TrendDirection::Rising);
    assert_eq!(status.energy_history.samples, 100);
}

#[test]
fn every_queued_event_is_drained_in_one_tick() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);
    for _ in 0..100 {
        queue.push(Event::new("noise", 0.01));
    }

    let report = runtime.tick();

    assert_eq!(report.events_drained, 100);
    assert!(queue.0.lock().is_empty());
}

#[test]
fn event_cap_defers_the_rest_to_later_ticks() {
    let queue = Queue::default();
    let mut config = config();
    config.runtime.max_events_per_tick = Some(64);
    let mut runtime = LifeRuntime::builder(config)
        .collaborators(collaborators(&queue))
        .persister(InMemorySnapshotStore::new(10))
        .flusher(MemoryLogSink::new())
        .build()
        .expect("runtime should build");
    for _ in 0..100 {
        queue.push(Event::new("noise", 0.01));
    }

    assert_eq!(runtime.tick().events_drained, 64);
    assert_eq!(runtime.tick().events_drained, 36);
}

#[test]
fn failing_event_does_not_abort_the_rest_of_the_tick() {
    let queue = Queue::default();
    let (mut runtime, _, sink) = runtime(&queue);
    queue.push(Event::new("bad", 0.5).with_impact("energy", -50.0));
    queue.push(Event::new("boom", 0.5).with_impact("energy", -50.0));
    queue.push(Event::new("stress", 0.5).with_impact("energy", -5.0));

    let report = runtime.tick();

    assert_eq!(report.tick, 1);
    assert_eq!(report.patterns.len(), 1);
    assert_eq!(report.failures.len(), 2);
    assert!(report.failures.iter().all(|f| f.stage == TickStage::Event));
    assert!((runtime.state().vitals().energy - 95.0).abs() < 1e-9);

    // Exception phase flushes immediately, carrying the failure records.
    let failures: Vec<LogRecord> = sink
        .records()
        .into_iter()
        .filter(|r| r.kind == "failure")
        .collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(runtime.telemetry().counter(telemetry::EVENTS_FAILED), 2);
}

#[test]
fn snapshots_follow_the_cadence() {
    let queue = Queue::default();
    let (mut runtime, store, _) = runtime(&queue);

    for tick in 1..=35u64 {
        let report = runtime.tick();
        assert_eq!(report.snapshot.is_some(), tick % 10 == 0, "tick {}", tick);
    }
    assert_eq!(store.ticks(), vec![10, 20, 30]);

    runtime.shutdown();
    assert_eq!(store.ticks(), vec![10, 20, 30, 35]);
}

#[test]
fn failed_snapshot_and_flush_are_skipped_not_fatal() {
    let queue = Queue::default();
    let runtime = LifeRuntime::builder(config())
        .collaborators(collaborators(&queue))
        .persister(|_: &LifeSnapshot| -> Result<(), PersistError> {
            Err(PersistError::Rejected("read-only volume".to_string()))
        })
        .flusher(|_: &[LogRecord]| -> Result<(), FlushError> {
            Err(FlushError::Rejected("sink offline".to_string()))
        })
        .build();
    let mut runtime = runtime.expect("runtime should build");

    let summary = runtime.run_ticks(30);

    assert_eq!(summary.final_tick, 30);
    assert_eq!(runtime.snapshots().failed(), 3);
    assert_eq!(runtime.logs().last_flush_tick(), 0);
    assert!(runtime.logs().pending() >= 30);
    assert_eq!(runtime.telemetry().counter(telemetry::SNAPSHOT_FAILURES), 3);
}

#[test]
fn log_flushes_every_period_and_once_on_shutdown() {
    let queue = Queue::default();
    let mut config = config();
    config.snapshot.period = 0;
    config.logs.flush_before_snapshot = false;
    config.logs.flush_after_snapshot = false;
    config.logs.flush_on_exception = false;
    let sink = MemoryLogSink::new();
    let mut runtime = LifeRuntime::builder(config)
        .collaborators(collaborators(&queue))
        .persister(InMemorySnapshotStore::default())
        .flusher(sink.clone())
        .build()
        .expect("runtime should build");

    runtime.run_ticks(100);
    assert_eq!(sink.flush_count(), 10);

    runtime.shutdown();
    assert_eq!(sink.flush_count(), 11);
    assert_eq!(runtime.logs().pending(), 0);
}

#[test]
fn learning_steps_are_capped_per_pass() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);
    let before = runtime.state().read(|s| s.learning().get_or("threshold.ignore", 0.0));

    let mut changes = None;
    for _ in 0..5 {
        let report = runtime.tick();
        if report.learning_changes.is_some() {
            changes = report.learning_changes;
        }
    }

    assert!(changes.is_some(), "learning should run at tick 5");
    let after = runtime.state().read(|s| s.learning().get_or("threshold.ignore", 0.0));
    let max_delta = runtime.config().cadence.max_param_delta;
    assert!((after - before - max_delta).abs() < 1e-9);

    let audited = runtime.state().read(|s| {
        s.audit()
            .for_parameter("learning.threshold.ignore")
            .count()
    });
    assert_eq!(audited, 1);
}

#[test]
fn adaptation_records_history_on_its_cadence() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);

    runtime.run_ticks(40);

    let records = runtime.state().read(|s| s.adaptation_history().cloned().collect::<Vec<_>>());
    assert_eq!(records.iter().map(|r| r.tick).collect::<Vec<_>>(), vec![20, 40]);
    let max_delta = runtime.config().cadence.max_param_delta;
    for record in &records {
        for (key, after) in record.after.iter() {
            let before = record.before.get_or(key, after);
            assert!((before - after).abs() <= max_delta + 1e-9);
        }
    }
}

#[test]
fn failing_learning_is_contained() {
    let queue = Queue::default();
    let mut collaborators = collaborators(&queue);
    collaborators.learning = Box::new(GreedyLearning { step: 0.1, fail: true });
    let mut runtime = LifeRuntime::builder(config())
        .collaborators(collaborators)
        .persister(InMemorySnapshotStore::default())
        .flusher(MemoryLogSink::new())
        .build()
        .expect("runtime should build");

    let summary = runtime.run_ticks(10);

    assert_eq!(summary.final_tick, 10);
    assert_eq!(summary.failed_stages, 2);
    let learning = runtime.state().read(|s| s.learning().clone());
    assert_eq!(learning, ParamTable::learning_defaults());
}

#[test]
fn maintenance_archives_faded_memories() {
    let queue = Queue::default();
    let (mut runtime, _, _) = runtime(&queue);
    for _ in 0..3 {
        queue.push(Event::new("noise", 0.01));
    }
    queue.push(Event::new("stress", 0.9));

    let mut archived = 0;
    for _ in 0..10 {
        if let Some(report) = runtime.tick().maintenance {
            archived = report.archived;
        }
    }

    // Three trivial events fall under the significance floor.
    assert!(archived >= 3, "archived {}", archived);
    assert_eq!(runtime.memory().archive().by_type("noise").count(), 3);
    assert!(runtime.memory().iter().any(|e: &MemoryEntry| e.event_type == "stress"));
}
