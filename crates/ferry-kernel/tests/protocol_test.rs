//! Integration tests for the boarding protocol.
//!
//! Passengers are spawned directly against a dock so each scenario controls
//! exactly who is on the dock. Every run is wrapped in a timeout: a test that
//! hits it has found a deadlock.

use std::sync::Arc;

use acton_reactive::prelude::*;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};

use ferry_kernel::actors::CrossingLedger;
use ferry_kernel::{
    audit_journal, Dock, DockConfig, DockOccupancy, DockSnapshot, EventKind, FerryError,
    GroupComposition,
    MemoryJournal, Passenger, PassengerTag, PassengerType, ReportLedger, Role, Voyage,
};

const DEADLOCK_GUARD: Duration = Duration::from_secs(20);

fn test_config(riders_per_type: usize) -> DockConfig {
    DockConfig {
        riders_per_type,
        max_hacker_delay_ms: 0,
        max_surfer_delay_ms: 0,
        max_cruise_ms: 5,
        max_recheck_ms: 20,
        dock_capacity: 5,
    }
}

fn dock_with_journal(config: DockConfig) -> (Arc<Dock>, MemoryJournal) {
    let journal = MemoryJournal::new();
    let dock = Dock::builder(config)
        .sink(Arc::new(journal.clone()))
        .build()
        .unwrap();
    (dock, journal)
}

fn board(
    dock: &Arc<Dock>,
    kind: PassengerType,
    id: u32,
) -> JoinHandle<Result<Voyage, FerryError>> {
    board_seeded(dock, kind, id, 0)
}

fn board_seeded(
    dock: &Arc<Dock>,
    kind: PassengerType,
    id: u32,
    round: u64,
) -> JoinHandle<Result<Voyage, FerryError>> {
    let seed = round * 1_000 + u64::from(id) * 31 + kind as u64;
    let passenger = Passenger::new(PassengerTag::new(kind, id), seed);
    tokio::spawn(passenger.run(dock.clone()))
}

async fn wait_until(dock: &Dock, what: &str, done: impl Fn(&DockSnapshot) -> bool) {
    timeout(DEADLOCK_GUARD, async {
        while !done(&dock.snapshot()) {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}: {:?}", dock.snapshot()));
}

async fn finish(handles: Vec<JoinHandle<Result<Voyage, FerryError>>>) -> Vec<Voyage> {
    timeout(DEADLOCK_GUARD, join_all(handles))
        .await
        .expect("passengers deadlocked")
        .into_iter()
        .map(|joined| joined.expect("passenger task panicked").expect("passenger failed"))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_population_drains_dock() {
    for (round, capacity) in [5, 6, 7, 5, 6, 7, 8, 5].into_iter().enumerate() {
        let config = DockConfig {
            dock_capacity: capacity,
            ..test_config(8)
        };
        let (dock, journal) = dock_with_journal(config.clone());

        let mut handles = Vec::new();
        for id in 1..=8 {
            handles.push(board_seeded(&dock, PassengerType::Hacker, id, round as u64));
            handles.push(board_seeded(&dock, PassengerType::Surfer, id, round as u64));
        }
        let voyages = finish(handles).await;

        let snapshot = dock.snapshot();
        assert!(snapshot.is_drained(), "round {round}: dock not drained: {snapshot:?}");
        assert_eq!(snapshot.crossings, 4);
        assert_eq!(snapshot.admissions, 16);
        assert_eq!(snapshot.free_capacity, capacity);

        let captains = voyages.iter().filter(|v| v.role == Role::Captain).count();
        assert_eq!(captains as u64, snapshot.crossings);
        for crossing in 1..=snapshot.crossings {
            let aboard: Vec<&Voyage> =
                voyages.iter().filter(|v| v.crossing == crossing).collect();
            assert_eq!(aboard.len(), 4, "crossing {crossing} carried {}", aboard.len());
            assert_eq!(
                aboard.iter().filter(|v| v.role == Role::Captain).count(),
                1,
                "crossing {crossing} needs exactly one captain"
            );
        }

        let report = audit_journal(&journal.events(), capacity, true);
        assert!(report.is_clean(), "round {round}: {:#?}", report.violations);
        assert_eq!(report.crossings.len(), 4);
        assert_eq!(report.passengers, 16);
    }
}

#[tokio::test]
async fn test_four_hackers_form_one_group() {
    let (dock, journal) = dock_with_journal(test_config(4));

    let handles = (1..=4)
        .map(|id| board(&dock, PassengerType::Hacker, id))
        .collect();
    let voyages = finish(handles).await;

    assert!(voyages.iter().all(|v| v.crossing == 1));
    let snapshot = dock.snapshot();
    assert_eq!(snapshot.free_capacity, 5);
    assert_eq!(snapshot.occupancy, DockOccupancy::default());

    let report = audit_journal(&journal.events(), 5, true);
    assert!(report.is_clean(), "{:#?}", report.violations);
    assert_eq!(report.count(GroupComposition::FourHackers), 1);
}

#[tokio::test]
async fn test_two_hackers_wait_without_deadlock() {
    let (dock, journal) = dock_with_journal(test_config(2));

    let hackers: Vec<_> = (1..=2)
        .map(|id| board(&dock, PassengerType::Hacker, id))
        .collect();
    wait_until(&dock, "two hackers on the dock", |s| {
        s.occupancy == DockOccupancy::new(2, 0)
    })
    .await;

    sleep(Duration::from_millis(50)).await;
    let snapshot = dock.snapshot();
    assert_eq!(snapshot.crossings, 0);
    assert_eq!(snapshot.free_capacity, 3);
    assert!(hackers.iter().all(|h| !h.is_finished()));

    // Two surfers complete a mixed group, proving the hackers were parked,
    // not wedged.
    let mut handles = hackers;
    handles.extend((1..=2).map(|id| board(&dock, PassengerType::Surfer, id)));
    finish(handles).await;

    let report = audit_journal(&journal.events(), 5, true);
    assert!(report.is_clean(), "{:#?}", report.violations);
    assert_eq!(report.count(GroupComposition::Mixed), 1);
    assert!(dock.snapshot().is_drained());
}

#[tokio::test]
async fn test_mixed_group_leaves_third_hacker_behind() {
    let (dock, journal) = dock_with_journal(test_config(4));

    let mut crossing = Vec::new();
    for id in 1..=3 {
        crossing.push(board(&dock, PassengerType::Hacker, id));
        wait_until(&dock, "hacker registration", |s| s.occupancy.hackers == id as usize).await;
    }
    crossing.push(board(&dock, PassengerType::Surfer, 1));
    wait_until(&dock, "surfer registration", |s| s.occupancy.surfers == 1).await;
    crossing.push(board(&dock, PassengerType::Surfer, 2));

    wait_until(&dock, "mixed crossing", |s| {
        s.crossings == 1 && !s.crossing_in_flight
    })
    .await;

    let snapshot = dock.snapshot();
    assert_eq!(snapshot.occupancy, DockOccupancy::new(1, 0));
    assert_eq!(snapshot.free_capacity, 4);

    // Exactly one of the five is still parked on the hacker gate.
    sleep(Duration::from_millis(20)).await;
    let parked: Vec<_> = crossing.iter().filter(|h| !h.is_finished()).collect();
    assert_eq!(parked.len(), 1);

    // Teardown wakes the straggler instead of leaking it.
    dock.close();
    let outcomes = timeout(DEADLOCK_GUARD, join_all(crossing))
        .await
        .expect("teardown left a waiter behind");
    let closed = outcomes
        .into_iter()
        .map(|joined| joined.expect("passenger task panicked"))
        .filter(|outcome| matches!(outcome, Err(FerryError::Closed(_))))
        .count();
    assert_eq!(closed, 1);

    let report = audit_journal(&journal.events(), 5, false);
    assert!(report.is_clean(), "{:#?}", report.violations);
    assert_eq!(report.count(GroupComposition::Mixed), 1);
}

#[tokio::test]
async fn test_zero_cruise_time_still_runs_barrier() {
    let config = DockConfig {
        max_cruise_ms: 0,
        ..test_config(4)
    };
    let (dock, journal) = dock_with_journal(config);

    let handles = (1..=4)
        .map(|id| board(&dock, PassengerType::Surfer, id))
        .collect();
    let voyages = finish(handles).await;

    assert_eq!(voyages.iter().filter(|v| v.role == Role::Crew).count(), 3);
    let report = audit_journal(&journal.events(), 5, true);
    assert!(report.is_clean(), "{:#?}", report.violations);
    assert_eq!(report.count(GroupComposition::FourSurfers), 1);
}

#[tokio::test]
async fn test_full_dock_sends_passengers_away() {
    let (dock, journal) = dock_with_journal(test_config(2));

    for _ in 0..5 {
        assert!(dock.try_admit().await.unwrap());
    }
    assert!(!dock.try_admit().await.unwrap());

    let latecomer = board(&dock, PassengerType::Hacker, 1);
    timeout(DEADLOCK_GUARD, async {
        while journal
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::IsBack)
            .count()
            < 2
        {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("latecomer never retried");

    dock.close();
    let outcome = timeout(DEADLOCK_GUARD, latecomer)
        .await
        .expect("latecomer stuck after teardown")
        .expect("passenger task panicked");
    assert!(matches!(outcome, Err(FerryError::Closed("admission gate"))));

    let events = journal.events();
    assert!(events.iter().all(|e| e.kind != EventKind::Waits));
    let report = audit_journal(&events, 5, false);
    assert!(report.is_clean(), "{:#?}", report.violations);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ledger_sees_every_crossing_in_order() {
    let mut runtime = ActonApp::launch_async().await;
    let (tx, mut rx) = mpsc::channel(1);
    let ledger = CrossingLedger::new(tx).spawn(&mut runtime).await;

    let dock = Dock::builder(test_config(6))
        .ledger(ledger.clone())
        .build()
        .unwrap();

    let mut handles = Vec::new();
    for id in 1..=6 {
        handles.push(board(&dock, PassengerType::Surfer, id));
        handles.push(board(&dock, PassengerType::Hacker, id));
    }
    finish(handles).await;

    ledger.send(ReportLedger).await;
    let report = timeout(DEADLOCK_GUARD, rx.recv())
        .await
        .expect("ledger did not answer")
        .expect("ledger channel closed");

    assert_eq!(report.completed as u64, dock.snapshot().crossings);
    assert_eq!(report.boarded(), 3);
    assert!(report.is_consistent());
    assert_eq!(report.in_flight, None);

    runtime.shutdown_all().await.unwrap();
}

#[test]
fn test_invalid_config_rejected_before_start() {
    let config = DockConfig {
        dock_capacity: 4,
        ..test_config(4)
    };
    assert!(matches!(
        Dock::builder(config).build(),
        Err(FerryError::InvalidConfig(_))
    ));
}
