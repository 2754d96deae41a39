//! End-to-end tests: console lines in, delivery reports out, with the real
//! tick scheduler running in between.
//!
//! These tests run with #[serial] because they depend on wall-clock tick
//! timing; running many schedulers at once on a loaded machine makes the
//! receive timeouts flaky.

use crossbeam_channel::{Receiver, Sender};
use serial_test::serial;
use std::time::Duration;
use ticksim_common::{MessageKind, NodeId, Tick};
use ticksim_registry::NodeError;
use ticksim_runner::{LineOutcome, Report, SimConfig, Simulation};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn start(nodes: usize, config: SimConfig) -> (Simulation<Sender<Report>>, Receiver<Report>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let sim = Simulation::start(&config, nodes, tx).expect("simulation should start");
    (sim, rx)
}

fn fast_config() -> SimConfig {
    SimConfig {
        tick_ms: 2,
        ..SimConfig::default()
    }
}

/// Wait for the next report that is not a `Delivering` line.
fn next_outcome(rx: &Receiver<Report>) -> Report {
    loop {
        let report = rx.recv_timeout(RECV_TIMEOUT).expect("timed out waiting for report");
        if report.is_outcome() {
            return report;
        }
    }
}

/// Submit one line and wait for its outcome.
fn exchange(sim: &Simulation<Sender<Report>>, rx: &Receiver<Report>, line: &str) -> Report {
    let outcome = sim.console().handle_line(line);
    assert!(
        matches!(outcome, LineOutcome::Queued { .. }),
        "{:?} was not queued: {:?}",
        line,
        outcome
    );
    next_outcome(rx)
}

#[test]
#[serial]
fn test_three_node_session() {
    let (sim, rx) = start(3, fast_config());

    assert_eq!(
        exchange(&sim, &rx, "send 0 1 hello"),
        Report::Sent {
            from: NodeId(0),
            to: NodeId(1),
            text: "hello".to_string()
        }
    );
    assert_eq!(
        exchange(&sim, &rx, "show 1"),
        Report::Inbox {
            node: NodeId(1),
            entries: vec!["hello".to_string()]
        }
    );

    assert_eq!(exchange(&sim, &rx, "crash 1"), Report::Crashed { node: NodeId(1) });
    assert_eq!(
        exchange(&sim, &rx, "status 1"),
        Report::Status {
            node: NodeId(1),
            alive: false
        }
    );
    assert_eq!(
        exchange(&sim, &rx, "send 0 1 again"),
        Report::Rejected {
            kind: MessageKind::Send,
            error: NodeError::NotAlive(NodeId(1))
        }
    );

    assert_eq!(exchange(&sim, &rx, "restart 1"), Report::Restarted { node: NodeId(1) });
    // The inbox survives a crash.
    assert_eq!(
        exchange(&sim, &rx, "show 1"),
        Report::Inbox {
            node: NodeId(1),
            entries: vec!["hello".to_string()]
        }
    );
    assert_eq!(exchange(&sim, &rx, "clear 1"), Report::Cleared { node: NodeId(1) });
    assert_eq!(
        exchange(&sim, &rx, "show 1"),
        Report::Inbox {
            node: NodeId(1),
            entries: vec![]
        }
    );

    assert_eq!(sim.console().handle_line("exit"), LineOutcome::Exit);
    let summary = sim.shutdown().unwrap();
    assert_eq!(summary.pending, 0);
    assert!(summary.registry.node(NodeId(1)).unwrap().is_alive());
}

#[test]
#[serial]
fn test_messages_delivered_in_order_no_earlier_than_enqueue_tick() {
    let (sim, rx) = start(2, fast_config());
    let console = sim.console();

    let mut queued_ticks = Vec::new();
    for text in ["a", "b", "c"] {
        match console.handle_line(&format!("send 0 1 {}", text)) {
            LineOutcome::Queued { tick, .. } => queued_ticks.push(tick),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    let mut delivered = Vec::new();
    while delivered.len() < 3 {
        if let Report::Delivering { tick, text, .. } =
            rx.recv_timeout(RECV_TIMEOUT).expect("timed out waiting for delivery")
        {
            delivered.push((tick, text));
        }
    }

    let texts: Vec<&str> = delivered.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(texts, ["a", "b", "c"]);
    for ((delivered_tick, _), queued_tick) in delivered.iter().zip(&queued_ticks) {
        assert!(
            delivered_tick >= queued_tick,
            "delivered on {} but queued on {}",
            delivered_tick,
            queued_tick
        );
    }

    sim.shutdown().unwrap();
}

#[test]
#[serial]
fn test_inbox_bound_through_scheduler() {
    let (sim, rx) = start(2, fast_config());
    let console = sim.console();

    for i in 0..11 {
        assert!(matches!(
            console.handle_line(&format!("send 0 1 m{}", i)),
            LineOutcome::Queued { .. }
        ));
    }

    let outcomes: Vec<Report> = (0..11).map(|_| next_outcome(&rx)).collect();
    let sent = outcomes
        .iter()
        .filter(|r| matches!(r, Report::Sent { .. }))
        .count();
    assert_eq!(sent, 10);
    assert_eq!(
        outcomes[10],
        Report::Rejected {
            kind: MessageKind::Send,
            error: NodeError::InboxFull {
                node: NodeId(1),
                capacity: 10
            }
        }
    );

    let summary = sim.shutdown().unwrap();
    assert_eq!(summary.registry.show(NodeId(1)).unwrap().len(), 10);
}

#[test]
#[serial]
fn test_queue_full_and_prompt_shutdown() {
    // Ticks far apart so nothing is delivered during the test.
    let config = SimConfig {
        tick_ms: 60_000,
        queue_capacity: 4,
        ..SimConfig::default()
    };
    let (sim, rx) = start(2, config);
    let console = sim.console();

    for _ in 0..3 {
        assert!(matches!(console.handle_line("status 0"), LineOutcome::Queued { .. }));
    }
    assert_eq!(
        console.handle_line("status 1"),
        LineOutcome::Rejected("Message queue full! (3 messages pending)".to_string())
    );

    let summary = sim.shutdown().unwrap();
    assert_eq!(summary.pending, 3);
    assert_eq!(summary.final_tick, Tick::ZERO);
    assert!(rx.try_recv().is_err());
}

#[test]
#[serial]
fn test_invalid_lines_never_reach_queue() {
    let (sim, _rx) = start(3, fast_config());
    let console = sim.console();

    assert_eq!(
        console.handle_line("send 0 9 hi"),
        LineOutcome::Rejected("Usage: send <from_id> <to_id> <message>".to_string())
    );
    assert!(matches!(console.handle_line("launch 1"), LineOutcome::Rejected(_)));
    assert_eq!(console.handle_line(""), LineOutcome::Ignored);
    assert!(sim.queue().is_empty());

    sim.shutdown().unwrap();
}
