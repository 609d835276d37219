//! Full protocol sessions and scenario files.

use std::io::Cursor;
use std::path::PathBuf;

use harvest_headless::protocol::{Response, StateSnapshot};
use harvest_headless::runner::{HeadlessConfig, HeadlessRunner};
use harvest_headless::scenario::{Scenario, ScenarioError};
use harvest_test_utils::determinism::verify_determinism;

fn session(input: &str) -> Vec<Response> {
    let mut runner = HeadlessRunner::new();
    let mut output = Vec::new();
    runner
        .run(Cursor::new(input.to_string()), &mut output)
        .expect("in-memory I/O");

    String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid response line"))
        .collect()
}

fn send(runner: &mut HeadlessRunner, line: &str) -> Response {
    runner.handle(serde_json::from_str(line).expect("valid command"))
}

fn created_id(response: &Response) -> u64 {
    match response {
        Response::Ack { id: Some(id), .. } => *id,
        other => panic!("expected an id, got {other:?}"),
    }
}

fn bundled_scenario() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/two_bases.ron")
}

#[test]
fn session_answers_every_line() {
    let responses = session(
        r#"{"cmd":"tick","count":3}

{"cmd":"hash"}
not json
{"cmd":"quit"}
{"cmd":"tick"}
"#,
    );

    assert_eq!(responses.len(), 5);
    assert_eq!(responses[0], Response::ready(0));
    assert!(matches!(responses[1], Response::Ticked(ref t) if t.tick == 3));
    assert!(matches!(responses[2], Response::StateHash { tick: 3, .. }));
    assert!(matches!(responses[3], Response::Error { cmd: None, .. }));
    assert_eq!(responses[4], Response::Bye);
}

#[test]
fn huge_coordinates_get_an_error_line() {
    let responses = session(
        r#"{"cmd":"spawn_hostile","x":1e12,"y":0.0}
{"cmd":"create_resource","x":0.0,"y":-1e300,"amount":5}
{"cmd":"create_base","x":2.5,"y":0.0}
{"cmd":"quit"}
"#,
    );

    assert_eq!(responses.len(), 5);
    assert_eq!(
        responses[1],
        Response::error("Coordinate out of range", Some("spawn_hostile"))
    );
    assert_eq!(
        responses[2],
        Response::error("Coordinate out of range", Some("create_resource"))
    );
    assert!(matches!(responses[3], Response::Ack { id: Some(_), .. }));
    assert_eq!(responses[4], Response::Bye);
}

#[test]
fn harvest_through_the_protocol() {
    let mut runner = HeadlessRunner::new();
    let base = created_id(&send(&mut runner, r#"{"cmd":"create_base","x":0.0,"y":0.0}"#));

    let Response::State(state) = send(&mut runner, r#"{"cmd":"query"}"#) else {
        panic!("query must return state");
    };
    assert_eq!(state.bases.len(), 1);
    assert_eq!(state.bases[0].id, base);
    assert!(state.workers.iter().all(|w| w.base == base && w.state == "Idle"));
    assert!(!state.nodes.is_empty());
    let supply: u64 = state.nodes.iter().map(|n| u64::from(n.amount)).sum();

    send(&mut runner, r#"{"cmd":"assign_nearest"}"#);
    let Response::Ticked(summary) = send(&mut runner, r#"{"cmd":"tick","count":600}"#) else {
        panic!("tick must summarise");
    };
    assert!(summary.delivered > 0);

    let state = StateSnapshot::capture(runner.simulation());
    let carried: u64 = state.workers.iter().map(|w| u64::from(w.carried)).sum();
    let remaining: u64 = state.nodes.iter().map(|n| u64::from(n.amount)).sum();
    assert_eq!(state.bank.collected_total, summary.delivered);
    assert_eq!(state.bank.collected_total + carried + remaining, supply);
}

#[test]
fn stale_ids_are_rejected_after_removal() {
    let mut runner = HeadlessRunner::new();
    let base = created_id(&send(&mut runner, r#"{"cmd":"create_base","x":0.0,"y":0.0}"#));
    let spawn = format!(r#"{{"cmd":"spawn_worker","base":{base},"x":1.0,"y":1.0}}"#);
    let worker = created_id(&send(&mut runner, &spawn));

    let remove = format!(r#"{{"cmd":"remove_worker","worker":{worker}}}"#);
    assert_eq!(
        send(&mut runner, &remove),
        Response::ack("remove_worker")
    );
    assert!(matches!(
        send(&mut runner, &remove),
        Response::Error { .. }
    ));

    let select = format!(r#"{{"cmd":"select","worker":{worker},"selected":true}}"#);
    assert!(matches!(
        send(&mut runner, &select),
        Response::Error { .. }
    ));
}

#[test]
fn purchases_fail_without_stockpile() {
    let mut runner = HeadlessRunner::new();
    let base = created_id(&send(&mut runner, r#"{"cmd":"create_base","x":0.0,"y":0.0}"#));
    let buy = format!(r#"{{"cmd":"purchase_defender","base":{base},"kind":"fast"}}"#);

    assert_eq!(
        send(&mut runner, &buy),
        Response::error("Purchase rejected", Some("purchase_defender"))
    );
    assert!(runner.simulation().defenders().is_empty());
}

#[test]
fn bundled_scenario_loads() {
    let scenario = Scenario::load(bundled_scenario()).expect("bundled scenario parses");
    assert_eq!(scenario.name, "Two bases");
    assert_eq!(scenario.bases.len(), 2);
    assert_eq!(scenario.defenders.len(), 2);
    assert_eq!(scenario.config.workers_per_base, 5);
    assert!(scenario.config.hostiles_vulnerable);

    let run = scenario.start();
    assert_eq!(run.sim.workers().len(), 10);
    assert_eq!(run.sim.defenders().len(), 2);
    assert_eq!(run.pending_waves(), 3);
}

#[test]
fn scenario_session_runs_waves() {
    let scenario = Scenario::load(bundled_scenario()).expect("bundled scenario parses");
    let mut runner = HeadlessRunner::with_config(HeadlessConfig {
        auto_state_output: true,
        scenario: Some(scenario),
    });

    let response = send(&mut runner, r#"{"cmd":"tick","count":401}"#);
    let Response::State(state) = response else {
        panic!("auto state output expected");
    };
    assert_eq!(state.tick, 401);
    assert_eq!(state.hostiles.len(), 2);
    assert!(state.hostiles.iter().all(|h| h.kind == "fast" && h.health.is_some()));
}

#[test]
fn scenario_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();

    let good = dir.path().join("good.ron");
    let contents = r#"Scenario(name: "Disk", bases: [(x: 0.0, y: 0.0)], ticks: 10)"#;
    std::fs::write(&good, contents).unwrap();
    let scenario = Scenario::resolve(good.to_str().unwrap()).expect("valid file");
    assert_eq!(scenario.ticks, 10);

    let bad = dir.path().join("bad.ron");
    std::fs::write(&bad, "Scenario(name: 3)").unwrap();
    assert!(matches!(Scenario::load(&bad), Err(ScenarioError::ParseError(_))));

    let far = dir.path().join("far.ron");
    std::fs::write(&far, r#"Scenario(name: "Far", bases: [(x: -5e9, y: 0.0)])"#).unwrap();
    assert!(matches!(
        Scenario::load(&far),
        Err(ScenarioError::OutOfRange { what: "base", index: 0 })
    ));

    assert!(matches!(
        Scenario::load(dir.path().join("missing.ron")),
        Err(ScenarioError::FileNotFound(_))
    ));
}

#[test]
fn scenario_runs_are_deterministic() {
    let scenario = Scenario::load(bundled_scenario()).expect("bundled scenario parses");
    let result = verify_determinism(
        3,
        1500,
        || scenario.start_with_seed(99),
        |run| {
            run.step();
        },
        |run| run.sim.state_hash(),
    );
    result.assert_deterministic();
}

#[test]
fn seeds_change_the_layout() {
    let scenario = Scenario::siege();
    let a = scenario.start_with_seed(1).sim.state_hash();
    let b = scenario.start_with_seed(2).sim.state_hash();
    assert_ne!(a, b);
}
