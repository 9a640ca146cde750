//! Tests for single guard cycles: ordering, fail-fast, tolerance, terminal state.

use std::sync::Arc;

use killer::channel::Channel;
use killer::config::{parse_config, WhitelistPolicy};
use killer::guard::{Guard, GuardError, GuardState, Verdict};
use killer::kill::KillTrigger;
use killer::matcher::{Violation, ViolationReason};
use killer::probes::ProbeError;

use super::fakes::{paired, unavailable, FakeProbes, FakeState, RecordingPowerOff};

const FULL_POLICY: &str = r#"
[linux.bluetooth]
paired = { "DE:AF:BE:EF:CA:FE" = "Generic Bluetooth Device" }
connected = ["DE:AF:BE:EF:CA:FE"]

[linux.usb]
allowed = ["1d6b:0002"]
required = ["1d6b:0002"]

[linux.tray]
drive = "/dev/sr0"
whitelisted_status = 1

[linux.ethernet]
carrier_file = "/sys/class/net/eth0/carrier"
expected_carrier = true
"#;

fn full_policy() -> Arc<WhitelistPolicy> {
    Arc::new(parse_config(FULL_POLICY).expect("policy").linux)
}

fn minimal_policy() -> Arc<WhitelistPolicy> {
    Arc::new(
        parse_config("[linux.usb]\nallowed = [\"1d6b:0002\"]\n")
            .expect("policy")
            .linux,
    )
}

fn guard_with(
    policy: Arc<WhitelistPolicy>,
    state: FakeState,
) -> (Guard<FakeProbes>, FakeProbes, RecordingPowerOff) {
    let probes = FakeProbes::new(state);
    let power = RecordingPowerOff::new();
    let guard = Guard::new(
        policy,
        probes.clone(),
        KillTrigger::new(Box::new(power.clone())),
    );
    (guard, probes, power)
}

fn expect_violation(verdict: Verdict) -> Violation {
    match verdict {
        Verdict::Violation(violation) => violation,
        Verdict::Clean => panic!("expected a violation, got a clean cycle"),
    }
}

fn matching_state() -> FakeState {
    let mut state = FakeState {
        paired: Ok(vec![paired("DE:AF:BE:EF:CA:FE", "Generic Bluetooth Device")]),
        ..FakeState::default()
    };
    state.connected.insert("DE:AF:BE:EF:CA:FE".to_owned(), true);
    state
}

#[tokio::test]
async fn matching_host_never_fires_the_trigger() {
    let (mut guard, probes, power) = guard_with(full_policy(), matching_state());

    for _ in 0..3 {
        let verdict = guard.run_cycle().await.expect("cycle");
        assert_eq!(verdict, Verdict::Clean);
    }

    assert_eq!(power.count(), 0);
    assert_eq!(guard.state(), GuardState::Running);
    assert!(probes.calls().contains(&Channel::Ethernet));
}

#[tokio::test]
async fn channels_run_in_fixed_order() {
    let (mut guard, probes, _power) = guard_with(full_policy(), matching_state());
    guard.run_cycle().await.expect("cycle");

    let mut seen = probes.calls();
    seen.dedup();
    assert_eq!(
        seen,
        vec![
            Channel::Bluetooth,
            Channel::Usb,
            Channel::Ac,
            Channel::Battery,
            Channel::Tray,
            Channel::Ethernet,
        ]
    );
}

#[tokio::test]
async fn optional_channels_are_skipped_when_unconfigured() {
    let (guard, probes, _power) = guard_with(minimal_policy(), FakeState::default());
    assert_eq!(
        guard.channels(),
        vec![Channel::Bluetooth, Channel::Usb, Channel::Ac, Channel::Battery]
    );

    guard.evaluate().await.expect("evaluate");
    assert!(!probes.calls().contains(&Channel::Tray));
    assert!(!probes.calls().contains(&Channel::Ethernet));
}

#[tokio::test]
async fn disallowed_usb_device_fires_once_and_stops_the_cycle() {
    let state = FakeState {
        usb: Ok(vec!["1d6b:0002".to_owned(), "05ac:12a8".to_owned()]),
        ..FakeState::default()
    };
    let (mut guard, probes, power) = guard_with(minimal_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason, ViolationReason::UsbAllowedWhitelist);
    assert_eq!(violation.reason.tag(), "USB Allowed Whitelist");
    assert_eq!(power.count(), 1);

    let calls = probes.calls();
    assert!(!calls.contains(&Channel::Ac));
    assert!(!calls.contains(&Channel::Battery));
    assert_eq!(guard.state(), GuardState::ShuttingDown);
}

#[tokio::test]
async fn missing_required_usb_device_fires() {
    let state = FakeState {
        usb: Ok(Vec::new()),
        ..matching_state()
    };
    let (mut guard, _probes, power) = guard_with(full_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "USB Connected Whitelist");
    assert_eq!(power.count(), 1);
}

#[tokio::test]
async fn ac_loss_fires_on_the_next_cycle() {
    let (mut guard, probes, power) = guard_with(minimal_policy(), FakeState::default());

    assert_eq!(guard.run_cycle().await.expect("cycle"), Verdict::Clean);
    probes.update(|s| s.ac = Ok(false));

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "AC");
    assert_eq!(power.count(), 1);
}

#[tokio::test]
async fn unavailable_battery_is_not_a_violation() {
    let state = FakeState {
        battery: Err(unavailable(Channel::Battery)),
        ..FakeState::default()
    };
    let (mut guard, _probes, power) = guard_with(minimal_policy(), state);

    assert_eq!(guard.run_cycle().await.expect("cycle"), Verdict::Clean);
    assert_eq!(power.count(), 0);
}

#[tokio::test]
async fn unavailable_bluetooth_is_not_a_violation() {
    let state = FakeState {
        paired: Err(unavailable(Channel::Bluetooth)),
        ..FakeState::default()
    };
    let (mut guard, probes, power) = guard_with(minimal_policy(), state);

    assert_eq!(guard.run_cycle().await.expect("cycle"), Verdict::Clean);
    assert_eq!(power.count(), 0);
    assert!(probes.calls().contains(&Channel::Usb));
}

#[tokio::test]
async fn unavailable_ac_is_fatal_and_never_fires() {
    let state = FakeState {
        ac: Err(unavailable(Channel::Ac)),
        ..FakeState::default()
    };
    let (mut guard, probes, power) = guard_with(minimal_policy(), state);

    let err = guard.run_cycle().await.expect_err("fatal");
    assert!(matches!(
        err,
        GuardError::Probe(ProbeError::Unavailable {
            channel: Channel::Ac,
            ..
        })
    ));
    assert_eq!(power.count(), 0);
    assert!(!probes.calls().contains(&Channel::Battery));
}

#[tokio::test]
async fn battery_resource_error_is_fatal() {
    let state = FakeState {
        battery: Err(ProbeError::Resource {
            channel: Channel::Battery,
            details: "permission denied".to_owned(),
        }),
        ..FakeState::default()
    };
    let (mut guard, _probes, power) = guard_with(minimal_policy(), state);

    assert!(guard.run_cycle().await.is_err());
    assert_eq!(power.count(), 0);
}

#[tokio::test]
async fn probe_timeout_is_fatal_even_on_tolerant_channels() {
    let state = FakeState {
        paired: Err(ProbeError::Timeout {
            channel: Channel::Bluetooth,
            seconds: 10,
        }),
        ..FakeState::default()
    };
    let (mut guard, _probes, _power) = guard_with(minimal_policy(), state);

    assert!(matches!(
        guard.run_cycle().await,
        Err(GuardError::Probe(ProbeError::Timeout { .. }))
    ));
}

#[tokio::test]
async fn unexpected_tray_status_fires_cd_tray() {
    let state = FakeState {
        tray: Ok(2),
        ..matching_state()
    };
    let (mut guard, probes, power) = guard_with(full_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "CD Tray");
    assert_eq!(power.count(), 1);
    assert!(!probes.calls().contains(&Channel::Ethernet));
}

#[tokio::test]
async fn ethernet_carrier_change_fires() {
    let state = FakeState {
        ethernet: Ok(false),
        ..matching_state()
    };
    let (mut guard, _probes, power) = guard_with(full_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "Ethernet");
    assert_eq!(power.count(), 1);
}

#[tokio::test]
async fn unknown_paired_device_fires_without_connection_query() {
    let state = FakeState {
        paired: Ok(vec![paired("AA:BB:CC:DD:EE:FF", "Rogue Keyboard")]),
        ..matching_state()
    };
    let (mut guard, probes, power) = guard_with(full_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "Bluetooth Paired");
    assert_eq!(power.count(), 1);
    // Only the list query ran.
    assert_eq!(probes.calls(), vec![Channel::Bluetooth]);
}

#[tokio::test]
async fn connected_device_with_wrong_name_fires_name_mismatch() {
    let mut state = FakeState {
        paired: Ok(vec![paired("DE:AF:BE:EF:CA:FE", "Evil Twin")]),
        ..FakeState::default()
    };
    state.connected.insert("DE:AF:BE:EF:CA:FE".to_owned(), true);
    let (mut guard, _probes, _power) = guard_with(full_policy(), state);

    let verdict = guard.run_cycle().await.expect("cycle");
    let violation = expect_violation(verdict);
    assert_eq!(violation.reason.tag(), "Bluetooth Connected Name Mismatch");
}

#[tokio::test]
async fn shut_down_guard_refuses_further_cycles() {
    let state = FakeState {
        ac: Ok(false),
        ..FakeState::default()
    };
    let (mut guard, probes, power) = guard_with(minimal_policy(), state);

    assert!(matches!(
        guard.run_cycle().await,
        Ok(Verdict::Violation(_))
    ));
    let calls_after_first = probes.calls().len();

    assert!(matches!(
        guard.run_cycle().await,
        Err(GuardError::AlreadyShutDown)
    ));
    assert_eq!(probes.calls().len(), calls_after_first);
    assert_eq!(power.count(), 1);
}

#[tokio::test]
async fn evaluate_reports_without_firing() {
    let state = FakeState {
        ac: Ok(false),
        ..FakeState::default()
    };
    let (guard, _probes, power) = guard_with(minimal_policy(), state);

    let verdict = guard.evaluate().await.expect("evaluate");
    assert!(matches!(verdict, Verdict::Violation(ref v) if v.reason == ViolationReason::Ac));
    assert_eq!(power.count(), 0);
    assert_eq!(guard.state(), GuardState::Running);
}

#[tokio::test]
async fn failing_power_off_still_latches_shutdown() {
    let state = FakeState {
        ac: Ok(false),
        ..FakeState::default()
    };
    let power = RecordingPowerOff::failing();
    let mut guard = Guard::new(
        minimal_policy(),
        FakeProbes::new(state),
        KillTrigger::new(Box::new(power.clone())),
    );

    assert!(matches!(guard.run_cycle().await, Err(GuardError::Kill(_))));
    assert_eq!(guard.state(), GuardState::ShuttingDown);
    assert!(matches!(
        guard.run_cycle().await,
        Err(GuardError::AlreadyShutDown)
    ));
    assert_eq!(power.count(), 1);
}
