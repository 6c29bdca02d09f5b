//! End-to-end runs of an ARP responder scenario against a series of
//! candidates, from idle to fully correct.

use std::thread;
use std::time::Duration;

use wirecheck_core::event::Expectation;
use wirecheck_core::matcher::Matcher;
use wirecheck_core::scenario::{EntryStatus, InterfaceType, Scenario};
use wirecheck_core::Outcome;
use wirecheck_engine::{Halt, NetworkProxy, ProxyError, RunReport, RunState, Supervisor};
use wirecheck_protocols::{create_ip_arp_reply, create_ip_arp_request, MacAddr, Packet};

const ROUTER_MAC: &str = "40:00:00:00:00:03";
const CLIENT_MAC: &str = "30:00:00:00:00:01";

fn mac(s: &str) -> MacAddr {
    s.parse().unwrap()
}

fn arp_reply() -> Packet {
    create_ip_arp_reply(
        mac(ROUTER_MAC),
        mac(CLIENT_MAC),
        "10.1.1.2".parse().unwrap(),
        "10.1.1.1".parse().unwrap(),
    )
}

fn arp_scenario() -> Scenario {
    let mut scenario = Scenario::new("ARP request", Duration::from_secs(1));
    let interfaces = [
        ("router-eth0", "40:00:00:00:00:00", "192.168.1.1"),
        ("router-eth1", "40:00:00:00:00:01", "192.168.100.1"),
        ("router-eth2", "40:00:00:00:00:02", "10.0.1.2"),
        ("router-eth3", ROUTER_MAC, "10.1.1.2"),
    ];
    for (name, hw, ip) in interfaces {
        scenario
            .add_interface(
                name,
                mac(hw),
                ip.parse().unwrap(),
                "255.255.255.0".parse().unwrap(),
                InterfaceType::Ethernet,
            )
            .unwrap();
    }

    let request = create_ip_arp_request(
        mac(CLIENT_MAC),
        "10.1.1.1".parse().unwrap(),
        "10.1.1.2".parse().unwrap(),
    );
    scenario
        .expect(Expectation::input("router-eth3", Matcher::exact(request)), "Incoming ARP request")
        .unwrap();
    scenario
        .expect(
            Expectation::output("router-eth3", Matcher::exact(arp_reply())),
            "Outgoing ARP reply (1)",
        )
        .unwrap();
    scenario
        .expect(Expectation::timeout(Duration::from_millis(500)), "Timeout on recv")
        .unwrap();
    scenario
        .expect(
            Expectation::output("router-eth3", Matcher::exact(arp_reply())),
            "Outgoing ARP reply (2)",
        )
        .unwrap();
    scenario
}

async fn run<F>(candidate: F) -> RunReport
where
    F: FnOnce(&mut NetworkProxy) -> anyhow::Result<()> + Send + 'static,
{
    Supervisor::new(arp_scenario()).run(candidate).await.unwrap()
}

fn counts(report: &RunReport) -> (usize, usize, usize) {
    (report.passed(), report.failed(), report.pending())
}

fn failure_detail(report: &RunReport) -> String {
    match &report.scenario.failed_entry().unwrap().status {
        EntryStatus::Failed { detail, .. } => detail.clone(),
        _ => unreachable!(),
    }
}

/// Answers the request, sits out the quiet period and answers again.
fn responder(proxy: &mut NetworkProxy) -> anyhow::Result<()> {
    let request = proxy.receive()?;
    assert_eq!(request.interface, "router-eth3");
    proxy.send("router-eth3", arp_reply())?;
    assert_eq!(proxy.receive(), Err(ProxyError::NoPackets));
    proxy.send("router-eth3", arp_reply())?;
    Ok(())
}

#[tokio::test]
async fn idle_candidate_fails_the_first_event() {
    let report = run(|_proxy: &mut NetworkProxy| -> anyhow::Result<()> { Ok(()) }).await;
    assert_eq!(counts(&report), (0, 1, 3));
    assert_eq!(report.state, RunState::Halted(Halt::Returned));
    assert_eq!(failure_detail(&report), "your code returned, but I was expecting receive");
    assert!(!report.all_passed());
    assert!(!report.to_string().contains("All tests passed"));
}

#[tokio::test]
async fn single_receive_then_return() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert_eq!(report.state, RunState::Halted(Halt::Returned));
    assert_eq!(report.scenario.failed_entry().unwrap().label, "Outgoing ARP reply (1)");
    assert_eq!(failure_detail(&report), "your code returned, but I was expecting send");

    let text = report.to_string();
    assert!(text.starts_with("Results for test scenario ARP request: 1 passed, 1 failed, 2 pending"));
    assert!(text.contains("Passed:\n1 Incoming ARP request\n"));
    assert!(text.contains("Failed:\n    Outgoing ARP reply (1)\n"));
    assert!(!text.contains("All tests passed"));
}

#[tokio::test]
async fn second_receive_is_the_wrong_call() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        proxy.receive()?;
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert_eq!(report.state, RunState::Halted(Halt::Mismatch(Outcome::CallKindMismatch)));
    assert_eq!(failure_detail(&report), "receive was called, but I was expecting send");

    let text = report.to_string();
    assert!(text.starts_with("Results for test scenario ARP request: 1 passed, 1 failed, 2 pending"));
    assert!(text.contains("Passed:\n1 Incoming ARP request\n"));
    assert!(text.contains("Failed:\n    Outgoing ARP reply (1)\n"));
    assert!(text.contains("Pending (couldn't test because of earlier failure):\n1 Timeout on recv\n2 Outgoing ARP reply (2)\n"));
}

#[tokio::test]
async fn stalled_candidate_hits_the_deadline() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        thread::sleep(Duration::from_secs(2));
        proxy.send("router-eth3", arp_reply())?;
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert_eq!(
        report.state,
        RunState::Halted(Halt::DeadlineExceeded(Duration::from_secs(1)))
    );
    let failed = report.scenario.failed_entry().unwrap();
    assert_eq!(failed.label, "Outgoing ARP reply (1)");
    assert!(matches!(failed.status, EntryStatus::Failed { outcome: Outcome::Timeout, .. }));
    assert!(report.to_string().contains("1 Timeout on recv"));
}

#[tokio::test]
async fn correct_responder_passes_everything() {
    let report = run(responder).await;
    assert_eq!(counts(&report), (4, 0, 0));
    assert_eq!(report.state, RunState::Completed);
    assert!(report.all_passed());
    assert!(report.to_string().ends_with("All tests passed!\n"));
}

#[tokio::test]
async fn extra_receive_after_the_last_event_is_flagged() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        responder(proxy)?;
        assert_eq!(proxy.receive(), Err(ProxyError::Shutdown));
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (4, 0, 0));
    assert_eq!(report.state, RunState::Halted(Halt::UnexpectedCall));
    assert_eq!(report.unexpected(), 1);
    assert!(!report.all_passed());
    let text = report.to_string();
    assert!(text.contains("Your code didn't crash, but something unexpected happened."));
    assert!(!text.contains("All tests passed"));
}

#[tokio::test]
async fn extra_send_after_the_last_event_is_flagged() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        responder(proxy)?;
        let _ = proxy.send("router-eth3", arp_reply());
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (4, 0, 0));
    assert_eq!(report.state, RunState::Halted(Halt::UnexpectedCall));
    assert!(report.scenario.unexpected[0].starts_with("send was called"));
}

#[tokio::test]
async fn panic_is_reported_as_a_crash() {
    let report = run(|_proxy: &mut NetworkProxy| -> anyhow::Result<()> { panic!("index out of bounds") }).await;
    assert_eq!(counts(&report), (0, 1, 3));
    assert_eq!(
        report.state,
        RunState::Halted(Halt::Crashed("index out of bounds".to_string()))
    );
    let failed = report.scenario.failed_entry().unwrap();
    assert!(matches!(failed.status, EntryStatus::Failed { outcome: Outcome::Crash, .. }));
    assert!(report.to_string().contains("Your code crashed"));
}

#[tokio::test]
async fn crash_after_the_last_event_keeps_the_counts() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        responder(proxy)?;
        anyhow::bail!("late cleanup failed")
    })
    .await;
    assert_eq!(counts(&report), (4, 0, 0));
    assert_eq!(
        report.state,
        RunState::Halted(Halt::Crashed("late cleanup failed".to_string()))
    );
    assert!(report.scenario.failed_entry().is_none());
    let text = report.to_string();
    assert!(text.contains("Your code crashed after every expected event had happened: late cleanup failed"));
    assert!(!text.contains("All tests passed"));
}

#[tokio::test]
async fn error_return_is_reported_as_a_crash() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        anyhow::bail!("routing table is empty")
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert!(failure_detail(&report).contains("routing table is empty"));
}

#[tokio::test]
async fn reply_on_the_wrong_device() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        let _ = proxy.send("router-eth2", arp_reply());
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert_eq!(report.state, RunState::Halted(Halt::Mismatch(Outcome::EndpointMismatch)));
    assert!(failure_detail(&report).starts_with("output on device router-eth2 unexpected"));
}

#[tokio::test]
async fn reply_with_the_wrong_contents() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        let wrong = create_ip_arp_reply(
            mac(ROUTER_MAC),
            mac(CLIENT_MAC),
            "10.1.1.2".parse().unwrap(),
            "10.1.1.9".parse().unwrap(),
        );
        assert_eq!(proxy.send("router-eth3", wrong), Err(ProxyError::Shutdown));
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 1, 2));
    assert_eq!(report.state, RunState::Halted(Halt::Mismatch(Outcome::PayloadMismatch)));
    assert!(failure_detail(&report).starts_with("an exact match failed"));
}

#[tokio::test]
async fn sending_before_receiving() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        let _ = proxy.send("router-eth3", arp_reply());
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (0, 1, 3));
    assert_eq!(failure_detail(&report), "send was called, but I was expecting receive");
}

#[tokio::test]
async fn early_stop_leaves_events_pending() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        proxy.receive()?;
        proxy.request_stop()?;
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (1, 0, 3));
    assert_eq!(report.state, RunState::Halted(Halt::Stopped));
    assert!(report.scenario.failed_entry().is_none());
    assert!(!report.all_passed());
}

#[tokio::test]
async fn stop_after_the_last_event_completes() {
    let report = run(|proxy: &mut NetworkProxy| -> anyhow::Result<()> {
        responder(proxy)?;
        proxy.request_stop()?;
        Ok(())
    })
    .await;
    assert_eq!(counts(&report), (4, 0, 0));
    assert_eq!(report.state, RunState::Completed);
    assert!(report.all_passed());
}

#[tokio::test]
async fn supervisor_runs_only_once() {
    let mut supervisor = Supervisor::new(arp_scenario());
    supervisor
        .run(|_proxy: &mut NetworkProxy| -> anyhow::Result<()> { Ok(()) })
        .await
        .unwrap();
    let again = supervisor
        .run(|_proxy: &mut NetworkProxy| -> anyhow::Result<()> { Ok(()) })
        .await;
    assert!(matches!(again, Err(wirecheck_engine::EngineError::AlreadyRun)));
}

#[test]
fn blocking_entry_point() {
    let report = Supervisor::new(arp_scenario()).run_blocking(responder).unwrap();
    assert!(report.all_passed());
}
