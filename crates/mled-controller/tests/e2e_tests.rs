//! Controller/node integration over loopback

use std::net::Ipv4Addr;
use std::time::Duration;

use mled_controller::{
    run_show, Controller, ControllerConfig, NodeStatus, ShowOutcome, ShowRequest, ShowSelector,
};
use mled_core::{CuePrepare, Pattern, PatternConfig, Rgb};
use mled_node::{NodeConfig, NodeRuntime, TracingSink};
use mled_transport::GroupConfig;

fn loopback_config(port: u16) -> GroupConfig {
    GroupConfig {
        group: Ipv4Addr::LOCALHOST,
        port,
        ..GroupConfig::default()
    }
}

// Multi-node tests need real multicast: with the unicast degradation two
// reuse-port sockets would split the traffic instead of each seeing it.
// Looping a private group over the loopback interface delivers every
// group send to every member.
fn multicast_config(port: u16) -> GroupConfig {
    GroupConfig {
        group: Ipv4Addr::new(239, 255, 77, 40),
        port,
        interface: Ipv4Addr::LOCALHOST,
        ..GroupConfig::default()
    }
}

fn fast_config() -> ControllerConfig {
    ControllerConfig {
        discovery_timeout: Duration::from_millis(400),
        ack_wait: Duration::from_millis(500),
        fire_delay_ms: 300,
        ..ControllerConfig::default()
    }
}

fn spawn_node(group: &GroupConfig, node_id: u32, name: &str) {
    let runtime = NodeRuntime::new(NodeConfig::new(node_id, name), group, TracingSink).unwrap();
    tokio::spawn(runtime.run());
}

fn test_cue(cue_id: u32) -> CuePrepare {
    CuePrepare {
        cue_id,
        fade_in_ms: 0,
        fade_out_ms: 0,
        pattern: PatternConfig::new(
            Pattern::Breathing {
                speed: 8,
                color: Rgb { r: 255, g: 64, b: 0 },
                min_bri: 10,
                max_bri: 90,
                curve: 0,
            },
            70,
        ),
    }
}

#[tokio::test]
async fn test_discovery_finds_fleet() {
    let group = multicast_config(40640);
    spawn_node(&group, 0x11, "alpha");
    spawn_node(&group, 0x22, "beta");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut controller = Controller::new(&group, fast_config()).unwrap();
    let table = controller.discover().await.unwrap();

    assert_eq!(table.len(), 2);
    let alpha = table.find_by_name("alpha").unwrap();
    assert_eq!(alpha.node_id, 0x11);
    assert_eq!(alpha.status(std::time::Instant::now()), NodeStatus::Online);

    let dtos = table.snapshot(std::time::Instant::now());
    assert_eq!(dtos.len(), 2);
    // DTOs serialize for status output.
    let json = serde_json::to_string(&dtos).unwrap();
    assert!(json.contains("\"alpha\""));
}

#[tokio::test]
async fn test_full_show_converges() {
    let group = loopback_config(40641);
    spawn_node(&group, 0x33, "solo");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut controller = Controller::new(&group, fast_config()).unwrap();
    let mut request = ShowRequest::new(ShowSelector::Name("solo".to_string()), test_cue(7));
    request.sync_window = Duration::from_millis(400);

    let outcome = run_show(&mut controller, request).await.unwrap();
    assert_eq!(outcome, ShowOutcome::Converged { nodes: 1 });

    // The post-fire discovery recorded the active cue.
    let node = controller.nodes().find_by_name("solo").unwrap();
    assert_eq!(node.active_cue_id, 7);
    assert_eq!(node.epoch, controller.epoch());
}

#[tokio::test]
async fn test_show_unknown_target_errors() {
    let group = loopback_config(40642);
    spawn_node(&group, 0x44, "present");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut controller = Controller::new(&group, fast_config()).unwrap();
    let request = ShowRequest::new(ShowSelector::Name("absent".to_string()), test_cue(1));

    assert!(run_show(&mut controller, request).await.is_err());
}

#[tokio::test]
async fn test_cancel_clears_active_cue() {
    let group = loopback_config(40643);
    spawn_node(&group, 0x55, "cancellable");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut controller = Controller::new(&group, fast_config()).unwrap();
    let mut request = ShowRequest::new(ShowSelector::All, test_cue(9));
    request.sync_window = Duration::from_millis(400);
    let outcome = run_show(&mut controller, request).await.unwrap();
    assert_eq!(outcome, ShowOutcome::Converged { nodes: 1 });

    controller.cancel(9).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    controller.discover().await.unwrap();
    let node = controller.nodes().get(0x55).unwrap();
    assert_eq!(node.active_cue_id, 0);
}
