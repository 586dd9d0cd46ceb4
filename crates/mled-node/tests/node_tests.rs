//! Node runtime tests over loopback
//!
//! The group address is pointed at 127.0.0.1, which makes group sends plain
//! unicast and lets a whole exchange run without a multicast-capable
//! network.

use std::net::Ipv4Addr;
use std::time::Duration;

use mled_core::{Body, Flags, MsgType, Packet, Pattern, PatternConfig, TargetMode};
use mled_node::{NodeConfig, NodeRuntime, TracingSink};
use mled_transport::{GroupConfig, PacketReceiver, ShowSocket};
use tokio::time::timeout;

fn loopback_config(port: u16) -> GroupConfig {
    GroupConfig {
        group: Ipv4Addr::LOCALHOST,
        port,
        ..GroupConfig::default()
    }
}

async fn spawn_node(port: u16, node_id: u32, name: &str) -> (ShowSocket, PacketReceiver) {
    let config = loopback_config(port);
    let runtime = NodeRuntime::new(
        NodeConfig::new(node_id, name),
        &config,
        TracingSink,
    )
    .unwrap();
    tokio::spawn(runtime.run());

    let controller = ShowSocket::bind_ephemeral(&config).unwrap();
    let receiver = controller.start_receiver();
    (controller, receiver)
}

async fn recv_kind(
    receiver: &mut PacketReceiver,
    kind: MsgType,
) -> Packet {
    loop {
        let (packet, _) = timeout(Duration::from_secs(2), receiver.recv())
            .await
            .expect("timed out waiting for packet")
            .expect("receiver closed");
        if packet.header.kind() == Some(kind) {
            return packet;
        }
    }
}

#[tokio::test]
async fn test_node_answers_discovery() {
    let (controller, mut receiver) = spawn_node(40628, 0x77, "loop-node").await;

    // Repeated ping burst with a shared msg_id, as a discoverer sends it.
    let ping = Packet::ping(0, 1234);
    for _ in 0..3 {
        controller.send_group(&ping).await.unwrap();
    }

    let pong = recv_kind(&mut receiver, MsgType::Pong).await;
    assert_eq!(pong.header.msg_id, 1234);
    assert_eq!(pong.header.sender_id, 0x77);
    match pong.body {
        Body::Pong(p) => assert_eq!(p.name, "loop-node"),
        other => panic!("expected pong, got {other:?}"),
    }

    // The burst produced exactly one pong.
    assert!(
        timeout(Duration::from_millis(200), receiver.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_prepare_ack_and_scheduled_fire() {
    let (controller, mut receiver) = spawn_node(40629, 0x42, "fire-node").await;

    controller
        .send_group(&Packet::beacon(9, 1, 10_000))
        .await
        .unwrap();
    // An unsynced node asks for a precise sample off the beacon.
    recv_kind(&mut receiver, MsgType::TimeReq).await;

    let mut prepare = Packet::cue_prepare(
        9,
        2,
        mled_core::CuePrepare {
            cue_id: 5,
            fade_in_ms: 0,
            fade_out_ms: 0,
            pattern: PatternConfig::new(
                Pattern::Rainbow {
                    speed: 5,
                    saturation: 100,
                    spread_x10: 10,
                },
                50,
            ),
        },
    );
    prepare.header.flags = Flags {
        target_mode: TargetMode::Node,
        ack_req: true,
    };
    prepare.header.target = 0x42;
    controller.send_group(&prepare).await.unwrap();

    let ack = recv_kind(&mut receiver, MsgType::Ack).await;
    match ack.body {
        Body::Ack(a) => {
            assert_eq!(a.ack_for_msg_id, 2);
            assert_eq!(a.code, 0);
        }
        other => panic!("expected ack, got {other:?}"),
    }

    // Fire slightly in the future; the ack comes back before the deadline.
    let mut fire = Packet::cue_fire(9, 3, 5, 10_500);
    fire.header.flags.ack_req = true;
    controller.send_group(&fire).await.unwrap();

    let ack = recv_kind(&mut receiver, MsgType::Ack).await;
    match ack.body {
        Body::Ack(a) => {
            assert_eq!(a.ack_for_msg_id, 3);
            assert_eq!(a.code, 0);
        }
        other => panic!("expected ack, got {other:?}"),
    }
}
