//! Multicast UDP socket for MLED traffic
//!
//! One [`ShowSocket`] serves both roles: group sends go to the configured
//! multicast address, replies go unicast to the observed source address.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use mled_core::{Packet, DEFAULT_GROUP, DEFAULT_PORT, DEFAULT_TTL};

use crate::error::{Result, TransportError};

/// Multicast group configuration
#[derive(Debug, Clone)]
pub struct GroupConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    pub ttl: u32,
    /// Local interface to bind/join on
    pub interface: Ipv4Addr,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP,
            port: DEFAULT_PORT,
            ttl: DEFAULT_TTL,
            interface: Ipv4Addr::UNSPECIFIED,
        }
    }
}

impl GroupConfig {
    /// The group's socket address
    pub fn group_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.group, self.port))
    }
}

/// A UDP socket joined to the MLED multicast group
pub struct ShowSocket {
    socket: Arc<UdpSocket>,
    group_addr: SocketAddr,
}

impl ShowSocket {
    /// Bind to the group port and join the group
    ///
    /// If the configured group address is not actually multicast the join is
    /// skipped and group sends degrade to unicast toward that address, which
    /// lets two sockets exercise the full protocol over loopback.
    pub fn bind(config: &GroupConfig) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        if config.group.is_multicast() {
            socket.join_multicast_v4(&config.group, &config.interface)?;
            socket.set_multicast_if_v4(&config.interface)?;
            socket.set_multicast_ttl_v4(config.ttl)?;
            socket.set_multicast_loop_v4(true)?;
        }

        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;

        debug!(group = %config.group, port = config.port, "show socket bound");

        Ok(Self {
            socket: Arc::new(socket),
            group_addr: config.group_addr(),
        })
    }

    /// Bind to an ephemeral local port without joining the group
    ///
    /// Used by short-lived senders that only need unicast replies. Group
    /// sends still egress the configured interface and loop back to local
    /// members, so a sender on the same host reaches its own fleet.
    pub fn bind_ephemeral(config: &GroupConfig) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
        socket
            .bind(&bind_addr.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        if config.group.is_multicast() {
            socket.set_multicast_if_v4(&config.interface)?;
            socket.set_multicast_ttl_v4(config.ttl)?;
            socket.set_multicast_loop_v4(true)?;
        }
        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;

        Ok(Self {
            socket: Arc::new(socket),
            group_addr: config.group_addr(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// The address group sends are directed at
    pub fn group_addr(&self) -> SocketAddr {
        self.group_addr
    }

    /// Send a packet to the multicast group
    pub async fn send_group(&self, packet: &Packet) -> Result<()> {
        self.send_to(packet, self.group_addr).await
    }

    /// Send a packet unicast
    pub async fn send_to(&self, packet: &Packet, target: SocketAddr) -> Result<()> {
        let wire = packet.encode()?;
        self.socket
            .send_to(&wire, target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    /// Send pre-encoded bytes, for repeated sends of the same packet
    pub async fn send_raw(&self, wire: &Bytes, target: SocketAddr) -> Result<()> {
        self.socket
            .send_to(wire, target)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;
        Ok(())
    }

    /// Start decoding inbound datagrams into a channel
    ///
    /// Datagrams that fail to decode are logged and dropped; they never tear
    /// down the receiver.
    pub fn start_receiver(&self) -> PacketReceiver {
        let (tx, rx) = mpsc::channel(100);
        let socket = self.socket.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];

            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, from)) => match Packet::decode(&buf[..len]) {
                        Ok(packet) => {
                            if tx.send((packet, from)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(%from, len, "dropping undecodable datagram: {}", e);
                        }
                    },
                    Err(e) => {
                        error!("receive error: {}", e);
                        break;
                    }
                }
            }
        });

        PacketReceiver { rx }
    }
}

/// Stream of decoded packets with their source addresses
pub struct PacketReceiver {
    rx: mpsc::Receiver<(Packet, SocketAddr)>,
}

impl PacketReceiver {
    pub async fn recv(&mut self) -> Option<(Packet, SocketAddr)> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config(port: u16) -> GroupConfig {
        GroupConfig {
            group: Ipv4Addr::LOCALHOST,
            port,
            ..GroupConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let sock = ShowSocket::bind_ephemeral(&GroupConfig::default()).unwrap();
        assert!(sock.local_addr().unwrap().port() > 0);
    }

    #[tokio::test]
    async fn test_send_recv_over_loopback() {
        let config = loopback_config(40626);
        let server = ShowSocket::bind(&config).unwrap();
        let client = ShowSocket::bind_ephemeral(&config).unwrap();

        let mut receiver = server.start_receiver();

        let ping = Packet::ping(7, 99);
        client.send_group(&ping).await.unwrap();

        let (packet, from) = receiver.recv().await.unwrap();
        assert_eq!(packet, ping);
        assert_eq!(from.port(), client.local_addr().unwrap().port());
    }

    #[tokio::test]
    async fn test_group_send_reaches_every_member() {
        // Real multicast over the loopback interface: both member sockets
        // share the port, and one group send must reach each of them
        // rather than load-balancing across the reuse-port pair.
        let config = GroupConfig {
            group: Ipv4Addr::new(239, 255, 77, 25),
            port: 40625,
            interface: Ipv4Addr::LOCALHOST,
            ..GroupConfig::default()
        };
        let member_a = ShowSocket::bind(&config).unwrap();
        let member_b = ShowSocket::bind(&config).unwrap();
        let sender = ShowSocket::bind_ephemeral(&config).unwrap();

        let mut rx_a = member_a.start_receiver();
        let mut rx_b = member_b.start_receiver();

        let ping = Packet::ping(3, 44);
        sender.send_group(&ping).await.unwrap();

        let (got_a, _) = rx_a.recv().await.unwrap();
        let (got_b, _) = rx_b.recv().await.unwrap();
        assert_eq!(got_a, ping);
        assert_eq!(got_b, ping);
    }

    #[tokio::test]
    async fn test_garbage_datagram_is_dropped() {
        let config = loopback_config(40627);
        let server = ShowSocket::bind(&config).unwrap();
        let client = ShowSocket::bind_ephemeral(&config).unwrap();

        let mut receiver = server.start_receiver();

        client
            .send_raw(&Bytes::from_static(b"not an mled packet"), config.group_addr())
            .await
            .unwrap();
        let valid = Packet::ping(1, 2);
        client.send_group(&valid).await.unwrap();

        // Only the valid packet comes through.
        let (packet, _) = receiver.recv().await.unwrap();
        assert_eq!(packet, valid);
    }
}
