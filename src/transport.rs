//! OSC over UDP transport
//!
//! One socket per configuration. When feedback is enabled it is bound to the
//! configured receive port and a task decodes every inbound datagram; otherwise
//! it is an ephemeral send-only socket.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use rosc::{OscMessage, OscPacket};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::ConsoleConfig;
use crate::error::{GatewayError, Result};

/// Largest UDP payload
const MAX_DATAGRAM: usize = 65_507;

/// Events emitted by an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Socket bound and ready
    Ready { local_addr: SocketAddr },
    /// One decoded inbound message (bundles arrive flattened)
    Message(OscMessage),
    /// Receive failure; the transport keeps running unless the socket is gone
    Error(String),
}

/// An open OSC socket and its receive task
pub struct OscTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    recv_task: Option<JoinHandle<()>>,
}

impl OscTransport {
    /// Bind a socket for the given console configuration
    pub async fn open(
        config: &ConsoleConfig,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let port = if config.enable_feedback { config.rx_port } else { 0 };
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));

        let socket = UdpSocket::bind(bind_addr).await.map_err(|e| {
            warn!(addr = %bind_addr, error = %e, "Failed to bind OSC socket");
            GatewayError::Transport(format!("bind {}: {}", bind_addr, e))
        })?;
        let local_addr = socket.local_addr()?;
        let socket = Arc::new(socket);

        let recv_task = if config.enable_feedback {
            let forward = config
                .forward_osc
                .then(|| SocketAddr::from((Ipv4Addr::LOCALHOST, config.forward_port)));
            info!(%local_addr, ?forward, "Listening for console feedback");
            Some(tokio::spawn(receive_loop(socket.clone(), forward, events.clone())))
        } else {
            debug!(%local_addr, "Feedback disabled, send-only socket");
            None
        };

        let _ = events.send(TransportEvent::Ready { local_addr });

        Ok(Self {
            socket,
            local_addr,
            recv_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Encode and send one message; fire-and-forget
    pub async fn send(&self, message: &OscMessage, host: &str, port: u16) -> Result<()> {
        let packet = rosc::encoder::encode(&OscPacket::Message(message.clone()))?;
        trace!(addr = %message.addr, args = ?message.args, host, port, "OSC out");
        self.socket
            .send_to(&packet, (host, port))
            .await
            .map_err(|e| GatewayError::Transport(format!("send to {}:{}: {}", host, port, e)))?;
        Ok(())
    }

    /// Stop the receive task and release the socket
    ///
    /// Returns once the task has been dropped, so the port can be bound again.
    pub async fn close(mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
            let _ = task.await;
        }
        debug!(local_addr = %self.local_addr, "OSC transport closed");
    }
}

impl Drop for OscTransport {
    fn drop(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
    }
}

/// Append every message in a packet, depth first
fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

async fn receive_loop(
    socket: Arc<UdpSocket>,
    forward: Option<SocketAddr>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            // ICMP port-unreachable from an earlier send surfaces here on some platforms
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                trace!("Ignoring connection reset on UDP socket");
                continue;
            }
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string()));
                break;
            }
        };
        let datagram = &buf[..len];

        if let Some(target) = forward {
            if let Err(e) = socket.send_to(datagram, target).await {
                debug!(%target, error = %e, "OSC forward failed");
            }
        }

        let packet = match rosc::decoder::decode_udp(datagram) {
            Ok((_, packet)) => packet,
            Err(e) => {
                trace!(%from, len, error = ?e, "Undecodable datagram ignored");
                continue;
            }
        };

        let mut messages = Vec::new();
        flatten(packet, &mut messages);
        for message in messages {
            trace!(%from, addr = %message.addr, args = ?message.args, "OSC in");
            if events.send(TransportEvent::Message(message)).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosc::{OscBundle, OscTime, OscType};
    use std::time::Duration;
    use tokio::time::timeout;

    fn feedback_config(rx_port: u16) -> ConsoleConfig {
        ConsoleConfig {
            host: Some("127.0.0.1".into()),
            enable_feedback: true,
            rx_port,
            ..ConsoleConfig::default()
        }
    }

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage { addr: addr.to_string(), args }
    }

    async fn next_message(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> OscMessage {
        loop {
            match timeout(Duration::from_secs(2), rx.recv()).await {
                Ok(Some(TransportEvent::Message(m))) => return m,
                Ok(Some(_)) => continue,
                other => panic!("no message received: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_send_reaches_target() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = OscTransport::open(&ConsoleConfig::default(), tx).await.unwrap();

        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = console.local_addr().unwrap().port();

        transport
            .send(&msg("/pb/3", vec![OscType::Int(75)]), "127.0.0.1", port)
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, _) = timeout(Duration::from_secs(2), console.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let (_, packet) = rosc::decoder::decode_udp(&buf[..len]).unwrap();
        assert_eq!(packet, OscPacket::Message(msg("/pb/3", vec![OscType::Int(75)])));
    }

    #[tokio::test]
    async fn test_ready_then_messages_with_bundles_flattened() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = OscTransport::open(&feedback_config(0), tx).await.unwrap();
        let port = transport.local_addr().port();

        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Ready { .. })
        ));

        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime { seconds: 0, fractional: 1 },
            content: vec![
                OscPacket::Message(msg("/pb/1", vec![OscType::Float(0.5)])),
                OscPacket::Message(msg("/exec/2/5", vec![OscType::Float(0.3)])),
            ],
        });
        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bytes = rosc::encoder::encode(&bundle).unwrap();
        console.send_to(&bytes, ("127.0.0.1", port)).await.unwrap();

        assert_eq!(next_message(&mut rx).await.addr, "/pb/1");
        assert_eq!(next_message(&mut rx).await.addr, "/exec/2/5");
    }

    #[tokio::test]
    async fn test_forwarding_resends_raw_datagram() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = feedback_config(0);
        config.forward_osc = true;
        config.forward_port = listener.local_addr().unwrap().port();

        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = OscTransport::open(&config, tx).await.unwrap();

        let bytes = rosc::encoder::encode(&OscPacket::Message(msg(
            "/pb/2/flash",
            vec![OscType::Int(1)],
        )))
        .unwrap();
        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        console
            .send_to(&bytes, ("127.0.0.1", transport.local_addr().port()))
            .await
            .unwrap();

        let mut buf = vec![0u8; 1024];
        let (len, _) = timeout(Duration::from_secs(2), listener.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], &bytes[..]);
    }

    #[tokio::test]
    async fn test_close_releases_port() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = OscTransport::open(&feedback_config(0), tx.clone()).await.unwrap();
        let port = first.local_addr().port();
        first.close().await;

        let second = OscTransport::open(&feedback_config(port), tx).await.unwrap();
        assert_eq!(second.local_addr().port(), port);
    }

    #[tokio::test]
    async fn test_garbage_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport = OscTransport::open(&feedback_config(0), tx).await.unwrap();
        let port = transport.local_addr().port();
        let console = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        console.send_to(b"not osc", ("127.0.0.1", port)).await.unwrap();
        let bytes = rosc::encoder::encode(&OscPacket::Message(msg("/pb/4", vec![]))).unwrap();
        console.send_to(&bytes, ("127.0.0.1", port)).await.unwrap();

        assert_eq!(next_message(&mut rx).await.addr, "/pb/4");
    }
}
