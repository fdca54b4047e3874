use super::GTPU_PORT;
use super::counters::DownlinkCounters;
use super::counters::downlink_counter_indices::DL_SEND_ERRORS;
use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};
use async_std::net::UdpSocket;
use async_std::task::{self, JoinHandle};
use atomic_counter::AtomicCounter;
use slog::{Logger, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Puts datagrams on the wire towards base stations.  The transport adds the outer addressing.
pub trait Transport {
    fn send_datagram(&mut self, destination: IpAddr, datagram: &[u8]) -> Result<()>;
}

/// Sends GTP-U over UDP to port 2152 of the destination.
///
/// Datagrams are handed to a sender task that owns the writing side of the socket, so a busy socket
/// holds them up instead of losing them.  `send_datagram` only fails once that task has gone.
pub struct UdpTransport {
    datagrams: Sender<(IpAddr, Vec<u8>)>,
}

impl UdpTransport {
    /// Start the sender task.  It finishes once the transport is dropped and everything already
    /// handed to it has been sent.
    pub fn new(
        socket: Arc<UdpSocket>,
        counters: Arc<DownlinkCounters>,
        logger: Logger,
    ) -> (Self, JoinHandle<()>) {
        Self::spawn(socket, GTPU_PORT, counters, logger)
    }

    fn spawn(
        socket: Arc<UdpSocket>,
        port: u16,
        counters: Arc<DownlinkCounters>,
        logger: Logger,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = async_channel::unbounded();
        let task = task::spawn(send_datagrams(socket, port, receiver, counters, logger));
        (UdpTransport { datagrams: sender }, task)
    }
}

impl Transport for UdpTransport {
    fn send_datagram(&mut self, destination: IpAddr, datagram: &[u8]) -> Result<()> {
        self.datagrams
            .try_send((destination, datagram.to_vec()))
            .map_err(|_| anyhow!("S1-U sender task has stopped"))
    }
}

async fn send_datagrams(
    socket: Arc<UdpSocket>,
    port: u16,
    datagrams: Receiver<(IpAddr, Vec<u8>)>,
    counters: Arc<DownlinkCounters>,
    logger: Logger,
) {
    while let Ok((destination, datagram)) = datagrams.recv().await {
        match socket
            .send_to(&datagram, SocketAddr::new(destination, port))
            .await
        {
            Ok(bytes_sent) if bytes_sent == datagram.len() => {}
            Ok(bytes_sent) => {
                counters[DL_SEND_ERRORS].inc();
                warn!(
                    logger,
                    "Short send to {destination} - {bytes_sent} of {} bytes",
                    datagram.len()
                );
            }
            Err(e) => {
                counters[DL_SEND_ERRORS].inc();
                warn!(logger, "Failed to send to {destination} - {e}");
            }
        }
    }
}

pub fn create_s1u_socket(local_ip: IpAddr, logger: &Logger) -> Result<std::net::UdpSocket> {
    let transport_address = SocketAddr::new(local_ip, GTPU_PORT);
    let domain = match local_ip {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };

    // On the base station side (S1-U reference point), we open a GTP UDP socket.
    let gtpu_socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    gtpu_socket.set_reuse_port(true)?;
    gtpu_socket
        .bind(&transport_address.into())
        .context(format!("Failed to bind {}", transport_address))?;
    info!(logger, "Serving GTP-U on {transport_address}");
    Ok(gtpu_socket.into())
}
