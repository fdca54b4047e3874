//! mock_enb - enables a test script to assume the role of a base station on the S1-U reference point

use anyhow::{Result, anyhow, bail};
use async_net::{IpAddr, SocketAddr, UdpSocket};
use async_std::future;
use gtpn::{GtpnHeader, split_merged};
use sgw::TunnelId;
use slog::{Logger, debug, info, o};
use std::collections::HashMap;
use std::time::Duration;

const GTPU_PORT: u16 = 2152; // TS29.281

/// One sub-packet of a received datagram, with its compressed TEID resolved.
#[derive(Debug)]
pub struct ReceivedPacket {
    pub teid: TunnelId,
    // Whether the header carried the full TEID rather than just the compressed code.
    pub full_teid: bool,
    pub version: u8,
    pub payload: Vec<u8>,
}

pub struct MockEnb {
    gtpu_socket: UdpSocket,
    local_ip: IpAddr,
    // What each compressed code was last bound to by a full TEID header.
    codes: HashMap<u8, u32>,
    logger: Logger,
}

impl MockEnb {
    pub async fn new(local_ip: &str, logger: &Logger) -> Result<Self> {
        let logger = logger.new(o!("enb" => local_ip.to_string()));
        let local_ip: IpAddr = local_ip.parse()?;
        let transport_address = SocketAddr::new(local_ip, GTPU_PORT);
        info!(logger, "Serving GTP-U on {transport_address}");
        let gtpu_socket = UdpSocket::bind(transport_address).await?;
        Ok(MockEnb {
            gtpu_socket,
            local_ip,
            codes: HashMap::new(),
            logger,
        })
    }

    pub fn ip_addr(&self) -> IpAddr {
        self.local_ip
    }

    /// Receive one datagram and split it into its sub-packets.
    pub async fn recv_datagram(&mut self) -> Result<Vec<ReceivedPacket>> {
        let mut buf = [0u8; 2000];
        let future_result = self.gtpu_socket.recv(&mut buf);
        let bytes_received = future::timeout(Duration::from_secs(5), future_result).await??;
        let datagram = &buf[..bytes_received];
        debug!(self.logger, "<< Datagram of {bytes_received} bytes");

        let mut received = vec![];
        for sub_packet in split_merged(datagram)? {
            let header = sub_packet.header;
            let teid = match header.teid {
                Some(teid) => {
                    self.codes.insert(header.compressed_teid, teid);
                    teid
                }
                None => *self
                    .codes
                    .get(&header.compressed_teid)
                    .ok_or(anyhow!("Unknown compressed TEID {}", header.compressed_teid))?,
            };
            received.push(ReceivedPacket {
                teid: TunnelId(teid),
                full_teid: header.teid.is_some(),
                version: header.version(),
                payload: sub_packet.payload.to_vec(),
            });
        }
        info!(
            self.logger,
            "<< Downlink datagram with {} sub-packets",
            received.len()
        );
        Ok(received)
    }

    /// Check that nothing arrives for a while.
    pub async fn expect_nothing(&self, wait: Duration) -> Result<()> {
        let mut buf = [0u8; 2000];
        match future::timeout(wait, self.gtpu_socket.recv(&mut buf)).await {
            Err(_) => Ok(()),
            Ok(result) => bail!("Unexpected datagram ({:?})", result),
        }
    }

    /// Send an uplink inner packet with a single header.
    pub async fn send_uplink(&self, sgw_ip: IpAddr, teid: TunnelId, inner: &[u8]) -> Result<()> {
        let header = GtpnHeader::leading(teid.0, teid.0 as u8, inner.len())?;
        let mut packet = vec![];
        header.encode(&mut packet);
        packet.extend_from_slice(inner);
        self.gtpu_socket
            .send_to(&packet, SocketAddr::new(sgw_ip, GTPU_PORT))
            .await?;
        info!(self.logger, ">> Uplink packet on TEID {teid}");
        Ok(())
    }

    /// Send arbitrary bytes to the gateway's GTP-U port.
    pub async fn send_raw(&self, sgw_ip: IpAddr, datagram: &[u8]) -> Result<()> {
        self.gtpu_socket
            .send_to(datagram, SocketAddr::new(sgw_ip, GTPU_PORT))
            .await?;
        Ok(())
    }
}
