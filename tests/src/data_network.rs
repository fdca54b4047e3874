use anyhow::{Result, anyhow};
use async_channel::Receiver;
use async_std::future;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::MutableIpv4Packet;
use pnet_packet::udp::MutableUdpPacket;
use sgw::Sgw;
use slog::{Logger, info, o};
use std::net::Ipv4Addr;
use std::time::Duration;

const IPV4_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

// A host on the far side of N6.
pub const DN_HOST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);
pub const DN_PORT: u16 = 23215;

/// Mocks up the data network side of the gateway.  Packets are handed straight to the gateway rather
/// than going through a tun device.
pub struct DataNetwork {
    logger: Logger,
    sgw: Sgw,
    n6_uplink: Receiver<Vec<u8>>,
}

impl DataNetwork {
    pub fn new(sgw: &Sgw, logger: &Logger) -> Self {
        DataNetwork {
            logger: logger.new(o!("dn" => 1)),
            sgw: sgw.clone(),
            n6_uplink: sgw.n6_uplink(),
        }
    }

    pub async fn send_n6_udp_packet(&self, ue_addr: Ipv4Addr, ue_port: u16, data: &[u8]) -> Result<()> {
        let packet = build_ipv4_udp(DN_HOST, DN_PORT, ue_addr, ue_port, data);
        self.sgw.send_downlink(packet).await?;
        info!(self.logger, "Sent in N6 packet to {ue_addr}:{ue_port}");
        Ok(())
    }

    pub async fn receive_n6_packet(&self) -> Result<Vec<u8>> {
        let packet = future::timeout(Duration::from_secs(5), self.n6_uplink.recv())
            .await?
            .map_err(|_| anyhow!("Gateway closed N6"))?;
        info!(&self.logger, ">> Uplink packet from UE");
        Ok(packet)
    }

    pub async fn expect_no_n6_packet(&self, wait: Duration) -> Result<()> {
        match future::timeout(wait, self.n6_uplink.recv()).await {
            Err(_) => Ok(()),
            Ok(packet) => Err(anyhow!("Unexpected N6 packet {:?}", packet)),
        }
    }
}

/// Build an IPv4 UDP packet with a valid IP header checksum.
pub fn build_ipv4_udp(
    src: Ipv4Addr,
    src_port: u16,
    dst: Ipv4Addr,
    dst_port: u16,
    data: &[u8],
) -> Vec<u8> {
    let total_len = IPV4_HEADER_LEN + UDP_HEADER_LEN + data.len();
    let mut packet = vec![0u8; total_len];

    let mut ipv4_packet = MutableIpv4Packet::new(&mut packet[..IPV4_HEADER_LEN]).unwrap();
    ipv4_packet.set_version(4);
    ipv4_packet.set_header_length(5);
    ipv4_packet.set_total_length(total_len as u16);
    ipv4_packet.set_ttl(64);
    ipv4_packet.set_next_level_protocol(IpNextHeaderProtocols::Udp);
    ipv4_packet.set_source(src);
    ipv4_packet.set_destination(dst);
    let checksum = pnet_packet::ipv4::checksum(&ipv4_packet.to_immutable());
    ipv4_packet.set_checksum(checksum);

    let mut udp_packet = MutableUdpPacket::new(&mut packet[IPV4_HEADER_LEN..]).unwrap();
    udp_packet.set_source(src_port);
    udp_packet.set_destination(dst_port);
    udp_packet.set_length((UDP_HEADER_LEN + data.len()) as u16);
    udp_packet.set_payload(data);

    packet
}
