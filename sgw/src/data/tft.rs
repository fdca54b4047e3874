use pnet_packet::Packet;
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;
use std::net::IpAddr;
use std::ops::RangeInclusive;

/// Traffic flow template.  A packet matches if any filter matches.  A template with no filters matches
/// every packet, which is what a default bearer uses.
#[derive(Debug, Clone, Default)]
pub struct Tft {
    pub filters: Vec<PacketFilter>,
}

#[derive(Debug, Clone, Default)]
pub struct PacketFilter {
    pub protocol: Option<u8>,
    pub ue_ports: Option<RangeInclusive<u16>>,
    pub remote_ports: Option<RangeInclusive<u16>>,
}

/// The fields of a downlink IP packet that bearer classification looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkFlow {
    pub ue_addr: IpAddr,
    pub protocol: u8,
    pub ue_port: Option<u16>,
    pub remote_port: Option<u16>,
}

impl Tft {
    pub fn match_all() -> Self {
        Tft::default()
    }

    pub fn matches(&self, flow: &DownlinkFlow) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(flow))
    }
}

impl PacketFilter {
    fn matches(&self, flow: &DownlinkFlow) -> bool {
        if self.protocol.is_some_and(|p| p != flow.protocol) {
            return false;
        }
        port_matches(&self.ue_ports, flow.ue_port) && port_matches(&self.remote_ports, flow.remote_port)
    }
}

fn port_matches(range: &Option<RangeInclusive<u16>>, port: Option<u16>) -> bool {
    match (range, port) {
        (None, _) => true,
        (Some(range), Some(port)) => range.contains(&port),
        (Some(_), None) => false,
    }
}

impl DownlinkFlow {
    /// Parse an IPv4 or IPv6 packet heading towards a UE.  Returns None if this is not an IP packet.
    pub fn parse(packet: &[u8]) -> Option<Self> {
        match packet.first()? >> 4 {
            4 => {
                let ip = Ipv4Packet::new(packet)?;
                let protocol = ip.get_next_level_protocol().0;
                let (remote_port, ue_port) = ports(protocol, ip.payload());
                Some(DownlinkFlow {
                    ue_addr: IpAddr::V4(ip.get_destination()),
                    protocol,
                    ue_port,
                    remote_port,
                })
            }
            6 => {
                let ip = Ipv6Packet::new(packet)?;
                let protocol = ip.get_next_header().0;
                let (remote_port, ue_port) = ports(protocol, ip.payload());
                Some(DownlinkFlow {
                    ue_addr: IpAddr::V6(ip.get_destination()),
                    protocol,
                    ue_port,
                    remote_port,
                })
            }
            _ => None,
        }
    }
}

// Source and destination ports for UDP and TCP.
fn ports(protocol: u8, l4: &[u8]) -> (Option<u16>, Option<u16>) {
    if protocol == IpNextHeaderProtocols::Udp.0 {
        if let Some(udp) = UdpPacket::new(l4) {
            return (Some(udp.get_source()), Some(udp.get_destination()));
        }
    } else if protocol == IpNextHeaderProtocols::Tcp.0 {
        if let Some(tcp) = TcpPacket::new(l4) {
            return (Some(tcp.get_source()), Some(tcp.get_destination()));
        }
    }
    (None, None)
}
