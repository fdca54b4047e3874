mod data_network;
mod mock_enb;
pub mod framework;

pub use data_network::{DN_HOST, DN_PORT, DataNetwork, build_ipv4_udp};
pub use mock_enb::{MockEnb, ReceivedPacket};
