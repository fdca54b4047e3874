//! gtpn - compact GTP header with TEID compression and packet merging
//!
//! A merged datagram is one leading header + payload followed by zero or more
//! continuation header + payload pairs.  See [`GtpnHeader`] for the bit layout.

mod error;
mod header;
mod merged;

pub use error::HeaderError;
pub use header::{
    GtpnHeader, HeaderKind, MAX_PAYLOAD_LEN, MESSAGE_TYPE_GPDU, VERSION_CONTINUATION,
    VERSION_LEADING,
};
pub use merged::{SubPacket, split_merged};
