use derive_deref::Deref;

/// Identifies one user plane tunnel (bearer) between the gateway and a base station.
#[derive(Deref, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TunnelId(pub u32);

/// One byte stand-in for a [`TunnelId`], valid only while its TEID table slot holds that TEID.
#[derive(Deref, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedCode(pub u8);

/// Selects which of a destination's parallel aggregation queues a packet joins.
#[derive(Deref, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageClass(pub u8);

impl std::fmt::Display for TunnelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl std::fmt::Display for MessageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
