use atomic_counter::RelaxedCounter;
use std::sync::Arc;

pub mod downlink_counter_indices {
    pub const DL_RX_PKTS: usize = 0;
    pub const DL_RX_BYTES: usize = 1;
    pub const DL_TX_DATAGRAMS: usize = 2;
    pub const DL_TX_SUB_PACKETS: usize = 3;
    pub const DL_SIZE_FLUSHES: usize = 4;
    pub const DL_TIMEOUT_FLUSHES: usize = 5;
    pub const DL_BYPASS_SENDS: usize = 6;
    pub const DL_TEID_TABLE_RESETS: usize = 7;
    // Drops from here on.
    pub const DL_DROP_NOT_IP: usize = 8;
    pub const DL_DROP_NO_BEARER: usize = 9;
    pub const DL_DROP_TOO_LONG: usize = 10;
    pub const DL_DROP_SEND_FAILED: usize = 11;
    // Datagrams the socket failed to send.
    pub const DL_SEND_ERRORS: usize = 12;
    pub const DL_NUM_COUNTERS: usize = 13;
}

pub mod uplink_counter_indices {
    pub const UL_RX_PKTS: usize = 0;
    pub const UL_RX_BYTES: usize = 1;
    // Drops from here on.
    pub const UL_DROP_BAD_HEADER: usize = 2;
    pub const UL_DROP_NO_TEID: usize = 3;
    pub const UL_DROP_UNKNOWN_TEID: usize = 4;
    pub const UL_DROP_NOT_IP: usize = 5;
    pub const UL_NUM_COUNTERS: usize = 6;
}

use downlink_counter_indices::DL_NUM_COUNTERS;
use uplink_counter_indices::UL_NUM_COUNTERS;

pub type DownlinkCounters = [RelaxedCounter; DL_NUM_COUNTERS];
pub type UplinkCounters = [RelaxedCounter; UL_NUM_COUNTERS];

pub fn new_downlink_counters() -> Arc<DownlinkCounters> {
    Arc::new(std::array::from_fn(|_| RelaxedCounter::new(0)))
}

pub fn new_uplink_counters() -> Arc<UplinkCounters> {
    Arc::new(std::array::from_fn(|_| RelaxedCounter::new(0)))
}
