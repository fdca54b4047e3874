mod aggregation_queue;
mod bearer_table;
mod counters;
mod destination_queues;
mod engine;
mod n6;
mod packet_processor;
mod teid_table;
mod timer;
mod transport;

pub use aggregation_queue::{
    AggregationQueue, EnqueueOutcome, FlushTrigger, Flushed, PendingPacket,
};
pub use bearer_table::{BearerTable, Classification};
pub use counters::{DownlinkCounters, UplinkCounters};
pub use destination_queues::DestinationQueueSet;
pub use engine::{AggregationEngine, Dispatch, InboundPacket};
pub use n6::{N6Bridge, open_n6_tun_device};
pub use packet_processor::PacketProcessor;
pub use teid_table::{Binding, TEID_TABLE_SIZE, TeidHashTable, TeidLookup};
pub use timer::{FlushTimer, Scheduler, TimerQueue};
pub use transport::{Transport, UdpTransport, create_s1u_socket};

const GTPU_PORT: u16 = 2152; // TS29.281
