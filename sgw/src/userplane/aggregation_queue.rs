//! aggregation_queue - merges downlink packets for one (destination, message class) pair
//!
//! A queue is flushed when it reaches its length threshold or when its wait timer fires.  Three flushes
//! in a row of the same kind move the thresholds: back to back full queues grow the batch and shorten
//! the wait, back to back timeouts shrink the batch and lengthen the wait.

use super::teid_table::TeidHashTable;
use crate::{CompressedCode, MessageClass, QueueParams, TunnelId, millis};
use anyhow::Result;
use gtpn::GtpnHeader;
use std::net::IpAddr;
use std::time::Duration;

/// A packet waiting to be merged.  Its header is only encoded at flush time, once its position in the
/// datagram is known.
#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub teid: TunnelId,
    pub code: CompressedCode,
    // TEID table epoch that `code` was obtained in.
    pub epoch: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Size,
    Timeout,
    // Draining on shutdown.  Does not adapt the thresholds.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    // The length threshold has been reached - flush now.
    Full,
    // First packet into an empty queue - arm a timer for this generation.
    ArmTimer { generation: u64, wait: Duration },
    // A timer is already running.
    Waiting,
}

#[derive(Debug)]
pub struct Flushed {
    pub datagram: Vec<u8>,
    pub sub_packets: usize,
    pub table_resets: usize,
    // Bindings sent in full in this datagram.  Only record them against the destination once it has
    // actually been sent.
    pub announced: Vec<(CompressedCode, TunnelId)>,
}

#[derive(Debug)]
pub struct AggregationQueue {
    destination: IpAddr,
    message_class: MessageClass,
    params: QueueParams,
    pending: Vec<PendingPacket>,
    max_length: f64,
    wait_time_ms: f64,
    consecutive_full_flushes: u32,
    consecutive_timeout_flushes: u32,
    // Incremented on every flush, so that timers armed before the flush can be recognized as stale.
    generation: u64,
}

impl AggregationQueue {
    pub fn new(destination: IpAddr, message_class: MessageClass, params: QueueParams) -> Self {
        AggregationQueue {
            destination,
            message_class,
            params,
            pending: vec![],
            max_length: params.initial_max_length,
            wait_time_ms: params.initial_wait_time_ms,
            consecutive_full_flushes: 0,
            consecutive_timeout_flushes: 0,
            generation: 0,
        }
    }

    pub fn enqueue(&mut self, packet: PendingPacket) -> EnqueueOutcome {
        let was_empty = self.pending.is_empty();
        self.pending.push(packet);
        if self.pending.len() as f64 >= self.max_length {
            EnqueueOutcome::Full
        } else if was_empty {
            EnqueueOutcome::ArmTimer {
                generation: self.generation,
                wait: self.wait_time(),
            }
        } else {
            EnqueueOutcome::Waiting
        }
    }

    /// Merge everything pending into one datagram, in enqueue order, and adapt the thresholds.
    ///
    /// The first sub-packet gets a leading header with the full TEID.  Later ones get a continuation
    /// header, which only carries the full TEID if this destination has not yet been sent it against
    /// the code, either in an earlier datagram or earlier in this one.  A code from before a TEID table
    /// reset is looked up again first.  The table is not told about new announcements - see
    /// `Flushed::announced`.
    pub fn flush(&mut self, trigger: FlushTrigger, teid_table: &mut TeidHashTable) -> Result<Flushed> {
        let packets = std::mem::take(&mut self.pending);
        self.generation += 1;
        self.adapt(trigger);

        let mut datagram = Vec::with_capacity(packets.iter().map(|p| p.payload.len() + 12).sum());
        let mut table_resets = 0;
        let mut announced: Vec<(CompressedCode, TunnelId)> = vec![];
        for (idx, packet) in packets.iter().enumerate() {
            let mut code = packet.code;
            if packet.epoch != teid_table.epoch() {
                let binding = teid_table.bind(packet.teid);
                if binding.table_was_reset {
                    table_resets += 1;
                }
                code = binding.code;
            }

            let header = if idx == 0 {
                GtpnHeader::leading(packet.teid.0, code.0, packet.payload.len())?
            } else if teid_table.is_announced_to(code, self.destination)
                || announced.contains(&(code, packet.teid))
            {
                GtpnHeader::continuation(None, code.0, packet.payload.len())?
            } else {
                GtpnHeader::continuation(Some(packet.teid.0), code.0, packet.payload.len())?
            };
            if header.teid.is_some() {
                // A later reset in this flush may hand the code to another TEID.
                announced.retain(|(c, _)| *c != code);
                announced.push((code, packet.teid));
            }
            header.encode(&mut datagram);
            datagram.extend_from_slice(&packet.payload);
        }

        Ok(Flushed {
            datagram,
            sub_packets: packets.len(),
            table_resets,
            announced,
        })
    }

    fn adapt(&mut self, trigger: FlushTrigger) {
        let p = &self.params;
        match trigger {
            FlushTrigger::Size => {
                self.consecutive_timeout_flushes = 0;
                self.consecutive_full_flushes += 1;
                if self.consecutive_full_flushes >= p.adapt_after {
                    self.consecutive_full_flushes = 0;
                    self.max_length = (self.max_length + p.increase_step).min(p.max_queue_length);
                    self.wait_time_ms = (self.wait_time_ms - p.decrease_step).max(p.min_wait_time_ms);
                }
            }
            FlushTrigger::Timeout => {
                self.consecutive_full_flushes = 0;
                self.consecutive_timeout_flushes += 1;
                if self.consecutive_timeout_flushes >= p.adapt_after {
                    self.consecutive_timeout_flushes = 0;
                    self.wait_time_ms = (self.wait_time_ms + p.decrease_step).min(p.max_wait_time_ms);
                    self.max_length = (self.max_length - p.increase_step).max(p.min_queue_length);
                }
            }
            FlushTrigger::Shutdown => {}
        }
    }

    pub fn destination(&self) -> IpAddr {
        self.destination
    }

    pub fn message_class(&self) -> MessageClass {
        self.message_class
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn max_length(&self) -> f64 {
        self.max_length
    }

    pub fn wait_time(&self) -> Duration {
        millis(self.wait_time_ms)
    }

    pub fn wait_time_ms(&self) -> f64 {
        self.wait_time_ms
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn consecutive_full_flushes(&self) -> u32 {
        self.consecutive_full_flushes
    }

    pub fn consecutive_timeout_flushes(&self) -> u32 {
        self.consecutive_timeout_flushes
    }
}
