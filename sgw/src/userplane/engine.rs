//! engine - downlink compression and aggregation, plus the single header receive path

use super::aggregation_queue::{AggregationQueue, EnqueueOutcome, FlushTrigger, PendingPacket};
use super::counters::DownlinkCounters;
use super::counters::downlink_counter_indices::*;
use super::destination_queues::DestinationQueueSet;
use super::teid_table::TeidHashTable;
use super::timer::{FlushTimer, Scheduler, TimerQueue};
use super::transport::Transport;
use crate::{AggregationConfig, MessageClass, TunnelId};
use anyhow::{Result, bail, ensure};
use atomic_counter::AtomicCounter;
use gtpn::{GtpnHeader, MAX_PAYLOAD_LEN};
use slog::{Logger, debug, info, warn};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// What happened to an outbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    // Waiting in its queue.
    Queued,
    // Completed its queue, which was flushed as one datagram of this many packets.
    Flushed { sub_packets: usize },
    // The TEID table was reset, so the packet was sent on its own with its full TEID.
    Bypassed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub teid: Option<TunnelId>,
    pub payload: Vec<u8>,
}

pub struct AggregationEngine<T: Transport, S: Scheduler> {
    config: AggregationConfig,
    teid_table: TeidHashTable,
    destinations: HashMap<IpAddr, DestinationQueueSet>,
    transport: T,
    scheduler: S,
    counters: Arc<DownlinkCounters>,
    logger: Logger,
}

impl<T: Transport, S: Scheduler> AggregationEngine<T, S> {
    pub fn new(
        config: AggregationConfig,
        transport: T,
        scheduler: S,
        counters: Arc<DownlinkCounters>,
        logger: Logger,
    ) -> Self {
        AggregationEngine {
            config,
            teid_table: TeidHashTable::new(),
            destinations: HashMap::new(),
            transport,
            scheduler,
            counters,
            logger,
        }
    }

    /// Compress the TEID of a downlink packet and queue it for merging, flushing the queue if that
    /// fills it.  `now` is the current time on the scheduler's clock.
    pub fn on_outbound_packet(
        &mut self,
        now: Duration,
        packet: Vec<u8>,
        destination: IpAddr,
        teid: TunnelId,
        message_class: MessageClass,
    ) -> Result<Dispatch> {
        if packet.len() > MAX_PAYLOAD_LEN {
            self.counters[DL_DROP_TOO_LONG].inc();
            bail!(
                "Packet of {} bytes for TEID {teid} exceeds the {MAX_PAYLOAD_LEN} byte limit",
                packet.len()
            );
        }

        let binding = self.teid_table.bind(teid);
        if binding.table_was_reset {
            self.counters[DL_TEID_TABLE_RESETS].inc();
            warn!(
                self.logger,
                "TEID table full - all compressed TEIDs invalidated while binding {teid}"
            );

            // Send it straight away, on its own, so that it does not wait behind packets whose
            // codes need to be refreshed.
            let header = GtpnHeader::leading(teid.0, binding.code.0, packet.len())?;
            let mut datagram = Vec::with_capacity(header.serialized_len() + packet.len());
            header.encode(&mut datagram);
            datagram.extend_from_slice(&packet);
            self.send(destination, &datagram, 1)?;
            self.teid_table.mark_announced(binding.code, teid, destination);
            self.counters[DL_BYPASS_SENDS].inc();
            return Ok(Dispatch::Bypassed);
        }

        let logger = &self.logger;
        let queue = self
            .destinations
            .entry(destination)
            .or_insert_with(|| {
                info!(logger, "New aggregation destination {destination}");
                DestinationQueueSet::new(destination)
            })
            .queue_mut(message_class, &self.config);

        match queue.enqueue(PendingPacket {
            teid,
            code: binding.code,
            epoch: self.teid_table.epoch(),
            payload: packet,
        }) {
            EnqueueOutcome::Full => {
                let sub_packets = self.flush(destination, message_class, FlushTrigger::Size)?;
                Ok(Dispatch::Flushed { sub_packets })
            }
            EnqueueOutcome::ArmTimer { generation, wait } => {
                self.scheduler.schedule(
                    now + wait,
                    FlushTimer {
                        destination,
                        message_class,
                        generation,
                    },
                );
                Ok(Dispatch::Queued)
            }
            EnqueueOutcome::Waiting => Ok(Dispatch::Queued),
        }
    }

    /// Handle an expired flush timer.  Returns the number of packets flushed, which is zero if the
    /// queue was flushed some other way since the timer was armed.
    pub fn on_flush_timer(&mut self, timer: FlushTimer) -> Result<usize> {
        let current = self
            .queue(timer.destination, timer.message_class)
            .is_some_and(|q| q.generation() == timer.generation && !q.is_empty());
        if !current {
            return Ok(0);
        }
        self.flush(timer.destination, timer.message_class, FlushTrigger::Timeout)
    }

    /// Remove the header from a datagram received from a base station.  Merged datagrams are not
    /// expected in this direction - anything after the first payload is treated as part of it.
    pub fn on_inbound_packet(&self, raw: &[u8]) -> Result<InboundPacket> {
        let (header, header_len) = GtpnHeader::decode(raw)?;
        let payload = &raw[header_len..];
        ensure!(
            payload.len() >= header.length as usize,
            "Payload of {} bytes is shorter than header length {}",
            payload.len(),
            header.length
        );
        Ok(InboundPacket {
            teid: header.teid.map(TunnelId),
            payload: payload.to_vec(),
        })
    }

    /// Flush every queue that has packets waiting, without adapting thresholds.
    pub fn flush_all(&mut self) -> usize {
        let waiting: Vec<(IpAddr, MessageClass)> = self
            .destinations
            .values_mut()
            .flat_map(|d| d.queues_mut())
            .filter(|q| !q.is_empty())
            .map(|q| (q.destination(), q.message_class()))
            .collect();

        let mut flushed = 0;
        for (destination, message_class) in waiting {
            match self.flush(destination, message_class, FlushTrigger::Shutdown) {
                Ok(n) => flushed += n,
                Err(e) => warn!(self.logger, "Failed final flush to {destination} - {e}"),
            }
        }
        flushed
    }

    fn flush(
        &mut self,
        destination: IpAddr,
        message_class: MessageClass,
        trigger: FlushTrigger,
    ) -> Result<usize> {
        let Some(queue) = self
            .destinations
            .get_mut(&destination)
            .and_then(|d| d.existing_queue_mut(message_class))
        else {
            return Ok(0);
        };
        if queue.is_empty() {
            return Ok(0);
        }

        let flushed = queue.flush(trigger, &mut self.teid_table)?;
        debug!(
            self.logger,
            "{trigger:?} flush of {} packets to {destination} class {message_class}, now max length {} wait {}ms",
            flushed.sub_packets,
            queue.max_length(),
            queue.wait_time_ms()
        );

        match trigger {
            FlushTrigger::Size => {
                self.counters[DL_SIZE_FLUSHES].inc();
            }
            FlushTrigger::Timeout => {
                self.counters[DL_TIMEOUT_FLUSHES].inc();
            }
            FlushTrigger::Shutdown => {}
        }
        self.counters[DL_TEID_TABLE_RESETS].add(flushed.table_resets);

        self.send(destination, &flushed.datagram, flushed.sub_packets)?;
        for (code, teid) in flushed.announced {
            self.teid_table.mark_announced(code, teid, destination);
        }
        Ok(flushed.sub_packets)
    }

    fn send(&mut self, destination: IpAddr, datagram: &[u8], sub_packets: usize) -> Result<()> {
        if let Err(e) = self.transport.send_datagram(destination, datagram) {
            self.counters[DL_DROP_SEND_FAILED].add(sub_packets);
            return Err(e.context(format!("Failed to send to {destination}")));
        }
        self.counters[DL_TX_DATAGRAMS].inc();
        self.counters[DL_TX_SUB_PACKETS].add(sub_packets);
        Ok(())
    }

    pub fn queue(
        &self,
        destination: IpAddr,
        message_class: MessageClass,
    ) -> Option<&AggregationQueue> {
        self.destinations.get(&destination)?.queue(message_class)
    }

    pub fn destination_count(&self) -> usize {
        self.destinations.len()
    }

    pub fn pending_packets(&self) -> usize {
        self.destinations.values().map(|d| d.pending_packets()).sum()
    }

    pub fn teid_table(&self) -> &TeidHashTable {
        &self.teid_table
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

impl<T: Transport> AggregationEngine<T, TimerQueue> {
    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    /// Fire every timer that is due at `now`, returning the number of packets flushed.
    pub fn run_due_timers(&mut self, now: Duration) -> usize {
        let mut flushed = 0;
        while let Some(timer) = self.scheduler.pop_due(now) {
            match self.on_flush_timer(timer) {
                Ok(n) => flushed += n,
                Err(e) => warn!(self.logger, "Timed flush failed - {e}"),
            }
        }
        flushed
    }
}
