use super::bearer_table::{BearerTable, Classification};
use super::counters::downlink_counter_indices::*;
use super::counters::uplink_counter_indices::*;
use super::counters::{
    DownlinkCounters, UplinkCounters, new_downlink_counters, new_uplink_counters,
};
use super::engine::{AggregationEngine, InboundPacket};
use super::timer::TimerQueue;
use super::transport::{UdpTransport, create_s1u_socket};
use crate::{AggregationConfig, DownlinkFlow};
use anyhow::Result;
use async_channel::{Receiver, Sender};
use async_std::future;
use async_std::net::UdpSocket;
use async_std::sync::Mutex;
use async_std::task::{self, JoinHandle};
use atomic_counter::AtomicCounter;
use slog::{Logger, debug, info, o, warn};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

enum UserplaneEvent {
    Downlink {
        packet: Vec<u8>,
        classification: Classification,
    },
    Uplink(Vec<u8>),
    Shutdown,
}

struct Tasks {
    userplane: JoinHandle<()>,
    uplink: JoinHandle<()>,
    stats: JoinHandle<()>,
    sender: JoinHandle<()>,
}

/// Runs the S1-U user plane.  A single task owns the aggregation engine and handles downlink packets,
/// uplink datagrams and flush timers in the order they occur.
#[derive(Clone)]
pub struct PacketProcessor {
    events: Sender<UserplaneEvent>,
    n6_uplink: Receiver<Vec<u8>>,
    bearer_table: BearerTable,
    downlink_counters: Arc<DownlinkCounters>,
    tasks: Arc<Mutex<Option<Tasks>>>,
    logger: Logger,
}

impl PacketProcessor {
    pub fn new(
        local_ip: IpAddr,
        aggregation: AggregationConfig,
        bearer_table: BearerTable,
        logger: &Logger,
    ) -> Result<Self> {
        // Create the packet source/sink.
        let s1u_socket = Arc::new(UdpSocket::from(create_s1u_socket(local_ip, logger)?));

        let downlink_counters = new_downlink_counters();
        let uplink_counters = new_uplink_counters();
        let (event_sender, event_receiver) = async_channel::unbounded();
        let (n6_sender, n6_receiver) = async_channel::unbounded();

        // Start the S1-U sender task, then the userplane task (N6 -> S1-U, plus processing of S1-U -> N6).
        let (transport, sender) = UdpTransport::new(
            s1u_socket.clone(),
            downlink_counters.clone(),
            logger.clone(),
        );
        let engine = AggregationEngine::new(
            aggregation,
            transport,
            TimerQueue::new(),
            downlink_counters.clone(),
            logger.new(o!("aggregation" => 1)),
        );
        let userplane = UserplaneTask {
            engine,
            events: event_receiver,
            n6_uplink: n6_sender,
            bearer_table: bearer_table.clone(),
            counters: uplink_counters.clone(),
            start: Instant::now(),
            logger: logger.clone(),
        };
        let userplane = task::spawn(userplane.run());

        // Start the uplink receive task (S1-U -> userplane task).
        let uplink = task::spawn(receive_uplink(
            s1u_socket,
            event_sender.clone(),
            uplink_counters.clone(),
            logger.clone(),
        ));

        // Spawn the stats task
        let stats = task::spawn(dump_stats(
            logger.clone(),
            downlink_counters.clone(),
            uplink_counters,
        ));

        Ok(PacketProcessor {
            events: event_sender,
            n6_uplink: n6_receiver,
            bearer_table,
            downlink_counters,
            tasks: Arc::new(Mutex::new(Some(Tasks {
                userplane,
                uplink,
                stats,
                sender,
            }))),
            logger: logger.clone(),
        })
    }

    /// Classify an IP packet from the data network and hand it to the aggregation engine.  Packets with no
    /// bearer to go on are counted and dropped.
    pub async fn send_downlink(&self, packet: Vec<u8>) -> Result<()> {
        self.downlink_counters[DL_RX_PKTS].inc();
        self.downlink_counters[DL_RX_BYTES].add(packet.len());

        let Some(flow) = DownlinkFlow::parse(&packet) else {
            self.downlink_counters[DL_DROP_NOT_IP].inc();
            return Ok(());
        };
        let Some(classification) = self.bearer_table.classify(&flow).await else {
            self.downlink_counters[DL_DROP_NO_BEARER].inc();
            debug!(self.logger, "No bearer for downlink packet to {}", flow.ue_addr);
            return Ok(());
        };

        self.events
            .send(UserplaneEvent::Downlink {
                packet,
                classification,
            })
            .await?;
        Ok(())
    }

    /// Inner IP packets received from base stations, for forwarding to the data network.
    pub fn n6_uplink(&self) -> Receiver<Vec<u8>> {
        self.n6_uplink.clone()
    }

    pub fn bearer_table(&self) -> &BearerTable {
        &self.bearer_table
    }

    /// Flush every queue and stop the user plane.
    pub async fn shutdown(&self) {
        let Some(tasks) = self.tasks.lock().await.take() else {
            return;
        };
        let _ = self.events.send(UserplaneEvent::Shutdown).await;
        tasks.userplane.await;
        // The engine has been dropped, so the sender task stops once it has sent the final flush.
        tasks.sender.await;
        tasks.uplink.cancel().await;
        tasks.stats.cancel().await;
    }
}

struct UserplaneTask {
    engine: AggregationEngine<UdpTransport, TimerQueue>,
    events: Receiver<UserplaneEvent>,
    n6_uplink: Sender<Vec<u8>>,
    bearer_table: BearerTable,
    counters: Arc<UplinkCounters>,
    // Engine time is measured from here.
    start: Instant,
    logger: Logger,
}

impl UserplaneTask {
    async fn run(mut self) {
        loop {
            let event = match self.engine.next_deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_sub(self.start.elapsed());
                    match future::timeout(wait, self.events.recv()).await {
                        Ok(event) => event,
                        Err(_) => {
                            self.engine.run_due_timers(self.start.elapsed());
                            continue;
                        }
                    }
                }
                None => self.events.recv().await,
            };

            match event {
                Ok(UserplaneEvent::Downlink {
                    packet,
                    classification,
                }) => self.handle_downlink(packet, classification),
                Ok(UserplaneEvent::Uplink(raw)) => self.handle_uplink(raw).await,
                Ok(UserplaneEvent::Shutdown) | Err(_) => break,
            }

            // Don't let a busy event queue hold up expired timers.
            self.engine.run_due_timers(self.start.elapsed());
        }

        let flushed = self.engine.flush_all();
        info!(
            self.logger,
            "Userplane stopped - flushed {flushed} queued packets"
        );
    }

    fn handle_downlink(&mut self, packet: Vec<u8>, classification: Classification) {
        let Classification {
            destination,
            teid,
            message_class,
        } = classification;
        if let Err(e) = self.engine.on_outbound_packet(
            self.start.elapsed(),
            packet,
            destination,
            teid,
            message_class,
        ) {
            warn!(self.logger, "Dropped downlink packet - {e}");
        }
    }

    async fn handle_uplink(&mut self, raw: Vec<u8>) {
        let InboundPacket { teid, payload } = match self.engine.on_inbound_packet(&raw) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.counters[UL_DROP_BAD_HEADER].inc();
                warn!(
                    self.logger,
                    "Malformed uplink header {} - {e}",
                    hex::encode(&raw[..raw.len().min(12)])
                );
                return;
            }
        };
        let Some(teid) = teid else {
            self.counters[UL_DROP_NO_TEID].inc();
            return;
        };
        if !self.bearer_table.is_known_teid(teid).await {
            self.counters[UL_DROP_UNKNOWN_TEID].inc();
            debug!(self.logger, "Uplink packet for unknown TEID {teid}");
            return;
        }
        if !is_ip(&payload) {
            self.counters[UL_DROP_NOT_IP].inc();
            return;
        }
        let _ = self.n6_uplink.send(payload).await;
    }
}

fn is_ip(packet: &[u8]) -> bool {
    matches!(packet.first().map(|b| b >> 4), Some(4) | Some(6))
}

async fn receive_uplink(
    s1u_socket: Arc<UdpSocket>,
    events: Sender<UserplaneEvent>,
    counters: Arc<UplinkCounters>,
    logger: Logger,
) {
    let mut buf = [0u8; 2000];
    loop {
        let bytes_read = match s1u_socket.recv_from(&mut buf).await {
            Ok((bytes_read, _peer)) => bytes_read,
            Err(e) => {
                info!(logger, "Exiting uplink receive task with error {e}");
                break;
            }
        };
        counters[UL_RX_PKTS].inc();
        counters[UL_RX_BYTES].add(bytes_read);
        if events
            .send(UserplaneEvent::Uplink(buf[..bytes_read].to_vec()))
            .await
            .is_err()
        {
            break;
        }
    }
}

async fn dump_stats(logger: Logger, dl: Arc<DownlinkCounters>, ul: Arc<UplinkCounters>) {
    let mut last_dl = [0usize; DL_NUM_COUNTERS];
    let mut last_ul = [0usize; UL_NUM_COUNTERS];
    const FIRST_DL_WARN_IDX: usize = DL_DROP_NOT_IP;
    const FIRST_UL_WARN_IDX: usize = UL_DROP_BAD_HEADER;

    loop {
        task::sleep(std::time::Duration::new(5, 0)).await;

        if dl[DL_RX_PKTS].get() != last_dl[DL_RX_PKTS]
            || ul[UL_RX_PKTS].get() != last_ul[UL_RX_PKTS]
        {
            for idx in 0..FIRST_DL_WARN_IDX {
                last_dl[idx] = dl[idx].get();
            }
            last_ul[UL_RX_PKTS] = ul[UL_RX_PKTS].get();
            last_ul[UL_RX_BYTES] = ul[UL_RX_BYTES].get();

            info!(
                &logger,
                "DL pkts={} bytes={} datagrams={} merged={} size_flushes={} timeouts={} bypass={} resets={} UL pkts={} bytes={}",
                last_dl[DL_RX_PKTS],
                last_dl[DL_RX_BYTES],
                last_dl[DL_TX_DATAGRAMS],
                last_dl[DL_TX_SUB_PACKETS],
                last_dl[DL_SIZE_FLUSHES],
                last_dl[DL_TIMEOUT_FLUSHES],
                last_dl[DL_BYPASS_SENDS],
                last_dl[DL_TEID_TABLE_RESETS],
                last_ul[UL_RX_PKTS],
                last_ul[UL_RX_BYTES]
            );
        }

        let mut dl_warn_needed = false;
        for idx in FIRST_DL_WARN_IDX..DL_NUM_COUNTERS {
            if last_dl[idx] != dl[idx].get() {
                dl_warn_needed = true;
            }
            last_dl[idx] = dl[idx].get();
        }
        let mut ul_warn_needed = false;
        for idx in FIRST_UL_WARN_IDX..UL_NUM_COUNTERS {
            if last_ul[idx] != ul[idx].get() {
                ul_warn_needed = true;
            }
            last_ul[idx] = ul[idx].get();
        }

        if dl_warn_needed {
            warn!(
                &logger,
                "DL DROPS not_ip={} no_bearer={} too_long={} send_failed={} send_errors={}",
                last_dl[DL_DROP_NOT_IP],
                last_dl[DL_DROP_NO_BEARER],
                last_dl[DL_DROP_TOO_LONG],
                last_dl[DL_DROP_SEND_FAILED],
                last_dl[DL_SEND_ERRORS]
            );
        }

        if ul_warn_needed {
            warn!(
                &logger,
                "UL DROPS bad_header={} no_teid={} unknown_teid={} not_ip={}",
                last_ul[UL_DROP_BAD_HEADER],
                last_ul[UL_DROP_NO_TEID],
                last_ul[UL_DROP_UNKNOWN_TEID],
                last_ul[UL_DROP_NOT_IP]
            );
        }
    }
}
