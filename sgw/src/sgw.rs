use crate::userplane::{BearerTable, N6Bridge, PacketProcessor};
use crate::{Config, CreateSessionRequest, CreateSessionResponse, TunnelId};
use anyhow::Result;
use async_channel::Receiver;
use async_tun::Tun;
use slog::{Logger, info};
use std::net::IpAddr;

/// Serving gateway user plane, with downlink packet aggregation towards base stations.
#[derive(Clone)]
pub struct Sgw {
    config: Config,
    logger: Logger,
    bearer_table: BearerTable,
    packet_processor: PacketProcessor,
}

impl Sgw {
    pub async fn start(config: Config, logger: Logger) -> Result<Self> {
        config.aggregation.validate()?;
        info!(
            &logger,
            "Starting {} on {}",
            config.name.as_deref().unwrap_or("SGW"),
            config.ip_addr
        );
        let bearer_table = BearerTable::new();
        let packet_processor = PacketProcessor::new(
            config.ip_addr,
            config.aggregation.clone(),
            bearer_table.clone(),
            &logger,
        )?;
        Ok(Sgw {
            config,
            logger,
            bearer_table,
            packet_processor,
        })
    }

    pub async fn graceful_shutdown(self) {
        info!(&self.logger, "Shutting down");
        self.packet_processor.shutdown().await;
    }

    pub fn ip_addr(&self) -> &IpAddr {
        &self.config.ip_addr
    }

    pub async fn add_enb(&self, cell_id: u16, enb_addr: IpAddr) {
        self.bearer_table
            .add_enb(cell_id, enb_addr, &self.logger)
            .await
    }

    pub async fn add_ue(&self, imsi: u64) {
        self.bearer_table.add_ue(imsi, &self.logger).await
    }

    pub async fn set_ue_address(&self, imsi: u64, ue_addr: IpAddr) -> Result<()> {
        self.bearer_table
            .set_ue_address(imsi, ue_addr, &self.logger)
            .await
    }

    pub async fn create_session(&self, request: CreateSessionRequest) -> Result<CreateSessionResponse> {
        self.bearer_table
            .create_session(request, &self.logger)
            .await
    }

    pub async fn modify_bearer(&self, imsi: u64, cell_id: u16) -> Result<()> {
        self.bearer_table
            .modify_bearer(imsi, cell_id, &self.logger)
            .await
    }

    pub async fn delete_bearers(&self, imsi: u64, eps_bearer_ids: &[u8]) -> Result<Vec<TunnelId>> {
        self.bearer_table
            .delete_bearers(imsi, eps_bearer_ids, &self.logger)
            .await
    }

    /// Send an IP packet from the data network towards its UE.
    pub async fn send_downlink(&self, packet: Vec<u8>) -> Result<()> {
        self.packet_processor.send_downlink(packet).await
    }

    /// IP packets from UEs, bound for the data network.
    pub fn n6_uplink(&self) -> Receiver<Vec<u8>> {
        self.packet_processor.n6_uplink()
    }

    /// Carry data network traffic over a tun device.
    pub fn bridge_n6(&self, tun: Tun) -> N6Bridge {
        N6Bridge::start(tun, self.packet_processor.clone(), &self.logger)
    }
}
