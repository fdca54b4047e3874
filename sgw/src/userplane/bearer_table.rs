use crate::{
    BearerCreated, CreateSessionRequest, CreateSessionResponse, DownlinkFlow, MessageClass, Tft,
    TunnelId,
};
use anyhow::{Result, anyhow, bail, ensure};
use async_std::sync::Mutex;
use slog::{Logger, info};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Bearer {
    eps_bearer_id: u8,
    teid: TunnelId,
    tft: Tft,
    message_class: MessageClass,
}

#[derive(Debug, Default)]
struct UeContext {
    ue_addrs: Vec<IpAddr>,
    enb_addr: Option<IpAddr>,
    // In creation order, which is the order they are tried in when classifying.
    bearers: Vec<Bearer>,
}

#[derive(Debug, Default)]
struct Inner {
    enbs: HashMap<u16, IpAddr>,
    ues: HashMap<u64, UeContext>,
    imsi_by_ue_addr: HashMap<IpAddr, u64>,
    imsi_by_teid: HashMap<TunnelId, u64>,
    last_teid: u32,
}

/// Where a downlink packet goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub destination: IpAddr,
    pub teid: TunnelId,
    pub message_class: MessageClass,
}

/// Base stations, UEs and their bearers.  Clones share the same table.
#[derive(Clone, Default)]
pub struct BearerTable(Arc<Mutex<Inner>>);

impl BearerTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    fn with_last_teid(last_teid: u32) -> Self {
        Self(Arc::new(Mutex::new(Inner {
            last_teid,
            ..Default::default()
        })))
    }

    pub async fn add_enb(&self, cell_id: u16, enb_addr: IpAddr, logger: &Logger) {
        info!(logger, "Base station {enb_addr} serves cell {cell_id}");
        self.0.lock().await.enbs.insert(cell_id, enb_addr);
    }

    pub async fn add_ue(&self, imsi: u64, logger: &Logger) {
        info!(logger, "Added UE {imsi}");
        self.0.lock().await.ues.entry(imsi).or_default();
    }

    /// Associate an IPv4 or IPv6 address with a UE.  A UE may have one of each.
    pub async fn set_ue_address(&self, imsi: u64, ue_addr: IpAddr, logger: &Logger) -> Result<()> {
        let mut inner = self.0.lock().await;
        let Inner {
            ues,
            imsi_by_ue_addr,
            ..
        } = &mut *inner;
        let ue = ues.get_mut(&imsi).ok_or(anyhow!("Unknown UE {imsi}"))?;

        if let Some(old) = ue
            .ue_addrs
            .iter()
            .position(|a| a.is_ipv4() == ue_addr.is_ipv4())
        {
            let old = ue.ue_addrs.remove(old);
            imsi_by_ue_addr.remove(&old);
        }
        // The address may have been reassigned from another UE.
        if let Some(other) = imsi_by_ue_addr.insert(ue_addr, imsi)
            && let Some(other_ue) = ues.get_mut(&other)
        {
            other_ue.ue_addrs.retain(|a| *a != ue_addr);
        }
        if let Some(ue) = ues.get_mut(&imsi) {
            ue.ue_addrs.push(ue_addr);
        }
        info!(logger, "UE {imsi} has address {ue_addr}");
        Ok(())
    }

    /// Attach the UE to the base station serving the cell, and allocate a TEID for each new bearer.
    /// A bearer with the same EPS bearer ID as an existing one replaces it.
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
        logger: &Logger,
    ) -> Result<CreateSessionResponse> {
        let mut inner = self.0.lock().await;
        let enb_addr = *inner
            .enbs
            .get(&request.cell_id)
            .ok_or(anyhow!("No base station for cell {}", request.cell_id))?;
        ensure!(
            inner.ues.contains_key(&request.imsi),
            "Unknown UE {}",
            request.imsi
        );
        ensure!(
            (u32::MAX - inner.last_teid) as usize >= request.bearers.len(),
            "TEID exhausted"
        );

        let mut bearers = Vec::with_capacity(request.bearers.len());
        for to_create in request.bearers {
            inner.last_teid += 1;
            let teid = TunnelId(inner.last_teid);
            inner.imsi_by_teid.insert(teid, request.imsi);

            let ue = inner
                .ues
                .get_mut(&request.imsi)
                .ok_or(anyhow!("Unknown UE {}", request.imsi))?;
            let replaced = ue
                .bearers
                .iter()
                .position(|b| b.eps_bearer_id == to_create.eps_bearer_id)
                .map(|idx| ue.bearers.remove(idx));
            ue.bearers.push(Bearer {
                eps_bearer_id: to_create.eps_bearer_id,
                teid,
                tft: to_create.tft,
                message_class: to_create.message_class,
            });
            if let Some(replaced) = replaced {
                inner.imsi_by_teid.remove(&replaced.teid);
            }

            info!(
                logger,
                "UE {} bearer {} TEID {teid} class {} via {enb_addr}",
                request.imsi,
                to_create.eps_bearer_id,
                to_create.message_class
            );
            bearers.push(BearerCreated {
                eps_bearer_id: to_create.eps_bearer_id,
                teid,
            });
        }

        if let Some(ue) = inner.ues.get_mut(&request.imsi) {
            ue.enb_addr = Some(enb_addr);
        }
        Ok(CreateSessionResponse { bearers })
    }

    /// Path switch - send the UE's downlink traffic via the base station serving `cell_id`.
    pub async fn modify_bearer(&self, imsi: u64, cell_id: u16, logger: &Logger) -> Result<()> {
        let mut inner = self.0.lock().await;
        let Some(&enb_addr) = inner.enbs.get(&cell_id) else {
            bail!("No base station for cell {cell_id}");
        };
        let ue = inner
            .ues
            .get_mut(&imsi)
            .ok_or(anyhow!("Unknown UE {imsi}"))?;
        ue.enb_addr = Some(enb_addr);
        info!(logger, "UE {imsi} switched to {enb_addr} (cell {cell_id})");
        Ok(())
    }

    /// Returns the TEIDs of the bearers that were deleted.
    pub async fn delete_bearers(
        &self,
        imsi: u64,
        eps_bearer_ids: &[u8],
        logger: &Logger,
    ) -> Result<Vec<TunnelId>> {
        let mut inner = self.0.lock().await;
        let ue = inner
            .ues
            .get_mut(&imsi)
            .ok_or(anyhow!("Unknown UE {imsi}"))?;
        let (deleted, kept): (Vec<Bearer>, Vec<Bearer>) = ue
            .bearers
            .drain(..)
            .partition(|b| eps_bearer_ids.contains(&b.eps_bearer_id));
        ue.bearers = kept;

        let deleted: Vec<TunnelId> = deleted.into_iter().map(|b| b.teid).collect();
        for teid in deleted.iter() {
            inner.imsi_by_teid.remove(teid);
            info!(logger, "Deleted UE {imsi} bearer TEID {teid}");
        }
        Ok(deleted)
    }

    /// Find the base station, TEID and message class for a downlink flow.  The UE's bearers are tried in
    /// the order they were created and the first whose TFT matches wins.
    pub async fn classify(&self, flow: &DownlinkFlow) -> Option<Classification> {
        let inner = self.0.lock().await;
        let imsi = inner.imsi_by_ue_addr.get(&flow.ue_addr)?;
        let ue = inner.ues.get(imsi)?;
        let destination = ue.enb_addr?;
        let bearer = ue.bearers.iter().find(|b| b.tft.matches(flow))?;
        Some(Classification {
            destination,
            teid: bearer.teid,
            message_class: bearer.message_class,
        })
    }

    pub async fn is_known_teid(&self, teid: TunnelId) -> bool {
        self.0.lock().await.imsi_by_teid.contains_key(&teid)
    }
}
