use super::{MessageClass, Tft, TunnelId};

#[derive(Debug, Clone)]
pub struct BearerToBeCreated {
    pub eps_bearer_id: u8,
    pub tft: Tft,
    pub message_class: MessageClass,
}

#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub imsi: u64,
    // Cell that the UE is attached through - selects the base station for downlink.
    pub cell_id: u16,
    pub bearers: Vec<BearerToBeCreated>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerCreated {
    pub eps_bearer_id: u8,
    pub teid: TunnelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSessionResponse {
    pub bearers: Vec<BearerCreated>,
}
