use super::{DataNetwork, MockEnb};
use anyhow::Result;
use sgw::{
    AggregationConfig, BearerToBeCreated, Config, CreateSessionRequest, MessageClass, Sgw, Tft,
    TunnelId,
};
use slog::{Drain, Logger, o};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub const SGW_IP: &str = "127.0.0.1";
pub const ENB_IP: &str = "127.0.0.2";
pub const IMSI: u64 = 208930000000001;
pub const CELL_ID: u16 = 1;
pub const UE_ADDR: Ipv4Addr = Ipv4Addr::new(10, 255, 0, 1);
pub const TEST_UDP_PORT: u16 = 23215;

// Long enough that a handful of packets sent back to back all make it into the same batch.
pub const WAIT_TIME: Duration = Duration::from_millis(200);
pub const MAX_LENGTH: usize = 3;

pub async fn init() -> Result<(MockEnb, Sgw, DataNetwork, Logger)> {
    exit_on_panic();
    let logger = init_logging();
    let enb = MockEnb::new(ENB_IP, &logger).await?;
    let sgw = start_sgw(SGW_IP, &logger).await?;
    let dn = DataNetwork::new(&sgw, &logger);
    Ok((enb, sgw, dn, logger))
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

fn init_logging() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

async fn start_sgw(addr: &str, logger: &Logger) -> Result<Sgw> {
    Sgw::start(
        Config {
            ip_addr: addr.parse()?,
            name: Some("SGW".to_string()),
            aggregation: AggregationConfig {
                initial_max_length: MAX_LENGTH as f64,
                initial_wait_time_ms: WAIT_TIME.as_millis() as f64,
                max_wait_time_ms: 500.0,
                ..Default::default()
            },
        },
        logger.new(o!("sgw" => 1)),
    )
    .await
}

/// A default bearer that carries everything.
pub fn default_bearer(eps_bearer_id: u8) -> BearerToBeCreated {
    BearerToBeCreated {
        eps_bearer_id,
        tft: Tft::match_all(),
        message_class: MessageClass(1),
    }
}

/// Register the base station and the UE and create the UE's bearers.  Returns their TEIDs.
pub async fn attach_ue(
    sgw: &Sgw,
    enb: &MockEnb,
    bearers: Vec<BearerToBeCreated>,
) -> Result<Vec<TunnelId>> {
    sgw.add_enb(CELL_ID, enb.ip_addr()).await;
    sgw.add_ue(IMSI).await;
    sgw.set_ue_address(IMSI, IpAddr::V4(UE_ADDR)).await?;
    let response = sgw
        .create_session(CreateSessionRequest {
            imsi: IMSI,
            cell_id: CELL_ID,
            bearers,
        })
        .await?;
    Ok(response.bearers.into_iter().map(|b| b.teid).collect())
}

pub fn random_data() -> [u8; 16] {
    rand::random()
}
