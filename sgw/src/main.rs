//! main - starts a serving gateway user plane with downlink packet aggregation

use anyhow::{Result, ensure};
use async_std::channel::Sender;
use async_std::prelude::*;
use clap::Parser;
use sgw::userplane::open_n6_tun_device;
use sgw::{AggregationConfig, Config, Sgw, load_config_file};
use signal_hook::consts::signal::*;
use signal_hook_async_std::Signals;
use slog::{Drain, Logger, o};
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local IP address of the gateway.  UDP port 2152 (for S1-U) is bound on this
    /// address.  Defaults to the eth0 address.
    #[arg(long, default_value_t = local_ip_address::local_ip().unwrap())]
    local_ip: IpAddr,

    /// Name of the Linux tun device to open for routing userplane packets to/from UEs on the N6 reference point.
    #[arg(long, default_value = "ue")]
    n6_tun_name: String,

    /// TOML file of aggregation settings.  Built in defaults are used if not given.
    #[arg(long)]
    config: Option<String>,

    /// Name to use in logs.
    #[arg(long, default_value = "SGW")]
    name: String,
}

#[async_std::main]
async fn main() -> Result<()> {
    exit_on_panic();
    let logger = init_logging();

    let args = Args::parse();
    check_local_ip(&args.local_ip)?;

    let aggregation = match args.config {
        Some(filename) => load_config_file(&filename, &logger)?,
        None => AggregationConfig::default(),
    };

    let sgw = Sgw::start(
        Config {
            ip_addr: args.local_ip,
            name: Some(args.name),
            aggregation,
        },
        logger.clone(),
    )
    .await?;

    let tun = open_n6_tun_device(&args.n6_tun_name, &logger).await?;
    let n6_bridge = sgw.bridge_n6(tun);

    wait_for_signal().await?;
    sgw.graceful_shutdown().await;
    n6_bridge.stop().await;

    Ok(())
}

fn init_logging() -> Logger {
    // Use info level logging by default
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info") }
    }
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

fn check_local_ip(ip: &IpAddr) -> Result<()> {
    ensure!(
        !ip.is_unspecified(),
        "Unspecified IP address not allowed for local IP - this must be an address that base stations can send to"
    );
    Ok(())
}

async fn wait_for_signal() -> Result<i32> {
    let signals = Signals::new([SIGHUP, SIGTERM, SIGINT, SIGQUIT])?;
    let handle = signals.handle();
    let (sig_sender, sig_receiver) = async_std::channel::unbounded();
    let signals_task = async_std::task::spawn(handle_signals(signals, sig_sender));
    let signal = sig_receiver.recv().await;
    handle.close();
    signals_task.await;
    Ok(signal?)
}

async fn handle_signals(signals: Signals, sig_sender: Sender<i32>) {
    let mut signals = signals.fuse();
    while let Some(signal) = signals.next().await {
        match signal {
            SIGHUP => {
                // Nothing to reload - aggregation settings are fixed at startup.
            }
            SIGTERM | SIGINT | SIGQUIT => {
                let _ = sig_sender.send(signal).await;
            }
            _ => unreachable!(),
        }
    }
}
