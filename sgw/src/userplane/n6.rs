//! n6 - bridges the data network tun device to the user plane

use super::PacketProcessor;
use anyhow::{Result, bail};
use async_std::fs::File;
use async_std::io::{ReadExt, WriteExt};
use async_std::task::{self, JoinHandle};
use async_tun::{Tun, TunBuilder};
use slog::{Logger, info};
use std::mem::ManuallyDrop;
use std::os::fd::{AsRawFd, FromRawFd};

pub struct N6Bridge {
    downlink: JoinHandle<()>,
    uplink: JoinHandle<()>,
}

impl N6Bridge {
    pub fn start(tun: Tun, packet_processor: PacketProcessor, logger: &Logger) -> Self {
        // The tun device owns the descriptor.  The writer only borrows it, so must not close it.
        let writer = ManuallyDrop::new(unsafe { File::from_raw_fd(tun.as_raw_fd()) });

        let uplink = task::spawn(n6_uplink(
            writer,
            packet_processor.clone(),
            logger.clone(),
        ));
        let downlink = task::spawn(n6_downlink(tun, packet_processor, logger.clone()));
        N6Bridge { downlink, uplink }
    }

    pub async fn stop(self) {
        // Writer first, since the reader task owns the descriptor.
        self.uplink.cancel().await;
        self.downlink.cancel().await;
    }
}

async fn n6_downlink(tun: Tun, packet_processor: PacketProcessor, logger: Logger) {
    let mut buf = [0u8; 2000];
    loop {
        let bytes_read = match tun.reader().read(&mut buf).await {
            Ok(bytes_read) => bytes_read,
            Err(e) => {
                info!(logger, "Exiting N6 downlink task with error {e}");
                break;
            }
        };
        if packet_processor
            .send_downlink(buf[..bytes_read].to_vec())
            .await
            .is_err()
        {
            break;
        }
    }
}

async fn n6_uplink(mut writer: ManuallyDrop<File>, packet_processor: PacketProcessor, logger: Logger) {
    let receiver = packet_processor.n6_uplink();
    while let Ok(packet) = receiver.recv().await {
        if let Err(e) = write_packet(&mut writer, &packet).await {
            info!(logger, "Exiting N6 uplink task with error {e}");
            break;
        }
    }
}

async fn write_packet(writer: &mut File, packet: &[u8]) -> Result<()> {
    writer.write_all(packet).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn open_n6_tun_device(tun_device_name: &str, logger: &Logger) -> Result<Tun> {
    match TunBuilder::new()
        .name(tun_device_name)
        .tap(false)
        .packet_info(false)
        .try_build()
        .await
    {
        Ok(tun) => {
            info!(logger, "Opened tun device '{tun_device_name}' for N6");
            Ok(tun)
        }
        Err(e) => bail!(
            "Failed to open TUN device '{tun_device_name}' - does it exist and is it owned by the current user?
Device open error code: {e}
 EPERM: may indicate that the device doesn't exist or is not owned by the current user
 EINVAL: may indicate that the device is actually a tap device rather than a tun device
 EBUSY: another process, e.g. another gateway instance, has the device open"
        ),
    }
}
