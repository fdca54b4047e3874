use sgw::TunnelId;
use sgw_tests::{DN_HOST, DN_PORT, build_ipv4_udp, framework::*};
use std::time::Duration;

#[async_std::test]
async fn uplink() -> anyhow::Result<()> {
    let (enb, sgw, dn, _logger) = init().await?;
    let teids = attach_ue(&sgw, &enb, vec![default_bearer(5)]).await?;
    let sgw_ip = *sgw.ip_addr();

    // The header is removed and the inner packet goes to the data network.
    let inner = build_ipv4_udp(UE_ADDR, TEST_UDP_PORT, DN_HOST, DN_PORT, &random_data());
    enb.send_uplink(sgw_ip, teids[0], &inner).await?;
    assert_eq!(dn.receive_n6_packet().await?, inner);

    // Unknown TEIDs, malformed headers and non IP payloads are dropped.
    enb.send_uplink(sgw_ip, TunnelId(0xdead), &inner).await?;
    enb.send_raw(sgw_ip, &[0x10, 0xff, 0x00]).await?;
    enb.send_uplink(sgw_ip, teids[0], &[0x00; 20]).await?;
    dn.expect_no_n6_packet(Duration::from_millis(300)).await?;

    sgw.graceful_shutdown().await;
    Ok(())
}
