use sgw_tests::framework::*;
use std::net::Ipv4Addr;

#[async_std::test]
async fn unknown_ue() -> anyhow::Result<()> {
    let (mut enb, sgw, dn, _logger) = init().await?;
    attach_ue(&sgw, &enb, vec![default_bearer(5)]).await?;

    // Nothing is sent for a UE address that has no bearers.
    dn.send_n6_udp_packet(Ipv4Addr::new(10, 255, 0, 99), TEST_UDP_PORT, &random_data())
        .await?;
    enb.expect_nothing(WAIT_TIME * 2).await?;

    let data = random_data();
    dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &data).await?;
    let received = enb.recv_datagram().await?;
    assert_eq!(received.len(), 1);
    assert!(received[0].payload.ends_with(&data));

    // Nor once the bearer has been deleted.
    sgw.delete_bearers(IMSI, &[5]).await?;
    dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &random_data())
        .await?;
    enb.expect_nothing(WAIT_TIME * 2).await?;

    sgw.graceful_shutdown().await;
    Ok(())
}
