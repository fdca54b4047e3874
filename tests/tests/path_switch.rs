use sgw_tests::{MockEnb, framework::*};

#[async_std::test]
async fn path_switch() -> anyhow::Result<()> {
    let (mut enb, sgw, dn, logger) = init().await?;
    let teids = attach_ue(&sgw, &enb, vec![default_bearer(5)]).await?;

    for _ in 0..MAX_LENGTH {
        dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &random_data())
            .await?;
    }
    assert_eq!(enb.recv_datagram().await?.len(), MAX_LENGTH);

    // The UE moves to a cell on a second base station.
    let mut target_enb = MockEnb::new("127.0.0.3", &logger).await?;
    sgw.add_enb(2, target_enb.ip_addr()).await;
    sgw.modify_bearer(IMSI, 2).await?;

    for _ in 0..MAX_LENGTH {
        dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &random_data())
            .await?;
    }
    let received = target_enb.recv_datagram().await?;
    assert_eq!(received.len(), MAX_LENGTH);
    assert!(received.iter().all(|p| p.teid == teids[0]));
    assert!(received[0].full_teid);
    enb.expect_nothing(WAIT_TIME * 2).await?;

    sgw.graceful_shutdown().await;
    Ok(())
}
