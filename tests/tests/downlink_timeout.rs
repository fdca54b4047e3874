use sgw_tests::framework::*;
use std::time::Instant;

#[async_std::test]
async fn downlink_timeout() -> anyhow::Result<()> {
    let (mut enb, sgw, dn, _logger) = init().await?;
    let teids = attach_ue(&sgw, &enb, vec![default_bearer(5)]).await?;

    // A lone packet waits for the queue's timer.
    let start = Instant::now();
    let data = random_data();
    dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &data).await?;
    let received = enb.recv_datagram().await?;
    assert!(start.elapsed() >= WAIT_TIME);

    assert_eq!(received.len(), 1);
    assert_eq!(received[0].teid, teids[0]);
    assert!(received[0].full_teid);
    assert!(received[0].payload.ends_with(&data));

    sgw.graceful_shutdown().await;
    Ok(())
}
