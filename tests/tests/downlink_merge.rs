use sgw_tests::framework::*;

#[async_std::test]
async fn downlink_merge() -> anyhow::Result<()> {
    let (mut enb, sgw, dn, _logger) = init().await?;
    let teids = attach_ue(&sgw, &enb, vec![default_bearer(5)]).await?;

    // A full batch goes out straight away as one datagram, in the order it was sent.
    let data: Vec<[u8; 16]> = (0..MAX_LENGTH).map(|_| random_data()).collect();
    for d in data.iter() {
        dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, d).await?;
    }
    let received = enb.recv_datagram().await?;
    assert_eq!(received.len(), MAX_LENGTH);
    for (packet, d) in received.iter().zip(data.iter()) {
        assert_eq!(packet.teid, teids[0]);
        assert!(packet.payload.ends_with(d));
    }

    // Only the leading header carries the full TEID.
    assert_eq!(received[0].version, 3);
    assert!(received[0].full_teid);
    for packet in &received[1..] {
        assert_eq!(packet.version, 4);
        assert!(!packet.full_teid);
    }

    sgw.graceful_shutdown().await;
    Ok(())
}
