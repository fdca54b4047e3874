use sgw::{BearerToBeCreated, MessageClass, PacketFilter, Tft};
use sgw_tests::framework::*;

#[async_std::test]
async fn two_bearers() -> anyhow::Result<()> {
    let (mut enb, sgw, dn, _logger) = init().await?;

    // A dedicated bearer for one UDP port, then a default bearer for everything else, sharing a
    // message class.
    const DEDICATED_PORT: u16 = 5004;
    let dedicated = BearerToBeCreated {
        eps_bearer_id: 6,
        tft: Tft {
            filters: vec![PacketFilter {
                protocol: Some(17),
                ue_ports: Some(DEDICATED_PORT..=DEDICATED_PORT),
                remote_ports: None,
            }],
        },
        message_class: MessageClass(1),
    };
    let teids = attach_ue(&sgw, &enb, vec![dedicated, default_bearer(5)]).await?;

    dn.send_n6_udp_packet(UE_ADDR, DEDICATED_PORT, &random_data())
        .await?;
    dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &random_data())
        .await?;
    dn.send_n6_udp_packet(UE_ADDR, TEST_UDP_PORT, &random_data())
        .await?;

    let received = enb.recv_datagram().await?;
    assert_eq!(received.len(), 3);
    assert_eq!(received[0].teid, teids[0]);
    assert!(received[0].full_teid);

    // The default bearer's TEID is new to the base station the first time it appears.
    assert_eq!(received[1].teid, teids[1]);
    assert_eq!(received[1].version, 4);
    assert!(received[1].full_teid);
    assert_eq!(received[2].teid, teids[1]);
    assert!(!received[2].full_teid);

    sgw.graceful_shutdown().await;
    Ok(())
}
