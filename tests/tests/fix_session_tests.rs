//! FIX session engine against the mock venue

use keeper_core::RequestId;
use keeper_exchanges::erisx::ErisxFix;
use keeper_exchanges::fix::tags::{msg_type, tag};
use keeper_exchanges::fix::{FixConnectionState, FixEngine};
use keeper_tests::{init_test_logging, MockVenue, VenueScript, VENUE_PASSWORD};
use std::rc::Rc;
use std::time::Duration;

fn engine(venue: &MockVenue, heartbeat: u64) -> FixEngine {
    let config = ErisxFix::fix_config(venue.endpoint(), "trader-1", "trader-1", VENUE_PASSWORD, None)
        .with_heartbeat_interval(heartbeat)
        .with_response_timeout(Duration::from_secs(3))
        .with_write_timeout(Duration::from_secs(1));
    FixEngine::new(config)
}

fn security_list_request(engine: &FixEngine, id: &str) -> keeper_exchanges::FixMessage {
    let mut msg = engine.create_message(msg_type::SECURITY_LIST_REQUEST).unwrap();
    msg.append_pair(tag::SECURITY_REQ_ID, id)
        .append_pair(tag::SECURITY_LIST_REQUEST_TYPE, 0)
        .append_pair(tag::SYMBOL, "NA")
        .append_pair(tag::PRODUCT, 2);
    msg
}

#[monoio::test(timer_enabled = true)]
async fn test_sequence_numbers_after_reset() {
    init_test_logging();
    let venue = MockVenue::start(VenueScript::default()).unwrap();
    let engine = engine(&venue, 10);
    engine.logon().await.unwrap();
    assert_eq!(engine.state(), FixConnectionState::LoggedIn);
    assert_eq!(engine.next_outbound_seq(), 2);
    assert_eq!(engine.expected_inbound_seq(), 2);

    let pending = engine.request(security_list_request(&engine, "s-1"), "s-1").unwrap();
    pending.wait_for(&[msg_type::SECURITY_LIST]).await.unwrap();
    let pending = engine.request(security_list_request(&engine, "s-2"), "s-2").unwrap();
    pending.wait_for(&[msg_type::SECURITY_LIST]).await.unwrap();

    let seqs: Vec<u64> = venue.received().iter().filter_map(|m| m.seq_num()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(engine.expected_inbound_seq(), 4);
    engine.logout().await.unwrap();
}

#[monoio::test(timer_enabled = true)]
async fn test_concurrent_requests_get_their_own_responses() {
    init_test_logging();
    let venue = MockVenue::start(VenueScript::default()).unwrap();
    let engine = Rc::new(engine(&venue, 10));
    engine.logon().await.unwrap();

    let ids: Vec<RequestId> = (0..4).map(|_| RequestId::new()).collect();
    let pending: Vec<_> = ids
        .iter()
        .map(|id| engine.request(security_list_request(&engine, id.as_str()), id.as_str()).unwrap())
        .collect();

    // collect in reverse order of sending
    for (id, pending) in ids.iter().zip(pending).rev() {
        let response = pending.wait_for(&[msg_type::SECURITY_LIST]).await.unwrap();
        assert_eq!(response.get(tag::SECURITY_REQ_ID), Some(id.as_str()));
    }
    engine.logout().await.unwrap();
}

#[monoio::test(timer_enabled = true)]
async fn test_quiet_line_triggers_test_request() {
    init_test_logging();
    let venue = MockVenue::start(VenueScript::default()).unwrap();
    let engine = engine(&venue, 1);
    engine.logon().await.unwrap();

    // the venue never sends heartbeats on its own
    monoio::time::sleep(Duration::from_millis(2500)).await;
    assert!(engine.is_logged_in());
    assert!(!venue.received_of(msg_type::HEARTBEAT).is_empty());
    let test_requests = venue.received_of(msg_type::TEST_REQUEST);
    assert!(!test_requests.is_empty());
    assert!(test_requests[0].get(tag::TEST_REQ_ID).is_some());
    engine.logout().await.unwrap();
}

#[monoio::test(timer_enabled = true)]
async fn test_unknown_message_type_is_rejected_by_venue() {
    init_test_logging();
    let venue = MockVenue::start(VenueScript::default()).unwrap();
    let engine = engine(&venue, 10);
    engine.logon().await.unwrap();

    let mut msg = engine.create_message("AE").unwrap();
    msg.append_pair(tag::TEXT, "hello");
    engine.write(msg).unwrap();

    // no correlation id, so the reject is unsolicited
    let reject = engine.wait_for_response(msg_type::EXECUTION_REPORT).await.unwrap();
    assert_eq!(reject.msg_type(), msg_type::BUSINESS_MESSAGE_REJECT);
    assert_eq!(reject.get(tag::REF_MSG_TYPE), Some("AE"));
    engine.logout().await.unwrap();
}

#[monoio::test(timer_enabled = true)]
async fn test_logout_then_logon_again() {
    init_test_logging();
    let venue = MockVenue::start(VenueScript::default()).unwrap();
    let engine = engine(&venue, 10);
    engine.logon().await.unwrap();
    engine.logout().await.unwrap();
    assert_eq!(engine.state(), FixConnectionState::LoggedOut);
    assert!(engine.request(security_list_request(&engine, "late"), "late").is_err());

    engine.logon().await.unwrap();
    assert!(engine.is_logged_in());
    let pending = engine.request(security_list_request(&engine, "again"), "again").unwrap();
    let list = pending.wait_for(&[msg_type::SECURITY_LIST]).await.unwrap();
    assert_eq!(list.get(tag::NO_RELATED_SYM), Some("2"));
    engine.logout().await.unwrap();
    assert_eq!(venue.received_of(msg_type::LOGON).len(), 2);
}
