//! Shared model and codec behaviour seen from outside the crates

use keeper_core::prelude::*;
use keeper_core::wad;
use keeper_exchanges::fix::tags::{tag, FIX_44};
use keeper_exchanges::fix::{FixMessage, FixParser};
use keeper_exchanges::prelude::*;
use proptest::prelude::*;
use rstest::rstest;
use std::collections::HashSet;

#[rstest]
#[case("ETH-USD", true)]
#[case("eth-usd-perp", true)]
#[case("ETH/USD", false)]
#[case("-USD", false)]
#[case("ETH-", false)]
fn test_trade_pair_validation(#[case] pair: &str, #[case] valid: bool) {
    let trade = Trade::new("t-1", 1_700_000_000, pair, true, wad!(100), wad!(1));
    assert_eq!(trade.is_ok(), valid, "{pair}");
}

#[test]
fn test_order_remaining_amounts() {
    let sell = Order::new("1|a", 1, "ETH/USD", true, wad!(200), wad!(1.5));
    assert_eq!(sell.remaining_sell_amount(), wad!(1.5));
    assert_eq!(sell.remaining_buy_amount(), wad!(300));

    let buy = Order::new("2|b", 1, "ETH/USD", false, wad!(200), wad!(300));
    assert_eq!(buy.remaining_buy_amount(), wad!(300));
    assert_eq!(buy.remaining_sell_amount(), wad!(60000));
}

#[test]
fn test_orders_hash_by_id_time_price_amount() {
    let a = Order::new("1|a", 1, "ETH/USD", true, wad!(200), wad!(1.50));
    let b = Order::new("1|a", 1, "ETH/USD", true, wad!(200.0), wad!(1.5));
    let mut set = HashSet::new();
    set.insert(a);
    set.insert(b);
    assert_eq!(set.len(), 1);
}

fn field_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9./:-]{1,24}"
}

proptest! {
    #[test]
    fn prop_parser_recovers_message_after_garbage(
        garbage in "[a-z ]{0,32}",
        symbol in field_value(),
        text in field_value(),
        split in 0usize..200,
    ) {
        let mut msg = FixMessage::new(FIX_44, "8");
        msg.append_header(tag::MSG_SEQ_NUM, 7)
            .append_pair(tag::SYMBOL, &symbol)
            .append_pair(tag::TEXT, &text);
        let mut stream = garbage.into_bytes();
        stream.extend_from_slice(&msg.encode());

        let split = split.min(stream.len());
        let mut parser = FixParser::new();
        parser.append_buffer(&stream[..split]);
        let mut parsed = Vec::new();
        while let Some(m) = parser.get_message().unwrap() {
            parsed.push(m);
        }
        parser.append_buffer(&stream[split..]);
        while let Some(m) = parser.get_message().unwrap() {
            parsed.push(m);
        }

        prop_assert_eq!(parsed.len(), 1);
        prop_assert_eq!(parsed[0].get(tag::SYMBOL), Some(symbol.as_str()));
        prop_assert_eq!(parsed[0].get(tag::TEXT), Some(text.as_str()));
        prop_assert_eq!(parsed[0].seq_num(), Some(7));
    }
}

#[test]
fn test_fix_timestamps() {
    let dt = parse_fix_timestamp("20240105-10:20:30.123").unwrap();
    assert_eq!(fix_utc_timestamp(dt), "20240105-10:20:30.123");
    assert!(parse_fix_timestamp("2024-01-05").is_none());
}
