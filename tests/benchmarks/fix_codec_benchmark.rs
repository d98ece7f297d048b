//! FIX codec throughput
//!
//! - encoding a NewOrderSingle (BodyLength and CheckSum included)
//! - decoding a full-book MarketDataSnapshot
//! - stream parsing with frames split across reads
//! - repeating group extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keeper_core::Wad;
use keeper_exchanges::fix::tags::{msg_type, tag, FIX_44};
use keeper_exchanges::fix::{FixMessage, FixParser};

fn new_order_single(seq: u64) -> FixMessage {
    let mut msg = FixMessage::new(FIX_44, msg_type::NEW_ORDER_SINGLE);
    msg.append_header(tag::SENDER_COMP_ID, "trader-1")
        .append_header(tag::TARGET_COMP_ID, "ERISX")
        .append_header(tag::MSG_SEQ_NUM, seq)
        .append_utc_timestamp_header(tag::SENDING_TIME)
        .append_pair(tag::CL_ORD_ID, "bench-0001")
        .append_pair(tag::HANDL_INST, 1)
        .append_pair(tag::SYMBOL, "ETH/USD")
        .append_pair(tag::CURRENCY, "ETH")
        .append_pair(tag::SIDE, 2)
        .append_utc_timestamp(tag::TRANSACT_TIME)
        .append_pair(tag::ORDER_QTY, "0.5")
        .append_pair(tag::ORD_TYPE, 2)
        .append_pair(tag::PRICE, "151.25")
        .append_pair(tag::TIME_IN_FORCE, 1)
        .append_pair(tag::EXEC_INST, 6);
    msg
}

fn book_snapshot(levels: usize) -> FixMessage {
    let mut msg = FixMessage::new(FIX_44, msg_type::MARKET_DATA_SNAPSHOT);
    msg.append_header(tag::SENDER_COMP_ID, "ERISX")
        .append_header(tag::TARGET_COMP_ID, "md-1")
        .append_header(tag::MSG_SEQ_NUM, 42)
        .append_utc_timestamp_header(tag::SENDING_TIME)
        .append_pair(tag::MD_REQ_ID, "md-req")
        .append_pair(tag::SYMBOL, "ETH/USD")
        .append_pair(tag::NO_MD_ENTRIES, levels * 2);
    for i in 0..levels {
        let bid = Wad::from_i64(150) - Wad::from_i64(i as i64);
        let ask = Wad::from_i64(151) + Wad::from_i64(i as i64);
        msg.append_pair(tag::MD_ENTRY_TYPE, 0)
            .append_pair(tag::MD_ENTRY_PX, bid)
            .append_pair(tag::MD_ENTRY_SIZE, "1.5")
            .append_pair(tag::MD_ENTRY_TYPE, 1)
            .append_pair(tag::MD_ENTRY_PX, ask)
            .append_pair(tag::MD_ENTRY_SIZE, "2");
    }
    msg
}

fn bench_encode(c: &mut Criterion) {
    let msg = new_order_single(7);
    let len = msg.encode().len() as u64;

    let mut group = c.benchmark_group("fix_encode");
    group.throughput(Throughput::Bytes(len));
    group.bench_function("new_order_single", |b| b.iter(|| black_box(&msg).encode()));
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("fix_decode");
    for levels in [1usize, 10, 50] {
        let raw = book_snapshot(levels).encode();
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("snapshot", levels), &raw, |b, raw| {
            b.iter(|| FixMessage::decode(black_box(raw)))
        });
    }
    group.finish();
}

fn bench_parser(c: &mut Criterion) {
    let mut stream = Vec::new();
    for seq in 1..=100 {
        stream.extend_from_slice(&new_order_single(seq).encode());
    }

    let mut group = c.benchmark_group("fix_parser");
    group.throughput(Throughput::Bytes(stream.len() as u64));
    for chunk in [64usize, 1024, 16 * 1024] {
        group.bench_with_input(BenchmarkId::new("100_messages", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut parser = FixParser::new();
                let mut count = 0;
                for piece in stream.chunks(chunk) {
                    parser.append_buffer(piece);
                    while let Ok(Some(msg)) = parser.get_message() {
                        black_box(msg);
                        count += 1;
                    }
                }
                assert_eq!(count, 100);
            })
        });
    }
    group.finish();
}

fn bench_groups(c: &mut Criterion) {
    let msg = book_snapshot(50);
    c.bench_function("fix_group_md_entries", |b| {
        b.iter(|| black_box(&msg).group_from(tag::NO_MD_ENTRIES).len())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_parser, bench_groups);
criterion_main!(benches);
