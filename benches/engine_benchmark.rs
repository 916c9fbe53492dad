//! Benchmarks for book normalization and position reconstruction

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use perp_flow::orderbook::{compute_depth, normalize, DepthView};
use perp_flow::positions::{reconstruct, Fill, Side};
use rust_decimal::Decimal;
use serde_json::{json, Value};

fn create_snapshot(levels: usize) -> Value {
    let bids: Vec<Value> = (0..levels)
        .map(|i| json!({ "px": (50_000 - i).to_string(), "sz": "1.5", "n": 3 }))
        .collect();
    let asks: Vec<Value> = (0..levels)
        .map(|i| json!({ "px": (50_001 + i).to_string(), "sz": "1.5", "n": 3 }))
        .collect();

    json!({ "coin": "BTC", "time": 1_672_531_200_000u64, "levels": [bids, asks] })
}

fn create_fills(round_trips: usize) -> Vec<Fill> {
    (0..round_trips)
        .flat_map(|i| {
            let t = (i as u64) * 10;
            let coin = if i % 2 == 0 { "BTC" } else { "ETH" };
            let entry = Decimal::from(100 + (i % 7) as i64);
            [
                Fill::new(coin, Side::Buy, Decimal::ONE, entry, t),
                Fill::new(coin, Side::Buy, Decimal::ONE, entry + Decimal::TWO, t + 1),
                Fill::new(coin, Side::Sell, Decimal::TWO, entry + Decimal::TEN, t + 5),
            ]
        })
        .collect()
}

fn benchmark_normalize(c: &mut Criterion) {
    let snapshot = create_snapshot(100);

    c.bench_function("normalize_snapshot_100_levels", |b| {
        b.iter(|| normalize(black_box(&snapshot)))
    });
}

fn benchmark_depth(c: &mut Criterion) {
    let book = match normalize(&create_snapshot(100)) {
        Ok(Some(book)) => book,
        _ => panic!("benchmark snapshot must normalize"),
    };

    c.bench_function("compute_depth_100_levels", |b| {
        b.iter(|| compute_depth(black_box(&book.bids)))
    });

    c.bench_function("depth_view_20_levels", |b| {
        b.iter(|| DepthView::from_state(black_box(&book), Some(20)))
    });
}

fn benchmark_reconstruct(c: &mut Criterion) {
    let fills = create_fills(10_000);

    c.bench_function("reconstruct_30k_fills", |b| {
        b.iter(|| reconstruct(black_box(&fills)))
    });
}

criterion_group!(
    benches,
    benchmark_normalize,
    benchmark_depth,
    benchmark_reconstruct
);
criterion_main!(benches);
