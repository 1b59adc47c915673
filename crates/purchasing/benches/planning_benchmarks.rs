use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use procura_core::{ItemId, Money, QuoteId, RfqId, VendorId};
use procura_purchasing::{InventoryItem, QuoteCandidate, plan_requirements, rank_quotes};

fn items(n: usize) -> Vec<InventoryItem> {
    (0..n)
        .map(|i| InventoryItem {
            id: ItemId::new(i as i64 + 1),
            name: format!("item-{i}"),
            current_stock: (i % 40) as i64,
            reorder_level: 25,
            unit_price: Money::from_cents(999).unwrap_or_default(),
        })
        .rev()
        .collect()
}

fn candidates(n: usize) -> Vec<QuoteCandidate> {
    (0..n)
        .map(|i| QuoteCandidate {
            quote_id: QuoteId::new(i as i64 + 1),
            rfq_id: RfqId::new(i as i64 + 1),
            vendor_id: VendorId::new(i as i64 + 1),
            vendor_name: format!("vendor-{i}"),
            price: Money::from_cents(1_000 + ((i * 7919) % 5_000) as i64).unwrap_or_default(),
            delivery_days: (i % 30) as i32,
            validity_days: 30,
            rating: (i % 6) as f64 * 0.9,
        })
        .collect()
}

fn bench_plan_requirements(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_requirements");
    for size in [10usize, 1_000, 10_000] {
        let input = items(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| plan_requirements(black_box(20.0), black_box(input)))
        });
    }
    group.finish();
}

fn bench_rank_quotes(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_quotes");
    for size in [2usize, 16, 256] {
        let input = candidates(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &input, |b, input| {
            b.iter(|| rank_quotes(black_box(input)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_plan_requirements, bench_rank_quotes);
criterion_main!(benches);
