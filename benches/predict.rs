use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use motovalue::dataset::{Listing, ListingFeatures, ListingTable};
use motovalue::{PriceEstimator, PricePipeline};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const NAMES: [&str; 8] = [
    "Royal Enfield Classic 350",
    "Honda Dio",
    "Yamaha FZ S V 2.0",
    "Bajaj Pulsar 150",
    "Honda CB Shine",
    "TVS Apache RTR 160",
    "Hero Splendor Plus",
    "KTM Duke 390",
];
const SELLERS: [&str; 2] = ["Individual", "Dealer"];
const OWNERS: [&str; 3] = ["1st owner", "2nd owner", "3rd owner"];

/// Synthetic listings with a price driven by age, mileage and list price.
fn synthetic_listings(n: usize, seed: u64) -> ListingTable {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let year = rng.gen_range(2005..=2020_i32) as f64;
            let km_driven = rng.gen_range(500..80_000_i32) as f64;
            let ex_showroom_price = rng.gen_range(40_000..250_000_i32) as f64;
            let age = 2021.0 - year;
            let selling_price =
                (ex_showroom_price * 0.9_f64.powf(age) - km_driven * 0.2).max(5_000.0);
            Listing {
                features: ListingFeatures {
                    name: Some(NAMES[rng.gen_range(0..NAMES.len())].to_string()),
                    year,
                    km_driven,
                    seller_type: Some(SELLERS[rng.gen_range(0..SELLERS.len())].to_string()),
                    owner: Some(OWNERS[rng.gen_range(0..OWNERS.len())].to_string()),
                    ex_showroom_price,
                },
                selling_price,
            }
        })
        .collect()
}

/// Fit a pipeline once for prediction benchmarks
fn train_pipeline() -> PricePipeline {
    let table = synthetic_listings(1000, 42);
    PriceEstimator::new()
        .fit_table(&table)
        .expect("Failed to fit pipeline")
        .pipeline
}

fn bench_predict_single(c: &mut Criterion) {
    let pipeline = train_pipeline();
    let listing = synthetic_listings(1, 7).listings()[0].features.clone();

    c.bench_function("predict_single", |b| {
        b.iter(|| {
            let price = pipeline.predict_one(black_box(&listing));
            black_box(price).ok();
        });
    });
}

fn bench_predict_batch(c: &mut Criterion) {
    let pipeline = train_pipeline();

    for batch_size in [10, 100, 1000].iter() {
        let frame = synthetic_listings(*batch_size, 9).features();
        c.bench_with_input(
            BenchmarkId::new("predict_batch", batch_size),
            batch_size,
            |b, _| {
                b.iter(|| {
                    let prices = pipeline.predict(black_box(&frame));
                    black_box(prices).ok();
                });
            },
        );
    }
}

fn bench_fit(c: &mut Criterion) {
    let table = synthetic_listings(500, 42);
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);
    for n_jobs in [1, 4].iter() {
        group.bench_with_input(BenchmarkId::new("n_jobs", n_jobs), n_jobs, |b, &jobs| {
            b.iter(|| {
                let outcome = PriceEstimator::new()
                    .with_n_trees(50)
                    .with_n_jobs(jobs)
                    .fit_table(black_box(&table));
                black_box(outcome).ok();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_predict_single, bench_predict_batch, bench_fit);
criterion_main!(benches);
