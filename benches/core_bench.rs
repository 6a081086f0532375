use criterion::{black_box, criterion_group, criterion_main, Criterion};
use primegen::candidates::CandidateSource;
use primegen::checkpoint::CheckpointStore;
use primegen::flush::FlushManager;
use primegen::{MillerRabin, PrimalityTest};
use rug::Integer;

fn bench_miller_rabin_prime(c: &mut Criterion) {
    // 2^127 - 1 (Mersenne prime, no small factors)
    let prime = (Integer::from(1u32) << 127u32) - 1u32;
    let mr = MillerRabin::default();
    c.bench_function("miller_rabin(M127)", |b| {
        b.iter(|| mr.test(black_box(&prime)).unwrap());
    });
}

fn bench_miller_rabin_composite(c: &mut Criterion) {
    // Carmichael number 561 = 3 * 11 * 17
    let composite = Integer::from(561);
    let mr = MillerRabin::default();
    c.bench_function("miller_rabin(561)", |b| {
        b.iter(|| mr.test(black_box(&composite)).unwrap());
    });
}

fn bench_candidate_generation(c: &mut Criterion) {
    let start = (Integer::from(1u32) << 200u32) + 1u32;
    c.bench_function("candidates(2^200+1, 10k)", |b| {
        b.iter(|| CandidateSource::unbounded(black_box(start.clone())).take(10_000).count());
    });
}

fn bench_flush_reversed_batch(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::in_dir(dir.path(), "bench");
    let batch: Vec<Integer> = (0..1_000u32).rev().map(|n| Integer::from(n * 2 + 3)).collect();

    c.bench_function("flush(1000 reversed)", |b| {
        b.iter(|| {
            let mgr = FlushManager::new(Some(store.clone()), batch.len(), 0);
            for p in &batch {
                mgr.append(black_box(p.clone())).unwrap();
            }
        });
    });
}

fn bench_read_last_prime(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let store = CheckpointStore::in_dir(dir.path(), "bench");
    let batch: Vec<Integer> = (0..10_000u32).map(|n| Integer::from(n * 2 + 3)).collect();
    store.append(&batch).unwrap();
    let fallback = Integer::from(3);

    c.bench_function("read_last_prime(10k lines)", |b| {
        b.iter(|| store.read_last_prime(black_box(&fallback)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_miller_rabin_prime,
    bench_miller_rabin_composite,
    bench_candidate_generation,
    bench_flush_reversed_batch,
    bench_read_last_prime,
);
criterion_main!(benches);
