//! Dump and restore throughput.
//!
//! Run with: cargo bench --bench dump_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use swapbuf_core::buffer::{BufferManager, BufferManagerConfig};

const SIZES: [usize; 3] = [4 * 1024, 256 * 1024, 4 * 1024 * 1024];

fn manager(root: &tempfile::TempDir, policy: &str) -> BufferManager {
    let config = BufferManagerConfig::default()
        .with_temp_root(root.path())
        .with_policy(policy)
        .with_sweep_stale(false);
    BufferManager::new(config).unwrap()
}

fn bench_dump_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("dump_restore");
    let root = tempfile::tempdir().unwrap();
    let manager = manager(&root, "never");

    for size in SIZES {
        let id = manager.next_buffer_id();
        manager.set_buffer(id, vec![0x5A; size]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &id, |b, &id| {
            b.iter(|| {
                black_box(manager.dump_buffer(id));
                black_box(manager.restore_buffer(id).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_lock_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_cycle");
    let root = tempfile::tempdir().unwrap();

    for policy in ["never", "always"] {
        let manager = manager(&root, policy);
        let id = manager.next_buffer_id();
        manager.set_buffer(id, vec![1; 64 * 1024]).unwrap();

        group.bench_function(policy, |b| {
            b.iter(|| {
                let lock = manager.lock(id).unwrap();
                black_box(lock.bytes()[0]);
            });
        });
    }

    group.finish();
}

fn bench_barrier_churn(c: &mut Criterion) {
    let root = tempfile::tempdir().unwrap();
    let config = BufferManagerConfig::default()
        .with_temp_root(root.path())
        .with_policy("barrier")
        .with_policy_param("barrier", "1MiB")
        .with_sweep_stale(false);
    let manager = BufferManager::new(config).unwrap();
    let ids: Vec<_> = (0..32).map(|_| manager.next_buffer_id()).collect();
    for id in &ids {
        manager.allocate(*id, 64 * 1024).unwrap();
    }

    c.bench_function("barrier_churn", |b| {
        let mut next = 0;
        b.iter(|| {
            let lock = manager.lock(ids[next % ids.len()]).unwrap();
            black_box(lock.len());
            next += 7;
        });
    });
}

criterion_group!(benches, bench_dump_restore, bench_lock_cycle, bench_barrier_churn);
criterion_main!(benches);
