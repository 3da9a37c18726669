use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use molt_capi_handles::{Handle, HandleKind, HandleTable};

fn bench_insert_get_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table");
    for size in [1024usize, 8192, 65536] {
        group.bench_with_input(BenchmarkId::new("insert_get_remove", size), &size, |b, &size| {
            let mut table = HandleTable::new();
            let mut handles: Vec<Handle> = Vec::with_capacity(size);
            b.iter(|| {
                for i in 0..size {
                    handles.push(table.insert(HandleKind::Object, i as u64));
                }
                for &handle in &handles {
                    black_box(table.get(handle));
                }
                for handle in handles.drain(..) {
                    black_box(table.remove(handle));
                }
            });
        });
    }
    group.finish();
}

fn bench_get_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_table");
    for size in [1024usize, 8192, 65536] {
        let mut table = HandleTable::new();
        let handles: Vec<Handle> = (0..size)
            .map(|i| table.insert(HandleKind::Dict, i as u64))
            .collect();
        group.bench_with_input(BenchmarkId::new("get", size), &handles, |b, handles| {
            b.iter(|| {
                for &handle in handles {
                    black_box(table.get(handle));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert_get_remove, bench_get_only);
criterion_main!(benches);
