use core_raster::Row;
use core_stencil::{apply_row, Kernel};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_apply_row(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_row");
    for width in [64usize, 512, 4096] {
        let prev = Row::from_vec((0..width).map(|x| (x % 7) as f32).collect());
        let curr = Row::from_vec((0..width).map(|x| (x % 13) as f32).collect());
        let next = Row::from_vec((0..width).map(|x| (x % 5) as f32).collect());
        let kernel = Kernel::default();

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut out = Row::zeroed(width);
            b.iter(|| apply_row(&prev, &curr, &next, &kernel, &mut out));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply_row);
criterion_main!(benches);
