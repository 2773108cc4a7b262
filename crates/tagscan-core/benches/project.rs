use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Point2;
use tagscan_core::{project, Detections, OutputRequest, TagDetection};

fn grid_detections(n: usize) -> Detections {
    (0..n)
        .map(|i| {
            let x = (i % 32) as f64 * 40.0;
            let y = (i / 32) as f64 * 40.0;
            TagDetection {
                id: i as u32,
                hamming: 0,
                decision_margin: 60.0,
                center: Point2::new(x + 15.0, y + 15.0),
                corners: [
                    Point2::new(x, y),
                    Point2::new(x, y + 30.0),
                    Point2::new(x + 30.0, y + 30.0),
                    Point2::new(x + 30.0, y),
                ],
            }
        })
        .collect()
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");
    for n in [0usize, 16, 512] {
        let detections = grid_detections(n);
        for k in [1usize, 6] {
            let request = OutputRequest::new(k).expect("request");
            group.bench_with_input(BenchmarkId::new(format!("k{k}"), n), &detections, |b, d| {
                b.iter(|| project(black_box(d.clone()), request).expect("project"))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_project);
criterion_main!(benches);
