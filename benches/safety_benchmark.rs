/*!
 * Safety Scan Benchmarks
 *
 * Scan cost over a full 10x10 system: all-safe, chained and fully
 * deadlocked shapes
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use deadlock_sim::coordinator::AllocationSnapshot;
use deadlock_sim::detector::scan;
use deadlock_sim::resource::ResourceSummary;
use deadlock_sim::{ProcessId, ResourceId};

const N: usize = 10;

/// Process i holds R_i and waits for R_next(i)
fn system(next: impl Fn(usize) -> Option<usize>) -> AllocationSnapshot {
    let mut allocation = vec![vec![0u32; N]; N];
    let mut request = vec![vec![0u32; N]; N];
    for i in 0..N {
        allocation[i][i] = 1;
        if let Some(j) = next(i) {
            request[i][j] = 1;
        }
    }
    AllocationSnapshot {
        processes: (0..N as u32).map(ProcessId).collect(),
        resources: (0..N as u32)
            .map(|j| ResourceSummary {
                id: ResourceId(j),
                name: format!("R{}", j),
                available: 0,
                total: 1,
            })
            .collect(),
        allocation,
        request,
        available: vec![0; N],
    }
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("safety_scan");

    let shapes = [
        ("no_requests", system(|_| None)),
        // each process waits on the previous one: worst case, one finish per pass
        ("reverse_chain", system(|i| (i + 1 < N).then_some(i + 1))),
        ("full_cycle", system(|i| Some((i + 1) % N))),
    ];

    for (name, snapshot) in shapes.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), snapshot, |b, s| {
            b.iter(|| scan(black_box(s)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
