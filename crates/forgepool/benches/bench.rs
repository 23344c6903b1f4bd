use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use forgepool::{Pool, ShutdownMode};
use std::hint::black_box;

const TASKS: usize = 1024;

fn submit_await(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let workers = num_cpus::get().max(1);

    let mut group = c.benchmark_group("pool");
    group.throughput(Throughput::Elements(TASKS as u64));
    group.bench_function(BenchmarkId::new("submit_await", workers), |b| {
        b.iter(|| {
            rt.block_on(async {
                let pool = Pool::new(workers);
                let mut handles = Vec::with_capacity(TASKS);
                for n in 0..TASKS as u64 {
                    handles.push(
                        pool.submit(move || Ok::<_, String>(black_box(n) * 2))
                            .unwrap(),
                    );
                }
                for handle in handles {
                    black_box(handle.await.unwrap());
                }
                pool.shutdown(ShutdownMode::Graceful).await;
            })
        })
    });
    group.finish();
}

criterion_group!(benches, submit_await);
criterion_main!(benches);
