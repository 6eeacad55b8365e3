//! # Gameplay Bus Throughput Benchmarks
//!
//! | Scenario | Target |
//! |----------|--------|
//! | publish, single event | < 1µs |
//! | publish + process_sync, 1k events, 4 subscribers | < 1ms |
//! | publish_batch, 256 events | < 50µs |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gameplay_bus::{BusConfig, Event, EventBus, EventDraft, Payload, Priority};
use rand::Rng;
use std::time::Duration;

const BENCH_EVENT: u32 = 0x9100;

fn bus(queue: usize, subscribers: u32) -> EventBus {
    let config = BusConfig::new("Bench")
        .with_max_queue_size(queue)
        .with_replay(false, 0)
        .with_frame_budget_us(0);
    let bus = EventBus::with_config(config).expect("bench bus");
    for system in 0..subscribers {
        bus.subscribe(BENCH_EVENT, system, |e: &Event| black_box(e.sequence_number) > 0)
            .expect("bench subscription");
    }
    bus
}

fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let bus = bus(1 << 20, 0);
    let payload = Payload::raw(&[7; 32]).expect("payload");

    group.bench_function("single", |b| {
        b.iter(|| {
            if bus.total_queue_depth() > 1 << 19 {
                bus.process_sync(u32::MAX, 0);
            }
            black_box(bus.publish(BENCH_EVENT, payload, Priority::Normal, 1, "bench"))
        })
    });

    for size in [16usize, 256] {
        let drafts: Vec<EventDraft> = (0..size)
            .map(|_| EventDraft::new(BENCH_EVENT, payload).with_source(1, "bench"))
            .collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), &drafts, |b, drafts| {
            b.iter(|| {
                if bus.total_queue_depth() > 1 << 19 {
                    bus.process_sync(u32::MAX, 0);
                }
                black_box(bus.publish_batch(drafts))
            })
        });
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(10));

    let mut rng = rand::thread_rng();
    let priorities: Vec<Priority> = (0..1_000)
        .map(|_| Priority::ALL[rng.gen_range(0..Priority::ALL.len())])
        .collect();

    for subscribers in [1u32, 4, 16] {
        let bus = bus(4096, subscribers);
        group.throughput(Throughput::Elements(priorities.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("publish_then_process_1k", subscribers),
            &priorities,
            |b, priorities| {
                b.iter(|| {
                    for &priority in priorities {
                        let _ = bus.publish(BENCH_EVENT, Payload::default(), priority, 1, "bench");
                    }
                    black_box(bus.process_sync(u32::MAX, 0))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_publish, bench_dispatch);
criterion_main!(benches);
