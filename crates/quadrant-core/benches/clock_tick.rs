use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use quadrant_core::motion::KinematicMotion;
use quadrant_core::prelude::*;
use quadrant_logic::graph::EdgeDescriptor;
use quadrant_logic::level::{LevelData, WaypointSpec};
use std::time::Duration;

/// Ring of `n` waypoints 40 units apart.
fn ring_level(n: u32) -> LevelData {
    LevelData {
        waypoints: (0..n)
            .map(|key| WaypointSpec {
                key,
                position: Vec3::new(key as f32 * 40.0, 0.0, 0.0),
                camera_lane: None,
            })
            .collect(),
        edges: (0..n).map(|k| EdgeDescriptor::new(k, (k + 1) % n)).collect(),
    }
}

fn populated(agents: u32) -> Simulation {
    let config = SimConfig {
        trigger_chance: 25.0,
        event_interval_rate: 1.0,
        seed: 0xBEEF,
        ..Default::default()
    };
    let mut sim = Simulation::new(&ring_level(16), config).unwrap();
    for i in 0..agents {
        let start = Vec3::new((i % 16) as f32 * 40.0, 0.0, 0.0);
        sim.spawn_agent(AgentSpawn::new(format!("C{i}"), KinematicMotion::new(start, 3.5)).in_quadrant(i % 16));
    }
    sim
}

fn bench_clock_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock_tick");
    group.sample_size(30);
    group.measurement_time(Duration::from_secs(8));

    // Env override for quick local runs, e.g. QC_BENCH_AGENTS=500,5000
    let agents_list: Vec<u32> = std::env::var("QC_BENCH_AGENTS")
        .ok()
        .map(|s| s.split(',').filter_map(|t| t.trim().parse().ok()).collect::<Vec<_>>())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![1000, 5000]);

    for &agents in &agents_list {
        group.bench_function(format!("agents{agents}_ticks10"), |b| {
            b.iter_batched(
                || populated(agents),
                |mut sim| {
                    // one clock tick per simulated second
                    for _ in 0..10 {
                        sim.update(1.0);
                    }
                    sim
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_clock_ticks);
criterion_main!(benches);
