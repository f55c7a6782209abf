//! Benchmarks for grid planning and path following on generated farms.
//!
//! Run with: cargo bench -p homestead-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hecs::World;
use homestead_core::generation::{generate_farm, FarmConfig};
use homestead_core::physics::collect_colliders;
use homestead_logic::collision::{ColliderSet, ObstacleFilter};
use homestead_logic::follower::{AgentBody, FollowerConfig, PathFollower};
use homestead_logic::geometry::Vec2;
use homestead_logic::planner::{GridConfig, GridPlanner, PathPlanner};
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Generate a farm of `width` x `height` tiles and a planner covering it.
fn build_farm(width: u32, height: u32) -> (ColliderSet, GridPlanner) {
    let config = FarmConfig {
        width,
        height,
        rocks: width * height / 25,
        trees: width * height / 40,
        ..Default::default()
    };
    let mut world = World::new();
    let mut rng = StdRng::seed_from_u64(42);
    let layout = generate_farm(&mut world, &config, &mut rng);
    let colliders = collect_colliders(&world, &layout.terrain);

    let bounds = layout.terrain.bounds();
    let mut planner = GridPlanner::new(GridConfig {
        origin: bounds.min,
        cell_size: 0.5,
        width: width * 2,
        height: height * 2,
        ..Default::default()
    });
    planner.set_agent_radius(FollowerConfig::default().inflation_radius());
    planner.rebuild(&colliders, &ObstacleFilter::new(None, Some(0)));
    (colliders, planner)
}

/// Walkable points near opposite corners of the ground layer.
fn corners(planner: &GridPlanner, width: u32, height: u32) -> Option<(Vec2, Vec2)> {
    let start = planner.try_find_nearest_walkable(Vec2::new(1.5, 1.5))?;
    let goal = planner.try_find_nearest_walkable(Vec2::new(width as f32 - 1.5, height as f32 * 0.6))?;
    Some((start, goal))
}

fn bench_find_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_path");

    for (width, height) in [(32, 24), (64, 48), (128, 96)] {
        let (_, planner) = build_farm(width, height);
        let Some((start, goal)) = corners(&planner, width, height) else {
            continue;
        };

        group.bench_with_input(
            BenchmarkId::new("corner_to_corner", format!("{}x{}", width, height)),
            &(start, goal),
            |b, &(start, goal)| {
                b.iter(|| {
                    planner.clear_cache();
                    black_box(planner.try_find_path(black_box(start), black_box(goal)))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("cached", format!("{}x{}", width, height)),
            &(start, goal),
            |b, &(start, goal)| {
                b.iter(|| black_box(planner.try_find_path(black_box(start), black_box(goal))));
            },
        );
    }

    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner_rebuild");

    for (width, height) in [(32, 24), (64, 48)] {
        let (colliders, mut planner) = build_farm(width, height);
        let filter = ObstacleFilter::new(None, Some(0));
        group.bench_function(BenchmarkId::from_parameter(format!("{}x{}", width, height)), |b| {
            b.iter(|| planner.rebuild(black_box(&colliders), &filter));
        });
    }

    group.finish();
}

fn bench_smoothing(c: &mut Criterion) {
    let (colliders, planner) = build_farm(64, 48);
    let Some((start, goal)) = corners(&planner, 64, 48) else {
        return;
    };
    let Some(raw) = planner.try_find_path(start, goal) else {
        return;
    };
    let follower = PathFollower::new(FollowerConfig::default());
    let agent = AgentBody::at(start);

    c.bench_function("smooth_path_64x48", |b| {
        b.iter(|| black_box(follower.smooth_path(start, black_box(&raw), &agent, &colliders)));
    });
}

criterion_group!(benches, bench_find_path, bench_rebuild, bench_smoothing);
criterion_main!(benches);
