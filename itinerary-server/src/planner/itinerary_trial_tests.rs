//! Scenario tests for tunnel chain composition.

use super::*;
use crate::domain::RegionId;
use crate::modes::{ModeType, ModeTypeGroup};
use crate::terrain::{
    GridWorld, OwnerConfig, RegionSpec, TerrainCacheConfig, TerrainOwner, TerrainSample,
};
use std::sync::Arc;

const R1: RegionId = RegionId(1);
const R2: RegionId = RegionId(2);
const R3: RegionId = RegionId(3);

fn at(region: RegionId, x: i32, z: i32) -> Cell {
    Cell::new(x, 0, z, region)
}

fn tunnel(from: Cell, to: Cell, cost: f64) -> Tunnel {
    Tunnel::new(from, to, cost).unwrap()
}

fn flat_world(regions: &[RegionId]) -> GridWorld {
    regions.iter().fold(GridWorld::new(), |world, region| {
        world.with_region(*region, RegionSpec::flat(0))
    })
}

fn serve(world: GridWorld) -> (Arc<TerrainCache>, TerrainOwner) {
    let cache = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
    let config = OwnerConfig {
        tick: Duration::from_millis(1),
        sweep_interval: Duration::from_secs(1),
    };
    let owner = TerrainOwner::spawn(world, cache.clone(), config).unwrap();
    (cache, owner)
}

/// Walking only, with a small expansion budget so unreachable legs fail
/// quickly in unbounded worlds.
fn walking() -> SearchFlags {
    SearchFlags {
        max_expansions: 3_000,
        ..SearchFlags::with_modes(ModeTypeGroup::of(&[ModeType::Walk]))
    }
}

async fn run(
    terrain: &TerrainCache,
    flags: &SearchFlags,
    tunnels: Vec<Tunnel>,
    origin: Cell,
    destination: Destination,
) -> ItineraryReport {
    let cancel = CancelFlag::new();
    ItineraryTrial::new(terrain, flags, &cancel, tunnels)
        .run(origin, destination)
        .await
}

fn found(report: ItineraryReport) -> Itinerary {
    match report.outcome {
        ItineraryOutcome::Found(itinerary) => itinerary,
        other => panic!("expected an itinerary, got {other:?}"),
    }
}

/// Walls a cell in with bedrock on all four sides.
fn enclose(world: &mut GridWorld, cell: Cell) {
    for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1), (1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let c = cell.offset(dx, 0, dz);
        world.fill_box(c.region, [c.x, 0, c.z], [c.x, 1, c.z], TerrainSample::Bedrock);
    }
}

#[tokio::test]
async fn same_region_is_direct() {
    let (terrain, _owner) = serve(flat_world(&[R1]));

    let itinerary = found(
        run(
            &terrain,
            &walking(),
            Vec::new(),
            at(R1, 0, 0),
            Destination::from(at(R1, 4, 0)),
        )
        .await,
    );

    assert!(itinerary.is_direct());
    assert_eq!(itinerary.total_length(), 4.0);
}

#[tokio::test]
async fn single_tunnel_between_regions() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2]));
    let tunnels = vec![tunnel(at(R1, 5, 0), at(R2, 0, 0), 1.0)];

    let report = run(
        &terrain,
        &walking(),
        tunnels,
        at(R1, 0, 0),
        Destination::from(at(R2, 3, 0)),
    )
    .await;
    assert_eq!(report.path_trials, 2);
    let itinerary = found(report);

    let segments = itinerary.segments();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].length(), 5.0);
    assert_eq!(segments[1].as_tunnel().unwrap().cost(), 1.0);
    assert_eq!(segments[2].length(), 3.0);
    assert_eq!(itinerary.total_length(), 9.0);
    assert_eq!(itinerary.origin(), at(R1, 0, 0));
    assert_eq!(itinerary.destination(), at(R2, 3, 0));
}

#[tokio::test]
async fn picks_the_cheaper_tunnel() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2]));
    let tunnels = vec![
        tunnel(at(R1, 5, 0), at(R2, 0, 0), 10.0),
        tunnel(at(R1, 0, 3), at(R2, 0, 0), 1.0),
    ];

    let itinerary = found(
        run(
            &terrain,
            &walking(),
            tunnels,
            at(R1, 0, 0),
            Destination::from(at(R2, 3, 0)),
        )
        .await,
    );

    assert_eq!(itinerary.total_length(), 7.0);
    assert_eq!(itinerary.tunnels().next().unwrap().origin(), at(R1, 0, 3));
}

#[tokio::test]
async fn blocked_tunnel_entrance_falls_back() {
    let mut world = flat_world(&[R1, R2]);
    enclose(&mut world, at(R1, 5, 0));
    let (terrain, _owner) = serve(world);
    let tunnels = vec![
        tunnel(at(R1, 5, 0), at(R2, 0, 0), 1.0),
        tunnel(at(R1, -6, 0), at(R2, 0, 0), 2.0),
    ];

    let itinerary = found(
        run(
            &terrain,
            &walking(),
            tunnels,
            at(R1, 0, 0),
            Destination::from(at(R2, 3, 0)),
        )
        .await,
    );

    assert_eq!(itinerary.tunnels().next().unwrap().origin(), at(R1, -6, 0));
    assert_eq!(itinerary.total_length(), 6.0 + 2.0 + 3.0);
}

#[tokio::test]
async fn chains_through_intermediate_region() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2, R3]));
    let tunnels = vec![
        tunnel(at(R2, 2, 0), at(R3, 0, 0), 1.0),
        tunnel(at(R1, 1, 0), at(R2, 0, 0), 1.0),
    ];

    let itinerary = found(
        run(
            &terrain,
            &walking(),
            tunnels.clone(),
            at(R1, 0, 0),
            Destination::from(at(R3, 2, 0)),
        )
        .await,
    );

    assert_eq!(itinerary.tunnel_count(), 2);
    assert_eq!(itinerary.segments().len(), 5);
    assert_eq!(itinerary.total_length(), 1.0 + 1.0 + 2.0 + 1.0 + 2.0);

    // A one-tunnel limit cuts the only chain
    let limited = SearchFlags {
        max_tunnels: 1,
        ..walking()
    };
    let report = run(
        &terrain,
        &limited,
        tunnels,
        at(R1, 0, 0),
        Destination::from(at(R3, 2, 0)),
    )
    .await;
    assert_eq!(report.outcome, ItineraryOutcome::NotFound);
}

#[tokio::test]
async fn unconnected_region_is_not_found() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2, R3]));
    let tunnels = vec![tunnel(at(R1, 1, 0), at(R2, 0, 0), 1.0)];

    let report = run(
        &terrain,
        &walking(),
        tunnels,
        at(R1, 0, 0),
        Destination::from(at(R3, 0, 0)),
    )
    .await;

    assert_eq!(report.outcome, ItineraryOutcome::NotFound);
    assert_eq!(report.path_trials, 0);
}

#[tokio::test]
async fn same_region_detours_through_tunnels() {
    // Two halves of a room split by a wall, joined through another region
    let spec = RegionSpec {
        min_y: -2,
        max_y: 5,
        ground_level: None,
        fill: TerrainSample::Bedrock,
    };
    let mut world = flat_world(&[R2]).with_region(R1, spec);
    world.fill_box(R1, [0, 0, 0], [8, 2, 8], TerrainSample::Air);
    world.fill_box(R1, [4, 0, 0], [4, 2, 8], TerrainSample::Bedrock);
    let (terrain, _owner) = serve(world);

    let tunnels = vec![
        tunnel(at(R1, 1, 1), at(R2, 0, 0), 1.0),
        tunnel(at(R2, 2, 0), at(R1, 7, 7), 1.0),
    ];

    let itinerary = found(
        run(
            &terrain,
            &walking(),
            tunnels,
            at(R1, 1, 1),
            Destination::from(at(R1, 7, 5)),
        )
        .await,
    );

    assert_eq!(itinerary.tunnel_count(), 2);
    assert_eq!(itinerary.segments()[0].length(), 0.0);
    assert_eq!(itinerary.total_length(), 0.0 + 1.0 + 2.0 + 1.0 + 2.0);
}

#[tokio::test]
async fn cancellation_aborts_every_leg() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2]));
    let flags = walking();
    let cancel = CancelFlag::new();
    cancel.cancel();

    let report = ItineraryTrial::new(
        &terrain,
        &flags,
        &cancel,
        vec![tunnel(at(R1, 5, 0), at(R2, 0, 0), 1.0)],
    )
    .run(at(R1, 0, 0), Destination::from(at(R2, 3, 0)))
    .await;

    assert_eq!(report.outcome, ItineraryOutcome::Canceled);
}

#[tokio::test]
async fn passed_deadline_stops_chain_search() {
    let (terrain, _owner) = serve(flat_world(&[R1, R2]));
    let flags = walking();
    let cancel = CancelFlag::new();

    let report = ItineraryTrial::new(
        &terrain,
        &flags,
        &cancel,
        vec![tunnel(at(R1, 5, 0), at(R2, 0, 0), 1.0)],
    )
    .with_deadline(tokio::time::Instant::now())
    .run(at(R1, 0, 0), Destination::from(at(R2, 3, 0)))
    .await;

    assert_eq!(report.outcome, ItineraryOutcome::Canceled);
    assert_eq!(report.path_trials, 0);
    assert!(!cancel.is_canceled());
}

#[tokio::test]
async fn terrain_failure_is_an_error() {
    let terrain = TerrainCache::new(TerrainCacheConfig::default());
    terrain.close();

    let report = run(
        &terrain,
        &walking(),
        Vec::new(),
        at(R1, 0, 0),
        Destination::from(at(R1, 3, 0)),
    )
    .await;

    assert_eq!(
        report.outcome,
        ItineraryOutcome::Error(TerrainError::Unavailable)
    );
}

#[tokio::test]
async fn repeated_search_hits_result_cache() {
    use crate::results::{MemoryStore, ResultCacheConfig};

    let (terrain, _owner) = serve(flat_world(&[R1, R2]));
    let results = ResultCache::new(&ResultCacheConfig::default(), Arc::new(MemoryStore::new()));
    let flags = walking();
    let cancel = CancelFlag::new();
    let tunnels = vec![tunnel(at(R1, 5, 0), at(R2, 0, 0), 1.0)];
    let trial = ItineraryTrial::new(&terrain, &flags, &cancel, tunnels).with_results(Some(&results));

    let first = trial.run(at(R1, 0, 0), Destination::from(at(R2, 3, 0))).await;
    let second = trial.run(at(R1, 0, 0), Destination::from(at(R2, 3, 0))).await;

    assert_eq!(first.cache_hits, 0);
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.expansions, 0);
    assert_eq!(first.outcome, second.outcome);
}
