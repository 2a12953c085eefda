use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use itinerary_server::domain::{Cell, RegionId, StaticTunnels, Tunnel};
use itinerary_server::results::{
    JsonFileStore, MemoryStore, ResultCache, ResultCacheConfig, ResultStore,
};
use itinerary_server::session::{CoordinatorConfig, SearchContext, SearchCoordinator};
use itinerary_server::terrain::{
    GridWorld, OwnerConfig, RegionSpec, TerrainCache, TerrainCacheConfig, TerrainOwner,
    TerrainSample,
};
use itinerary_server::web::{AppState, create_router};

/// How often to log search and terrain counters.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = std::env::var("ITINERARY_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    let world = match std::env::var("ITINERARY_WORLD") {
        Ok(path) => {
            let world = GridWorld::load(&path)?;
            info!(
                %path,
                regions = world.region_count(),
                tunnels = world.tunnels().len(),
                "loaded world"
            );
            world
        }
        Err(_) => {
            warn!("ITINERARY_WORLD not set, serving the demo world");
            demo_world()?
        }
    };
    let tunnels = world.tunnels().to_vec();

    let store: Arc<dyn ResultStore> = match std::env::var("ITINERARY_CACHE_FILE") {
        Ok(path) => {
            info!(%path, "persisting search results");
            Arc::new(JsonFileStore::new(path))
        }
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let mut coordinator_config = CoordinatorConfig::default();
    if let Ok(max) = std::env::var("ITINERARY_MAX_SEARCHES") {
        coordinator_config.max_concurrent_searches = max.parse()?;
    }

    // Terrain owner thread
    let terrain = Arc::new(TerrainCache::new(TerrainCacheConfig::default()));
    let owner = TerrainOwner::spawn(world, terrain.clone(), OwnerConfig::default())?;

    let results = ResultCache::new(&ResultCacheConfig::default(), store);
    let context = SearchContext::new(terrain, Arc::new(StaticTunnels::new(tunnels)))
        .with_results(Arc::new(results));
    let coordinator = Arc::new(SearchCoordinator::new(context, &coordinator_config));

    // Spawn background task to log counters
    let stats_coordinator = coordinator.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATS_INTERVAL);
        interval.tick().await; // First tick is immediate, skip it
        loop {
            interval.tick().await;
            let terrain = stats_coordinator.context().terrain.stats();
            info!(
                active = stats_coordinator.active_count(),
                running = stats_coordinator.running_count(),
                cached_chunks = terrain.cached_chunks,
                hits = terrain.hits,
                fetches = terrain.fetches,
                "search stats"
            );
        }
    });

    let app = create_router(AppState::new(coordinator.clone()));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "itinerary server listening");
    info!("  GET    /health          - Health check");
    info!("  GET    /stats           - Search and terrain counters");
    info!("  POST   /search          - Start a search");
    info!("  GET    /search/:caller  - Search status and outcome");
    info!("  DELETE /search/:caller  - Cancel a search");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for ctrl-c: {e}");
            }
        })
        .await?;

    coordinator.shutdown();
    owner.shutdown();
    info!("stopped");
    Ok(())
}

/// Two flat regions joined by a pair of tunnels, with a wall across the
/// first so some searches need a detour.
fn demo_world() -> Result<GridWorld, Box<dyn std::error::Error>> {
    let surface = RegionId(1);
    let caves = RegionId(2);

    let mut world = GridWorld::new()
        .with_region(surface, RegionSpec::flat(0))
        .with_region(caves, RegionSpec::flat(0))
        .with_tunnel(Tunnel::new(
            Cell::new(0, 0, 0, surface),
            Cell::new(0, 0, 0, caves),
            4.0,
        )?)
        .with_tunnel(Tunnel::new(
            Cell::new(5, 0, 5, caves),
            Cell::new(15, 0, 0, surface),
            4.0,
        )?);
    world.fill_box(surface, [10, 0, -20], [10, 2, 20], TerrainSample::Bedrock);
    world.fill_box(surface, [20, -1, -5], [30, -1, 5], TerrainSample::Water);
    Ok(world)
}
