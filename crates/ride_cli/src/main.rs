use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ride_core::config::SessionConfig;
use ride_core::fleet::FleetGenerator;
use ride_core::geo::Coordinate;
use ride_core::location::{LocationFix, LocationUpdate};
use ride_core::places::nominatim::NominatimPlaceSearch;
use ride_core::places::{Place, PlaceSearchProvider};
use ride_core::route::{RouteComputer, Waypoint};
use ride_core::routing::{build_route_provider, RouteProviderKind};
use ride_core::session::{spawn_session, Collaborators, SessionEvent};
use ride_core::snapping::RoadSnapper;
use ride_core::store::JsonFileStore;
use tokio::sync::broadcast::error::RecvError;

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "ride",
    about = "Nearby-vehicle simulation and route planning",
    long_about = "Generate a road-snapped fleet around a point, plan multi-stop routes,\n\
                  search for places, or run a live session that prints its events."
)]
struct Cli {
    /// Session configuration file (JSON); missing fields use defaults
    #[arg(long, global = true, env = "RIDE_CONFIG")]
    config: Option<PathBuf>,
    /// OSRM endpoint used for routing and road snapping
    #[arg(long, global = true, env = "RIDE_OSRM")]
    osrm: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Place vehicles on roads around a point and print them as JSON
    Fleet {
        /// Centre as `lat,lng`
        #[arg(long, value_parser = parse_coordinate)]
        at: Coordinate,
        /// Number of vehicles wanted
        #[arg(long, default_value_t = 9)]
        count: usize,
        /// Seed for reproducible placement
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Route from one point to another through optional stops
    Route {
        /// Start as `lat,lng`
        #[arg(long, value_parser = parse_coordinate)]
        from: Coordinate,
        /// Intermediate stop as `lat,lng`; repeatable
        #[arg(long = "via", value_parser = parse_coordinate)]
        stops: Vec<Coordinate>,
        /// Destination as `lat,lng`
        #[arg(long, value_parser = parse_coordinate)]
        to: Coordinate,
    },
    /// Search for places by free text and print the matches as JSON
    Search {
        query: String,
        /// Nominatim endpoint
        #[arg(long, env = "RIDE_NOMINATIM", default_value = "https://nominatim.openstreetmap.org")]
        nominatim: String,
    },
    /// Run a session at a fixed user location and print its events
    Simulate {
        /// User location as `lat,lng`
        #[arg(long, value_parser = parse_coordinate)]
        at: Coordinate,
        /// How long to run
        #[arg(long, default_value_t = 30)]
        seconds: u64,
        /// File that keeps recents and favorites between runs
        #[arg(long)]
        store: Option<PathBuf>,
        /// Destination as `lat,lng`, routed from the user location
        #[arg(long, value_parser = parse_coordinate)]
        destination: Option<Coordinate>,
    },
}

fn parse_coordinate(value: &str) -> Result<Coordinate, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lng`, got `{value}`"))?;
    let lat: f64 = lat.trim().parse().map_err(|err| format!("bad latitude: {err}"))?;
    let lng: f64 = lng.trim().parse().map_err(|err| format!("bad longitude: {err}"))?;
    Coordinate::validated(lat, lng).map_err(|err| err.to_string())
}

fn load_config(cli: &Cli) -> Result<SessionConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(endpoint) = &cli.osrm {
        config.route_provider = RouteProviderKind::Osrm {
            endpoint: endpoint.clone(),
        };
    }
    Ok(config)
}

// ── Commands ───────────────────────────────────────────────────────

async fn fleet(
    config: SessionConfig,
    at: Coordinate,
    count: usize,
    seed: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let provider = build_route_provider(&config.route_provider)?;
    let mut fleet_config = config.fleet;
    if seed.is_some() {
        fleet_config.seed = seed;
    }
    let generator = FleetGenerator::new(Arc::new(RoadSnapper::new(provider)), fleet_config);
    let vehicles = generator.generate(at, count).await;
    println!("{}", serde_json::to_string_pretty(&vehicles)?);
    Ok(())
}

async fn route(
    config: SessionConfig,
    from: Coordinate,
    stops: Vec<Coordinate>,
    to: Coordinate,
) -> Result<(), Box<dyn Error>> {
    let provider = build_route_provider(&config.route_provider)?;
    let computer = RouteComputer::new(provider, config.route);
    let stops: Vec<_> = stops
        .into_iter()
        .enumerate()
        .map(|(i, coordinate)| Waypoint::new(coordinate, format!("Stop {}", i + 1)))
        .collect();
    let route = computer
        .compute_route(from, &stops, &Waypoint::new(to, "Destination"))
        .await;

    if route.is_empty() {
        println!("no route found");
        return Ok(());
    }
    for (i, segment) in route.segments.iter().enumerate() {
        println!(
            "leg {}: {:.5},{:.5} -> {:.5},{:.5}  {:.0} m  {:.0} s  ({} points)",
            i + 1,
            segment.source.lat,
            segment.source.lng,
            segment.destination.lat,
            segment.destination.lng,
            segment.distance_m,
            segment.duration_secs,
            segment.path.len()
        );
    }
    println!(
        "total: {:.0} m, {:.0} s",
        route.total_distance_m(),
        route.total_duration_secs()
    );
    Ok(())
}

async fn search(
    config: SessionConfig,
    query: String,
    endpoint: String,
) -> Result<(), Box<dyn Error>> {
    let provider = NominatimPlaceSearch::new(&endpoint)?;
    let region = config.search.bias_region;
    let candidates = tokio::task::spawn_blocking(move || provider.search(&query, &region)).await??;
    let places: Vec<Place> = candidates
        .into_iter()
        .take(config.search.max_results)
        .map(Place::from_candidate)
        .collect();
    println!("{}", serde_json::to_string_pretty(&places)?);
    Ok(())
}

async fn simulate(
    config: SessionConfig,
    at: Coordinate,
    seconds: u64,
    store: Option<PathBuf>,
    destination: Option<Coordinate>,
) -> Result<(), Box<dyn Error>> {
    let mut collaborators = Collaborators::from_config(&config)?;
    if let Some(path) = store {
        collaborators.store = Arc::new(JsonFileStore::new(path));
    }
    let (handle, task) = spawn_session(config, collaborators);
    let mut events = handle.subscribe();

    handle.location_update(LocationUpdate::Fix(LocationFix::at(at)))?;
    if let Some(destination) = destination {
        handle.set_destination(None, Vec::new(), Waypoint::new(destination, "Destination"))?;
    }

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => log::warn!("skipped {skipped} events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown()?;
    task.await?;
    Ok(())
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::FleetChanged(fleet) => println!("fleet: {} vehicles", fleet.len()),
        SessionEvent::VehicleMoved(transition) => println!(
            "vehicle {} -> {:.5},{:.5} heading {:.0}° over {:.0} s",
            transition.vehicle_id.0,
            transition.to.lat,
            transition.to.lng,
            transition.bearing,
            transition.duration.as_secs_f64()
        ),
        SessionEvent::RouteChanged(route) => println!(
            "route: {} legs, {:.0} m",
            route.segments.len(),
            route.total_distance_m()
        ),
        other => println!("{other:?}"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Fleet { at, count, seed } => fleet(config, at, count, seed).await,
        Commands::Route { from, stops, to } => route(config, from, stops, to).await,
        Commands::Search { query, nominatim } => search(config, query, nominatim).await,
        Commands::Simulate {
            at,
            seconds,
            store,
            destination,
        } => simulate(config, at, seconds, store, destination).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
