//! flyzone - check a planned flight shape against restricted airspace zones.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use flyzone_cli::{parse_point, shape_events, ShapeRequest};
use flyzone_core::{style, BuilderOutput, Point, ZoneCategory, ZoneIndex};
use flyzone_planner::{ElevationCache, OpenMeteoProvider, PlannerConfig, PlanningSession};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GeoJSON feature collection with the zones (overrides FLYZONE_ZONES_PATH)
    #[arg(long)]
    zones: Option<PathBuf>,

    /// Elevation service URL (overrides FLYZONE_ELEVATION_URL)
    #[arg(long)]
    elevation_url: Option<String>,

    /// Hide a zone category (repeatable)
    #[arg(long = "hide")]
    hide: Vec<ZoneCategory>,

    /// Skip hidden categories in the intersection check
    #[arg(long)]
    exclude_hidden: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Disc from a center point and a point on its edge
    Disc {
        #[arg(long, value_parser = parse_point)]
        center: Point,
        #[arg(long, value_parser = parse_point)]
        edge: Point,
    },
    /// Route through two or more points
    Route {
        #[arg(long = "point", value_parser = parse_point, required = true)]
        points: Vec<Point>,
    },
    /// Polygon with three or more points
    Polygon {
        #[arg(long = "point", value_parser = parse_point, required = true)]
        points: Vec<Point>,
    },
    /// List zone counts and styles per category
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("flyzone_core=info".parse()?)
                .add_directive("flyzone_planner=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let mut config = PlannerConfig::from_env();
    if let Some(zones) = args.zones {
        config.zones_path = zones;
    }
    if let Some(url) = args.elevation_url {
        config.elevation_url = url;
    }
    if args.exclude_hidden {
        config.include_hidden_in_intersection_check = false;
    }

    let mut zones = ZoneIndex::load_or_empty(&config.zones_path);
    for category in &args.hide {
        zones.set_visible(*category, false);
    }

    let request = match args.command {
        Command::Categories => {
            print_categories(&zones)?;
            return Ok(());
        }
        Command::Disc { center, edge } => ShapeRequest::Disc { center, edge },
        Command::Route { points } => ShapeRequest::Route { points },
        Command::Polygon { points } => ShapeRequest::Polygon { points },
    };

    let elevation = ElevationCache::new(OpenMeteoProvider::from_config(&config));
    let mut session = PlanningSession::new(zones, elevation, config.engine_options());
    let mut builder = session.new_builder();

    let mut finalized = false;
    for event in shape_events(&request) {
        if let BuilderOutput::Finalized(_) = session.apply(&mut builder, event)? {
            finalized = true;
        }
    }
    if !finalized {
        bail!("shape was not finalized");
    }

    let report = session.complete(&mut builder).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_categories(zones: &ZoneIndex) -> Result<()> {
    let rows: Vec<serde_json::Value> = zones
        .categories()
        .into_iter()
        .map(|(category, count)| {
            serde_json::json!({
                "category": category,
                "zones": count,
                "visible": zones.is_visible(category),
                "style": style(category),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
