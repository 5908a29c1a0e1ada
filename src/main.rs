//! Delivery Clusterer - Command Line Interface
//!
//! Geocodes a list of delivery addresses and splits them between drivers.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use delivery_clusterer::address::{load_addresses, sample_addresses};
use delivery_clusterer::clustering::KMeansConfig;
use delivery_clusterer::geocoder::{
    GeocodeBackend, Geocoder, GeocoderConfig, NominatimBackend, PointTable, DEFAULT_ENDPOINT,
};
use delivery_clusterer::pipeline::{export_points, export_routes, DeliveryClusterer};
use delivery_clusterer::visualization::Visualizer;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "delivery-clusterer")]
#[command(version = "1.0")]
#[command(about = "Split delivery addresses between drivers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Geocode addresses, cluster them and export per-driver waypoints
    Cluster(ClusterArgs),

    /// Geocode addresses and save the coordinates as CSV
    Geocode {
        /// File with one address per line (built-in sample list if omitted)
        #[arg(short, long)]
        addresses: Option<PathBuf>,

        /// Output CSV file
        #[arg(short, long, default_value = "geocoded.csv")]
        output: PathBuf,

        #[command(flatten)]
        geocoder: GeocoderArgs,
    },
}

#[derive(Args)]
struct ClusterArgs {
    /// File with one address per line (built-in sample list if omitted)
    #[arg(short, long)]
    addresses: Option<PathBuf>,

    /// Number of drivers (asked interactively if omitted)
    #[arg(short, long)]
    drivers: Option<usize>,

    /// Output JSON file
    #[arg(short, long, default_value = "driver_routes.json")]
    output: PathBuf,

    /// Random seed
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of k-means restarts
    #[arg(long, default_value = "10")]
    restarts: usize,

    /// Use coordinates from a CSV written by `geocode` instead of the network
    #[arg(long)]
    points: Option<PathBuf>,

    /// Render the clusters as SVG
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Print a per-driver summary
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    geocoder: GeocoderArgs,
}

#[derive(Args)]
struct GeocoderArgs {
    /// Nominatim-compatible service URL
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// User agent sent to the service
    #[arg(long, default_value = "delivery_clusterer")]
    user_agent: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: f64,

    /// Attempts per address when the service times out
    #[arg(long, default_value = "3")]
    attempts: u32,

    /// Pause before every request in seconds
    #[arg(long, default_value = "1")]
    pause: f64,
}

impl GeocoderArgs {
    fn to_config(&self) -> anyhow::Result<GeocoderConfig> {
        Ok(GeocoderConfig {
            endpoint: self.endpoint.clone(),
            user_agent: self.user_agent.clone(),
            timeout: seconds("--timeout", self.timeout)?,
            max_attempts: self.attempts,
            rate_limit_pause: seconds("--pause", self.pause)?,
            show_progress: true,
            ..Default::default()
        })
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Cluster(args) => cluster(&args),
        Commands::Geocode { addresses, output, geocoder } => geocode(addresses.as_deref(), &output, &geocoder),
    };

    if let Err(e) = result {
        println!("Error: {:#}", e);
    }
}

fn cluster(args: &ClusterArgs) -> anyhow::Result<()> {
    let addresses = read_addresses(args.addresses.as_deref())?;

    let num_drivers = match args.drivers {
        Some(n) => n,
        None => prompt_driver_count(addresses.len())?,
    };

    match &args.points {
        Some(path) => {
            let table = PointTable::from_csv(path)
                .with_context(|| format!("cannot load points from {}", path.display()))?;
            log::info!("Loaded {} geocoded points from {:?}", table.len(), path);
            let config = GeocoderConfig { show_progress: true, ..GeocoderConfig::offline() };
            run_clusterer(Geocoder::new(table, config), &addresses, num_drivers, args)
        }
        None => {
            let config = args.geocoder.to_config()?;
            let backend = NominatimBackend::new(&config)?;
            run_clusterer(Geocoder::new(backend, config), &addresses, num_drivers, args)
        }
    }
}

fn run_clusterer<B: GeocodeBackend>(
    geocoder: Geocoder<B>,
    addresses: &[String],
    num_drivers: usize,
    args: &ClusterArgs,
) -> anyhow::Result<()> {
    let kmeans = KMeansConfig {
        seed: args.seed,
        n_init: args.restarts,
        ..Default::default()
    };
    let clusterer = DeliveryClusterer::new(geocoder, kmeans);

    let plan = export_routes(&clusterer, addresses, num_drivers, &args.output)?;
    println!("Routes exported to {}", args.output.display());

    if args.verbose {
        println!("\n========== Drivers ==========");
        for summary in plan.summary() {
            println!("{}", summary);
        }
        println!("Inertia: {:.6e}", plan.fit.inertia);
    }

    if let Some(svg_path) = &args.svg {
        let viz = Visualizer::new();
        let svg = viz.generate_svg(&plan);
        viz.save_svg(&svg, svg_path)
            .with_context(|| format!("cannot write {}", svg_path.display()))?;
        println!("Visualization saved to {}", svg_path.display());
    }

    Ok(())
}

fn geocode(addresses: Option<&Path>, output: &Path, args: &GeocoderArgs) -> anyhow::Result<()> {
    let addresses = read_addresses(addresses)?;

    let config = args.to_config()?;
    let backend = NominatimBackend::new(&config)?;
    let geocoder = Geocoder::new(backend, config);

    let points = export_points(&geocoder, &addresses, output)
        .with_context(|| format!("cannot write {}", output.display()))?;

    println!(
        "Geocoded {}/{} addresses, saved to {}",
        points.len(),
        addresses.len(),
        output.display()
    );
    Ok(())
}

fn read_addresses(path: Option<&Path>) -> anyhow::Result<Vec<String>> {
    match path {
        Some(path) => load_addresses(path).with_context(|| format!("cannot load addresses from {}", path.display())),
        None => Ok(sample_addresses()),
    }
}

fn prompt_driver_count(num_addresses: usize) -> anyhow::Result<usize> {
    print!("Enter number of drivers (2-{}): ", num_addresses);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;

    line.trim()
        .parse()
        .with_context(|| format!("invalid number of drivers {:?}", line.trim()))
}

fn seconds(flag: &str, value: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("invalid {} value {}", flag, value))
}
