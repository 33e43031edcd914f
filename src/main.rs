use clap::{Parser, Subcommand};
use sitefence::checker::{CheckOutcome, CheckerOptions, GeofenceChecker, LocationCheckResult, Notifier};
use sitefence::config::Settings;
use sitefence::position::{FixedPositionSource, IpPositionSource, PositionSource};
use sitefence::site::{find_site, Coordinate, SelectionStore, SiteDirectory, SiteLocation};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// sitefence: geofenced site check-in
///
/// Verifies that the device is within a project site's check-in radius.
///
/// Examples:
///   sitefence sites --search tower
///   sitefence select P-100
///   sitefence check --lat 12.9716 --lon 77.5946
///   sitefence check --project P-100 --auto
///   sitefence serve --port 8080
#[derive(Parser)]
#[command(name = "sitefence", version, about, long_about = None)]
struct Cli {
    /// Settings file (default: ~/.sitefence/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local JSON site list.
    #[arg(long, global = true)]
    sites_file: Option<PathBuf>,

    /// Remote site directory endpoint.
    #[arg(long, global = true)]
    directory_url: Option<String>,

    /// How long to wait for the device position, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Debug logging.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List directory sites.
    Sites {
        /// Case-insensitive filter on number, name, location, description.
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Remember a site as the current office location.
    Select {
        /// Project number.
        project_no: String,
    },

    /// Check the device position against a site.
    Check {
        /// Project number (default: the selected site).
        #[arg(long, short = 'p')]
        project: Option<String>,

        /// Device latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        /// Device longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Device place name.
        #[arg(long)]
        name: Option<String>,

        /// Device address.
        #[arg(long)]
        address: Option<String>,

        /// Locate the device via IP geolocation.
        #[arg(long, short = 'a', conflicts_with = "lat")]
        auto: bool,

        /// Do not print alerts.
        #[arg(long)]
        no_alerts: bool,
    },

    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Alerts and advisories go to stderr.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn alert(&self, title: &str, message: &str) {
        eprintln!("  \u{26A0}\u{FE0F}  {}: {}", title, message);
    }

    fn advisory(&self, message: &str) {
        eprintln!("  \u{2139}\u{FE0F}  {}", message);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(&cli);
    let code = match cli.command {
        Command::Sites { ref search } => list_sites(&settings, search.as_deref()).await,
        Command::Select { ref project_no } => select(&settings, project_no).await,
        Command::Check {
            ref project,
            lat,
            lon,
            ref name,
            ref address,
            auto,
            no_alerts,
        } => {
            let source: Arc<dyn PositionSource> = match (lat, lon, auto) {
                (_, _, true) => Arc::new(IpPositionSource::new()),
                (Some(lat), Some(lon), false) => {
                    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                        fail("Invalid coordinates. Lat: -90..90, Lon: -180..180");
                    }
                    let mut fixed = FixedPositionSource::new(Coordinate::new(lat, lon));
                    if let Some(n) = name {
                        fixed = fixed.with_name(n.clone());
                    }
                    if let Some(a) = address {
                        fixed = fixed.with_address(a.clone());
                    }
                    Arc::new(fixed)
                }
                _ => fail("No device position. Use --lat/--lon or --auto"),
            };
            let settings = Settings {
                show_alerts: settings.show_alerts && !no_alerts,
                ..settings
            };
            check(&settings, project.as_deref(), source).await
        }
        Command::Serve { ref host, port } => {
            let directory = site_directory(&settings);
            eprintln!("  sitefence server listening on http://{}:{}", host, port);
            eprintln!("  Press Ctrl+C to stop.");
            match sitefence::server::start(host, port, settings, directory).await {
                Ok(()) => 0,
                Err(e) => fail(&format!("Server error on {}:{}: {}", host, port, e)),
            }
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "sitefence=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Settings {
    let loaded = match cli.config {
        Some(ref path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let mut settings = loaded.unwrap_or_else(|e| fail(&e.to_string()));

    if let Some(ref path) = cli.sites_file {
        settings.sites_file = Some(path.clone());
        settings.directory_url = None;
    }
    if let Some(ref url) = cli.directory_url {
        settings.directory_url = Some(url.clone());
    }
    if let Some(ms) = cli.timeout_ms {
        settings.position_timeout_ms = ms;
    }
    settings
}

fn site_directory(settings: &Settings) -> Arc<dyn SiteDirectory> {
    match settings.site_directory() {
        Ok(directory) => Arc::from(directory),
        Err(e) => fail(&e.to_string()),
    }
}

/// Directory fetches block on network or disk; keep them off the runtime.
async fn fetch_sites(directory: &Arc<dyn SiteDirectory>) -> Vec<SiteLocation> {
    let directory = Arc::clone(directory);
    match tokio::task::spawn_blocking(move || directory.fetch_sites()).await {
        Ok(Ok(sites)) => sites,
        Ok(Err(e)) => fail(&e.to_string()),
        Err(e) => fail(&format!("Site directory worker failed: {}", e)),
    }
}

async fn list_sites(settings: &Settings, search: Option<&str>) -> i32 {
    let sites = fetch_sites(&site_directory(settings)).await;
    let hits = sitefence::site::filter_sites(&sites, search.unwrap_or(""));

    for site in &hits {
        let marker = if site.has_valid_coordinates() { "\u{1F4CD}" } else { "\u{2753}" };
        println!(
            "{} {:<10} {:<30} radius {:>6} m  {}",
            marker,
            site.project_no,
            site.project_name.as_deref().unwrap_or("-"),
            site.checkin_radius.meters(),
            site.site_location,
        );
    }
    eprintln!("  {} of {} sites", hits.len(), sites.len());
    0
}

async fn select(settings: &Settings, project_no: &str) -> i32 {
    let sites = fetch_sites(&site_directory(settings)).await;
    let Some(site) = find_site(&sites, project_no) else {
        fail(&format!("Unknown project '{}'", project_no));
    };

    let mut store = SelectionStore::load_from(settings.storage_path());
    if let Err(e) = store.save_current_office_location(site) {
        fail(&e.to_string());
    }
    eprintln!("  \u{2705} Selected {}", site.display_name());
    0
}

async fn check(settings: &Settings, project: Option<&str>, source: Arc<dyn PositionSource>) -> i32 {
    let directory = site_directory(settings);
    let target = match project {
        Some(no) => {
            let sites = fetch_sites(&directory).await;
            match find_site(&sites, no) {
                Some(site) => Some(site.clone()),
                None => fail(&format!("Unknown project '{}'", no)),
            }
        }
        None => None,
    };

    let store = SelectionStore::load_from(settings.storage_path());
    let mut checker = GeofenceChecker::new(directory, source, store)
        .with_notifier(Arc::new(StderrNotifier))
        .with_options(CheckerOptions::from(settings));

    if target.is_none() {
        checker.mount();
    }

    let outcome = checker.check_location_distance(target).await;
    if let Some(result) = outcome.result() {
        print_summary(result);
        match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&e.to_string()),
        }
    }

    match outcome {
        CheckOutcome::Granted(_) => 0,
        CheckOutcome::Denied(_) | CheckOutcome::Rejected { result: Some(_), .. } => 2,
        CheckOutcome::Rejected { error, .. } | CheckOutcome::Error(error) => {
            eprintln!("Error: {}", error);
            1
        }
    }
}

fn print_summary(result: &LocationCheckResult) {
    let verdict = if result.can_access { "\u{2705} Access granted" } else { "\u{274C} Access denied" };
    let distance = match result.distance_meters {
        Some(d) => format!("{} m", d),
        None => "n/a".to_string(),
    };
    eprintln!("  {} at {}", verdict, result.selected_site.display_name());
    eprintln!("  \u{1F4CF} distance {} / radius {} m", distance, result.radius_meters);
    if !result.coordinates.is_empty() {
        eprintln!("  \u{1F4CD} {}", result.coordinates);
    }
}

fn fail(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}
