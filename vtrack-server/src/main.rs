//! vtrack: vehicle tracking server + CLI.
//!
//! `serve` runs the HTTP/WebSocket server. `latest` and `history` read the
//! SQLite database directly. `watch` prints live updates from a running
//! server.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use tracing::info;

use vtrack_core::config::{self, Config};
use vtrack_core::{LocationRecord, TrackingState};

mod broadcast;
mod db;
mod geocode;
mod logging;
mod pipeline;
mod poller;
mod watch;
mod web;

use broadcast::Broadcaster;
use db::{Database, MemoryStore, RecordStore, SqliteStore};
use geocode::NominatimSource;
use pipeline::IngestPipeline;

#[derive(Parser)]
#[command(name = "vtrack", version, about = "Single-vehicle location tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tracking server
    Serve {
        /// Bind address [config: server.host]
        #[arg(long, env = "VTRACK_HOST")]
        host: Option<String>,

        /// Bind port [config: server.port]
        #[arg(long, env = "VTRACK_PORT")]
        port: Option<u16>,

        /// SQLite database path [config: database.path]
        #[arg(long, env = "VTRACK_DB")]
        db_path: Option<String>,

        /// Keep records in memory only; overrides --db-path
        #[arg(long)]
        memory: bool,

        /// Free-text place the pull endpoint geocodes [config: geocoder.query]
        #[arg(long, env = "VTRACK_QUERY")]
        query: Option<String>,

        /// Nominatim-compatible search URL [config: geocoder.url]
        #[arg(long, env = "VTRACK_GEOCODER_URL")]
        geocoder_url: Option<String>,

        /// Upper bound on each position lookup [config: geocoder.timeout_ms]
        #[arg(long)]
        lookup_timeout_ms: Option<u64>,

        /// Pull a position every N seconds; 0 disables [config: poller.interval_secs]
        #[arg(long)]
        poll_interval_secs: Option<u64>,
    },

    /// Print the most recent stored record
    Latest {
        #[arg(long, env = "VTRACK_DB")]
        db_path: Option<String>,
    },

    /// Print stored records in chronological order
    History {
        #[arg(long, env = "VTRACK_DB")]
        db_path: Option<String>,

        /// Only show the last N records
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Print live updates from a running server
    Watch {
        /// Event stream URL
        #[arg(long, default_value = "ws://127.0.0.1:5000/ws")]
        url: String,

        /// Exit after this many updates
        #[arg(long)]
        count: Option<usize>,
    },

    /// Write the default config file to ~/.vtrack/config.yaml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    logging::init("info");
    let cli = Cli::parse();
    let config = config::load_config();

    match cli.command {
        Commands::Serve {
            host,
            port,
            db_path,
            memory,
            query,
            geocoder_url,
            lookup_timeout_ms,
            poll_interval_secs,
        } => {
            let mut config = config;
            if let Some(v) = host {
                config.server.host = v;
            }
            if let Some(v) = port {
                config.server.port = v;
            }
            if let Some(v) = db_path {
                config.database.path = v;
            }
            if let Some(v) = query {
                config.geocoder.query = v;
            }
            if let Some(v) = geocoder_url {
                config.geocoder.url = v;
            }
            if let Some(v) = lookup_timeout_ms {
                config.geocoder.timeout_ms = v;
            }
            if let Some(v) = poll_interval_secs {
                config.poller.interval_secs = v;
            }
            cmd_serve(config, memory).await
        }
        Commands::Latest { db_path } => {
            cmd_latest(&db_path.unwrap_or(config.database.path))
        }
        Commands::History { db_path, limit } => {
            cmd_history(&db_path.unwrap_or(config.database.path), limit)
        }
        Commands::Watch { url, count } => {
            if let Err(e) = watch::run(&url, count).await {
                fail(&format!("Error watching {url}: {e}"));
            }
        }
        Commands::InitConfig { force } => cmd_init_config(force),
    }
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

async fn cmd_serve(config: Config, memory: bool) {
    let store: Arc<dyn RecordStore> = if memory {
        info!("using in-memory record store");
        Arc::new(MemoryStore::new())
    } else {
        let path = &config.database.path;
        let store = SqliteStore::open(path)
            .unwrap_or_else(|e| fail(&format!("Error opening database {path}: {e}")));
        info!(path = %path, "using SQLite record store");
        Arc::new(store)
    };

    let lookup_timeout = Duration::from_millis(config.geocoder.timeout_ms);
    let source = NominatimSource::new(
        &config.geocoder.url,
        &config.geocoder.user_agent,
        lookup_timeout,
    )
    .unwrap_or_else(|e| fail(&format!("Error creating geocoder: {e}")));

    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(TrackingState::new()),
        store,
        Arc::new(source),
        Broadcaster::new(config.broadcast.capacity),
        &config.geocoder.query,
        lookup_timeout,
    ));

    let poller = (config.poller.interval_secs > 0).then(|| {
        info!(
            every_secs = config.poller.interval_secs,
            query = %config.geocoder.query,
            "starting poller"
        );
        poller::spawn(
            Arc::clone(&pipeline),
            Duration::from_secs(config.poller.interval_secs),
        )
    });

    let state = Arc::new(web::AppState { pipeline });
    let result = web::serve(state, &config.server.host, config.server.port).await;

    if let Some(handle) = poller {
        handle.abort();
    }
    if let Err(e) = result {
        fail(&format!(
            "Server error on {}:{}: {e}",
            config.server.host, config.server.port
        ));
    }
}

fn open_db(db_path: &str) -> Database {
    Database::open(db_path)
        .unwrap_or_else(|e| fail(&format!("Error opening database {db_path}: {e}")))
}

fn cmd_latest(db_path: &str) {
    let database = open_db(db_path);
    match database.latest() {
        Ok(Some(record)) => print_records(&[record]),
        Ok(None) => println!("No records in {db_path}"),
        Err(e) => fail(&format!("Error reading {db_path}: {e}")),
    }
}

fn cmd_history(db_path: &str, limit: Option<usize>) {
    let database = open_db(db_path);
    let records = database
        .all_ordered()
        .unwrap_or_else(|e| fail(&format!("Error reading {db_path}: {e}")));

    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    let shown = &records[skip..];

    println!();
    println!("Database: {db_path}");
    println!("  {} records, showing {}", records.len(), shown.len());
    println!();

    if !shown.is_empty() {
        print_records(shown);
    }
}

fn cmd_init_config(force: bool) {
    let path = config::config_file();
    if path.exists() && !force {
        fail(&format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    match config::save_config(&Config::default()) {
        Ok(path) => println!("Wrote {}", path.display()),
        Err(e) => fail(&format!("Error writing config: {e}")),
    }
}

fn print_records(records: &[LocationRecord]) {
    let mut table = Table::new();
    table.set_header(vec!["Timestamp (UTC)", "Lat", "Lon", "Speed (m/s)", "ID"]);

    for r in records {
        table.add_row(vec![
            Cell::new(r.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(format!("{:.5}", r.latitude)),
            Cell::new(format!("{:.5}", r.longitude)),
            Cell::new(format!("{:.2}", r.speed)),
            Cell::new(r.id.as_deref().unwrap_or("-")),
        ]);
    }

    println!("{table}");
}
