//! Command line front end for the PhotoJournal library.

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use enrichment::Enricher;
use gallery::{evaluate, format_capture_date, DateFilter, Gallery, QuerySpec, SortDirection, SortKey};
use lookup_client::{CaptureEvent, Coordinates, Geocoder, LookupClient, LookupError, WeatherProvider};
use photo_store::PhotoStore;
use std::path::{Path, PathBuf};
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(
    name = "photojournal",
    author,
    version,
    about = "PhotoJournal photo library CLI"
)]
struct Cli {
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the library directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Override the number of gallery columns
    #[arg(long)]
    columns: Option<usize>,
    /// Skip address and weather lookups
    #[arg(long)]
    offline: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a photo to the library, looking up address and weather
    Capture {
        /// URI or path of the image
        image: String,
        #[arg(long, allow_hyphen_values = true, requires = "longitude")]
        latitude: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "latitude")]
        longitude: Option<f64>,
        /// Capture time (RFC 3339), defaults to now
        #[arg(long)]
        taken_at: Option<DateTime<Utc>>,
    },
    /// List photos
    List {
        /// Case-insensitive search over address, weather and date
        #[arg(long)]
        search: Option<String>,
        /// all, this-month or this-year
        #[arg(long, default_value = "all")]
        date: DateFilter,
        /// date, location or weather
        #[arg(long, default_value = "date")]
        sort: SortKey,
        /// asc or desc
        #[arg(long, default_value = "desc")]
        direction: SortDirection,
        /// Maximum number of photos to display
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show metadata for a photo
    Show {
        /// ID of the photo
        id: String,
    },
    /// Delete one or more photos
    Delete {
        /// IDs of the photos
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show photo counts
    Stats,
    /// Print the masonry columns of the default gallery view
    Layout {
        #[arg(long)]
        viewport_width: Option<f32>,
    },
    /// List geotagged photos
    Map,
    /// Export all photos to a JSON file
    ExportItems {
        /// Path to the export file
        #[arg(long)]
        file: PathBuf,
    },
    /// Import photos from a JSON file
    ImportItems {
        /// Path to the JSON file
        #[arg(long)]
        file: PathBuf,
    },
    /// Copy the image behind a photo to a file
    ExportPhoto {
        /// ID of the photo
        id: String,
        /// Destination path
        #[arg(long)]
        out: PathBuf,
    },
    /// Delete every photo
    Clear,
    /// Write the effective configuration to the config file
    InitConfig,
}

/// Lookup collaborator for `--offline`: every lookup fails, so records keep
/// their coordinates without address or weather.
#[derive(Clone, Copy)]
struct OfflineLookup;

impl Geocoder for OfflineLookup {
    async fn reverse_geocode(&self, _coordinates: Coordinates) -> Result<String, LookupError> {
        Err(LookupError::NoData("offline".into()))
    }
}

impl WeatherProvider for OfflineLookup {
    async fn weather_at(
        &self,
        _coordinates: Coordinates,
        _at: DateTime<Utc>,
    ) -> Result<String, LookupError> {
        Err(LookupError::NoData("offline".into()))
    }
}

async fn capture_into<G: Geocoder, W: WeatherProvider>(
    enricher: Enricher<G, W>,
    event: CaptureEvent,
    store: &mut PhotoStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = enricher.capture(event, store).await?;
    store.persist_async().await?;
    println!("Captured {}", record.id);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn open_existing(db_path: &Path) -> Result<Option<PhotoStore>, Box<dyn std::error::Error>> {
    if !db_path.exists() {
        println!("No library found at {:?}", db_path);
        return Ok(None);
    }
    Ok(Some(PhotoStore::open(db_path)?))
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        data_dir: cli.data_dir.clone(),
        columns: cli.columns,
        offline: cli.offline,
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    let base_dir = cfg.data_dir.clone();
    std::fs::create_dir_all(&base_dir)?;
    let file_appender = rolling::daily(&base_dir, "photojournal.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    let db_path = cfg.db_path();
    tracing::debug!(db = ?db_path, offline = cfg.offline, "library path");

    match cli.command {
        Commands::Capture {
            image,
            latitude,
            longitude,
            taken_at,
        } => {
            let event = CaptureEvent {
                image_ref: image,
                captured_at: taken_at.unwrap_or_else(Utc::now),
                raw_coordinates: latitude.zip(longitude).map(|(lat, lon)| Coordinates::new(lat, lon)),
            };
            let mut store = PhotoStore::open(&db_path)?;
            if cfg.offline {
                let enricher = Enricher::new(OfflineLookup, OfflineLookup);
                capture_into(enricher, event, &mut store).await?;
            } else {
                let client = LookupClient::with_base_urls(cfg.geocoder_url.clone(), cfg.weather_url.clone());
                let enricher = Enricher::new(client.clone(), client).with_timeout(cfg.lookup_timeout());
                capture_into(enricher, event, &mut store).await?;
            }
        }
        Commands::List {
            search,
            date,
            sort,
            direction,
            limit,
        } => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let query = QuerySpec {
                search_term: search.unwrap_or_default(),
                date_filter: date,
                sort_key: sort,
                sort_direction: direction,
            };
            let photos = evaluate(store.all(), &query);
            if let Some(summary) = gallery::result_summary(&query, photos.len(), store.len()) {
                println!("{}", summary);
            }
            let max = limit.unwrap_or(photos.len());
            for photo in photos.iter().take(max) {
                println!(
                    "{} - {} - {}",
                    photo.id,
                    format_capture_date(photo, &Local),
                    photo.address.as_deref().unwrap_or("Unknown location")
                );
            }
        }
        Commands::Show { id } => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            match store.by_id(&id) {
                Ok(photo) => println!("{}", serde_json::to_string_pretty(photo)?),
                Err(_) => println!("Photo not found: {}", id),
            }
        }
        Commands::Delete { ids } => {
            let Some(mut store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let report = store.delete_many(&ids);
            store.persist_async().await?;
            println!("Deleted {} photos", report.deleted.len());
            if !report.missing.is_empty() {
                println!("Not found: {}", report.missing.join(", "));
            }
        }
        Commands::Stats => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let counts = gallery::breakdown(store.all());
            println!("Photos: {}", counts.total);
            println!("This month: {}", counts.this_month);
            println!("This year: {}", counts.this_year);
            println!("Geotagged: {}", store.geotagged().len());
        }
        Commands::Layout { viewport_width } => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let mut layout = cfg.layout();
            if let Some(width) = viewport_width {
                layout.viewport_width = width;
            }
            let view = Gallery::new(store, layout)?;
            for (idx, column) in view.layout().columns.iter().enumerate() {
                let ids: Vec<&str> = column.iter().map(|r| r.id.as_str()).collect();
                println!(
                    "Column {} ({:.0}px): {}",
                    idx,
                    view.layout().column_heights[idx],
                    ids.join(", ")
                );
            }
        }
        Commands::Map => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            for photo in store.geotagged() {
                if let Some(c) = photo.coordinates {
                    println!(
                        "{} ({:.5}, {:.5}) {}",
                        photo.id,
                        c.latitude,
                        c.longitude,
                        photo.address.as_deref().unwrap_or("")
                    );
                }
            }
        }
        Commands::ExportItems { file } => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            store.export_json(&file)?;
            println!("Exported to {:?}", file);
        }
        Commands::ImportItems { file } => {
            let mut store = PhotoStore::open(&db_path)?;
            let report = store.import_json(&file)?;
            store.persist_async().await?;
            println!(
                "Imported {} photos from {:?} ({} skipped)",
                report.imported, file, report.skipped
            );
        }
        Commands::ExportPhoto { id, out } => {
            let Some(store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let bytes = store.read_image_bytes(&id).await?;
            tokio::fs::write(&out, bytes).await?;
            println!("Exported photo to {:?}", out);
        }
        Commands::Clear => {
            let Some(mut store) = open_existing(&db_path)? else {
                return Ok(());
            };
            let removed = store.clear();
            store.persist_async().await?;
            println!("Removed {} photos", removed);
        }
        Commands::InitConfig => {
            cfg.save_to(cli.config.clone())?;
            println!("Config written");
        }
    }

    Ok(())
}
