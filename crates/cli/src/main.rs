mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::thread;

use clap::{Parser, Subcommand};

use facematch_core::gallery::infrastructure::json_gallery_store::JsonGalleryStore;
use facematch_core::matching::batch_logger::StdoutBatchLogger;
use facematch_core::matching::infrastructure::worker_pool::WorkerPool;
use facematch_core::matching::match_batch_use_case::MatchBatchUseCase;
use facematch_core::recognition::infrastructure::onnx_face_recognizer::OnnxFaceRecognizer;
use facematch_core::shared::model_resolver::{ModelResolver, ProgressFn};
use facematch_core::training::train_gallery_use_case::TrainGalleryUseCase;

use settings::Settings;

/// Train a face gallery and match photo collections against it.
#[derive(Parser)]
#[command(name = "facematch")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding one JSON file per known identity.
    #[arg(long, global = true)]
    gallery_dir: Option<PathBuf>,

    /// Encoding cache file, reused across match runs.
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Requested workers; one is left for dispatch (minimum 1 active).
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Maximum encoding distance that still counts as a match.
    #[arg(long, global = true)]
    tolerance: Option<f64>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true)]
    confidence: Option<f64>,

    /// Image file extension to process, case-sensitive, without the dot.
    #[arg(long, global = true)]
    extension: Option<String>,

    /// Settings file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective settings back to the settings file.
    #[arg(long, global = true)]
    save_settings: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Add identities from photos named <first>_[<middle>_]<last>&<nationality>.jpg
    Train {
        /// Directory of training photos.
        dir: PathBuf,
    },
    /// Match every photo in a directory against the gallery.
    Match {
        /// Directory of photos to match.
        dir: PathBuf,

        /// Write the JSON result here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().or_else(Settings::config_path);
    let settings = apply_overrides(
        config_path
            .as_deref()
            .map(Settings::load_from)
            .unwrap_or_default(),
        &cli,
    );
    settings.validate()?;

    if cli.save_settings {
        let path = config_path.ok_or("No config directory available for --save-settings")?;
        settings.save_to(&path)?;
        log::info!("Settings saved to {}", path.display());
    }

    let gallery_dir = settings
        .gallery_dir()
        .ok_or("No data directory available; pass --gallery-dir")?;
    let store = JsonGalleryStore::open(&gallery_dir)?;
    let pool = WorkerPool::new(settings.workers);
    let recognizer = build_recognizer(&settings, pool.slots())?;

    match cli.command {
        Command::Train { dir } => {
            validate_dir(&dir)?;
            let use_case = TrainGalleryUseCase::new(Box::new(recognizer), Box::new(store), pool)
                .with_extension(&settings.extension);
            let report = use_case.execute(&dir)?;
            log::info!(
                "Gallery at {}: {} trained, {} skipped, {} failed",
                gallery_dir.display(),
                report.trained.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
        Command::Match { dir, output } => {
            validate_dir(&dir)?;
            let mut use_case = MatchBatchUseCase::new(
                Box::new(recognizer),
                Box::new(store),
                pool,
                Box::new(StdoutBatchLogger::new(10)),
            )
            .with_extension(&settings.extension);
            if let Some(cache) = settings.cache_file() {
                use_case = use_case.with_cache_path(cache);
            }

            let report = use_case.execute(&dir)?;
            let missing = report.missing();
            if !missing.is_empty() {
                log::warn!("{} image(s) have no result: {}", missing.len(), missing.join(", "));
            }

            let json = serde_json::to_string_pretty(&report.result)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    log::info!("Results written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
    }

    Ok(())
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(dir) = &cli.gallery_dir {
        settings.gallery_dir = Some(dir.clone());
    }
    if let Some(cache) = &cli.cache {
        settings.cache_file = Some(cache.clone());
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(tolerance) = cli.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(confidence) = cli.confidence {
        settings.confidence = confidence;
    }
    if let Some(extension) = &cli.extension {
        settings.extension = extension.clone();
    }
    settings
}

fn build_recognizer(
    settings: &Settings,
    slots: usize,
) -> Result<OnnxFaceRecognizer, Box<dyn std::error::Error>> {
    // One session per worker slot, cores shared between them
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    let intra_threads = (cores / slots).max(1);

    let resolver = ModelResolver::from_user_cache()?;
    let recognizer = OnnxFaceRecognizer::load(
        &resolver,
        settings.confidence,
        slots,
        intra_threads,
        download_progress,
    )?
    .with_tolerance(settings.tolerance);
    Ok(recognizer)
}

fn validate_dir(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("Directory not found: {}", dir.display()).into());
    }
    Ok(())
}

fn download_progress(model: &str) -> Option<ProgressFn> {
    let model = model.to_string();
    Some(Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {model}... {pct}%");
        } else {
            eprint!("\rDownloading {model}... {downloaded} bytes");
        }
        if total > 0 && downloaded >= total {
            eprintln!();
        }
    }))
}
