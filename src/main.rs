mod db;
mod export;
mod pager;
mod parser;
mod pipeline;
mod review;
mod settings;
mod store;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use pager::client::HttpSource;
use pager::StopReason;
use pipeline::ExportSummary;
use settings::Settings;

const DEFAULT_PAGES_DIR: &str = "html_pages";

#[derive(Parser)]
#[command(name = "steam_reviews", about = "Page through a storefront's user reviews and export them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch review pages and save the raw HTML
    Fetch {
        /// First listing URL (must carry an appid query parameter)
        #[arg(short, long)]
        url: String,
        /// Number of pages to fetch
        #[arg(short = 'n', long, default_value = "3")]
        pages: usize,
        /// Folder the pages are saved into
        #[arg(short, long, default_value = DEFAULT_PAGES_DIR)]
        dir: PathBuf,
    },
    /// Extract reviews from saved pages into CSV + JSON
    Extract {
        /// Folder holding page_<n>.html files
        #[arg(short, long, default_value = DEFAULT_PAGES_DIR)]
        dir: PathBuf,
        /// Output folder (default: <dir>_dataset)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also store the records in this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Fetch + extract in one go
    Run {
        #[arg(short, long)]
        url: String,
        #[arg(short = 'n', long, default_value = "3")]
        pages: usize,
        #[arg(short, long, default_value = DEFAULT_PAGES_DIR)]
        dir: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show what the SQLite store holds
    Stats {
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch { url, pages, dir } => {
            let settings = Settings::load()?;
            fetch(&url, pages, &dir, &settings).map(|_| ())
        }
        Commands::Extract { dir, out, db } => extract(&dir, out.as_deref(), db.as_deref()),
        Commands::Run { url, pages, dir, out, db } => {
            let settings = Settings::load()?;
            let saved = fetch(&url, pages, &dir, &settings)?;
            if saved == 0 {
                println!("Nothing fetched, skipping extraction.");
                return Ok(());
            }
            println!();
            extract(&dir, out.as_deref(), db.as_deref())
        }
        Commands::Stats { db } => {
            if !db.exists() {
                anyhow::bail!("Database {} does not exist", db.display());
            }
            let conn = db::connect(&db)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Runs:            {}", s.runs);
            println!("Reviews:         {}", s.reviews);
            println!("Recommended:     {}", s.recommended);
            println!("Not recommended: {}", s.not_recommended);
            println!("Unknown:         {}", s.unknown);
            if let Some(at) = s.last_export {
                println!("Last export:     {}", at);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Returns the number of pages saved.
fn fetch(url: &str, pages: usize, dir: &Path, settings: &Settings) -> anyhow::Result<usize> {
    pager::validate_start_url(url)?;
    let mut source = HttpSource::new(settings).context("Failed to build HTTP client")?;

    println!("Fetching {} pages into {}...", pages, dir.display());
    let outcome = pager::fetch_pages(&mut source, url, pages, dir, settings)?;

    match outcome.stop {
        StopReason::PageCountReached => {}
        StopReason::NoNextCursor { page } => println!("No next page after page {}, stopping.", page),
        StopReason::RetriesExhausted { page } => {
            println!("Page {} failed after retries, remaining pages skipped.", page)
        }
        StopReason::CursorError { page } => {
            println!("Could not build the URL after page {}, stopping.", page)
        }
    }

    println!("Saved {} pages:", outcome.saved.len());
    for path in &outcome.saved {
        println!("  - {}", path.display());
    }
    Ok(outcome.saved.len())
}

fn extract(dir: &Path, out: Option<&Path>, db: Option<&Path>) -> anyhow::Result<()> {
    println!("Extracting reviews from {}...", dir.display());
    let summary = pipeline::extract_and_export(dir, out, db)?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(s: &ExportSummary) {
    if s.tally.total == 0 {
        println!("No reviews found in {} pages.", s.pages);
        return;
    }
    if let Some(paths) = &s.paths {
        println!("CSV:  {}", paths.csv.display());
        println!("JSON: {}", paths.json.display());
    }
    if let Some(run_id) = s.run_id {
        println!("SQLite run #{}", run_id);
    }
    println!();
    println!("Pages:           {}", s.pages);
    println!("Skipped cards:   {}", s.skipped_cards);
    println!("Reviews:         {}", s.tally.total);
    println!("Recommended:     {}", s.tally.recommended);
    println!("Not recommended: {}", s.tally.not_recommended);
    if s.tally.unknown > 0 {
        println!("Unknown:         {}", s.tally.unknown);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
