use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::info;

use crate::db;
use crate::export::{self, ExportPaths};
use crate::parser::{self, PageExtraction};
use crate::review::{tally, ReviewRecord, Tally};
use crate::store;

/// Everything pulled out of one folder of saved pages.
pub struct FolderExtraction {
    pub pages: usize,
    pub skipped_cards: usize,
    pub records: Vec<ReviewRecord>,
}

/// Parse every saved page of `dir`. Pages are parsed in parallel but records
/// come back in page-counter order.
pub fn extract_folder(dir: &Path) -> Result<FolderExtraction> {
    let paths = store::list_pages(dir)?;
    info!(folder = %dir.display(), pages = paths.len(), "Extracting reviews");

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let results: Vec<Result<PageExtraction>> = paths
        .par_iter()
        .map(|path| -> Result<PageExtraction> {
            let page = store::read_page(path)?;
            let extracted = parser::process_page(&page);
            pb.inc(1);
            Ok(extracted)
        })
        .collect();
    pb.finish_and_clear();

    let mut out = FolderExtraction {
        pages: 0,
        skipped_cards: 0,
        records: Vec::new(),
    };
    for res in results {
        let page = res?;
        println!("{}: {} reviews", page.page, page.records.len());
        for f in &page.failures {
            println!("  skipped card {}: {}", f.card_index, f.reason);
        }
        out.pages += 1;
        out.skipped_cards += page.failures.len();
        out.records.extend(page.records);
    }
    Ok(out)
}

pub struct ExportSummary {
    pub pages: usize,
    pub skipped_cards: usize,
    pub tally: Tally,
    /// None when there was nothing to export.
    pub paths: Option<ExportPaths>,
    pub run_id: Option<i64>,
}

/// Extract `input` and write the CSV/JSON exports (and optionally the SQLite store).
pub fn extract_and_export(input: &Path, out_dir: Option<&Path>, db_path: Option<&Path>) -> Result<ExportSummary> {
    store::ensure_dir(input)?;

    let extraction = extract_folder(input)?;
    let t = tally(&extraction.records);
    let mut summary = ExportSummary {
        pages: extraction.pages,
        skipped_cards: extraction.skipped_cards,
        tally: t,
        paths: None,
        run_id: None,
    };
    if extraction.records.is_empty() {
        return Ok(summary);
    }

    let out_dir: PathBuf = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| export::default_out_dir(input));
    let stem = export::dataset_stem(input);
    summary.paths = Some(export::write_exports(&extraction.records, &out_dir, &stem)?);

    if let Some(db_path) = db_path {
        let mut conn = db::connect(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        db::init_schema(&conn)?;
        summary.run_id = Some(db::save_run(&mut conn, &input.display().to_string(), &extraction.records)?);
    }

    Ok(summary)
}
