//! CSV and JSON views of one record list.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::review::{ReviewRecord, COLUMNS};

pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Default output folder for an input folder: `<input>_dataset` next to it.
pub fn default_out_dir(input: &Path) -> PathBuf {
    let name = dataset_stem(input);
    match input.parent() {
        Some(parent) => parent.join(format!("{}_dataset", name)),
        None => PathBuf::from(format!("{}_dataset", name)),
    }
}

/// File stem shared by both exports, derived from the input folder name.
pub fn dataset_stem(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "reviews".to_string())
}

/// Write `<stem>_dataset.csv` and `<stem>_dataset.json` into `out_dir`.
pub fn write_exports(records: &[ReviewRecord], out_dir: &Path, stem: &str) -> Result<ExportPaths> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output folder {}", out_dir.display()))?;

    let csv = out_dir.join(format!("{}_dataset.csv", stem));
    let mut buf = Vec::new();
    write_csv(&mut buf, records)?;
    fs::write(&csv, buf).with_context(|| format!("Failed to write {}", csv.display()))?;

    let json = out_dir.join(format!("{}_dataset.json", stem));
    let text = serde_json::to_string_pretty(records)?;
    fs::write(&json, text).with_context(|| format!("Failed to write {}", json.display()))?;

    Ok(ExportPaths { csv, json })
}

pub fn write_csv<W: Write>(mut w: W, records: &[ReviewRecord]) -> io::Result<()> {
    write_row(&mut w, COLUMNS.iter().copied())?;
    for r in records {
        let row = r.to_row();
        write_row(&mut w, row.iter().map(String::as_str))?;
    }
    w.flush()
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<'a, W: Write>(w: &mut W, cells: impl Iterator<Item = &'a str>) -> io::Result<()> {
    let mut first = true;
    for cell in cells {
        if !first {
            w.write_all(b",")?;
        }
        first = false;
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\r\n")
}
