use std::path::Path;

use anyhow::Result;
use rusqlite::{params, Connection};

use crate::review::{tally, ReviewRecord};

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id              INTEGER PRIMARY KEY,
            source_dir      TEXT NOT NULL,
            exported_at     TEXT NOT NULL,
            total           INTEGER NOT NULL,
            recommended     INTEGER NOT NULL,
            not_recommended INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reviews (
            id             INTEGER PRIMARY KEY,
            run_id         INTEGER NOT NULL REFERENCES runs(id),
            position       INTEGER NOT NULL,
            recommendation TEXT NOT NULL
                CHECK(recommendation IN ('Recommended','NotRecommended','Unknown')),
            author         TEXT NOT NULL,
            content        TEXT NOT NULL,
            date_posted    TEXT NOT NULL,
            playtime_text  TEXT NOT NULL,
            helpful_count  INTEGER NOT NULL,
            funny_count    INTEGER NOT NULL,
            award_count    INTEGER NOT NULL,
            comment_count  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_reviews_run ON reviews(run_id);
        ",
    )?;
    Ok(())
}

/// Store one export run and its records in a single transaction. Returns the run id.
pub fn save_run(conn: &mut Connection, source_dir: &str, records: &[ReviewRecord]) -> Result<i64> {
    let t = tally(records);
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO runs (source_dir, exported_at, total, recommended, not_recommended)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            source_dir,
            chrono::Utc::now().to_rfc3339(),
            t.total as i64,
            t.recommended as i64,
            t.not_recommended as i64,
        ],
    )?;
    let run_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO reviews (run_id, position, recommendation, author, content, date_posted,
                                  playtime_text, helpful_count, funny_count, award_count, comment_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for (i, r) in records.iter().enumerate() {
            stmt.execute(params![
                run_id,
                i as i64,
                r.recommendation.as_str(),
                r.author,
                r.content,
                r.date_posted,
                r.playtime_text,
                to_sql_int(r.helpful_count),
                to_sql_int(r.funny_count),
                to_sql_int(r.award_count),
                to_sql_int(r.comment_count),
            ])?;
        }
    }

    tx.commit()?;
    Ok(run_id)
}

// SQLite integers are signed.
fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub struct Stats {
    pub runs: i64,
    pub reviews: i64,
    pub recommended: i64,
    pub not_recommended: i64,
    pub unknown: i64,
    pub last_export: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: i64 = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_export: Option<String> =
        conn.query_row("SELECT MAX(exported_at) FROM runs", [], |r| r.get(0))?;
    let (reviews, recommended, not_recommended, unknown) = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(recommendation = 'Recommended'), 0),
                COALESCE(SUM(recommendation = 'NotRecommended'), 0),
                COALESCE(SUM(recommendation = 'Unknown'), 0)
         FROM reviews",
        [],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
    )?;

    Ok(Stats {
        runs,
        reviews,
        recommended,
        not_recommended,
        unknown,
        last_export,
    })
}
