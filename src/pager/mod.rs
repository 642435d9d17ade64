pub mod client;
pub mod cursor;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::parser;
use crate::settings::Settings;
use crate::store::{self, StoreError};
use client::{FetchError, FetchResponse, PageSource};

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("invalid start URL {url:?}: {reason}")]
    InvalidStartUrl { url: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why paging stopped. Only the first variant means every requested page was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    PageCountReached,
    NoNextCursor { page: usize },
    RetriesExhausted { page: usize },
    CursorError { page: usize },
}

pub struct FetchOutcome {
    pub saved: Vec<PathBuf>,
    pub stop: StopReason,
}

/// The start URL must parse and name the app whose reviews are paged.
pub fn validate_start_url(start_url: &str) -> Result<(), PagerError> {
    let invalid = |reason: String| PagerError::InvalidStartUrl {
        url: start_url.to_string(),
        reason,
    };
    let url = Url::parse(start_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if !url.query_pairs().any(|(k, v)| k == "appid" && !v.is_empty()) {
        return Err(invalid("missing appid query parameter".to_string()));
    }
    Ok(())
}

/// Fetch up to `count` pages starting at `start_url`, saving each into `save_dir`.
///
/// Strictly serial: every next URL comes from the previous body.
pub fn fetch_pages<S: PageSource + ?Sized>(
    source: &mut S,
    start_url: &str,
    count: usize,
    save_dir: &Path,
    settings: &Settings,
) -> Result<FetchOutcome, PagerError> {
    validate_start_url(start_url)?;

    let pb = ProgressBar::new(count as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut current = start_url.to_string();
    let mut saved = Vec::with_capacity(count);
    let mut stop = StopReason::PageCountReached;

    for counter in 1..=count {
        info!(page = counter, url = %current, "Fetching page");

        let body = match fetch_with_retry(source, &current, settings) {
            Ok(body) => body,
            Err(e) => {
                warn!(page = counter, error = %e, "Giving up on page, skipping the rest");
                stop = StopReason::RetriesExhausted { page: counter };
                break;
            }
        };

        let path = store::save_page(save_dir, counter, &body)?;
        info!(page = counter, path = %path.display(), bytes = body.len(), "Saved page");
        saved.push(path);
        pb.inc(1);

        if counter == count {
            break;
        }

        match cursor::next_page_url(&body, &current) {
            Ok(Some(next)) => current = next,
            Ok(None) => {
                info!(page = counter, "No next cursor, listing exhausted");
                stop = StopReason::NoNextCursor { page: counter };
                break;
            }
            Err(e) => {
                warn!(page = counter, error = %e, "Cannot derive next page URL");
                stop = StopReason::CursorError { page: counter };
                break;
            }
        }

        thread::sleep(settings.page_delay());
    }

    pb.finish_and_clear();
    Ok(FetchOutcome { saved, stop })
}

/// GET `url`, retrying throttling, soft-blocks, TLS and transport failures
/// up to `settings.max_retries` times.
fn fetch_with_retry<S: PageSource + ?Sized>(
    source: &mut S,
    url: &str,
    settings: &Settings,
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        let err = match source.get(url).and_then(|res| check_response(res, settings)) {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        if attempt >= settings.max_retries {
            return Err(err);
        }

        let backoff = match &err {
            FetchError::Throttled(_) | FetchError::SoftBlocked(_) => settings.backoff(attempt),
            FetchError::Tls(_) => {
                source.relax_tls()?;
                Duration::ZERO
            }
            FetchError::Status(_) | FetchError::Transport(_) => settings.backoff(0),
        };
        attempt += 1;

        warn!(
            "{} (attempt {}/{}), backing off {:.1}s",
            err,
            attempt,
            settings.max_retries,
            backoff.as_secs_f64()
        );
        thread::sleep(backoff);
    }
}

fn check_response(res: FetchResponse, settings: &Settings) -> Result<String, FetchError> {
    match res.status {
        429 | 503 => return Err(FetchError::Throttled(res.status)),
        200..=299 => {}
        other => return Err(FetchError::Status(other)),
    }
    if let Some(reason) = soft_block_reason(&res.body, settings) {
        return Err(FetchError::SoftBlocked(reason));
    }
    Ok(res.body)
}

/// A 200 response that is really an anti-bot page. Markers only count on a body
/// without review cards or a cursor, since review text can contain them too.
/// A short body with neither is the end of the listing, not a block.
fn soft_block_reason(body: &str, settings: &Settings) -> Option<String> {
    if body.contains(cursor::CURSOR_MARKER) || parser::has_review_cards(body) {
        return None;
    }
    settings
        .block_markers
        .iter()
        .find(|m| body.contains(m.as_str()))
        .map(|m| format!("body contains {:?} and no review cards", m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const START: &str = "https://steamcommunity.com/app/42/homecontent/?appid=42&p=1&userreviewsoffset=0";

    struct ScriptedSource {
        replies: VecDeque<Result<FetchResponse, FetchError>>,
        requested: Vec<String>,
        relaxed: usize,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<FetchResponse, FetchError>>) -> Self {
            ScriptedSource {
                replies: replies.into(),
                requested: Vec::new(),
                relaxed: 0,
            }
        }
    }

    impl PageSource for ScriptedSource {
        fn get(&mut self, url: &str) -> Result<FetchResponse, FetchError> {
            self.requested.push(url.to_string());
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".into())))
        }

        fn relax_tls(&mut self) -> Result<(), FetchError> {
            self.relaxed += 1;
            Ok(())
        }
    }

    fn fast_settings() -> Settings {
        Settings {
            delay_min_secs: 0,
            delay_max_secs: 0,
            base_backoff_ms: 0,
            max_retries: 2,
            ..Default::default()
        }
    }

    fn page(cursor: Option<&str>) -> Result<FetchResponse, FetchError> {
        let mut body = String::from("<html><body><div class=\"apphub_Card\"></div>");
        if let Some(c) = cursor {
            body.push_str(&format!(r#"<input name="userreviewscursor" value="{}">"#, c));
        }
        body.push_str("</body></html>");
        Ok(FetchResponse { status: 200, body })
    }

    fn status(code: u16) -> Result<FetchResponse, FetchError> {
        Ok(FetchResponse { status: code, body: "<html>busy, come back later</html>".into() })
    }

    #[test]
    fn follows_cursors_and_saves_every_page() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![page(Some("c1")), page(Some("c2")), page(Some("c3"))]);

        let out = fetch_pages(&mut src, START, 3, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::PageCountReached);
        assert_eq!(out.saved.len(), 3);
        assert!(tmp.path().join("page_3.html").exists());
        assert!(src.requested[1].contains("userreviewscursor=c1"));
        assert!(src.requested[1].contains("p=2"));
        assert!(src.requested[2].contains("userreviewscursor=c2"));
        assert!(src.requested[2].contains("userreviewsoffset=20"));
    }

    #[test]
    fn stops_without_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![page(Some("c1")), page(None)]);

        let out = fetch_pages(&mut src, START, 5, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::NoNextCursor { page: 2 });
        assert_eq!(out.saved.len(), 2);
        assert_eq!(src.requested.len(), 2);
    }

    #[test]
    fn retries_throttling_then_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![status(429), status(503), page(None)]);

        let out = fetch_pages(&mut src, START, 1, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::PageCountReached);
        assert_eq!(out.saved.len(), 1);
        assert_eq!(src.requested.len(), 3);
    }

    #[test]
    fn exhausted_retries_keep_earlier_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![
            page(Some("c1")),
            status(500),
            status(500),
            status(500),
        ]);

        let out = fetch_pages(&mut src, START, 4, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::RetriesExhausted { page: 2 });
        assert_eq!(out.saved.len(), 1);
        assert!(!tmp.path().join("page_2.html").exists());
    }

    #[test]
    fn soft_block_is_retried() {
        let tmp = tempfile::tempdir().unwrap();
        let blocked = Ok(FetchResponse {
            status: 200,
            body: "<html><div class=\"g-recaptcha\"></div></html>".into(),
        });
        let denied = Ok(FetchResponse { status: 200, body: "<h1>Access Denied</h1>".into() });
        let mut src = ScriptedSource::new(vec![blocked, denied, page(None)]);

        let out = fetch_pages(&mut src, START, 1, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.saved.len(), 1);
        assert_eq!(src.requested.len(), 3);
    }

    #[test]
    fn review_text_mentioning_a_marker_is_saved() {
        let tmp = tempfile::tempdir().unwrap();
        let body = std::fs::read_to_string("tests/fixtures/page_1.html")
            .unwrap()
            .replace("剧情很棒，画面也很好。", "I loved Access Denied, the puzzle game. Unusual traffic at launch though.")
            .replace("userreviewscursor", "nocursor");
        assert!(body.contains("Access Denied"));
        let mut src = ScriptedSource::new(vec![Ok(FetchResponse { status: 200, body })]);

        let out = fetch_pages(&mut src, START, 3, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::NoNextCursor { page: 1 });
        assert_eq!(out.saved.len(), 1);
        assert_eq!(src.requested.len(), 1);
    }

    #[test]
    fn short_last_page_ends_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let last = Ok(FetchResponse { status: 200, body: "<html><body></body></html>".into() });
        let mut src = ScriptedSource::new(vec![page(Some("c1")), last]);

        let out = fetch_pages(&mut src, START, 5, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.stop, StopReason::NoNextCursor { page: 2 });
        assert_eq!(out.saved.len(), 2);
        assert_eq!(src.requested.len(), 2);
    }

    #[test]
    fn tls_failure_relaxes_verification() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![
            Err(FetchError::Tls("invalid peer certificate".into())),
            page(None),
        ]);

        let out = fetch_pages(&mut src, START, 1, tmp.path(), &fast_settings()).unwrap();

        assert_eq!(out.saved.len(), 1);
        assert_eq!(src.relaxed, 1);
    }

    #[test]
    fn start_url_needs_app_id() {
        assert!(validate_start_url(START).is_ok());
        assert!(validate_start_url("https://steamcommunity.com/app/42/homecontent/?p=1").is_err());
        assert!(validate_start_url("ftp://example.com/?appid=1").is_err());
        assert!(validate_start_url("reviews please").is_err());
    }

    #[test]
    fn invalid_start_url_sends_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![page(None)]);
        let res = fetch_pages(&mut src, "https://example.com/?p=1", 1, tmp.path(), &fast_settings());
        assert!(matches!(res, Err(PagerError::InvalidStartUrl { .. })));
        assert!(src.requested.is_empty());
    }

    #[test]
    fn zero_pages_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let mut src = ScriptedSource::new(vec![]);
        let out = fetch_pages(&mut src, START, 0, tmp.path(), &fast_settings()).unwrap();
        assert!(out.saved.is_empty());
        assert!(src.requested.is_empty());
    }
}
