//! Next-page URL derivation.
//!
//! The review listing is paged by an opaque cursor embedded in a hidden form
//! field of each page. The next request must carry that cursor plus a full,
//! consistent set of paging parameters: the host template renders every
//! sub-tab and refuses to page reviews if any of their counters disagree.

use thiserror::Error;
use url::Url;

pub const CURSOR_MARKER: &str = r#"name="userreviewscursor" value=""#;
pub const REVIEWS_PER_PAGE: u32 = 10;

const DEFAULT_BROWSE_FILTER: &str = "toprated";
const DEFAULT_LANGUAGE: &str = "schinese";

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("query parameter {key}={value:?} is not a number")]
    InvalidNumber { key: &'static str, value: String },
}

/// Return the cursor token following `CURSOR_MARKER`, if any.
pub fn find_cursor(body: &str) -> Option<&str> {
    let start = body.find(CURSOR_MARKER)? + CURSOR_MARKER.len();
    let len = body[start..].find('"')?;
    Some(&body[start..start + len])
}

/// Position in the review listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    /// 1-based page index (`p`).
    pub page: u32,
    /// Reviews already shown (`userreviewsoffset`).
    pub offset: u32,
    pub cursor: String,
}

/// Per-sub-tab page counters. All of them track the review page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubTabPages {
    pub workshop_items: u32,
    pub ready_to_use_items: u32,
    pub mtx_items: u32,
    pub items: u32,
    pub screenshots: u32,
    pub videos: u32,
    pub art: u32,
    pub all_guides: u32,
    pub web_guides: u32,
    pub integrated_guides: u32,
    pub discussions: u32,
}

impl SubTabPages {
    pub fn at(page: u32) -> Self {
        SubTabPages {
            workshop_items: page,
            ready_to_use_items: page,
            mtx_items: page,
            items: page,
            screenshots: page,
            videos: page,
            art: page,
            all_guides: page,
            web_guides: page,
            integrated_guides: page,
            discussions: page,
        }
    }

    fn pairs(&self) -> [(&'static str, u32); 11] {
        [
            ("workshopitemspage", self.workshop_items),
            ("readytouseitemspage", self.ready_to_use_items),
            ("mtxitemspage", self.mtx_items),
            ("itemspage", self.items),
            ("screenshotspage", self.screenshots),
            ("videospage", self.videos),
            ("artpage", self.art),
            ("allguidepage", self.all_guides),
            ("webguidepage", self.web_guides),
            ("integratedguidepage", self.integrated_guides),
            ("discussionspage", self.discussions),
        ]
    }
}

/// Full query parameter set for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationParams {
    pub state: CursorState,
    pub sub_tabs: SubTabPages,
    pub app_id: Option<String>,
    pub browse_filter: String,
    pub language: String,
}

impl PaginationParams {
    /// Parameters for the page after `current`, continuing from `cursor`.
    pub fn next_from(current: &Url, cursor: &str) -> Result<Self, CursorError> {
        let page = numeric_param(current, "p", 1)?;
        let offset = numeric_param(current, "userreviewsoffset", 0)?;
        let next_page = page.saturating_add(1);

        Ok(PaginationParams {
            state: CursorState {
                page: next_page,
                offset: offset.saturating_add(REVIEWS_PER_PAGE),
                cursor: cursor.to_string(),
            },
            sub_tabs: SubTabPages::at(next_page),
            app_id: query_value(current, "appid"),
            browse_filter: query_value(current, "browsefilter")
                .unwrap_or_else(|| DEFAULT_BROWSE_FILTER.to_string()),
            language: query_value(current, "l").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        })
    }

    pub fn to_query(&self) -> String {
        let mut q = url::form_urlencoded::Serializer::new(String::new());
        q.append_pair("userreviewscursor", &self.state.cursor);
        q.append_pair("userreviewsoffset", &self.state.offset.to_string());
        q.append_pair("p", &self.state.page.to_string());
        for (key, page) in self.sub_tabs.pairs() {
            q.append_pair(key, &page.to_string());
        }
        q.append_pair("numperpage", &REVIEWS_PER_PAGE.to_string());
        q.append_pair("browsefilter", &self.browse_filter);
        if let Some(app_id) = &self.app_id {
            q.append_pair("appid", app_id);
        }
        q.append_pair("appHubSubSection", "10");
        q.append_pair("l", &self.language);
        q.append_pair("filterLanguage", "default");
        q.append_pair("searchText", "");
        q.append_pair("maxInappropriateScore", "100");
        q.append_pair("forceanon", "1");
        q.finish()
    }
}

/// Derive the URL of the page after `current_url` from that page's body.
///
/// `Ok(None)` means the listing is exhausted: no cursor, an empty one, or the
/// same cursor the current request already carried.
pub fn next_page_url(body: &str, current_url: &str) -> Result<Option<String>, CursorError> {
    let Some(cursor) = find_cursor(body) else {
        return Ok(None);
    };
    if cursor.is_empty() {
        return Ok(None);
    }

    let mut url = Url::parse(current_url).map_err(|source| CursorError::InvalidUrl {
        url: current_url.to_string(),
        source,
    })?;
    if query_value(&url, "userreviewscursor").as_deref() == Some(cursor) {
        return Ok(None);
    }

    let params = PaginationParams::next_from(&url, cursor)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(Some(format!("{}?{}", url, params.to_query())))
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn numeric_param(url: &Url, key: &'static str, default: u32) -> Result<u32, CursorError> {
    match query_value(url, key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| CursorError::InvalidNumber { key, value: v }),
    }
}
