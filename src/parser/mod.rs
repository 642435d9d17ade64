pub mod card;
pub mod counts;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use thiserror::Error;
use tracing::warn;

use crate::review::ReviewRecord;
use crate::store::SavedPage;

static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.apphub_Card").unwrap());

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("count {0:?} does not fit in 64 bits")]
    Overflow(String),
}

#[derive(Debug, Clone)]
pub struct CardFailure {
    pub card_index: usize,
    pub reason: String,
}

/// Records and skipped cards of one page.
#[derive(Debug, Clone)]
pub struct PageExtraction {
    pub page: String,
    pub records: Vec<ReviewRecord>,
    pub failures: Vec<CardFailure>,
}

/// Extract every review card of a page. A bad card is logged and skipped.
pub fn extract(page_id: &str, body: &str) -> PageExtraction {
    let doc = Html::parse_document(body);
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for (card_index, el) in doc.select(&CARD).enumerate() {
        match card::extract_card(el) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(page = page_id, card = card_index, error = %e, "Skipping review card");
                failures.push(CardFailure {
                    card_index,
                    reason: e.to_string(),
                });
            }
        }
    }

    PageExtraction {
        page: page_id.to_string(),
        records,
        failures,
    }
}

/// True when the body holds at least one review card.
pub fn has_review_cards(body: &str) -> bool {
    Html::parse_document(body).select(&CARD).next().is_some()
}

pub fn process_page(page: &SavedPage) -> PageExtraction {
    extract(&page.id, &page.body)
}
