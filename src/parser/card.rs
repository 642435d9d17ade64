use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use super::counts::{extract_number, parse_votes};
use super::ExtractError;
use crate::review::{Recommendation, ReviewRecord, UNKNOWN_AUTHOR, UNKNOWN_DATE, UNKNOWN_PLAYTIME};

static THUMB: LazyLock<Selector> = LazyLock::new(|| Selector::parse(r#"img[src*="icon_thumbs"]"#).unwrap());
static AUTHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".apphub_CardContentAuthorName a").unwrap());
static CONTENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".apphub_CardTextContent").unwrap());
static DATE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".date_posted").unwrap());
static HOURS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".hours").unwrap());
static HELPFUL: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".found_helpful").unwrap());
static AWARDS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".review_award_aggregated").unwrap());
static COMMENTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".apphub_CardCommentCount").unwrap());

const DATE_CLASS: &str = "date_posted";
const DATE_PREFIXES: &[&str] = &["发布于：", "发布于:", "Posted:"];

/// Pull all nine fields out of one review card.
pub fn extract_card(card: ElementRef) -> Result<ReviewRecord, ExtractError> {
    let votes = parse_votes(&all_text(card, &HELPFUL).unwrap_or_default())?;

    Ok(ReviewRecord {
        recommendation: recommendation(card),
        author: first_text(card, &AUTHOR).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        content: card.select(&CONTENT).next().map(content_text).unwrap_or_default(),
        date_posted: first_text(card, &DATE)
            .map(|t| strip_date_prefix(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
        playtime_text: first_text(card, &HOURS).unwrap_or_else(|| UNKNOWN_PLAYTIME.to_string()),
        helpful_count: votes.helpful,
        funny_count: votes.funny,
        award_count: count_in(card, &AWARDS)?,
        comment_count: count_in(card, &COMMENTS)?,
    })
}

fn recommendation(card: ElementRef) -> Recommendation {
    match card.select(&THUMB).next().and_then(|img| img.value().attr("src")) {
        Some(src) if src.contains("thumbsUp") => Recommendation::Recommended,
        Some(_) => Recommendation::NotRecommended,
        None => Recommendation::Unknown,
    }
}

/// Trimmed text of the first match, None when missing or blank.
fn first_text(card: ElementRef, sel: &Selector) -> Option<String> {
    all_text(card, sel)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn all_text(card: ElementRef, sel: &Selector) -> Option<String> {
    card.select(sel).next().map(|el| el.text().collect())
}

fn count_in(card: ElementRef, sel: &Selector) -> Result<u64, ExtractError> {
    match all_text(card, sel) {
        Some(text) => extract_number(&text),
        None => Ok(0),
    }
}

/// Review body without the embedded date line.
fn content_text(el: ElementRef) -> String {
    let mut chunks = Vec::new();
    collect_text(el, &mut chunks);
    chunks.join("\n")
}

fn collect_text(el: ElementRef, out: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let t = text.trim();
            if !t.is_empty() {
                out.push(t.to_string());
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !child_el.value().classes().any(|c| c == DATE_CLASS) {
                collect_text(child_el, out);
            }
        }
    }
}

fn strip_date_prefix(text: &str) -> String {
    let t = text.trim();
    DATE_PREFIXES
        .iter()
        .find_map(|p| t.strip_prefix(p))
        .unwrap_or(t)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn card(inner: &str) -> ReviewRecord {
        let html = Html::parse_fragment(&format!(r#"<div class="apphub_Card">{}</div>"#, inner));
        let sel = Selector::parse("div.apphub_Card").unwrap();
        extract_card(html.select(&sel).next().unwrap()).unwrap()
    }

    #[test]
    fn thumbs_up_is_recommended() {
        let r = card(r#"<img src="https://cdn/icon_thumbsUp_v6.png">"#);
        assert_eq!(r.recommendation, Recommendation::Recommended);
    }

    #[test]
    fn thumbs_down_is_not_recommended() {
        let r = card(r#"<img src="https://cdn/icon_thumbsDown_v6.png">"#);
        assert_eq!(r.recommendation, Recommendation::NotRecommended);
    }

    #[test]
    fn no_icon_is_unknown() {
        let r = card(r#"<img src="https://cdn/avatar.jpg">"#);
        assert_eq!(r.recommendation, Recommendation::Unknown);
    }

    #[test]
    fn empty_card_gets_defaults() {
        assert_eq!(card(""), ReviewRecord::default());
    }

    #[test]
    fn date_removed_from_content() {
        let r = card(
            r#"<div class="apphub_CardTextContent">
                 <div class="date_posted">发布于：3 月 14 日</div>
                 很好玩<br>值得一买
               </div>"#,
        );
        assert_eq!(r.content, "很好玩\n值得一买");
        assert_eq!(r.date_posted, "3 月 14 日");
    }

    #[test]
    fn english_date_prefix_stripped() {
        let r = card(r#"<div class="apphub_CardTextContent"><div class="date_posted">Posted: March 3</div>Great</div>"#);
        assert_eq!(r.date_posted, "March 3");
        assert_eq!(r.content, "Great");
    }

    #[test]
    fn author_and_playtime() {
        let r = card(
            r#"<div class="apphub_CardContentAuthorName offline ellipsis"><a href="/id/x">  Gabe  </a></div>
               <div class="hours">总时数 12.5 小时</div>"#,
        );
        assert_eq!(r.author, "Gabe");
        assert_eq!(r.playtime_text, "总时数 12.5 小时");
    }

    #[test]
    fn blank_author_falls_back() {
        let r = card(r#"<div class="apphub_CardContentAuthorName"><a> </a></div>"#);
        assert_eq!(r.author, UNKNOWN_AUTHOR);
    }

    #[test]
    fn counts() {
        let r = card(
            r#"<div class="found_helpful">有 1,234 人觉得这篇评测有价值<br>有 7 人觉得这篇评测很欢乐</div>
               <div class="review_award_aggregated tooltip"><img src="award.png">3</div>
               <div class="apphub_CardCommentCount">12</div>"#,
        );
        assert_eq!(r.helpful_count, 1234);
        assert_eq!(r.funny_count, 7);
        assert_eq!(r.award_count, 3);
        assert_eq!(r.comment_count, 12);
    }

    #[test]
    fn overflowing_count_fails_the_card() {
        let html = Html::parse_fragment(
            r#"<div class="apphub_Card"><div class="apphub_CardCommentCount">123456789012345678901234</div></div>"#,
        );
        let sel = Selector::parse("div.apphub_Card").unwrap();
        assert!(extract_card(html.select(&sel).next().unwrap()).is_err());
    }
}
