use serde::{Deserialize, Serialize};

pub const UNKNOWN_AUTHOR: &str = "unknown";
pub const UNKNOWN_DATE: &str = "unknown date";
pub const UNKNOWN_PLAYTIME: &str = "unknown playtime";

/// Column order shared by every tabular view of a record.
pub const COLUMNS: [&str; 9] = [
    "recommendation",
    "author",
    "content",
    "datePosted",
    "playtimeText",
    "helpfulCount",
    "funnyCount",
    "awardCount",
    "commentCount",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Recommendation {
    Recommended,
    NotRecommended,
    #[default]
    Unknown,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Recommended => "Recommended",
            Recommendation::NotRecommended => "NotRecommended",
            Recommendation::Unknown => "Unknown",
        }
    }

    #[cfg(test)]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Recommended" => Some(Recommendation::Recommended),
            "NotRecommended" => Some(Recommendation::NotRecommended),
            "Unknown" => Some(Recommendation::Unknown),
            _ => None,
        }
    }
}

/// One review card, fully populated (missing sub-elements fall back to sentinels).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub recommendation: Recommendation,
    pub author: String,
    pub content: String,
    pub date_posted: String,
    pub playtime_text: String,
    pub helpful_count: u64,
    pub funny_count: u64,
    pub award_count: u64,
    pub comment_count: u64,
}

impl Default for ReviewRecord {
    fn default() -> Self {
        ReviewRecord {
            recommendation: Recommendation::Unknown,
            author: UNKNOWN_AUTHOR.to_string(),
            content: String::new(),
            date_posted: UNKNOWN_DATE.to_string(),
            playtime_text: UNKNOWN_PLAYTIME.to_string(),
            helpful_count: 0,
            funny_count: 0,
            award_count: 0,
            comment_count: 0,
        }
    }
}

impl ReviewRecord {
    /// Cells in `COLUMNS` order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.recommendation.as_str().to_string(),
            self.author.clone(),
            self.content.clone(),
            self.date_posted.clone(),
            self.playtime_text.clone(),
            self.helpful_count.to_string(),
            self.funny_count.to_string(),
            self.award_count.to_string(),
            self.comment_count.to_string(),
        ]
    }

    /// Inverse of `to_row`. Returns None on a malformed row.
    #[cfg(test)]
    pub fn from_row(row: &[String]) -> Option<Self> {
        if row.len() != COLUMNS.len() {
            return None;
        }
        Some(ReviewRecord {
            recommendation: Recommendation::parse(&row[0])?,
            author: row[1].clone(),
            content: row[2].clone(),
            date_posted: row[3].clone(),
            playtime_text: row[4].clone(),
            helpful_count: row[5].parse().ok()?,
            funny_count: row[6].parse().ok()?,
            award_count: row[7].parse().ok()?,
            comment_count: row[8].parse().ok()?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub recommended: usize,
    pub not_recommended: usize,
    pub unknown: usize,
}

pub fn tally(records: &[ReviewRecord]) -> Tally {
    let mut t = Tally {
        total: records.len(),
        ..Default::default()
    };
    for r in records {
        match r.recommendation {
            Recommendation::Recommended => t.recommended += 1,
            Recommendation::NotRecommended => t.not_recommended += 1,
            Recommendation::Unknown => t.unknown += 1,
        }
    }
    t
}
