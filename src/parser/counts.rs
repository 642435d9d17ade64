use std::sync::LazyLock;

use regex::Regex;

use super::ExtractError;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9][0-9,]*").unwrap());
static HELPFUL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9][0-9,]*)\s*(?:人觉得这篇评测有价值|(?:people|person) found this review helpful)")
        .unwrap()
});
static FUNNY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9][0-9,]*)\s*(?:人觉得这篇评测很欢乐|(?:people|person) found this review funny)")
        .unwrap()
});

/// First integer in `text`, thousands separators dropped. No digits → 0.
pub fn extract_number(text: &str) -> Result<u64, ExtractError> {
    let Some(m) = NUMBER_RE.find(text) else {
        return Ok(0);
    };
    let digits: String = m.as_str().chars().filter(|c| *c != ',').collect();
    digits
        .parse()
        .map_err(|_| ExtractError::Overflow(m.as_str().to_string()))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Votes {
    pub helpful: u64,
    pub funny: u64,
}

/// Helpful/funny counts from the "found helpful" blurb. Either sentence may be missing.
pub fn parse_votes(text: &str) -> Result<Votes, ExtractError> {
    Ok(Votes {
        helpful: count_for(&HELPFUL_RE, text)?,
        funny: count_for(&FUNNY_RE, text)?,
    })
}

fn count_for(re: &Regex, text: &str) -> Result<u64, ExtractError> {
    match re.captures(text) {
        Some(caps) => extract_number(&caps[1]),
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_with_separators() {
        assert_eq!(extract_number("1,234").unwrap(), 1234);
        assert_eq!(extract_number("  12 条评论").unwrap(), 12);
    }

    #[test]
    fn no_digits_is_zero() {
        assert_eq!(extract_number("").unwrap(), 0);
        assert_eq!(extract_number("no comments, yet").unwrap(), 0);
    }

    #[test]
    fn leading_comma_is_not_a_number() {
        assert_eq!(extract_number(", 7").unwrap(), 7);
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(extract_number("99,999,999,999,999,999,999").is_err());
    }

    #[test]
    fn helpful_only_chinese() {
        let v = parse_votes("有 5 人觉得这篇评测有价值").unwrap();
        assert_eq!(v, Votes { helpful: 5, funny: 0 });
    }

    #[test]
    fn helpful_and_funny_chinese() {
        let v = parse_votes("有 1,024 人觉得这篇评测有价值\n有 3 人觉得这篇评测很欢乐").unwrap();
        assert_eq!(v, Votes { helpful: 1024, funny: 3 });
    }

    #[test]
    fn funny_only_english() {
        let v = parse_votes("1 person found this review funny").unwrap();
        assert_eq!(v, Votes { helpful: 0, funny: 1 });
    }

    #[test]
    fn both_english() {
        let v = parse_votes("12 people found this review helpful\n2 people found this review funny").unwrap();
        assert_eq!(v, Votes { helpful: 12, funny: 2 });
    }

    #[test]
    fn unrelated_text_is_zero() {
        let v = parse_votes("No one has rated this review as helpful yet").unwrap();
        assert_eq!(v, Votes::default());
    }
}
