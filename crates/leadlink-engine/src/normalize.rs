//! Total normalization functions shared by matching, conflict detection and merging.
//!
//! Each function degrades to an empty string instead of failing.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

const PHONE_DIGITS: usize = 10;

const LEGAL_SUFFIXES: [&str; 5] = ["llc", "inc", "corp", "ltd", "co"];

static STREET_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(street|avenue|boulevard|drive|road|lane|court|suite|apartment)\b")
        .expect("valid regex")
});

static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9+.-]*://").expect("valid regex"));

fn street_abbreviation(word: &str) -> &'static str {
    match word {
        "street" => "st",
        "avenue" => "ave",
        "boulevard" => "blvd",
        "drive" => "dr",
        "road" => "rd",
        "lane" => "ln",
        "court" => "ct",
        "suite" => "ste",
        _ => "apt",
    }
}

/// Digits only, keeping the trailing ten.
///
/// Numbers longer than ten digits lose their leading digits, so country
/// codes are dropped and non-North-American numbers may collide.
pub fn normalize_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(PHONE_DIGITS);
    digits[start..].iter().collect()
}

fn abbreviate_street_words(text: &str) -> String {
    STREET_WORD_RE
        .replace_all(text, |caps: &regex::Captures<'_>| street_abbreviation(&caps[1]))
        .into_owned()
}

/// Lower-cased address with street words abbreviated and `.,#` removed.
///
/// Abbreviation runs again after punctuation is removed so that words joined
/// by the removal are abbreviated too and the result is a fixed point.
pub fn normalize_address(address: &str) -> String {
    let abbreviated = abbreviate_street_words(&address.to_lowercase());
    let stripped: String = abbreviated
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '#'))
        .collect();
    abbreviate_street_words(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Host of a website URL, lower-cased, without leading `www.`.
pub fn extract_domain(website: &str) -> String {
    let trimmed = website.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lowered = trimmed.to_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let host = match Url::parse(&candidate) {
        Ok(url) => url.host_str().map(str::to_lowercase),
        Err(_) => None,
    };
    match host {
        Some(host) if !host.is_empty() => strip_www(&host).to_string(),
        _ => manual_domain(&lowered),
    }
}

fn manual_domain(lowered: &str) -> String {
    let without_scheme = SCHEME_RE.replace(lowered, "");
    let host = strip_www(&without_scheme);
    host.split('/').next().unwrap_or_default().trim().to_string()
}

fn strip_www(host: &str) -> &str {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        host = rest;
    }
    host
}

/// Canonical business name for fuzzy comparison.
///
/// Trailing legal suffixes are dropped, but a name made only of a suffix
/// keeps it.
pub fn normalize_business_name(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{02bc}' | '\u{00b4}' | '`' => '\'',
            other => other,
        })
        .collect::<String>()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '\'')
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_keeps_last_ten_digits() {
        assert_eq!(normalize_phone("(612) 555-0142"), "6125550142");
        assert_eq!(normalize_phone("+1 612.555.0142"), "6125550142");
        assert_eq!(normalize_phone("+44 20 7946 0958"), "2079460958");
        assert_eq!(normalize_phone("call us"), "");
        assert_eq!(normalize_phone("555-0142"), "5550142");
    }

    #[test]
    fn address_abbreviates_street_words() {
        assert_eq!(
            normalize_address("123 Main Street, Suite #4"),
            "123 main st ste 4"
        );
        assert_eq!(normalize_address("9 Lakeshore  Drive."), "9 lakeshore dr");
        assert_eq!(normalize_address("77 Courtland Ave"), "77 courtland ave");
        assert_eq!(normalize_address(""), "");
    }

    #[test]
    fn address_abbreviates_words_attached_to_punctuation() {
        assert_eq!(normalize_address("10 Oak Ave Suite#200"), "10 oak ave ste200");
        assert_eq!(normalize_address("12 Main.Street"), "12 mainst");
        assert_eq!(normalize_address("4 Lake St.reet"), "4 lake st");
        let once = normalize_address("4 Lake St.reet, Suite#2");
        assert_eq!(normalize_address(&once), once);
    }

    #[test]
    fn domain_strips_scheme_www_and_path() {
        assert_eq!(extract_domain("https://www.BlueDoor.com/menu"), "bluedoor.com");
        assert_eq!(extract_domain("bluedoor.com"), "bluedoor.com");
        assert_eq!(extract_domain("http://shop.bluedoor.com:8080/x?y=1"), "shop.bluedoor.com");
        assert_eq!(extract_domain("   "), "");
    }

    #[test]
    fn domain_falls_back_when_url_does_not_parse() {
        assert_eq!(extract_domain("www.blue door.com/menu"), "blue door.com");
    }

    #[test]
    fn business_name_drops_legal_suffix_and_punctuation() {
        assert_eq!(normalize_business_name("Smith & Sons, LLC"), "smith and sons");
        assert_eq!(normalize_business_name("Joe\u{2019}s Pizza Co."), "joe's pizza");
        assert_eq!(normalize_business_name("Acme Corp Inc"), "acme");
        assert_eq!(normalize_business_name("Co"), "co");
        assert_eq!(normalize_business_name("A-1 Plumbing"), "a1 plumbing");
    }

    #[test]
    fn legal_words_inside_a_name_are_kept() {
        assert_eq!(normalize_business_name("Co Op Grocers"), "co op grocers");
    }
}
