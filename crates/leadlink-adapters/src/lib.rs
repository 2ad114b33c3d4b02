//! Source adapter contracts that turn collector bundles into listings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadlink_core::{BusinessStatus, Coordinates, Listing, PlatformPayload};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub const CRATE_NAME: &str = "leadlink-adapters";

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("bundle for platform {found} handed to the {expected} adapter")]
    PlatformMismatch { expected: String, found: String },
}

/// Converts what one platform's collector captured into engine listings.
pub trait SourceAdapter: Send + Sync {
    fn platform_id(&self) -> &str;

    fn parse_bundle(&self, bundle: &ListingBundle) -> Result<Vec<Listing>, AdapterError>;
}

/// A batch of raw records captured from one platform in one collection pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingBundle {
    pub bundle_id: String,
    pub platform_id: String,
    pub captured_from_url: String,
    pub fetched_at: DateTime<Utc>,
    pub extractor_version: String,
    pub records: Vec<RawListingRecord>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A record as the collector saw it: text where the page showed text.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RawListingRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub business_name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    /// "lat,lng" as printed by the platform.
    #[serde(default)]
    pub coordinates_text: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    /// e.g. "4.5 stars", "Rated 9/10".
    #[serde(default)]
    pub rating_text: Option<String>,
    /// e.g. "(1,234 reviews)", "2.3k reviews".
    #[serde(default)]
    pub reviews_text: Option<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub status_text: Option<String>,
    #[serde(default)]
    pub photos_count: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub payload: Option<PlatformPayload>,
    #[serde(default)]
    pub extras: BTreeMap<String, JsonValue>,
}

pub fn load_listing_bundle(path: impl AsRef<Path>) -> Result<ListingBundle> {
    read_json_file(path)
}

/// Reads a plain JSON array of already-normalized listings.
pub fn load_listings_file(path: impl AsRef<Path>) -> Result<Vec<Listing>> {
    read_json_file(path)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

pub fn deterministic_listing_id(platform_id: &str, record: &RawListingRecord) -> String {
    let key = format!(
        "{}:{}:{}",
        platform_id,
        record.business_name.trim().to_lowercase(),
        record.address.as_deref().unwrap_or("").trim().to_lowercase()
    );
    format!("{platform_id}-{}", Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()))
}

fn text_or_none(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extract_numbers(text: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut seen_dot = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch.is_ascii_digit() {
            current.push(ch);
            continue;
        }
        // thousands separator: "1,234"
        if ch == ',' && !current.is_empty() && !seen_dot && chars.peek().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        if ch == '.' && !seen_dot && !current.is_empty() {
            current.push(ch);
            seen_dot = true;
            continue;
        }
        if !current.is_empty() {
            if let Ok(v) = current.trim_end_matches('.').parse::<f64>() {
                out.push(v);
            }
            current.clear();
            seen_dot = false;
        }
    }
    if !current.is_empty() {
        if let Ok(v) = current.trim_end_matches('.').parse::<f64>() {
            out.push(v);
        }
    }
    out
}

/// Star rating on the 0-5 scale, or `None` when the text carries none.
pub fn parse_rating(text: &str) -> Option<f64> {
    let value = extract_numbers(text).into_iter().next()?;
    let value = if text.contains("/10") { value / 2.0 } else { value };
    (0.0..=5.0)
        .contains(&value)
        .then(|| (value * 10.0).round() / 10.0)
}

pub fn parse_review_count(text: &str) -> Option<u32> {
    let lower = text.to_ascii_lowercase();
    let token = lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ')')
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;
    let multiplier = if token.ends_with('k') {
        1_000.0
    } else if token.ends_with('m') {
        1_000_000.0
    } else {
        1.0
    };
    let value = extract_numbers(token).into_iter().next()?;
    Some((value * multiplier).round() as u32)
}

pub fn parse_coordinates(text: &str) -> Option<Coordinates> {
    let (lat, lng) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)).then(|| Coordinates::new(lat, lng))
}

pub fn parse_business_status(text: &str) -> Option<BusinessStatus> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("permanently") {
        Some(BusinessStatus::ClosedPermanently)
    } else if lower.contains("temporarily") {
        Some(BusinessStatus::ClosedTemporarily)
    } else if lower.contains("open") || lower.contains("operational") {
        Some(BusinessStatus::Operational)
    } else {
        None
    }
}

/// Adapter for directory-style platforms whose collectors emit [`RawListingRecord`]s.
#[derive(Debug, Clone)]
pub struct DirectoryAdapter {
    platform_id: String,
}

impl DirectoryAdapter {
    pub fn new(platform_id: impl Into<String>) -> Self {
        Self {
            platform_id: platform_id.into(),
        }
    }

    fn record_to_listing(&self, bundle: &ListingBundle, record: &RawListingRecord) -> Listing {
        let id = text_or_none(record.id.as_deref())
            .unwrap_or_else(|| deterministic_listing_id(&self.platform_id, record));
        Listing {
            id,
            source: self.platform_id.clone(),
            business_name: record.business_name.trim().to_string(),
            category: text_or_none(record.category.as_deref()).unwrap_or_default(),
            address: text_or_none(record.address.as_deref()).unwrap_or_default(),
            city: text_or_none(record.city.as_deref()).unwrap_or_default(),
            state: text_or_none(record.state.as_deref()).unwrap_or_default(),
            country: text_or_none(record.country.as_deref()).unwrap_or_default(),
            zip_code: text_or_none(record.zip_code.as_deref()).unwrap_or_default(),
            coordinates: record.coordinates_text.as_deref().and_then(parse_coordinates),
            phone: text_or_none(record.phone.as_deref()),
            website: text_or_none(record.website.as_deref()),
            email: text_or_none(record.email.as_deref()),
            profile_url: text_or_none(record.profile_url.as_deref()),
            rating: record.rating_text.as_deref().and_then(parse_rating).unwrap_or(0.0),
            total_reviews: record.reviews_text.as_deref().and_then(parse_review_count).unwrap_or(0),
            price_range: text_or_none(record.price_range.as_deref()),
            business_status: record.status_text.as_deref().and_then(parse_business_status),
            photos_count: record.photos_count,
            description: text_or_none(record.description.as_deref()),
            amenities: record.amenities.clone(),
            scraped_at: bundle.fetched_at,
            payload: record.payload.clone(),
            extras: record.extras.clone(),
        }
    }
}

impl SourceAdapter for DirectoryAdapter {
    fn platform_id(&self) -> &str {
        &self.platform_id
    }

    fn parse_bundle(&self, bundle: &ListingBundle) -> Result<Vec<Listing>, AdapterError> {
        if bundle.platform_id != self.platform_id {
            return Err(AdapterError::PlatformMismatch {
                expected: self.platform_id.clone(),
                found: bundle.platform_id.clone(),
            });
        }
        Ok(bundle
            .records
            .iter()
            .filter(|record| !record.business_name.trim().is_empty())
            .map(|record| self.record_to_listing(bundle, record))
            .collect())
    }
}

pub fn adapter_for_platform(platform_id: &str) -> Box<dyn SourceAdapter> {
    Box::new(DirectoryAdapter::new(platform_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bundle(records: Vec<RawListingRecord>) -> ListingBundle {
        ListingBundle {
            bundle_id: "yelp-test".into(),
            platform_id: "yelp".into(),
            captured_from_url: "https://www.yelp.com/search?find_desc=bakery".into(),
            fetched_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).single().unwrap(),
            extractor_version: "test".into(),
            records,
            notes: None,
        }
    }

    #[test]
    fn numbers_with_thousands_separators() {
        assert_eq!(extract_numbers("(1,234 reviews)"), vec![1234.0]);
        assert_eq!(extract_numbers("4.5 of 5"), vec![4.5, 5.0]);
        assert_eq!(extract_numbers("open 9, 10 to 5"), vec![9.0, 10.0, 5.0]);
    }

    #[test]
    fn rating_text_variants() {
        assert_eq!(parse_rating("4.5 stars"), Some(4.5));
        assert_eq!(parse_rating("Rated 9/10"), Some(4.5));
        assert_eq!(parse_rating("4.47"), Some(4.5));
        assert_eq!(parse_rating("no rating yet"), None);
        assert_eq!(parse_rating("73 points"), None);
    }

    #[test]
    fn review_count_variants() {
        assert_eq!(parse_review_count("(1,234 reviews)"), Some(1234));
        assert_eq!(parse_review_count("2.3k reviews"), Some(2300));
        assert_eq!(parse_review_count("87"), Some(87));
        assert_eq!(parse_review_count("no reviews"), None);
    }

    #[test]
    fn coordinates_must_be_in_range() {
        assert_eq!(parse_coordinates("44.9778, -93.2650"), Some(Coordinates::new(44.9778, -93.2650)));
        assert_eq!(parse_coordinates("144.9, 10"), None);
        assert_eq!(parse_coordinates("nowhere"), None);
    }

    #[test]
    fn status_text_maps_to_business_status() {
        assert_eq!(parse_business_status("Permanently closed"), Some(BusinessStatus::ClosedPermanently));
        assert_eq!(parse_business_status("Temporarily closed"), Some(BusinessStatus::ClosedTemporarily));
        assert_eq!(parse_business_status("Open now"), Some(BusinessStatus::Operational));
        assert_eq!(parse_business_status(""), None);
    }

    #[test]
    fn parse_bundle_converts_raw_text_fields() {
        let adapter = adapter_for_platform("yelp");
        let listings = adapter
            .parse_bundle(&bundle(vec![RawListingRecord {
                business_name: "  Blue Door Cafe ".into(),
                address: Some("12 Lake Street".into()),
                phone: Some("   ".into()),
                website: Some("bluedoorcafe.com".into()),
                rating_text: Some("4.0 star rating".into()),
                reviews_text: Some("(312 reviews)".into()),
                coordinates_text: Some("44.95,-93.29".into()),
                ..Default::default()
            }]))
            .unwrap();
        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.business_name, "Blue Door Cafe");
        assert_eq!(listing.source, "yelp");
        assert!(listing.id.starts_with("yelp-"));
        assert_eq!(listing.phone, None);
        assert_eq!(listing.rating, 4.0);
        assert_eq!(listing.total_reviews, 312);
        assert!(listing.coordinates.is_some());
        assert_eq!(listing.scraped_at, bundle(vec![]).fetched_at);
    }

    #[test]
    fn deterministic_ids_are_stable_and_distinct() {
        let a = RawListingRecord {
            business_name: "Blue Door Cafe".into(),
            address: Some("12 Lake St".into()),
            ..Default::default()
        };
        let b = RawListingRecord {
            address: Some("14 Lake St".into()),
            ..a.clone()
        };
        assert_eq!(deterministic_listing_id("yelp", &a), deterministic_listing_id("yelp", &a));
        assert_ne!(deterministic_listing_id("yelp", &a), deterministic_listing_id("yelp", &b));
        assert_ne!(deterministic_listing_id("yelp", &a), deterministic_listing_id("facebook", &a));
    }

    #[test]
    fn nameless_records_are_skipped() {
        let adapter = DirectoryAdapter::new("yelp");
        let listings = adapter
            .parse_bundle(&bundle(vec![
                RawListingRecord::default(),
                RawListingRecord {
                    business_name: "Kept".into(),
                    ..Default::default()
                },
            ]))
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].business_name, "Kept");
    }

    #[test]
    fn mismatched_platform_is_rejected() {
        let adapter = DirectoryAdapter::new("facebook");
        let err = adapter.parse_bundle(&bundle(vec![])).unwrap_err();
        assert_eq!(err.to_string(), "bundle for platform yelp handed to the facebook adapter");
        let AdapterError::PlatformMismatch { expected, found } = err;
        assert_eq!((expected.as_str(), found.as_str()), ("facebook", "yelp"));
    }
}
