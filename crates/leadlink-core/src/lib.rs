//! Core domain model for cross-platform business listing linkage.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

mod clock;
mod enrich;

pub use clock::{Clock, FixedClock, SystemClock};
pub use enrich::{EstimatingEnricher, ListingDerivedEnricher, PlatformEnricher};

pub const CRATE_NAME: &str = "leadlink-core";

/// Stable identifiers of the platforms the engine knows payload shapes for.
pub mod platform {
    pub const GOOGLE_MAPS: &str = "google_maps";
    pub const YELP: &str = "yelp";
    pub const FACEBOOK: &str = "facebook";
    pub const YELLOW_PAGES: &str = "yellow_pages";
    pub const LINKEDIN: &str = "linkedin";
    pub const BBB: &str = "bbb";
    pub const GLASSDOOR: &str = "glassdoor";
    pub const TRUSTPILOT: &str = "trustpilot";
    pub const INSTAGRAM: &str = "instagram";
    pub const TRIPADVISOR: &str = "tripadvisor";
    pub const INDEED: &str = "indeed";
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessStatus {
    #[default]
    Operational,
    ClosedTemporarily,
    ClosedPermanently,
}

/// One business record as reported by a single source platform.
///
/// Listings are produced by collectors and are read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Listing {
    pub id: String,
    pub source: String,
    pub business_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Listing page on the source platform.
    #[serde(default)]
    pub profile_url: Option<String>,
    /// 0.0 means the source reported no rating.
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub business_status: Option<BusinessStatus>,
    #[serde(default)]
    pub photos_count: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub scraped_at: DateTime<Utc>,
    /// Platform payload supplied by the collector, if it scraped one.
    #[serde(default)]
    pub payload: Option<PlatformPayload>,
    /// Source-specific fields the engine carries but never interprets.
    #[serde(default)]
    pub extras: BTreeMap<String, JsonValue>,
}

impl Listing {
    pub fn new(id: impl Into<String>, source: impl Into<String>, business_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            business_name: business_name.into(),
            ..Default::default()
        }
    }

    pub fn has_rating(&self) -> bool {
        self.rating > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MatchBreakdown {
    pub name: u32,
    pub address: u32,
    pub phone: u32,
    pub proximity: u32,
    pub website: u32,
}

impl MatchBreakdown {
    pub fn total(&self) -> u32 {
        self.name + self.address + self.phone + self.proximity + self.website
    }
}

/// Outcome of comparing two listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub listing_a: String,
    pub listing_b: String,
    pub score: u32,
    pub breakdown: MatchBreakdown,
    pub is_match: bool,
    pub needs_review: bool,
}

/// A raw field value as one source reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Number(n) => n.is_nan(),
            FieldValue::Text(s) => s.trim().is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

/// One normalized bucket of agreeing values inside a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictValue {
    /// First raw value seen for this bucket.
    pub value: FieldValue,
    pub sources: Vec<String>,
    /// Mean reliability of `sources`, scaled to 0..=100.
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedBy {
    Auto,
    Manual,
}

/// Disagreement among sources about one field of one merged business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConflict {
    pub field: String,
    /// Sorted by descending confidence; equal confidences keep insertion order.
    pub values: Vec<ConflictValue>,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_value: Option<FieldValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<ResolvedBy>,
}

impl DataConflict {
    /// Pick candidate `index` by hand. Returns `false` when the index is out of range.
    pub fn resolve_manual(&mut self, index: usize) -> bool {
        let Some(choice) = self.values.get(index) else {
            return false;
        };
        self.resolved_value = Some(choice.value.clone());
        self.resolved_by = Some(ResolvedBy::Manual);
        self.resolved = true;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: String,
    pub verified: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Website {
    pub url: String,
    pub verified: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
    pub verified: bool,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    RatingInconsistency,
    SocialOnly,
    PlatformGap,
    DataMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossPlatformInsight {
    pub kind: InsightKind,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
    pub affected_platforms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Growing,
    Stable,
    Shrinking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GoogleMapsData {
    pub maps_url: Option<String>,
    pub rating: f64,
    pub total_reviews: u32,
    pub price_range: Option<String>,
    pub photos: u32,
    pub business_status: Option<BusinessStatus>,
    pub verification_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct YelpData {
    pub yelp_url: Option<String>,
    pub rating: f64,
    pub total_reviews: u32,
    pub price_range: Option<String>,
    pub categories: Vec<String>,
    pub features: Vec<String>,
    pub photos: u32,
    pub elite_reviews: Option<u32>,
    pub claimed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FacebookData {
    pub page_url: Option<String>,
    pub rating: f64,
    pub total_reviews: u32,
    pub likes: Option<u32>,
    pub followers: Option<u32>,
    pub check_ins: Option<u32>,
    pub response_rate: Option<u8>,
    pub response_time: Option<String>,
    pub has_messenger: Option<bool>,
    pub verified_page: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct YellowPagesData {
    pub yp_url: Option<String>,
    pub years_in_business: Option<u32>,
    pub accredited: Option<bool>,
    pub description: Option<String>,
    pub specializations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LinkedInData {
    pub company_url: Option<String>,
    pub industry: Option<String>,
    pub headquarters: Option<String>,
    pub specialties: Vec<String>,
    pub employee_count: Option<String>,
    pub followers: Option<u32>,
    pub recent_job_postings: Option<u32>,
    pub employee_growth: Option<Trend>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BbbData {
    pub bbb_url: Option<String>,
    pub accredited: Option<bool>,
    pub rating_grade: Option<String>,
    pub years_in_business: Option<u32>,
    pub complaints_total: Option<u32>,
    pub complaints_last_year: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GlassdoorData {
    pub company_url: Option<String>,
    pub overall_rating: Option<f64>,
    pub total_reviews: Option<u32>,
    pub ceo_approval: Option<u8>,
    pub job_openings: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TrustpilotData {
    pub trustpilot_url: Option<String>,
    pub trust_score: Option<f64>,
    pub total_reviews: Option<u32>,
    pub trust_stars: Option<String>,
    pub claimed_profile: Option<bool>,
}

/// Payload for a platform without a dedicated shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OtherPlatformData {
    pub platform_id: String,
    pub profile_url: Option<String>,
    pub rating: f64,
    pub total_reviews: u32,
    #[serde(default)]
    pub fields: BTreeMap<String, JsonValue>,
}

/// Typed platform-specific data attached to a merged business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformPayload {
    GoogleMaps(GoogleMapsData),
    Yelp(YelpData),
    Facebook(FacebookData),
    YellowPages(YellowPagesData),
    #[serde(rename = "linkedin")]
    LinkedIn(LinkedInData),
    Bbb(BbbData),
    Glassdoor(GlassdoorData),
    Trustpilot(TrustpilotData),
    Other(OtherPlatformData),
}

impl PlatformPayload {
    pub fn platform_id(&self) -> &str {
        match self {
            PlatformPayload::GoogleMaps(_) => platform::GOOGLE_MAPS,
            PlatformPayload::Yelp(_) => platform::YELP,
            PlatformPayload::Facebook(_) => platform::FACEBOOK,
            PlatformPayload::YellowPages(_) => platform::YELLOW_PAGES,
            PlatformPayload::LinkedIn(_) => platform::LINKEDIN,
            PlatformPayload::Bbb(_) => platform::BBB,
            PlatformPayload::Glassdoor(_) => platform::GLASSDOOR,
            PlatformPayload::Trustpilot(_) => platform::TRUSTPILOT,
            PlatformPayload::Other(data) => &data.platform_id,
        }
    }
}

/// Canonical merged record for one real-world business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedBusiness {
    pub id: String,
    pub business_name: String,
    pub category: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip_code: String,
    pub coordinates: Option<Coordinates>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub profile_url: Option<String>,
    pub rating: f64,
    pub total_reviews: u32,
    pub price_range: Option<String>,
    pub business_status: Option<BusinessStatus>,
    pub description: Option<String>,
    pub photos_count: Option<u32>,
    pub amenities: Vec<String>,
    /// Collection time of the primary listing.
    pub scraped_at: DateTime<Utc>,
    /// Source-specific fields of the primary listing, carried uninterpreted.
    pub extras: BTreeMap<String, JsonValue>,
    /// Platform of the listing that seeded the scalar fields.
    pub source: String,
    pub aliases: Vec<String>,
    pub phones: Vec<PhoneNumber>,
    pub websites: Vec<Website>,
    pub emails: Vec<Email>,
    pub platforms: BTreeMap<String, PlatformPayload>,
    pub aggregated_rating: f64,
    pub total_reviews_all_platforms: u32,
    pub platform_count: usize,
    pub platforms_found: Vec<String>,
    pub platform_gaps: Vec<String>,
    pub insights: Vec<CrossPlatformInsight>,
    pub conflicts: Vec<DataConflict>,
    pub data_quality: u8,
    pub match_confidence: u8,
    /// Ids of the listings folded into this record.
    pub merged_listing_ids: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DedupStats {
    /// Non-seed listings absorbed into a cluster.
    pub matched: usize,
    /// Number of unified records produced.
    pub unique: usize,
    pub conflicts: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_value_emptiness() {
        assert!(FieldValue::from("  ").is_empty());
        assert!(FieldValue::Number(f64::NAN).is_empty());
        assert!(!FieldValue::from(0.0).is_empty());
        assert!(!FieldValue::from("x").is_empty());
    }

    #[test]
    fn resolve_manual_picks_requested_candidate() {
        let mut conflict = DataConflict {
            field: "phone".into(),
            values: vec![
                ConflictValue { value: "555-0100".into(), sources: vec!["yelp".into()], confidence: 90 },
                ConflictValue { value: "555-0199".into(), sources: vec!["facebook".into()], confidence: 80 },
            ],
            resolved: false,
            resolved_value: None,
            resolved_by: None,
        };
        assert!(!conflict.resolve_manual(5));
        assert!(!conflict.resolved);
        assert!(conflict.resolve_manual(1));
        assert_eq!(conflict.resolved_value, Some(FieldValue::from("555-0199")));
        assert_eq!(conflict.resolved_by, Some(ResolvedBy::Manual));
    }

    #[test]
    fn payload_serializes_with_kind_tag() {
        let payload = PlatformPayload::LinkedIn(LinkedInData {
            industry: Some("Bakery".into()),
            ..Default::default()
        });
        let json = serde_json::to_value(&payload).expect("serialize payload");
        assert_eq!(json["kind"], "linkedin");
        let back: PlatformPayload = serde_json::from_value(json).expect("deserialize payload");
        assert_eq!(back.platform_id(), platform::LINKEDIN);
    }

    #[test]
    fn listing_deserializes_with_sparse_fields() {
        let listing: Listing = serde_json::from_str(
            r#"{"id":"a1","source":"yelp","business_name":"Blue Door Cafe","rating":4.5}"#,
        )
        .expect("sparse listing");
        assert_eq!(listing.total_reviews, 0);
        assert!(listing.coordinates.is_none());
        assert!(listing.has_rating());
    }
}
