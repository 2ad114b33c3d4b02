//! Platform payload construction for listings that arrive without one.

use crate::{
    platform, BbbData, FacebookData, GlassdoorData, GoogleMapsData, LinkedInData, Listing,
    OtherPlatformData, PlatformPayload, TrustpilotData, YellowPagesData, YelpData,
};

/// Builds the typed payload for a listing's platform.
///
/// Collectors that scrape platform-specific values implement this (or set
/// `Listing::payload` directly); the engine only calls it when no payload
/// was supplied.
pub trait PlatformEnricher: Send + Sync {
    fn enrich(&self, listing: &Listing) -> PlatformPayload;
}

/// Fills payloads strictly from values already present on the listing.
/// Anything the listing cannot answer stays `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingDerivedEnricher;

impl PlatformEnricher for ListingDerivedEnricher {
    fn enrich(&self, listing: &Listing) -> PlatformPayload {
        let category = non_empty(&listing.category);
        match listing.source.as_str() {
            platform::GOOGLE_MAPS => PlatformPayload::GoogleMaps(GoogleMapsData {
                maps_url: listing.profile_url.clone(),
                rating: listing.rating,
                total_reviews: listing.total_reviews,
                price_range: listing.price_range.clone(),
                photos: listing.photos_count.unwrap_or(0),
                business_status: listing.business_status,
                verification_status: None,
            }),
            platform::YELP => PlatformPayload::Yelp(YelpData {
                yelp_url: listing.profile_url.clone(),
                rating: listing.rating,
                total_reviews: listing.total_reviews,
                price_range: listing.price_range.clone(),
                categories: category.into_iter().collect(),
                features: listing.amenities.clone(),
                photos: listing.photos_count.unwrap_or(0),
                elite_reviews: None,
                claimed: None,
            }),
            platform::FACEBOOK => PlatformPayload::Facebook(FacebookData {
                page_url: listing.profile_url.clone(),
                rating: listing.rating,
                total_reviews: listing.total_reviews,
                ..Default::default()
            }),
            platform::YELLOW_PAGES => PlatformPayload::YellowPages(YellowPagesData {
                yp_url: listing.profile_url.clone(),
                description: listing.description.clone(),
                specializations: category.into_iter().collect(),
                ..Default::default()
            }),
            platform::LINKEDIN => PlatformPayload::LinkedIn(LinkedInData {
                company_url: listing.profile_url.clone(),
                industry: category.clone(),
                headquarters: headquarters(listing),
                specialties: category.into_iter().collect(),
                ..Default::default()
            }),
            platform::BBB => PlatformPayload::Bbb(BbbData {
                bbb_url: listing.profile_url.clone(),
                ..Default::default()
            }),
            platform::GLASSDOOR => PlatformPayload::Glassdoor(GlassdoorData {
                company_url: listing.profile_url.clone(),
                overall_rating: listing.has_rating().then_some(listing.rating),
                total_reviews: (listing.total_reviews > 0).then_some(listing.total_reviews),
                ..Default::default()
            }),
            platform::TRUSTPILOT => PlatformPayload::Trustpilot(TrustpilotData {
                trustpilot_url: listing.profile_url.clone(),
                trust_score: listing.has_rating().then_some(listing.rating),
                total_reviews: (listing.total_reviews > 0).then_some(listing.total_reviews),
                trust_stars: listing.has_rating().then(|| trust_stars(listing.rating).to_string()),
                ..Default::default()
            }),
            other => PlatformPayload::Other(OtherPlatformData {
                platform_id: other.to_string(),
                profile_url: listing.profile_url.clone(),
                rating: listing.rating,
                total_reviews: listing.total_reviews,
                fields: listing.extras.clone(),
            }),
        }
    }
}

/// Demo fallback: derives what it can, then fills engagement figures with
/// fixed ratios of the listing's review count. Estimates, not scraped data.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingEnricher;

impl PlatformEnricher for EstimatingEnricher {
    fn enrich(&self, listing: &Listing) -> PlatformPayload {
        let reviews = listing.total_reviews;
        match ListingDerivedEnricher.enrich(listing) {
            PlatformPayload::Yelp(mut data) => {
                data.elite_reviews.get_or_insert(reviews / 10);
                PlatformPayload::Yelp(data)
            }
            PlatformPayload::Facebook(mut data) => {
                data.likes.get_or_insert(reviews);
                data.followers.get_or_insert(reviews.saturating_mul(6) / 5);
                data.check_ins.get_or_insert(reviews / 2);
                data.total_reviews = reviews.saturating_mul(3) / 10;
                PlatformPayload::Facebook(data)
            }
            other => other,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn headquarters(listing: &Listing) -> Option<String> {
    match (non_empty(&listing.city), non_empty(&listing.state)) {
        (Some(city), Some(state)) => Some(format!("{city}, {state}")),
        (Some(city), None) => Some(city),
        (None, Some(state)) => Some(state),
        (None, None) => None,
    }
}

fn trust_stars(score: f64) -> &'static str {
    if score >= 4.5 {
        "Excellent"
    } else if score >= 4.0 {
        "Great"
    } else if score >= 3.0 {
        "Average"
    } else {
        "Poor"
    }
}
