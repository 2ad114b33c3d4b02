//! Folding a cluster of same-business listings into one canonical record.

use std::collections::BTreeMap;
use std::sync::Arc;

use leadlink_core::{
    Clock, DataConflict, Email, Listing, ListingDerivedEnricher, PhoneNumber,
    PlatformEnricher, PlatformPayload, SystemClock, UnifiedBusiness, Website,
};
use tracing::debug;

use crate::conflict::{auto_resolve_conflict, detect_conflict, SourcedValue};
use crate::error::MergeError;
use crate::insights::generate_insights;
use crate::normalize::{extract_domain, normalize_phone};
use crate::registry::PlatformRegistry;

const BASE_QUALITY: i64 = 50;
const QUALITY_PER_SOURCE: i64 = 10;
const MAX_SOURCE_BONUS: i64 = 30;
const CONFLICT_PENALTY: i64 = 5;
const CONTACT_BONUS: i64 = 5;

/// Match confidence used when no matching process vouches for the cluster.
pub const DEFAULT_MATCH_CONFIDENCE: u8 = 100;

pub struct Merger {
    registry: Arc<PlatformRegistry>,
    enricher: Arc<dyn PlatformEnricher>,
    clock: Arc<dyn Clock>,
    auto_resolve: bool,
}

impl Default for Merger {
    fn default() -> Self {
        Self::new(PlatformRegistry::builtin())
    }
}

impl Merger {
    pub fn new(registry: PlatformRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            enricher: Arc::new(ListingDerivedEnricher),
            clock: Arc::new(SystemClock),
            auto_resolve: false,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn PlatformEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resolve detected conflicts to their most reliable candidate on merge.
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    pub fn merge_listings(&self, cluster: &[Listing]) -> Result<UnifiedBusiness, MergeError> {
        self.merge_with_confidence(cluster, DEFAULT_MATCH_CONFIDENCE)
    }

    pub fn merge_with_confidence(
        &self,
        cluster: &[Listing],
        match_confidence: u8,
    ) -> Result<UnifiedBusiness, MergeError> {
        let refs: Vec<&Listing> = cluster.iter().collect();
        self.merge_refs(&refs, match_confidence)
    }

    pub(crate) fn merge_refs(
        &self,
        cluster: &[&Listing],
        match_confidence: u8,
    ) -> Result<UnifiedBusiness, MergeError> {
        let Some((seed, rest)) = cluster.split_first() else {
            return Err(MergeError::EmptyCluster);
        };
        Ok(self.merge_seeded(seed, rest, match_confidence))
    }

    /// Merges `seed` and `rest` in that order. Non-empty by construction.
    pub(crate) fn merge_seeded(&self, seed: &Listing, rest: &[&Listing], match_confidence: u8) -> UnifiedBusiness {
        let cluster: Vec<&Listing> = std::iter::once(seed).chain(rest.iter().copied()).collect();
        let cluster = cluster.as_slice();
        let mut ordered: Vec<&Listing> = cluster.to_vec();
        // stable: equally reliable sources keep cluster order
        ordered.sort_by(|a, b| {
            self.registry
                .reliability(&b.source)
                .total_cmp(&self.registry.reliability(&a.source))
        });
        let primary = ordered.first().copied().unwrap_or(seed);

        let mut aliases: Vec<String> = Vec::new();
        for listing in cluster {
            if listing.business_name != primary.business_name && !aliases.contains(&listing.business_name) {
                aliases.push(listing.business_name.clone());
            }
        }

        let phones: Vec<PhoneNumber> = group_contacts(
            ordered.iter().filter_map(|l| l.phone.as_deref().map(|p| (p, l.source.as_str()))),
            normalize_phone,
        )
        .into_iter()
        .map(|g| PhoneNumber {
            verified: g.verified(),
            number: g.value,
            sources: g.sources,
        })
        .collect();
        let websites: Vec<Website> = group_contacts(
            ordered.iter().filter_map(|l| l.website.as_deref().map(|w| (w, l.source.as_str()))),
            extract_domain,
        )
        .into_iter()
        .map(|g| Website {
            verified: g.verified(),
            url: g.value,
            sources: g.sources,
        })
        .collect();
        let emails: Vec<Email> = group_contacts(
            ordered.iter().filter_map(|l| l.email.as_deref().map(|e| (e, l.source.as_str()))),
            |e: &str| e.trim().to_lowercase(),
        )
        .into_iter()
        .map(|g| Email {
            verified: g.verified(),
            address: g.value,
            sources: g.sources,
        })
        .collect();

        let mut platforms: BTreeMap<String, PlatformPayload> = BTreeMap::new();
        for listing in &ordered {
            platforms
                .entry(listing.source.clone())
                .or_insert_with(|| listing.payload.clone().unwrap_or_else(|| self.enricher.enrich(listing)));
        }

        let ratings: Vec<f64> = cluster.iter().filter(|l| l.has_rating()).map(|l| l.rating).collect();
        let aggregated_rating = if ratings.is_empty() {
            primary.rating
        } else {
            round_one_decimal(ratings.iter().sum::<f64>() / ratings.len() as f64)
        };
        let total_reviews_all_platforms = cluster
            .iter()
            .fold(0u32, |sum, l| sum.saturating_add(l.total_reviews));

        let mut platforms_found: Vec<String> = Vec::new();
        for listing in cluster {
            if !platforms_found.contains(&listing.source) {
                platforms_found.push(listing.source.clone());
            }
        }

        let conflicts = self.detect_conflicts(cluster);

        let platform_gaps: Vec<String> = self
            .registry
            .baseline_platforms()
            .into_iter()
            .filter(|id| !platforms_found.iter().any(|p| p == id))
            .map(str::to_string)
            .collect();

        let insights = generate_insights(cluster, &platforms_found, &platform_gaps, &conflicts, &self.registry);
        let data_quality = data_quality(cluster, platforms_found.len(), conflicts.len());

        debug!(
            primary = %primary.id,
            listings = cluster.len(),
            platforms = platforms_found.len(),
            conflicts = conflicts.len(),
            "merged cluster"
        );

        UnifiedBusiness {
            id: format!("unified-{}", primary.id),
            business_name: primary.business_name.clone(),
            category: primary.category.clone(),
            address: primary.address.clone(),
            city: primary.city.clone(),
            state: primary.state.clone(),
            country: primary.country.clone(),
            zip_code: primary.zip_code.clone(),
            coordinates: primary.coordinates,
            phone: phones.first().map(|p| p.number.clone()).or_else(|| primary.phone.clone()),
            website: websites.first().map(|w| w.url.clone()).or_else(|| primary.website.clone()),
            email: emails.first().map(|e| e.address.clone()).or_else(|| primary.email.clone()),
            profile_url: primary.profile_url.clone(),
            rating: aggregated_rating,
            total_reviews: total_reviews_all_platforms,
            price_range: primary.price_range.clone(),
            business_status: primary.business_status,
            description: primary.description.clone(),
            photos_count: primary.photos_count,
            amenities: primary.amenities.clone(),
            scraped_at: primary.scraped_at,
            extras: primary.extras.clone(),
            source: primary.source.clone(),
            aliases,
            phones,
            websites,
            emails,
            platforms,
            aggregated_rating,
            total_reviews_all_platforms,
            platform_count: platforms_found.len(),
            platforms_found,
            platform_gaps,
            insights,
            conflicts,
            data_quality,
            match_confidence: match_confidence.min(100),
            merged_listing_ids: cluster.iter().map(|l| l.id.clone()).collect(),
            last_updated: self.clock.now(),
        }
    }

    fn detect_conflicts(&self, cluster: &[&Listing]) -> Vec<DataConflict> {
        let phone: Vec<SourcedValue> = cluster
            .iter()
            .map(|l| SourcedValue::new(l.phone.clone(), l.source.clone()))
            .collect();
        // 0.0 is "no rating", not a competing value
        let rating: Vec<SourcedValue> = cluster
            .iter()
            .map(|l| SourcedValue::new(l.has_rating().then_some(l.rating), l.source.clone()))
            .collect();
        let website: Vec<SourcedValue> = cluster
            .iter()
            .map(|l| SourcedValue::new(l.website.clone(), l.source.clone()))
            .collect();

        [("phone", phone), ("rating", rating), ("website", website)]
            .into_iter()
            .filter_map(|(field, values)| detect_conflict(field, &values, &self.registry))
            .map(|conflict| {
                if self.auto_resolve {
                    auto_resolve_conflict(conflict)
                } else {
                    conflict
                }
            })
            .collect()
    }
}

/// Merges with the builtin registry and default enrichment.
pub fn merge_listings(cluster: &[Listing]) -> Result<UnifiedBusiness, MergeError> {
    Merger::default().merge_listings(cluster)
}

struct ContactGroup {
    value: String,
    sources: Vec<String>,
}

impl ContactGroup {
    fn verified(&self) -> bool {
        self.sources.len() >= 2
    }
}

/// Buckets contact values by normalized key, most-corroborated first.
fn group_contacts<'a>(
    entries: impl Iterator<Item = (&'a str, &'a str)>,
    key: impl Fn(&str) -> String,
) -> Vec<ContactGroup> {
    let mut keyed: Vec<(String, ContactGroup)> = Vec::new();
    for (value, source) in entries {
        let k = key(value);
        if k.is_empty() {
            continue;
        }
        match keyed.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, group)) => {
                if !group.sources.iter().any(|s| s == source) {
                    group.sources.push(source.to_string());
                }
            }
            None => keyed.push((
                k,
                ContactGroup {
                    value: value.trim().to_string(),
                    sources: vec![source.to_string()],
                },
            )),
        }
    }
    let mut groups: Vec<ContactGroup> = keyed.into_iter().map(|(_, g)| g).collect();
    groups.sort_by(|a, b| b.sources.len().cmp(&a.sources.len()));
    groups
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn data_quality(cluster: &[&Listing], source_count: usize, conflict_count: usize) -> u8 {
    let has = |field: fn(&Listing) -> Option<&str>| {
        cluster
            .iter()
            .any(|l| field(l).is_some_and(|v| !v.trim().is_empty()))
    };
    let mut score = BASE_QUALITY;
    score += (source_count as i64 * QUALITY_PER_SOURCE).min(MAX_SOURCE_BONUS);
    score -= conflict_count as i64 * CONFLICT_PENALTY;
    for present in [
        has(|l| l.website.as_deref()),
        has(|l| l.email.as_deref()),
        has(|l| l.phone.as_deref()),
    ] {
        if present {
            score += CONTACT_BONUS;
        }
    }
    score.clamp(0, 100) as u8
}
