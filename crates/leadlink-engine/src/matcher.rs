//! Weighted multi-factor match scoring between two listings.

use leadlink_core::{Listing, MatchBreakdown, MatchResult};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::{extract_domain, normalize_address, normalize_phone};
use crate::similarity::{fuzzy_match, geo_distance_km};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    /// Multiplier applied to the 0-100 name similarity.
    pub name_factor: f64,
    pub address_exact: u32,
    pub address_fuzzy: u32,
    /// Address similarity must be strictly above this to earn `address_fuzzy`.
    pub address_fuzzy_min_similarity: u8,
    pub phone: u32,
    pub proximity_near: u32,
    pub proximity_near_km: f64,
    pub proximity_close: u32,
    pub proximity_close_km: f64,
    pub website: u32,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            name_factor: 0.4,
            address_exact: 30,
            address_fuzzy: 20,
            address_fuzzy_min_similarity: 80,
            phone: 15,
            proximity_near: 10,
            proximity_near_km: 0.1,
            proximity_close: 5,
            proximity_close_km: 0.5,
            website: 5,
        }
    }
}

impl MatchWeights {
    /// Highest total these weights can award, widened so oversized weights
    /// are reported instead of wrapping.
    pub fn max_score(&self) -> u64 {
        (100.0 * self.name_factor).round() as u64
            + u64::from(self.address_exact.max(self.address_fuzzy))
            + u64::from(self.phone)
            + u64::from(self.proximity_near.max(self.proximity_close))
            + u64::from(self.website)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    pub weights: MatchWeights,
    pub match_threshold: u32,
    pub review_threshold: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            weights: MatchWeights::default(),
            match_threshold: 80,
            review_threshold: 60,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factor = self.weights.name_factor;
        if !factor.is_finite() || !(0.0..=1.0).contains(&factor) {
            return Err(ConfigError::InvalidNameFactor(factor));
        }
        let max = self.weights.max_score();
        if max > 100 {
            return Err(ConfigError::ScoreOverflow(max));
        }
        if self.review_threshold > self.match_threshold {
            return Err(ConfigError::ThresholdOrder {
                review: self.review_threshold,
                matched: self.match_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatchConfig,
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn score(&self, a: &Listing, b: &Listing) -> MatchResult {
        let w = &self.config.weights;

        let name = (f64::from(fuzzy_match(&a.business_name, &b.business_name)) * w.name_factor).round() as u32;

        let addr_a = normalize_address(&a.address);
        let addr_b = normalize_address(&b.address);
        let address = if !addr_a.is_empty() && addr_a == addr_b {
            w.address_exact
        } else if fuzzy_match(&addr_a, &addr_b) > w.address_fuzzy_min_similarity {
            w.address_fuzzy
        } else {
            0
        };

        let phone_a = normalize_phone(a.phone.as_deref().unwrap_or_default());
        let phone_b = normalize_phone(b.phone.as_deref().unwrap_or_default());
        let phone = if !phone_a.is_empty() && phone_a == phone_b { w.phone } else { 0 };

        let distance = geo_distance_km(a.coordinates, b.coordinates);
        let proximity = if distance < w.proximity_near_km {
            w.proximity_near
        } else if distance < w.proximity_close_km {
            w.proximity_close
        } else {
            0
        };

        let domain_a = extract_domain(a.website.as_deref().unwrap_or_default());
        let domain_b = extract_domain(b.website.as_deref().unwrap_or_default());
        let website = if !domain_a.is_empty() && domain_a == domain_b { w.website } else { 0 };

        let breakdown = MatchBreakdown {
            name,
            address,
            phone,
            proximity,
            website,
        };
        let score = breakdown.total();
        let (is_match, needs_review) = self.classify(score);
        MatchResult {
            listing_a: a.id.clone(),
            listing_b: b.id.clone(),
            score,
            breakdown,
            is_match,
            needs_review,
        }
    }

    /// `(is_match, needs_review)`; never both true.
    pub fn classify(&self, score: u32) -> (bool, bool) {
        let is_match = score >= self.config.match_threshold;
        let needs_review = !is_match && score >= self.config.review_threshold;
        (is_match, needs_review)
    }
}

/// Scores a pair with the default weights and thresholds.
pub fn calculate_match_score(a: &Listing, b: &Listing) -> MatchResult {
    Matcher::default().score(a, b)
}
