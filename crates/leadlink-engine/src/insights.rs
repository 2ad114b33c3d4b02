//! Read-only observations derived from a merged cluster.

use leadlink_core::{CrossPlatformInsight, DataConflict, InsightKind, Listing, Severity};

use crate::registry::PlatformRegistry;

const RATING_SPREAD_INFO: f64 = 0.5;
const RATING_SPREAD_WARNING: f64 = 1.0;

/// Runs every rule independently; any number of them may fire.
pub fn generate_insights(
    cluster: &[&Listing],
    platforms_found: &[String],
    platform_gaps: &[String],
    conflicts: &[DataConflict],
    registry: &PlatformRegistry,
) -> Vec<CrossPlatformInsight> {
    [
        rating_inconsistency(cluster, platforms_found),
        social_only(cluster, platforms_found, registry),
        platform_gap(platform_gaps),
        data_mismatch(conflicts, platforms_found),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn rating_inconsistency(cluster: &[&Listing], platforms_found: &[String]) -> Option<CrossPlatformInsight> {
    let ratings: Vec<f64> = cluster.iter().filter(|l| l.has_rating()).map(|l| l.rating).collect();
    if ratings.len() < 2 {
        return None;
    }
    let min = ratings.iter().copied().fold(f64::INFINITY, f64::min);
    let max = ratings.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    if spread <= RATING_SPREAD_INFO {
        return None;
    }
    Some(CrossPlatformInsight {
        kind: InsightKind::RatingInconsistency,
        severity: if spread > RATING_SPREAD_WARNING {
            Severity::Warning
        } else {
            Severity::Info
        },
        description: format!("Rating varies from {min:.1} to {max:.1} across platforms"),
        recommendation: "Focus on improving ratings on lower-rated platforms".to_string(),
        affected_platforms: platforms_found.to_vec(),
    })
}

fn social_only(
    cluster: &[&Listing],
    platforms_found: &[String],
    registry: &PlatformRegistry,
) -> Option<CrossPlatformInsight> {
    let social: Vec<String> = platforms_found
        .iter()
        .filter(|p| registry.is_social(p))
        .cloned()
        .collect();
    let has_website = cluster
        .iter()
        .any(|l| l.website.as_deref().is_some_and(|w| !w.trim().is_empty()));
    if social.is_empty() || has_website {
        return None;
    }
    Some(CrossPlatformInsight {
        kind: InsightKind::SocialOnly,
        severity: Severity::Warning,
        description: "Social media presence but no dedicated website".to_string(),
        recommendation: "Build a website to own the business's digital presence".to_string(),
        affected_platforms: social,
    })
}

fn platform_gap(platform_gaps: &[String]) -> Option<CrossPlatformInsight> {
    if platform_gaps.is_empty() {
        return None;
    }
    Some(CrossPlatformInsight {
        kind: InsightKind::PlatformGap,
        severity: if platform_gaps.len() > 2 {
            Severity::Warning
        } else {
            Severity::Info
        },
        description: format!("Not found on {} major free platforms", platform_gaps.len()),
        recommendation: format!("Claim profiles on: {}", platform_gaps.join(", ")),
        affected_platforms: platform_gaps.to_vec(),
    })
}

fn data_mismatch(conflicts: &[DataConflict], platforms_found: &[String]) -> Option<CrossPlatformInsight> {
    if conflicts.is_empty() {
        return None;
    }
    Some(CrossPlatformInsight {
        kind: InsightKind::DataMismatch,
        severity: Severity::Info,
        description: format!("{} data discrepancies detected across platforms", conflicts.len()),
        recommendation: "Review and update inconsistent business information".to_string(),
        affected_platforms: platforms_found.to_vec(),
    })
}
