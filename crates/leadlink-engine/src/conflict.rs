//! Detection and reliability-weighted resolution of cross-source disagreements.

use leadlink_core::{ConflictValue, DataConflict, FieldValue, ResolvedBy};

use crate::normalize::{extract_domain, normalize_phone};
use crate::registry::PlatformRegistry;

/// One source's report for a field. `None` means the source said nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedValue {
    pub value: Option<FieldValue>,
    pub source: String,
}

impl SourcedValue {
    pub fn new(value: Option<impl Into<FieldValue>>, source: impl Into<String>) -> Self {
        Self {
            value: value.map(Into::into),
            source: source.into(),
        }
    }
}

/// Comparison key for a value of `field`. Empty keys are not comparable.
fn comparison_key(field: &str, value: &FieldValue) -> String {
    match (field, value) {
        ("phone", value) => normalize_phone(&value.to_string()),
        ("website", value) => extract_domain(&value.to_string()),
        (_, FieldValue::Number(n)) => format!("{n:.1}"),
        (_, FieldValue::Text(s)) => s.trim().to_lowercase(),
    }
}

struct Bucket {
    key: String,
    representative: FieldValue,
    sources: Vec<String>,
}

/// Groups the reported values of `field` into normalized buckets and returns a
/// conflict when at least two distinct buckets remain.
pub fn detect_conflict(field: &str, values: &[SourcedValue], registry: &PlatformRegistry) -> Option<DataConflict> {
    let mut buckets: Vec<Bucket> = Vec::new();
    for reported in values {
        let Some(value) = reported.value.as_ref().filter(|v| !v.is_empty()) else {
            continue;
        };
        let key = comparison_key(field, value);
        if key.is_empty() {
            continue;
        }
        match buckets.iter_mut().find(|b| b.key == key) {
            Some(bucket) => bucket.sources.push(reported.source.clone()),
            None => buckets.push(Bucket {
                key,
                representative: value.clone(),
                sources: vec![reported.source.clone()],
            }),
        }
    }

    if buckets.len() < 2 {
        return None;
    }

    let mut candidates: Vec<ConflictValue> = buckets
        .into_iter()
        .map(|bucket| {
            let total: f64 = bucket.sources.iter().map(|s| registry.reliability(s)).sum();
            let mean = total / bucket.sources.len() as f64;
            ConflictValue {
                value: bucket.representative,
                confidence: (mean * 100.0).round().clamp(0.0, 100.0) as u8,
                sources: bucket.sources,
            }
        })
        .collect();
    // stable: equal confidences keep first-reported order
    candidates.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    Some(DataConflict {
        field: field.to_string(),
        values: candidates,
        resolved: false,
        resolved_value: None,
        resolved_by: None,
    })
}

/// Resolves to the highest-confidence candidate; ties go to the candidate
/// reported first. Already-resolved conflicts are returned untouched.
pub fn auto_resolve_conflict(conflict: DataConflict) -> DataConflict {
    if conflict.resolved {
        return conflict;
    }
    let Some(best) = conflict.values.first().map(|c| c.value.clone()) else {
        return conflict;
    };
    DataConflict {
        resolved_value: Some(best),
        resolved_by: Some(ResolvedBy::Auto),
        resolved: true,
        ..conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str, source: &str) -> SourcedValue {
        SourcedValue::new(Some(value), source)
    }

    #[test]
    fn fewer_than_two_values_is_not_a_conflict() {
        let registry = PlatformRegistry::builtin();
        let values = vec![text("612-555-0142", "yelp"), SourcedValue::new(None::<&str>, "facebook"), text("", "google_maps")];
        assert!(detect_conflict("phone", &values, &registry).is_none());
    }

    #[test]
    fn equivalent_phones_collapse_into_one_bucket() {
        let registry = PlatformRegistry::builtin();
        let values = vec![text("(612) 555-0142", "yelp"), text("+1 612 555 0142", "facebook")];
        assert!(detect_conflict("phone", &values, &registry).is_none());
    }

    #[test]
    fn ratings_conflict_ranked_by_source_reliability() {
        let registry = PlatformRegistry::builtin();
        let values = vec![
            SourcedValue::new(Some(3.0), "facebook"),
            SourcedValue::new(Some(4.5), "google_maps"),
        ];
        let conflict = detect_conflict("rating", &values, &registry).unwrap();
        assert_eq!(conflict.field, "rating");
        assert!(!conflict.resolved);
        assert_eq!(conflict.values.len(), 2);
        assert_eq!(conflict.values[0].value, FieldValue::Number(4.5));
        assert_eq!(conflict.values[0].confidence, 95);
        assert_eq!(conflict.values[1].confidence, 80);
    }

    #[test]
    fn ratings_equal_to_one_decimal_agree() {
        let registry = PlatformRegistry::builtin();
        let values = vec![SourcedValue::new(Some(4.52), "yelp"), SourcedValue::new(Some(4.48), "google_maps")];
        assert!(detect_conflict("rating", &values, &registry).is_none());
    }

    #[test]
    fn bucket_confidence_averages_contributing_sources() {
        let registry = PlatformRegistry::builtin();
        let values = vec![
            text("Main St Bakery", "yelp"),
            text("main st bakery ", "facebook"),
            text("Main Street Bakery", "google_maps"),
        ];
        let conflict = detect_conflict("business_name", &values, &registry).unwrap();
        assert_eq!(conflict.values[0].value, FieldValue::from("Main Street Bakery"));
        assert_eq!(conflict.values[0].confidence, 95);
        assert_eq!(conflict.values[1].value, FieldValue::from("Main St Bakery"));
        assert_eq!(conflict.values[1].sources, vec!["yelp", "facebook"]);
        // (0.90 + 0.80) / 2
        assert_eq!(conflict.values[1].confidence, 85);
    }

    #[test]
    fn websites_compare_by_domain() {
        let registry = PlatformRegistry::builtin();
        let same = vec![text("https://www.bluedoor.com", "yelp"), text("bluedoor.com/menu", "google_maps")];
        assert!(detect_conflict("website", &same, &registry).is_none());
        let different = vec![text("bluedoor.com", "yelp"), text("bluedoorcafe.com", "google_maps")];
        assert!(detect_conflict("website", &different, &registry).is_some());
    }

    #[test]
    fn unknown_sources_use_default_reliability() {
        let registry = PlatformRegistry::builtin();
        let values = vec![text("a", "nextdoor"), text("b", "yelp")];
        let conflict = detect_conflict("category", &values, &registry).unwrap();
        assert_eq!(conflict.values[0].sources, vec!["yelp"]);
        assert_eq!(conflict.values[1].confidence, 50);
    }

    #[test]
    fn auto_resolve_picks_first_candidate_and_breaks_ties_by_order() {
        let registry = PlatformRegistry::builtin();
        let values = vec![text("bakery", "yelp"), text("cafe", "bbb")];
        let conflict = detect_conflict("category", &values, &registry).unwrap();
        assert_eq!(conflict.values[0].confidence, conflict.values[1].confidence);
        let resolved = auto_resolve_conflict(conflict);
        assert!(resolved.resolved);
        assert_eq!(resolved.resolved_by, Some(ResolvedBy::Auto));
        assert_eq!(resolved.resolved_value, Some(FieldValue::from("bakery")));
    }

    #[test]
    fn auto_resolve_leaves_resolved_conflicts_alone() {
        let registry = PlatformRegistry::builtin();
        let values = vec![text("bakery", "yelp"), text("cafe", "google_maps")];
        let mut conflict = detect_conflict("category", &values, &registry).unwrap();
        assert!(conflict.resolve_manual(1));
        let after = auto_resolve_conflict(conflict.clone());
        assert_eq!(after, conflict);
        assert_eq!(after.resolved_by, Some(ResolvedBy::Manual));
    }
}
