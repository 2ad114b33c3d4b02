//! String and geographic similarity primitives.

use leadlink_core::Coordinates;
use strsim::levenshtein;

use crate::normalize::normalize_business_name;

/// Distance reported when either side has no coordinates. Large enough that
/// no proximity band ever matches it.
pub const MISSING_DISTANCE_KM: f64 = 999.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Unit-cost insertion/deletion/substitution distance over chars.
pub fn levenshtein_edit_distance(a: &str, b: &str) -> usize {
    levenshtein(a, b)
}

/// 0..=100 similarity of two business-name-normalized strings.
pub fn fuzzy_match(left: &str, right: &str) -> u8 {
    let a = normalize_business_name(left);
    let b = normalize_business_name(right);
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a == b {
        return 100;
    }
    let distance = levenshtein_edit_distance(&a, &b) as f64;
    let longest = a.chars().count().max(b.chars().count()) as f64;
    ((1.0 - distance / longest) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Haversine great-circle distance in kilometres.
pub fn geo_distance_km(a: Option<Coordinates>, b: Option<Coordinates>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return MISSING_DISTANCE_KM;
    };
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let distance = 2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt());
    if distance.is_finite() {
        distance
    } else {
        MISSING_DISTANCE_KM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_distance_classic_cases() {
        assert_eq!(levenshtein_edit_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_edit_distance("", "abc"), 3);
        assert_eq!(levenshtein_edit_distance("abc", ""), 3);
        assert_eq!(levenshtein_edit_distance("same", "same"), 0);
    }

    #[test]
    fn fuzzy_match_short_circuits() {
        assert_eq!(fuzzy_match("Blue Door Cafe", "blue door cafe, LLC"), 100);
        assert_eq!(fuzzy_match("", ""), 0);
        assert_eq!(fuzzy_match("Blue Door", "!!!"), 0);
    }

    #[test]
    fn fuzzy_match_scales_by_longest_string() {
        // "blue door cafe" vs "blue door cafes": one insertion over 15 chars
        assert_eq!(fuzzy_match("Blue Door Cafe", "Blue Door Cafes"), 93);
        assert_eq!(fuzzy_match("abcd", "wxyz"), 0);
    }

    #[test]
    fn distance_between_nearby_points() {
        let a = Coordinates::new(44.9778, -93.2650);
        let b = Coordinates::new(44.9787, -93.2650);
        let d = geo_distance_km(Some(a), Some(b));
        assert!((d - 0.1).abs() < 0.01, "got {d}");
        assert_eq!(geo_distance_km(Some(a), Some(a)), 0.0);
    }

    #[test]
    fn missing_coordinates_are_far_away() {
        let a = Coordinates::new(44.9778, -93.2650);
        assert_eq!(geo_distance_km(Some(a), None), MISSING_DISTANCE_KM);
        assert_eq!(geo_distance_km(None, None), MISSING_DISTANCE_KM);
    }
}
