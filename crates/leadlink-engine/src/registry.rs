//! Platform registry: per-platform reliability and baseline membership.

use std::collections::HashSet;
use std::path::Path;

use leadlink_core::platform;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;

/// Reliability assumed for platforms the registry does not know.
pub const DEFAULT_RELIABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTier {
    Free,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub platform_id: String,
    pub display_name: String,
    pub reliability: f64,
    pub tier: PlatformTier,
    #[serde(default)]
    pub social: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformRegistry {
    pub platforms: Vec<PlatformConfig>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformRegistry {
    pub fn builtin() -> Self {
        let entry = |id: &str, name: &str, reliability: f64, tier: PlatformTier, social: bool| PlatformConfig {
            platform_id: id.to_string(),
            display_name: name.to_string(),
            reliability,
            tier,
            social,
            enabled: true,
            notes: None,
        };
        Self {
            platforms: vec![
                entry(platform::GOOGLE_MAPS, "Google Maps", 0.95, PlatformTier::Free, false),
                entry(platform::YELP, "Yelp", 0.90, PlatformTier::Free, false),
                entry(platform::FACEBOOK, "Facebook Pages", 0.80, PlatformTier::Free, true),
                entry(platform::YELLOW_PAGES, "Yellow Pages", 0.85, PlatformTier::Free, false),
                entry(platform::LINKEDIN, "LinkedIn", 0.85, PlatformTier::Premium, false),
                entry(platform::BBB, "Better Business Bureau", 0.90, PlatformTier::Premium, false),
                entry(platform::TRIPADVISOR, "TripAdvisor", 0.85, PlatformTier::Premium, false),
                entry(platform::TRUSTPILOT, "Trustpilot", 0.80, PlatformTier::Premium, false),
                entry(platform::GLASSDOOR, "Glassdoor", 0.75, PlatformTier::Premium, false),
                entry(platform::INDEED, "Indeed Companies", 0.75, PlatformTier::Premium, false),
                entry(platform::INSTAGRAM, "Instagram Business", 0.70, PlatformTier::Premium, true),
            ],
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, RegistryError> {
        let registry: Self = serde_yaml::from_str(text)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut seen = HashSet::new();
        for platform in &self.platforms {
            if !(0.0..=1.0).contains(&platform.reliability) {
                return Err(RegistryError::InvalidReliability {
                    platform_id: platform.platform_id.clone(),
                    reliability: platform.reliability,
                });
            }
            if !seen.insert(platform.platform_id.as_str()) {
                return Err(RegistryError::DuplicatePlatform(platform.platform_id.clone()));
            }
        }
        Ok(())
    }

    pub fn get(&self, platform_id: &str) -> Option<&PlatformConfig> {
        self.platforms.iter().find(|p| p.platform_id == platform_id)
    }

    pub fn reliability(&self, platform_id: &str) -> f64 {
        match self.get(platform_id) {
            Some(platform) => platform.reliability,
            None => {
                debug!(platform_id, "unknown platform, using default reliability");
                DEFAULT_RELIABILITY
            }
        }
    }

    /// Free-tier platforms every business is expected to appear on.
    pub fn baseline_platforms(&self) -> Vec<&str> {
        self.platforms
            .iter()
            .filter(|p| p.tier == PlatformTier::Free)
            .map(|p| p.platform_id.as_str())
            .collect()
    }

    pub fn is_social(&self, platform_id: &str) -> bool {
        self.get(platform_id).is_some_and(|p| p.social)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &PlatformConfig> {
        self.platforms.iter().filter(|p| p.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_is_valid() {
        let registry = PlatformRegistry::builtin();
        registry.validate().unwrap();
        assert_eq!(
            registry.baseline_platforms(),
            vec!["google_maps", "yelp", "facebook", "yellow_pages"]
        );
        assert!(registry.is_social("facebook"));
        assert!(!registry.is_social("yelp"));
    }

    #[test]
    fn unknown_platform_gets_neutral_reliability() {
        let registry = PlatformRegistry::builtin();
        assert_eq!(registry.reliability("google_maps"), 0.95);
        assert_eq!(registry.reliability("nextdoor"), DEFAULT_RELIABILITY);
    }

    #[test]
    fn yaml_registry_parses_with_defaults() {
        let registry = PlatformRegistry::from_yaml_str(
            r#"
platforms:
  - platform_id: google_maps
    display_name: Google Maps
    reliability: 0.9
    tier: free
  - platform_id: instagram
    display_name: Instagram
    reliability: 0.6
    tier: premium
    social: true
    enabled: false
"#,
        )
        .unwrap();
        assert_eq!(registry.platforms.len(), 2);
        assert!(registry.platforms[0].enabled);
        assert_eq!(registry.enabled().count(), 1);
        assert_eq!(registry.baseline_platforms(), vec!["google_maps"]);
    }

    #[test]
    fn out_of_range_reliability_is_rejected() {
        let err = PlatformRegistry::from_yaml_str(
            "platforms:\n  - platform_id: yelp\n    display_name: Yelp\n    reliability: 1.5\n    tier: free\n",
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidReliability { .. }));
    }

    #[test]
    fn duplicate_platforms_are_rejected() {
        let mut registry = PlatformRegistry::builtin();
        registry.platforms.push(registry.platforms[0].clone());
        assert!(matches!(
            registry.validate(),
            Err(RegistryError::DuplicatePlatform(id)) if id == "google_maps"
        ));
    }
}
