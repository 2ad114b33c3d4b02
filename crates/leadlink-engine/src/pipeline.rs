//! Batch linkage run: load collector bundles, deduplicate, write reports.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadlink_adapters::{adapter_for_platform, ListingBundle};
use leadlink_core::{Clock, Listing, ListingDerivedEnricher, PlatformEnricher, SystemClock, UnifiedBusiness};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dedup::{ClusterStrategy, DedupConfig, DedupEngine, DedupOutcome};
use crate::error::ConfigError;
use crate::matcher::Matcher;
use crate::merge::Merger;
use crate::registry::PlatformRegistry;

pub const REGISTRY_FILE: &str = "platforms.yaml";
const LOWEST_QUALITY_IN_BRIEF: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub workspace_root: PathBuf,
    pub reports_dir: PathBuf,
    pub dedup: DedupConfig,
}

impl PipelineConfig {
    pub fn for_workspace(root: impl Into<PathBuf>) -> Self {
        let workspace_root = root.into();
        Self {
            reports_dir: workspace_root.join("reports"),
            workspace_root,
            dedup: DedupConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let workspace_root = var("LEADLINK_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let reports_dir = var("LEADLINK_REPORTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace_root.join("reports"));
        let strategy = match var("LEADLINK_CLUSTER_STRATEGY") {
            Some(value) => value.parse::<ClusterStrategy>()?,
            None => ClusterStrategy::default(),
        };
        let flag = |key: &str| {
            var(key)
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(false)
        };
        Ok(Self {
            workspace_root,
            reports_dir,
            dedup: DedupConfig {
                strategy,
                parallel_scoring: flag("LEADLINK_PARALLEL"),
                auto_resolve_conflicts: flag("LEADLINK_AUTO_RESOLVE"),
            },
        })
    }

    pub fn fixture_path(&self, platform_id: &str) -> PathBuf {
        self.workspace_root
            .join("fixtures")
            .join(platform_id)
            .join("listings.json")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkageRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub enabled_platforms: usize,
    pub loaded_platforms: usize,
    pub listings: usize,
    pub unified: usize,
    pub matched: usize,
    pub conflicts: usize,
    pub review_items: usize,
    pub reports_dir: String,
    pub manifest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifest {
    pub schema_version: u32,
    pub run_id: Uuid,
    pub files: Vec<ReportManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub struct LinkagePipeline {
    config: PipelineConfig,
    matcher: Matcher,
    enricher: Arc<dyn PlatformEnricher>,
    clock: Arc<dyn Clock>,
}

impl LinkagePipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            matcher: Matcher::default(),
            enricher: Arc::new(ListingDerivedEnricher),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn PlatformEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the workspace registry, or the builtin one when the file is absent.
    pub async fn load_registry(&self) -> Result<PlatformRegistry> {
        let path = self.config.workspace_root.join(REGISTRY_FILE);
        match fs::read_to_string(&path).await {
            Ok(text) => PlatformRegistry::from_yaml_str(&text)
                .with_context(|| format!("parsing {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(path = %path.display(), "platform registry not found, using builtin registry");
                Ok(PlatformRegistry::builtin())
            }
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    pub fn engine(&self, registry: PlatformRegistry) -> DedupEngine {
        let merger = Merger::new(registry)
            .with_enricher(Arc::clone(&self.enricher))
            .with_clock(Arc::clone(&self.clock));
        DedupEngine::new(self.matcher.clone(), merger, self.config.dedup)
    }

    pub async fn run_once(&self) -> Result<LinkageRunSummary> {
        let started_at = self.clock.now();
        let run_id = Uuid::new_v4();
        let registry = self.load_registry().await?;
        let enabled: Vec<String> = registry.enabled().map(|p| p.platform_id.clone()).collect();

        let mut listings: Vec<Listing> = Vec::new();
        let mut loaded_platforms = 0usize;
        for platform_id in &enabled {
            let path = self.config.fixture_path(platform_id);
            if !fs::try_exists(&path)
                .await
                .with_context(|| format!("checking {}", path.display()))?
            {
                debug!(platform_id = %platform_id, "no fixture bundle for platform");
                continue;
            }
            let text = fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let bundle: ListingBundle =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            let parsed = adapter_for_platform(platform_id)
                .parse_bundle(&bundle)
                .with_context(|| format!("adapting {}", path.display()))?;
            debug!(platform_id = %platform_id, listings = parsed.len(), "loaded bundle");
            listings.extend(parsed);
            loaded_platforms += 1;
        }

        let outcome = self.engine(registry).deduplicate(&listings);
        let finished_at = self.clock.now();

        let reports_dir = self.config.reports_dir.join(run_id.to_string());
        let manifest_path = write_reports(&reports_dir, run_id, started_at, finished_at, &listings, &outcome).await?;

        info!(
            run_id = %run_id,
            listings = listings.len(),
            unified = outcome.unified.len(),
            reports = %reports_dir.display(),
            "linkage run complete"
        );

        Ok(LinkageRunSummary {
            run_id,
            started_at,
            finished_at,
            enabled_platforms: enabled.len(),
            loaded_platforms,
            listings: listings.len(),
            unified: outcome.stats.unique,
            matched: outcome.stats.matched,
            conflicts: outcome.stats.conflicts,
            review_items: outcome.review_queue.len(),
            reports_dir: reports_dir.display().to_string(),
            manifest: manifest_path.display().to_string(),
        })
    }
}

async fn write_reports(
    reports_dir: &Path,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    listings: &[Listing],
    outcome: &DedupOutcome,
) -> Result<PathBuf> {
    fs::create_dir_all(reports_dir)
        .await
        .with_context(|| format!("creating {}", reports_dir.display()))?;

    let unified = serde_json::to_vec_pretty(&serde_json::json!({
        "run_id": run_id,
        "stats": outcome.stats,
        "businesses": outcome.unified,
    }))
    .context("serializing unified businesses")?;
    let review = serde_json::to_vec_pretty(&outcome.review_queue).context("serializing review queue")?;
    let brief = linkage_brief(run_id, started_at, finished_at, listings, outcome).into_bytes();

    let mut files = Vec::new();
    for (name, file_name, bytes) in [
        ("unified", "unified.json", unified),
        ("review_queue", "review_queue.json", review),
        ("linkage_brief", "linkage_brief.md", brief),
    ] {
        let path = reports_dir.join(file_name);
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        files.push(manifest_entry(name, file_name, &bytes));
    }

    let manifest = ReportManifest {
        schema_version: 1,
        run_id,
        files,
    };
    let manifest_path = reports_dir.join("manifest.json");
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing report manifest")?;
    fs::write(&manifest_path, bytes)
        .await
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(manifest_path)
}

fn manifest_entry(name: &str, file_name: &str, bytes: &[u8]) -> ReportManifestFile {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    ReportManifestFile {
        name: name.to_string(),
        path: file_name.to_string(),
        sha256: hex::encode(hasher.finalize()),
        bytes: bytes.len() as u64,
    }
}

fn linkage_brief(
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    listings: &[Listing],
    outcome: &DedupOutcome,
) -> String {
    let mut platform_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for listing in listings {
        *platform_counts.entry(listing.source.as_str()).or_default() += 1;
    }

    let mut weakest: Vec<&UnifiedBusiness> = outcome.unified.iter().collect();
    weakest.sort_by_key(|u| u.data_quality);
    weakest.truncate(LOWEST_QUALITY_IN_BRIEF);

    format!(
        "# Leadlink Linkage Brief\n\n- Run ID: `{}`\n- Started: {}\n- Finished: {}\n- Listings: {}\n- Unified businesses: {}\n- Matched listings: {}\n- Conflicts: {}\n- Pairs awaiting review: {}\n\n## Platform Counts\n{}\n\n## Lowest Data Quality\n{}\n",
        run_id,
        started_at,
        finished_at,
        listings.len(),
        outcome.stats.unique,
        outcome.stats.matched,
        outcome.stats.conflicts,
        outcome.review_queue.len(),
        platform_counts
            .iter()
            .map(|(k, v)| format!("- {}: {}", k, v))
            .collect::<Vec<_>>()
            .join("\n"),
        weakest
            .iter()
            .map(|u| format!(
                "- {} (`{}`): quality {}, {} platform(s)",
                u.business_name, u.id, u.data_quality, u.platform_count
            ))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// One linkage run configured from `LEADLINK_*` environment variables.
pub async fn run_linkage_once_from_env() -> Result<LinkageRunSummary> {
    let config = PipelineConfig::from_env()?;
    LinkagePipeline::new(config).run_once().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use leadlink_core::FixedClock;
    use std::collections::HashMap;

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 4, 10, 6, 0, 0).single().unwrap()))
    }

    fn write_bundle(root: &Path, platform_id: &str, records: serde_json::Value) {
        let dir = root.join("fixtures").join(platform_id);
        std::fs::create_dir_all(&dir).unwrap();
        let bundle = serde_json::json!({
            "bundle_id": format!("{platform_id}-test"),
            "platform_id": platform_id,
            "captured_from_url": "https://example.test/search",
            "fetched_at": "2026-04-09T12:00:00Z",
            "extractor_version": "test",
            "records": records,
        });
        std::fs::write(dir.join("listings.json"), serde_json::to_vec(&bundle).unwrap()).unwrap();
    }

    #[test]
    fn config_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LEADLINK_WORKSPACE_ROOT", "/srv/leadlink"),
            ("LEADLINK_CLUSTER_STRATEGY", "transitive"),
            ("LEADLINK_PARALLEL", "1"),
        ]);
        let config = PipelineConfig::from_vars(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.workspace_root, PathBuf::from("/srv/leadlink"));
        assert_eq!(config.reports_dir, PathBuf::from("/srv/leadlink/reports"));
        assert_eq!(config.dedup.strategy, ClusterStrategy::TransitiveClosure);
        assert!(config.dedup.parallel_scoring);
        assert!(!config.dedup.auto_resolve_conflicts);

        let bad = PipelineConfig::from_vars(|k| (k == "LEADLINK_CLUSTER_STRATEGY").then(|| "best".to_string()));
        assert!(matches!(bad, Err(ConfigError::UnknownStrategy(_))));
    }

    #[tokio::test]
    async fn run_once_links_bundles_and_writes_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_bundle(
            root,
            "google_maps",
            serde_json::json!([
                {"id": "gm-1", "business_name": "Blue Door Cafe", "address": "12 Lake Street",
                 "phone": "(612) 555-0142", "rating_text": "4.5 stars", "reviews_text": "(1,204 reviews)"},
                {"id": "gm-2", "business_name": "Lakeside Dental", "address": "9 Oak Avenue",
                 "phone": "612-555-0400"}
            ]),
        );
        write_bundle(
            root,
            "facebook",
            serde_json::json!([
                {"id": "fb-1", "business_name": "Blue Door Cafe LLC", "address": "12 Lake St.",
                 "phone": "612.555.0142", "rating_text": "3.0"},
                {"business_name": "  "}
            ]),
        );

        let pipeline = LinkagePipeline::new(PipelineConfig::for_workspace(root)).with_clock(fixed_clock());
        let summary = pipeline.run_once().await.unwrap();

        assert_eq!(summary.enabled_platforms, PlatformRegistry::builtin().platforms.len());
        assert_eq!(summary.loaded_platforms, 2);
        assert_eq!(summary.listings, 3);
        assert_eq!(summary.unified, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.conflicts, 1);

        let dir = PathBuf::from(&summary.reports_dir);
        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("manifest.json")).unwrap()).unwrap();
        let files = manifest["files"].as_array().unwrap();
        assert_eq!(files.len(), 3);
        for file in files {
            let bytes = std::fs::read(dir.join(file["path"].as_str().unwrap())).unwrap();
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            assert_eq!(file["sha256"].as_str().unwrap(), hex::encode(hasher.finalize()));
            assert_eq!(file["bytes"].as_u64().unwrap(), bytes.len() as u64);
        }

        let unified: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("unified.json")).unwrap()).unwrap();
        let first = &unified["businesses"][0];
        assert_eq!(first["id"], "unified-gm-1");
        assert_eq!(first["aggregated_rating"], 3.8);
        assert_eq!(first["total_reviews_all_platforms"], 1204);
        assert_eq!(first["last_updated"], "2026-04-10T06:00:00Z");

        let brief = std::fs::read_to_string(dir.join("linkage_brief.md")).unwrap();
        assert!(brief.contains("- google_maps: 2"));
        assert!(brief.contains("- facebook: 1"));
    }

    #[tokio::test]
    async fn registry_file_controls_enabled_platforms() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::write(
            root.join(REGISTRY_FILE),
            "platforms:\n  - platform_id: yelp\n    display_name: Yelp\n    reliability: 0.9\n    tier: free\n  - platform_id: facebook\n    display_name: Facebook\n    reliability: 0.8\n    tier: free\n    social: true\n    enabled: false\n",
        )
        .unwrap();
        write_bundle(root, "yelp", serde_json::json!([{"id": "y-1", "business_name": "Blue Door Cafe"}]));
        write_bundle(root, "facebook", serde_json::json!([{"id": "f-1", "business_name": "Blue Door Cafe"}]));

        let summary = LinkagePipeline::new(PipelineConfig::for_workspace(root))
            .with_clock(fixed_clock())
            .run_once()
            .await
            .unwrap();
        assert_eq!(summary.enabled_platforms, 1);
        assert_eq!(summary.listings, 1);
        assert_eq!(summary.unified, 1);
    }

    #[tokio::test]
    async fn invalid_registry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(REGISTRY_FILE), "platforms: [").unwrap();
        let err = LinkagePipeline::new(PipelineConfig::for_workspace(tmp.path()))
            .run_once()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}
