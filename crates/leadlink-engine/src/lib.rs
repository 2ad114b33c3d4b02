//! Record linkage and merge engine for business listings collected from many
//! directory, review and social platforms.
//!
//! The building blocks are usable on their own: [`normalize`] and
//! [`similarity`] primitives, the [`Matcher`], conflict detection and the
//! [`Merger`]. [`DedupEngine`] composes them into a batch clustering pass and
//! [`LinkagePipeline`] wraps that pass with fixture loading and reports.

pub mod conflict;
pub mod dedup;
pub mod error;
pub mod insights;
pub mod matcher;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod similarity;

pub use conflict::{auto_resolve_conflict, detect_conflict, SourcedValue};
pub use dedup::{deduplicate, ClusterStrategy, DedupConfig, DedupEngine, DedupOutcome, ReviewItem};
pub use error::{ConfigError, MergeError, RegistryError};
pub use insights::generate_insights;
pub use matcher::{calculate_match_score, MatchConfig, MatchWeights, Matcher};
pub use merge::{merge_listings, Merger, DEFAULT_MATCH_CONFIDENCE};
pub use normalize::{extract_domain, normalize_address, normalize_business_name, normalize_phone};
pub use pipeline::{run_linkage_once_from_env, LinkagePipeline, LinkageRunSummary, PipelineConfig};
pub use registry::{PlatformConfig, PlatformRegistry, PlatformTier, DEFAULT_RELIABILITY};
pub use similarity::{fuzzy_match, geo_distance_km, levenshtein_edit_distance};

pub const CRATE_NAME: &str = "leadlink-engine";
