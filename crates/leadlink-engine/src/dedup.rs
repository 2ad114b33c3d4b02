//! Clustering listings into same-business groups and merging each group.
//!
//! The default strategy is a greedy, seed-relative single pass: each
//! unclaimed listing seeds a cluster and claims every later unclaimed listing
//! that matches the seed itself. Two listings that each match a third but not
//! the seed are therefore never joined. `TransitiveClosure` is the opt-in
//! alternative that unions every matching pair.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use leadlink_core::{DedupStats, Listing, MatchResult, UnifiedBusiness};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::matcher::Matcher;
use crate::merge::{Merger, DEFAULT_MATCH_CONFIDENCE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStrategy {
    #[default]
    SeedGreedy,
    TransitiveClosure,
}

impl FromStr for ClusterStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seed" | "seed_greedy" => Ok(Self::SeedGreedy),
            "transitive" | "transitive_closure" => Ok(Self::TransitiveClosure),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    pub strategy: ClusterStrategy,
    /// Score candidate pairs on the rayon pool. Claiming stays sequential.
    pub parallel_scoring: bool,
    pub auto_resolve_conflicts: bool,
}

/// A pair that landed between the review and match thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub listing_a: String,
    pub listing_b: String,
    pub score: u32,
}

impl From<&MatchResult> for ReviewItem {
    fn from(result: &MatchResult) -> Self {
        Self {
            listing_a: result.listing_a.clone(),
            listing_b: result.listing_b.clone(),
            score: result.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupOutcome {
    pub unified: Vec<UnifiedBusiness>,
    pub stats: DedupStats,
    pub review_queue: Vec<ReviewItem>,
}

struct Cluster {
    seed: usize,
    members: Vec<usize>,
    min_score: Option<u32>,
}

impl Cluster {
    fn new(seed: usize) -> Self {
        Self {
            seed,
            members: Vec::new(),
            min_score: None,
        }
    }

    fn note_score(&mut self, score: u32) {
        self.min_score = Some(self.min_score.map_or(score, |min| min.min(score)));
    }

    fn match_confidence(&self) -> u8 {
        self.min_score
            .map_or(DEFAULT_MATCH_CONFIDENCE, |score| score.min(100) as u8)
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// The smaller index becomes the root.
    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

pub struct DedupEngine {
    matcher: Matcher,
    merger: Merger,
    config: DedupConfig,
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self::new(Matcher::default(), Merger::default(), DedupConfig::default())
    }
}

impl DedupEngine {
    pub fn new(matcher: Matcher, merger: Merger, config: DedupConfig) -> Self {
        let merger = if config.auto_resolve_conflicts {
            merger.with_auto_resolve(true)
        } else {
            merger
        };
        Self {
            matcher,
            merger,
            config,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn merger(&self) -> &Merger {
        &self.merger
    }

    pub fn deduplicate(&self, listings: &[Listing]) -> DedupOutcome {
        warn_on_duplicate_ids(listings);

        let (clusters, review_queue) = match self.config.strategy {
            ClusterStrategy::SeedGreedy => self.seed_clusters(listings),
            ClusterStrategy::TransitiveClosure => self.transitive_clusters(listings),
        };

        let unified: Vec<UnifiedBusiness> = clusters
            .iter()
            .map(|cluster| {
                let rest: Vec<&Listing> = cluster.members.iter().map(|&i| &listings[i]).collect();
                self.merger
                    .merge_seeded(&listings[cluster.seed], &rest, cluster.match_confidence())
            })
            .collect();

        let stats = DedupStats {
            matched: clusters.iter().map(|c| c.members.len()).sum(),
            unique: unified.len(),
            conflicts: unified.iter().map(|u| u.conflicts.len()).sum(),
        };
        info!(
            listings = listings.len(),
            unique = stats.unique,
            matched = stats.matched,
            conflicts = stats.conflicts,
            review = review_queue.len(),
            strategy = ?self.config.strategy,
            "deduplication complete"
        );

        DedupOutcome {
            unified,
            stats,
            review_queue,
        }
    }

    fn seed_clusters(&self, listings: &[Listing]) -> (Vec<Cluster>, Vec<ReviewItem>) {
        let mut processed = vec![false; listings.len()];
        let mut clusters = Vec::new();
        let mut review_queue = Vec::new();

        for seed in 0..listings.len() {
            if processed[seed] {
                continue;
            }
            processed[seed] = true;

            let candidates: Vec<(usize, usize)> = ((seed + 1)..listings.len())
                .filter(|&j| !processed[j])
                .map(|j| (seed, j))
                .collect();
            let scored = self.score_pairs(listings, &candidates);

            let mut cluster = Cluster::new(seed);
            for ((_, j), result) in candidates.into_iter().zip(scored) {
                if result.is_match {
                    processed[j] = true;
                    cluster.members.push(j);
                    cluster.note_score(result.score);
                } else if result.needs_review {
                    review_queue.push(ReviewItem::from(&result));
                }
            }
            debug!(seed = %listings[seed].id, absorbed = cluster.members.len(), "cluster formed");
            clusters.push(cluster);
        }

        (clusters, review_queue)
    }

    fn transitive_clusters(&self, listings: &[Listing]) -> (Vec<Cluster>, Vec<ReviewItem>) {
        let n = listings.len();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let scored = self.score_pairs(listings, &pairs);

        let mut sets = DisjointSet::new(n);
        let mut matched_pairs = Vec::new();
        let mut review_queue = Vec::new();
        for (&(i, j), result) in pairs.iter().zip(&scored) {
            if result.is_match {
                sets.union(i, j);
                matched_pairs.push((i, result.score));
            } else if result.needs_review {
                review_queue.push(ReviewItem::from(result));
            }
        }

        let mut clusters: Vec<Cluster> = Vec::new();
        let mut cluster_of_root: HashMap<usize, usize> = HashMap::new();
        for i in 0..n {
            let root = sets.find(i);
            match cluster_of_root.get(&root) {
                Some(&c) => clusters[c].members.push(i),
                None => {
                    cluster_of_root.insert(root, clusters.len());
                    clusters.push(Cluster::new(i));
                }
            }
        }
        for (i, score) in matched_pairs {
            let root = sets.find(i);
            if let Some(&c) = cluster_of_root.get(&root) {
                clusters[c].note_score(score);
            }
        }

        (clusters, review_queue)
    }

    /// Results come back in `pairs` order on both paths.
    fn score_pairs(&self, listings: &[Listing], pairs: &[(usize, usize)]) -> Vec<MatchResult> {
        let matcher = &self.matcher;
        if self.config.parallel_scoring {
            pairs
                .par_iter()
                .map(|&(i, j)| matcher.score(&listings[i], &listings[j]))
                .collect()
        } else {
            pairs
                .iter()
                .map(|&(i, j)| matcher.score(&listings[i], &listings[j]))
                .collect()
        }
    }
}

fn warn_on_duplicate_ids(listings: &[Listing]) {
    let mut seen = HashSet::new();
    for listing in listings {
        if !seen.insert(listing.id.as_str()) {
            warn!(id = %listing.id, source = %listing.source, "duplicate listing id, treating as distinct");
        }
    }
}

/// Greedy seed-relative deduplication with default matcher and merger.
pub fn deduplicate(listings: &[Listing]) -> (Vec<UnifiedBusiness>, DedupStats) {
    let outcome = DedupEngine::default().deduplicate(listings);
    (outcome.unified, outcome.stats)
}
