//! Shared types for candidate generation.

use data_loader::{BusinessId, ClusterId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which generator produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// Businesses similar to the ones the user rated
    ItemCf,
    /// Businesses rated by similar users
    UserCf,
    /// Businesses similar to the ones the user's cluster interacted with
    ClusterCf,
    /// Businesses whose two-tower embedding is closest to the user's
    Embedding,
}

impl CandidateSource {
    pub const ALL: [CandidateSource; 4] = [
        CandidateSource::ItemCf,
        CandidateSource::UserCf,
        CandidateSource::ClusterCf,
        CandidateSource::Embedding,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CandidateSource::ItemCf => "item_cf",
            CandidateSource::UserCf => "user_cf",
            CandidateSource::ClusterCf => "cluster_cf",
            CandidateSource::Embedding => "embedding",
        }
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "itemcf" | "item" => Ok(CandidateSource::ItemCf),
            "usercf" | "user" => Ok(CandidateSource::UserCf),
            "clustercf" | "cluster" => Ok(CandidateSource::ClusterCf),
            "embedding" | "twotower" => Ok(CandidateSource::Embedding),
            _ => Err(format!("unknown candidate source '{s}'")),
        }
    }
}

/// A scored business proposed by one generator
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub business_id: BusinessId,
    pub source: CandidateSource,
    /// Accumulated similarity score within the source
    pub score: f64,
}

impl Candidate {
    pub fn new(business_id: impl Into<BusinessId>, source: CandidateSource, score: f64) -> Self {
        Self {
            business_id: business_id.into(),
            source,
            score,
        }
    }
}

/// Who a request is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seed {
    /// A user present in the catalog
    Known(UserId),
    /// A user with no history, described only by category tags
    ColdStart(Vec<String>),
}

/// The resolved seed handed to every generator.
///
/// Built once per request so generators never repeat catalog lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedContext {
    /// Set for known users; ItemCF and UserCF need it
    pub user_id: Option<UserId>,

    /// Stored, inferred, or cold-start-resolved cluster; ClusterCF needs it
    pub cluster: Option<ClusterId>,

    /// Businesses the user already rated
    pub rated: HashSet<BusinessId>,
}

impl SeedContext {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn for_cluster(cluster: ClusterId) -> Self {
        Self {
            cluster: Some(cluster),
            ..Self::default()
        }
    }

    pub fn with_cluster(mut self, cluster: Option<ClusterId>) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn is_cold_start(&self) -> bool {
        self.user_id.is_none()
    }
}
