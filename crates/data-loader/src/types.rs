//! Core domain types for the recommendation snapshot.
//!
//! This module defines the identifiers, attribute records, and the in-memory
//! `Snapshot` that the rest of the workspace reads from. Ids from different
//! namespaces are separate types, so a `UserId` can never be compared with a
//! `BusinessId` by accident.

use crate::category::{CategoryVector, CategoryVocabulary};
use crate::embedding::EmbeddingTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

// =============================================================================
// Identifiers
// =============================================================================

/// An identifier that can be stored in a similarity namespace.
///
/// Similarity stores and catalogs key their tables by the raw string form;
/// this trait converts between that form and the typed id.
pub trait EntityKey:
    Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    fn from_raw(raw: String) -> Self;
    fn as_raw(&self) -> &str;
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl EntityKey for $name {
            fn from_raw(raw: String) -> Self {
                Self(raw)
            }

            fn as_raw(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Stable identifier of a user
    UserId
);

string_id!(
    /// Stable identifier of a business (the recommended item)
    BusinessId
);

/// Identifier of an offline-built user cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cluster-{}", self.0)
    }
}

/// Dense position of an id inside one similarity namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityIndex(pub u32);

// =============================================================================
// Similarity namespaces
// =============================================================================

/// The three precomputed neighbor graphs.
///
/// - `Item`: business -> similar businesses (computed over user ratings)
/// - `User`: user -> similar users
/// - `Cluster`: business -> similar businesses (computed over cluster interactions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Item,
    User,
    Cluster,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Item, Namespace::User, Namespace::Cluster];

    pub(crate) fn slot(self) -> usize {
        match self {
            Namespace::Item => 0,
            Namespace::User => 1,
            Namespace::Cluster => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Item => "item",
            Namespace::User => "user",
            Namespace::Cluster => "cluster",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "item" => Ok(Namespace::Item),
            "user" => Ok(Namespace::User),
            "cluster" => Ok(Namespace::Cluster),
            other => Err(format!("unknown namespace '{other}'")),
        }
    }
}

/// Sparse neighbor list: `(neighbor_index, score)` pairs in no particular order.
pub type NeighborList = Vec<(EntityIndex, f64)>;

// =============================================================================
// Interaction
// =============================================================================

/// A historical rating of a business by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub business_id: BusinessId,
    /// Rating value from 1.0 to 5.0
    pub rating: f32,
}

// =============================================================================
// Attribute records
// =============================================================================

/// Compliment kinds a user can receive.
///
/// Order matters: it is the column order of the one-hot block in rerank
/// feature rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compliment {
    Hot,
    More,
    Profile,
    Cute,
    List,
    Note,
    Plain,
    Cool,
    Funny,
    Writer,
    Photos,
}

impl Compliment {
    pub const ALL: [Compliment; 11] = [
        Compliment::Hot,
        Compliment::More,
        Compliment::Profile,
        Compliment::Cute,
        Compliment::List,
        Compliment::Note,
        Compliment::Plain,
        Compliment::Cool,
        Compliment::Funny,
        Compliment::Writer,
        Compliment::Photos,
    ];
}

/// Profile of a user as seen by the reranker.
///
/// Counters missing from the source record default to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAttributes {
    pub user_id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub useful: u32,
    #[serde(default)]
    pub funny: u32,
    #[serde(default)]
    pub cool: u32,
    #[serde(default)]
    pub fans: u32,
    #[serde(default)]
    pub average_stars: f32,
    #[serde(default)]
    pub compliments: Vec<Compliment>,
}

/// Profile of a business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessAttributes {
    pub business_id: BusinessId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Aggregate star rating published for the business
    #[serde(default)]
    pub stars: f32,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default = "default_open")]
    pub is_open: bool,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Mean of the individual review stars, when reviews were loaded
    #[serde(default)]
    pub avg_review_stars: Option<f32>,
}

fn default_open() -> bool {
    true
}

// =============================================================================
// Clusters
// =============================================================================

/// Representative category vector of a cluster.
///
/// A cluster may have several representatives; resolution picks the closest
/// one and reports its cluster.
#[derive(Debug, Clone)]
pub struct ClusterCentroid {
    pub cluster: ClusterId,
    pub vector: CategoryVector,
}

// =============================================================================
// NeighborGraph
// =============================================================================

/// One similarity namespace: the id <-> index bijection plus the sparse
/// neighbor lists keyed by source index.
#[derive(Debug, Default, Clone)]
pub struct NeighborGraph {
    pub(crate) ids: Vec<String>,
    pub(crate) positions: HashMap<String, EntityIndex>,
    pub(crate) lists: HashMap<EntityIndex, NeighborList>,
}

impl NeighborGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `id`, assigning the next dense position if it is new
    pub fn register(&mut self, id: &str) -> EntityIndex {
        if let Some(&index) = self.positions.get(id) {
            return index;
        }
        let index = EntityIndex(self.ids.len() as u32);
        self.ids.push(id.to_string());
        self.positions.insert(id.to_string(), index);
        index
    }

    pub fn index_of(&self, id: &str) -> Option<EntityIndex> {
        self.positions.get(id).copied()
    }

    pub fn id_at(&self, index: EntityIndex) -> Option<&str> {
        self.ids.get(index.0 as usize).map(|s| s.as_str())
    }

    /// Neighbor list of `id`, if one was computed
    pub fn neighbors(&self, id: &str) -> Option<&NeighborList> {
        let index = self.index_of(id)?;
        self.lists.get(&index)
    }

    pub fn insert_list(&mut self, source: EntityIndex, list: NeighborList) {
        self.lists.insert(source, list);
    }

    /// Number of ids in the namespace
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// =============================================================================
// Snapshot - one immutable generation of every offline table
// =============================================================================

/// Everything the engine reads at request time.
///
/// A snapshot is built once (from files or with the `insert_*` builders in
/// tests) and then shared read-only behind an `Arc`. Reloading builds a new
/// snapshot; nothing is patched in place.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub(crate) users: HashMap<UserId, UserAttributes>,
    pub(crate) businesses: HashMap<BusinessId, BusinessAttributes>,
    pub(crate) user_interactions: HashMap<UserId, Vec<Interaction>>,
    pub(crate) graphs: [NeighborGraph; 3],
    pub(crate) vocabulary: CategoryVocabulary,
    pub(crate) centroids: Vec<ClusterCentroid>,
    pub(crate) assignments: HashMap<UserId, ClusterId>,
    pub(crate) cluster_interactions: HashMap<ClusterId, Vec<(BusinessId, f64)>>,
    pub(crate) user_embeddings: EmbeddingTable<UserId>,
    pub(crate) business_embeddings: EmbeddingTable<BusinessId>,
}

impl Snapshot {
    /// Creates a new, empty Snapshot
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_user(&self, id: &UserId) -> Option<&UserAttributes> {
        self.users.get(id)
    }

    pub fn get_business(&self, id: &BusinessId) -> Option<&BusinessAttributes> {
        self.businesses.get(id)
    }

    /// All ratings made by a user, in load order. Empty if none.
    pub fn get_user_interactions(&self, user_id: &UserId) -> &[Interaction] {
        self.user_interactions
            .get(user_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// A user is known if it has a profile or any recorded interaction
    pub fn contains_user(&self, user_id: &UserId) -> bool {
        self.users.contains_key(user_id) || self.user_interactions.contains_key(user_id)
    }

    pub fn graph(&self, namespace: Namespace) -> &NeighborGraph {
        &self.graphs[namespace.slot()]
    }

    pub fn vocabulary(&self) -> &CategoryVocabulary {
        &self.vocabulary
    }

    pub fn centroids(&self) -> &[ClusterCentroid] {
        &self.centroids
    }

    pub fn assigned_cluster(&self, user_id: &UserId) -> Option<ClusterId> {
        self.assignments.get(user_id).copied()
    }

    pub fn get_cluster_interactions(&self, cluster: ClusterId) -> &[(BusinessId, f64)] {
        self.cluster_interactions
            .get(&cluster)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// User tower outputs, one row per embedded user
    pub fn user_embeddings(&self) -> &EmbeddingTable<UserId> {
        &self.user_embeddings
    }

    /// Business tower outputs, scanned by embedding retrieval
    pub fn business_embeddings(&self) -> &EmbeddingTable<BusinessId> {
        &self.business_embeddings
    }

    /// Every known user id, sorted
    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .users
            .keys()
            .chain(self.user_interactions.keys())
            .cloned()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// (users, businesses, interactions, clusters) for logging
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let interactions = self.user_interactions.values().map(|v| v.len()).sum();
        let mut clusters: Vec<ClusterId> = self.centroids.iter().map(|c| c.cluster).collect();
        clusters.sort_unstable();
        clusters.dedup();
        (
            self.users.len(),
            self.businesses.len(),
            interactions,
            clusters.len(),
        )
    }

    // Mutators - used while loading and by test fixtures

    pub fn insert_user(&mut self, user: UserAttributes) {
        self.users.insert(user.user_id.clone(), user);
    }

    pub fn insert_business(&mut self, business: BusinessAttributes) {
        self.businesses.insert(business.business_id.clone(), business);
    }

    pub fn insert_interaction(&mut self, interaction: Interaction) {
        self.user_interactions
            .entry(interaction.user_id.clone())
            .or_default()
            .push(interaction);
    }

    /// Register `id` in a namespace without giving it a neighbor list
    pub fn register_entity(&mut self, namespace: Namespace, id: &str) -> EntityIndex {
        self.graphs[namespace.slot()].register(id)
    }

    /// Insert the neighbor list of `source`, registering every id involved in
    /// order of first appearance.
    pub fn insert_neighbors(&mut self, namespace: Namespace, source: &str, neighbors: &[(&str, f64)]) {
        let graph = &mut self.graphs[namespace.slot()];
        let source_index = graph.register(source);
        let list: NeighborList = neighbors
            .iter()
            .map(|(id, score)| (graph.register(id), *score))
            .collect();
        graph.insert_list(source_index, list);
    }

    pub fn set_vocabulary<S: AsRef<str>>(&mut self, tags: &[S]) {
        self.vocabulary = CategoryVocabulary::new(tags);
    }

    /// Add a cluster representative, encoded over the current vocabulary
    pub fn insert_centroid<S: AsRef<str>>(&mut self, cluster: ClusterId, categories: &[S]) {
        let vector = self.vocabulary.encode(categories);
        self.centroids.push(ClusterCentroid { cluster, vector });
    }

    pub fn assign_cluster(&mut self, user_id: UserId, cluster: ClusterId) {
        self.assignments.insert(user_id, cluster);
    }

    pub fn insert_cluster_interaction(&mut self, cluster: ClusterId, business_id: BusinessId, score: f64) {
        self.cluster_interactions
            .entry(cluster)
            .or_default()
            .push((business_id, score));
    }

    pub fn insert_user_embedding(&mut self, user_id: UserId, vector: &[f32]) -> crate::error::Result<()> {
        self.user_embeddings.insert(user_id, vector)
    }

    pub fn insert_business_embedding(&mut self, business_id: BusinessId, vector: &[f32]) -> crate::error::Result<()> {
        self.business_embeddings.insert(business_id, vector)
    }
}
