//! Cluster and link-aggregation planning.

pub mod cluster;
pub mod lag;

pub use cluster::{ensure_cluster, pair_unclustered_leaves, ClusterPlan};
pub use lag::{build_redundant_link_group, build_trunk};
