use serde::Serialize;

use crate::control::FabricControlPlane;
use crate::error::Result;
use crate::models::{ActionLog, Adjacency, Attributes, Cluster, ObjectKind, Outcome, Scope};
use crate::topology::TopologyReader;

/// Result of pairing: clusters to create, in order, and leaves left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterPlan {
    pub clusters: Vec<Cluster>,
    pub unpaired: Vec<String>,
}

/// Pair leaves that are not yet clustered with an adjacent unclustered leaf.
///
/// Greedy first match: leaves are taken in the given order and each one is
/// paired with the first neighbor (in discovery order) that is not a spine
/// and is still waiting for a partner. A leaf without such a neighbor is
/// reported as unpaired and not retried.
pub fn pair_unclustered_leaves(
    leaves: &[String],
    spines: &[String],
    adjacency: &Adjacency,
    existing: &[Cluster],
) -> ClusterPlan {
    let mut worklist: Vec<&str> = leaves
        .iter()
        .map(String::as_str)
        .filter(|leaf| !existing.iter().any(|c| c.contains(leaf)))
        .collect();
    let mut plan = ClusterPlan::default();

    while !worklist.is_empty() {
        let leaf = worklist.remove(0);
        let partner = adjacency
            .neighbors(leaf)
            .into_iter()
            .filter(|n| !spines.iter().any(|s| s == n))
            .find(|n| worklist.contains(n));

        match partner {
            Some(partner) => {
                worklist.retain(|l| *l != partner);
                tracing::debug!("Pairing {} with {}", leaf, partner);
                plan.clusters.push(Cluster::for_pair(leaf, partner));
            }
            None => {
                tracing::info!("No cluster formed for {}: no unclustered leaf neighbor", leaf);
                plan.unpaired.push(leaf.to_string());
            }
        }
    }
    plan
}

/// Create `cluster` unless it is already in place.
///
/// Returns true when the cluster exists afterwards. A cluster whose name or
/// membership is already present counts as existing; a member that already
/// belongs to some other cluster is skipped.
pub async fn ensure_cluster(
    control: &dyn FabricControlPlane,
    log: &mut ActionLog,
    cluster: &Cluster,
) -> Result<bool> {
    let existing = TopologyReader::new(control).existing_clusters().await?;

    if let Some(found) = existing
        .iter()
        .find(|c| c.name == cluster.name || c.same_members(cluster))
    {
        log.record(&cluster.node1, ObjectKind::Cluster, &found.name, Outcome::AlreadyExists);
        return Ok(true);
    }
    if let Some(other) = existing
        .iter()
        .find(|c| c.contains(&cluster.node1) || c.contains(&cluster.node2))
    {
        log.record(
            &cluster.node1,
            ObjectKind::Cluster,
            &cluster.name,
            Outcome::Skipped(format!("member already in cluster {}", other.name)),
        );
        return Ok(false);
    }

    let attrs = Attributes::new()
        .with("name", cluster.name.as_str())
        .with("cluster-node-1", cluster.node1.as_str())
        .with("cluster-node-2", cluster.node2.as_str());
    control
        .create(&Scope::switch(&cluster.node1), ObjectKind::Cluster, &attrs)
        .await?;
    log.record(&cluster.node1, ObjectKind::Cluster, &cluster.name, Outcome::Created);
    Ok(true)
}
