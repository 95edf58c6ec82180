use super::{Discovery, FabricOrchestrator};
use crate::error::{Result, ZtpError};
use crate::models::{ActionLog, Cluster, FabricRun, ObjectKind, Outcome};
use crate::planner::{build_redundant_link_group, build_trunk, ensure_cluster, pair_unclustered_leaves};

const SPINE_CLUSTER: &str = "spine-cluster";

impl<'a> FabricOrchestrator<'a> {
    /// DiscoverTopology → PairClusters → BuildLeafTrunksAndVlags →
    /// BuildUnclusteredLeafVlags → AssignInband
    pub(super) async fn run_layer2(&self, run: &mut FabricRun) -> Result<()> {
        let discovery = self.discover(&mut run.actions).await?;
        if self.settings.spines.len() < 2 {
            return Err(ZtpError::TopologyIncomplete(format!(
                "a layer2 fabric needs two spines, got {}",
                self.settings.spines.len()
            )));
        }
        let spine_pair = self.settings.spines[..2].to_vec();

        tracing::info!("Pairing clusters");
        let spine_cluster = Cluster {
            name: SPINE_CLUSTER.to_string(),
            node1: spine_pair[0].clone(),
            node2: spine_pair[1].clone(),
        };
        ensure_cluster(self.control, &mut run.actions, &spine_cluster).await?;

        let existing = self.reader().existing_clusters().await?;
        let plan = pair_unclustered_leaves(
            &discovery.leaves,
            &self.settings.spines,
            &discovery.adjacency,
            &existing,
        );

        // clusters already on the fabric get their bundles completed too
        let mut leaf_pairs: Vec<Cluster> = existing
            .into_iter()
            .filter(|c| discovery.leaves.contains(&c.node1) && discovery.leaves.contains(&c.node2))
            .collect();
        let mut unclustered = plan.unpaired;
        for cluster in plan.clusters {
            if ensure_cluster(self.control, &mut run.actions, &cluster).await? {
                leaf_pairs.push(cluster);
            } else {
                unclustered.push(cluster.node1);
                unclustered.push(cluster.node2);
            }
        }

        tracing::info!("Building trunks and vlags for {} leaf clusters", leaf_pairs.len());
        for pair in &leaf_pairs {
            let result = self
                .bundle_leaf_pair(&discovery, &mut run.actions, &spine_pair, pair)
                .await;
            skip_unconnected(&mut run.actions, &pair.node1, &pair.name, result)?;
        }

        tracing::info!("Building vlags for {} unclustered leaves", unclustered.len());
        for leaf in &unclustered {
            let result = self
                .bundle_single_leaf(&discovery, &mut run.actions, &spine_pair, leaf)
                .await;
            skip_unconnected(&mut run.actions, leaf, leaf, result)?;
        }
        run.unpaired_leaves = unclustered;

        self.assign_inband(&discovery, &mut run.actions).await
    }

    /// Leaf trunks toward the spines joined into one vlag, and the spine
    /// trunks toward the pair joined into the reciprocal vlag
    async fn bundle_leaf_pair(
        &self,
        discovery: &Discovery,
        log: &mut ActionLog,
        spine_pair: &[String],
        pair: &Cluster,
    ) -> Result<()> {
        let adjacency = &discovery.adjacency;
        let t1 = build_trunk(self.control, adjacency, log, &pair.node1, spine_pair).await?;
        let t2 = build_trunk(self.control, adjacency, log, &pair.node2, spine_pair).await?;
        let name = format!("{}{}-to-spine", pair.node1, pair.node2);
        build_redundant_link_group(self.control, log, &name, &pair.node1, &pair.node2, &t1.name, &t2.name)
            .await?;

        let leaves = vec![pair.node1.clone(), pair.node2.clone()];
        self.bundle_spines_toward(discovery, log, spine_pair, &leaves).await
    }

    /// Unclustered leaf: one trunk toward both spines, spines vlag toward it
    async fn bundle_single_leaf(
        &self,
        discovery: &Discovery,
        log: &mut ActionLog,
        spine_pair: &[String],
        leaf: &str,
    ) -> Result<()> {
        build_trunk(self.control, &discovery.adjacency, log, leaf, spine_pair).await?;
        self.bundle_spines_toward(discovery, log, spine_pair, &[leaf.to_string()])
            .await
    }

    async fn bundle_spines_toward(
        &self,
        discovery: &Discovery,
        log: &mut ActionLog,
        spine_pair: &[String],
        leaves: &[String],
    ) -> Result<()> {
        let (s1, s2) = (&spine_pair[0], &spine_pair[1]);
        let t1 = build_trunk(self.control, &discovery.adjacency, log, s1, leaves).await?;
        let t2 = build_trunk(self.control, &discovery.adjacency, log, s2, leaves).await?;
        let name = format!("{}{}-to-{}", s1, s2, leaves.concat());
        build_redundant_link_group(self.control, log, &name, s1, s2, &t1.name, &t2.name).await?;
        Ok(())
    }
}

/// A leaf missing its links toward one side is skipped; anything else halts the phase
fn skip_unconnected(log: &mut ActionLog, switch: &str, name: &str, result: Result<()>) -> Result<()> {
    match result {
        Err(e @ ZtpError::NoConnectingPorts { .. }) => {
            log.record(switch, ObjectKind::Vlag, name, Outcome::Skipped(e.to_string()));
            Ok(())
        }
        other => other,
    }
}
