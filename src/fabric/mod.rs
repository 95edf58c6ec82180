//! Fabric Orchestrator: sequences a layer-2 or layer-3 bring-up and
//! produces the run report.

mod layer2;
mod layer3;

use std::collections::HashSet;

use crate::config::FabricSettings;
use crate::control::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::ipam::compute_sequential_addresses;
use crate::models::{
    ActionLog, Adjacency, Attributes, FabricMode, FabricRun, ObjectKind, Outcome, Scope, Switch,
};
use crate::topology::TopologyReader;

/// Snapshot taken once at the start of a run
struct Discovery {
    adjacency: Adjacency,
    /// Configured leaves whose neighbor table could be read
    leaves: Vec<String>,
}

impl Discovery {
    fn reachable(&self, switch: &str) -> bool {
        !self.adjacency.unreachable.iter().any(|s| s == switch)
    }
}

pub struct FabricOrchestrator<'a> {
    control: &'a dyn FabricControlPlane,
    settings: FabricSettings,
}

impl<'a> FabricOrchestrator<'a> {
    pub fn new(control: &'a dyn FabricControlPlane, settings: FabricSettings) -> Self {
        Self { control, settings }
    }

    fn reader(&self) -> TopologyReader<'a> {
        TopologyReader::new(self.control)
    }

    /// Spines then leaves, in configured order
    fn all_switches(&self) -> impl Iterator<Item = &String> {
        self.settings.spines.iter().chain(self.settings.leaves.iter())
    }

    /// Run every phase for the configured mode. Never fails: errors end the
    /// run and are reported in the returned status.
    pub async fn run(&self) -> FabricRun {
        let mut run = FabricRun::start(self.settings.mode);
        tracing::info!(
            "Starting {} run {} for fabric {} ({} spines, {} leaves)",
            self.settings.mode,
            run.run_id,
            self.settings.fabric_name,
            self.settings.spines.len(),
            self.settings.leaves.len()
        );

        let result = match self.settings.mode {
            FabricMode::Layer2 => self.run_layer2(&mut run).await,
            FabricMode::Layer3 => self.run_layer3(&mut run).await,
        };
        match &result {
            Ok(()) => tracing::info!(
                "Fabric run {} completed with {} actions",
                run.run_id,
                run.actions.len()
            ),
            Err(e) => tracing::error!(
                "Fabric run {} halted after {} actions: {}",
                run.run_id,
                run.actions.len(),
                e
            ),
        }
        run.finish(result);
        run
    }

    /// DiscoverTopology: validate membership and read adjacency. Read-only.
    async fn discover(&self, log: &mut ActionLog) -> Result<Discovery> {
        let spines = &self.settings.spines;
        let leaves = &self.settings.leaves;
        if spines.is_empty() || leaves.is_empty() {
            return Err(ZtpError::TopologyIncomplete(format!(
                "need at least one spine and one leaf, got {} spines and {} leaves",
                spines.len(),
                leaves.len()
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.all_switches().find(|s| !seen.insert(s.as_str())) {
            return Err(ZtpError::TopologyIncomplete(format!(
                "switch {} is listed more than once",
                dup
            )));
        }

        let nodes = self.reader().fabric_nodes().await?;
        let missing: Vec<&str> = self
            .all_switches()
            .filter(|s| !nodes.contains(s))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ZtpError::TopologyIncomplete(format!(
                "not part of the fabric: {}",
                missing.join(", ")
            )));
        }

        let switches: Vec<Switch> = spines
            .iter()
            .map(|s| Switch::spine(s.as_str()))
            .chain(leaves.iter().map(|l| Switch::leaf(l.as_str())))
            .collect();
        let adjacency = self.reader().discover_adjacency(&switches).await?;
        for leaf in &adjacency.unreachable {
            log.record(
                leaf,
                ObjectKind::FabricNode,
                leaf,
                Outcome::Skipped("neighbor table unreachable".to_string()),
            );
        }
        tracing::info!(
            "Discovered {} links across {} switches",
            adjacency.edges.len(),
            switches.len()
        );

        let leaves: Vec<String> = leaves
            .iter()
            .filter(|l| !adjacency.unreachable.contains(l))
            .cloned()
            .collect();
        if leaves.is_empty() {
            return Err(ZtpError::TopologyIncomplete(format!(
                "no leaf neighbor table could be read ({})",
                adjacency.unreachable.join(", ")
            )));
        }
        Ok(Discovery { adjacency, leaves })
    }

    /// AssignInband: switch N (1-based, spines then leaves) gets `base.N/prefix`
    async fn assign_inband(&self, discovery: &Discovery, log: &mut ActionLog) -> Result<()> {
        let Some((base, prefix)) = self.settings.inband else {
            return Ok(());
        };
        let switches: Vec<&String> = self.all_switches().collect();
        let addresses = compute_sequential_addresses(base, switches.len())?;
        let reader = self.reader();

        for (switch, addr) in switches.into_iter().zip(addresses) {
            let ip = format!("{}/{}", addr, prefix);
            if !discovery.reachable(switch) {
                continue;
            }
            if let Some(current) = reader.inband_ip(switch).await? {
                tracing::debug!("{} already has in-band address {}", switch, current);
                log.record(switch, ObjectKind::SwitchSetup, &current, Outcome::AlreadyExists);
                continue;
            }
            let attrs = Attributes::new().with("in-band-ip", ip.as_str());
            self.control
                .modify(&Scope::switch(switch), ObjectKind::SwitchSetup, &attrs)
                .await?;
            log.record(switch, ObjectKind::SwitchSetup, &ip, Outcome::Modified);
        }
        Ok(())
    }
}
