use std::collections::HashMap;

use super::{Discovery, FabricOrchestrator};
use crate::bgp::configure_underlay;
use crate::error::{Result, ZtpError};
use crate::ipam::{compute_link_addresses, compute_sequential_addresses, AddressCursor, LinkAddress};
use crate::models::{
    ActionLog, AdjacencyEdge, Attributes, FabricRun, ObjectKind, Outcome, Scope, Vrouter, VrouterInterface,
};
use crate::planner::{ensure_cluster, pair_unclustered_leaves};

impl<'a> FabricOrchestrator<'a> {
    /// DiscoverTopology → DisableTrunkingOnAllSwitches → ProvisionVrouters →
    /// AllocateAndBindLinkAddresses → AssignLoopbacks → AssignInband →
    /// ConfigureBgp → PairClusters
    pub(super) async fn run_layer3(&self, run: &mut FabricRun) -> Result<()> {
        let discovery = self.discover(&mut run.actions).await?;
        let Some(link) = self.settings.link.clone() else {
            return Err(ZtpError::Config(
                "layer3 fabric needs a link network, cidr and supernet".to_string(),
            ));
        };
        let addresses = compute_link_addresses(link.network, link.cidr, link.supernet)?;
        let switches = self.reachable_switches(&discovery);

        tracing::info!("Disabling auto-trunk on {} switches", switches.len());
        for switch in &switches {
            self.disable_auto_trunk(&mut run.actions, switch).await?;
        }

        tracing::info!("Provisioning vrouters");
        for switch in &switches {
            self.provision_vrouter(&mut run.actions, switch).await?;
        }

        tracing::info!("Binding link addresses from {}/{} in /{} blocks", link.network, link.cidr, link.supernet);
        let mut cursor = AddressCursor::new(addresses, self.reader().bound_addresses().await?);
        self.bind_links(&discovery, &mut run.actions, &mut cursor).await?;

        if self.settings.loopback_base.is_some() {
            tracing::info!("Assigning loopbacks");
            self.assign_loopbacks(&discovery, &mut run.actions).await?;
        }

        self.assign_inband(&discovery, &mut run.actions).await?;

        if let Some(bgp) = &self.settings.bgp {
            tracing::info!("Configuring BGP underlay from AS {}", bgp.base_as);
            configure_underlay(
                self.control,
                &discovery.adjacency,
                &mut run.actions,
                &self.settings.spines,
                &self.settings.leaves,
                bgp,
            )
            .await?;
        }

        if self.settings.cluster_l3_leaves {
            tracing::info!("Pairing layer3 leaf clusters");
            let existing = self.reader().existing_clusters().await?;
            let plan = pair_unclustered_leaves(
                &discovery.leaves,
                &self.settings.spines,
                &discovery.adjacency,
                &existing,
            );
            let mut unpaired = plan.unpaired;
            for cluster in plan.clusters {
                if !ensure_cluster(self.control, &mut run.actions, &cluster).await? {
                    unpaired.push(cluster.node1);
                    unpaired.push(cluster.node2);
                }
            }
            run.unpaired_leaves = unpaired;
        }
        Ok(())
    }

    fn reachable_switches(&self, discovery: &Discovery) -> Vec<String> {
        self.all_switches()
            .filter(|s| discovery.reachable(s))
            .cloned()
            .collect()
    }

    async fn disable_auto_trunk(&self, log: &mut ActionLog, switch: &str) -> Result<()> {
        if !self.reader().auto_trunk_enabled(switch).await? {
            log.record(switch, ObjectKind::SystemSettings, "auto-trunk", Outcome::AlreadyExists);
            return Ok(());
        }
        let attrs = Attributes::new().flag("no-auto-trunk");
        self.control
            .modify(&Scope::switch(switch), ObjectKind::SystemSettings, &attrs)
            .await?;
        log.record(switch, ObjectKind::SystemSettings, "auto-trunk", Outcome::Modified);
        Ok(())
    }

    async fn provision_vrouter(&self, log: &mut ActionLog, switch: &str) -> Result<()> {
        if let Some(vrouter) = self.reader().vrouter_on(switch).await? {
            log.record(switch, ObjectKind::Vrouter, &vrouter.name, Outcome::AlreadyExists);
            return Ok(());
        }
        let name = Vrouter::name_for(switch);
        let vnet = format!("{}-global", self.settings.fabric_name);
        let attrs = Attributes::new()
            .with("name", name.as_str())
            .with("vnet", vnet);
        self.control
            .create(&Scope::switch(switch), ObjectKind::Vrouter, &attrs)
            .await?;
        log.record(switch, ObjectKind::Vrouter, &name, Outcome::Created);
        Ok(())
    }

    /// Vrouter name per switch, as found on the fabric
    async fn vrouter_names(&self) -> Result<HashMap<String, String>> {
        let vrouters = self.reader().vrouters().await?;
        let mut names = HashMap::new();
        for switch in self.all_switches() {
            if let Some(v) = vrouters
                .iter()
                .find(|v| v.switch == *switch || v.name == Vrouter::name_for(switch))
            {
                names.insert(switch.clone(), v.name.clone());
            }
        }
        Ok(names)
    }

    /// AllocateAndBindLinkAddresses: every spine-leaf link takes one sub-block
    async fn bind_links(&self, discovery: &Discovery, log: &mut ActionLog, cursor: &mut AddressCursor) -> Result<()> {
        let vrouters = self.vrouter_names().await?;
        let interfaces = self.reader().vrouter_interfaces().await?;
        let bound_on = |vrouter: &str, port: &str| -> Option<LinkAddress> {
            interfaces
                .iter()
                .find(|i| i.vrouter == vrouter && i.port == port)
                .map(|i| i.address)
        };

        for spine in &self.settings.spines {
            for leaf in &discovery.leaves {
                let edges: Vec<&AdjacencyEdge> = discovery.adjacency.links_between(leaf, spine).collect();
                for edge in edges {
                    let Some(spine_port) = discovery.adjacency.remote_port(edge).map(str::to_string) else {
                        log.record(
                            leaf,
                            ObjectKind::VrouterInterface,
                            &edge.local_port,
                            Outcome::Skipped(format!("cannot tell which {} port faces it", spine)),
                        );
                        continue;
                    };
                    let (Some(leaf_vrouter), Some(spine_vrouter)) = (vrouters.get(leaf), vrouters.get(spine)) else {
                        return Err(ZtpError::TopologyIncomplete(format!(
                            "no vrouter on {} or {}",
                            leaf, spine
                        )));
                    };

                    let leaf_bound = bound_on(leaf_vrouter.as_str(), edge.local_port.as_str());
                    let spine_bound = bound_on(spine_vrouter.as_str(), spine_port.as_str());
                    let (leaf_addr, spine_addr) = match (leaf_bound, spine_bound) {
                        (Some(l), Some(s)) => {
                            let kind = ObjectKind::VrouterInterface;
                            log.record(leaf, kind, &interface_label(&edge.local_port, l), Outcome::AlreadyExists);
                            log.record(spine, kind, &interface_label(&spine_port, s), Outcome::AlreadyExists);
                            continue;
                        }
                        (Some(l), None) => {
                            tracing::warn!("Link {}:{} is half bound, completing it", leaf, edge.local_port);
                            (l, self.partner(cursor, l)?)
                        }
                        (None, Some(s)) => {
                            tracing::warn!("Link {}:{} is half bound, completing it", spine, spine_port);
                            (self.partner(cursor, s)?, s)
                        }
                        (None, None) => cursor.next_link_pair()?,
                    };

                    if leaf_bound.is_none() {
                        self.bind_interface(log, leaf, leaf_vrouter, &edge.local_port, leaf_addr)
                            .await?;
                    }
                    if spine_bound.is_none() {
                        self.bind_interface(log, spine, spine_vrouter, &spine_port, spine_addr)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    fn partner(&self, cursor: &mut AddressCursor, bound: LinkAddress) -> Result<LinkAddress> {
        cursor.partner_for(bound).ok_or_else(|| {
            ZtpError::AddressSpaceExhausted(format!("no free address left next to {}", bound))
        })
    }

    /// Remove trunks holding `port`, then put the address on it
    async fn bind_interface(
        &self,
        log: &mut ActionLog,
        switch: &str,
        vrouter: &str,
        port: &str,
        address: LinkAddress,
    ) -> Result<()> {
        let scope = Scope::switch(switch);
        for trunk in self.reader().existing_trunks(switch).await? {
            if trunk.has_port(port) {
                let attrs = Attributes::new().with("name", trunk.name.as_str());
                self.control.delete(&scope, ObjectKind::Trunk, &attrs).await?;
                log.record(switch, ObjectKind::Trunk, &trunk.name, Outcome::Deleted);
            }
        }

        let interface = VrouterInterface {
            vrouter: vrouter.to_string(),
            port: port.to_string(),
            address,
        };
        let attrs = Attributes::new()
            .with("vrouter-name", interface.vrouter.as_str())
            .with("ip", interface.address.to_string())
            .with("l3-port", interface.port.as_str());
        self.control
            .create(&scope, ObjectKind::VrouterInterface, &attrs)
            .await?;
        log.record(
            switch,
            ObjectKind::VrouterInterface,
            &interface_label(port, address),
            Outcome::Created,
        );
        Ok(())
    }

    /// AssignLoopbacks: one /32 per switch, spines then leaves
    async fn assign_loopbacks(&self, discovery: &Discovery, log: &mut ActionLog) -> Result<()> {
        let Some(base) = self.settings.loopback_base else {
            return Ok(());
        };
        let switches: Vec<&String> = self.all_switches().collect();
        let addresses = compute_sequential_addresses(base, switches.len())?;
        let vrouters = self.vrouter_names().await?;
        let reader = self.reader();

        for (switch, addr) in switches.into_iter().zip(addresses) {
            if !discovery.reachable(switch) {
                continue;
            }
            let Some(vrouter) = vrouters.get(switch) else {
                log.record(
                    switch,
                    ObjectKind::VrouterLoopbackInterface,
                    &addr.to_string(),
                    Outcome::Skipped("no vrouter".to_string()),
                );
                continue;
            };
            let loopbacks = reader.loopbacks().await?;
            if let Some(current) = loopbacks.iter().find(|l| &l.vrouter == vrouter) {
                log.record(
                    switch,
                    ObjectKind::VrouterLoopbackInterface,
                    &current.address.to_string(),
                    Outcome::AlreadyExists,
                );
                continue;
            }
            if let Some(owner) = loopbacks.iter().find(|l| l.address == addr) {
                log.record(
                    switch,
                    ObjectKind::VrouterLoopbackInterface,
                    &addr.to_string(),
                    Outcome::Skipped(format!("address in use by {}", owner.vrouter)),
                );
                continue;
            }
            let attrs = Attributes::new()
                .with("vrouter-name", vrouter.as_str())
                .with("ip", addr.to_string());
            self.control
                .create(&Scope::switch(switch), ObjectKind::VrouterLoopbackInterface, &attrs)
                .await?;
            log.record(
                switch,
                ObjectKind::VrouterLoopbackInterface,
                &addr.to_string(),
                Outcome::Created,
            );
        }
        Ok(())
    }
}

fn interface_label(port: &str, address: LinkAddress) -> String {
    format!("{} on port {}", address, port)
}
