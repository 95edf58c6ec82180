//! Topology Reader: read-only view of what the fabric currently looks like.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use crate::control::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::ipam::LinkAddress;
use crate::models::{
    Adjacency, AdjacencyEdge, Attributes, BgpNeighbor, Cluster, LoopbackInterface, ObjectKind, Record,
    RedundantLinkGroup, Scope, Switch, Trunk, Vrouter, VrouterInterface,
};

/// TopologyReader issues show requests and turns the rows into typed models
pub struct TopologyReader<'a> {
    control: &'a dyn FabricControlPlane,
}

impl<'a> TopologyReader<'a> {
    pub fn new(control: &'a dyn FabricControlPlane) -> Self {
        Self { control }
    }

    async fn show(&self, scope: &Scope, kind: ObjectKind, filters: &Attributes) -> Result<Vec<Record>> {
        self.control.query(scope, kind, filters).await
    }

    /// Names of every switch that has joined the fabric
    pub async fn fabric_nodes(&self) -> Result<Vec<String>> {
        let rows = self.show(&Scope::Fabric, ObjectKind::FabricNode, &Attributes::new()).await?;
        let mut seen = HashSet::new();
        Ok(rows
            .iter()
            .filter_map(|r| r.get("name"))
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect())
    }

    /// Neighbor table of one switch, in the order the switch reports it
    pub async fn neighbors(&self, switch: &str) -> Result<Vec<AdjacencyEdge>> {
        let rows = self
            .show(&Scope::switch(switch), ObjectKind::Lldp, &Attributes::new())
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(AdjacencyEdge {
                    local: switch.to_string(),
                    remote: r.get("sys-name")?.to_string(),
                    local_port: r.get("local-port")?.to_string(),
                    remote_port: r.get("port-id").map(str::to_string),
                })
            })
            .collect())
    }

    /// Adjacency between `switches`, ignoring neighbors outside that set.
    ///
    /// An unreachable spine aborts discovery; an unreachable leaf is
    /// recorded in `Adjacency::unreachable` and contributes no edges.
    pub async fn discover_adjacency(&self, switches: &[Switch]) -> Result<Adjacency> {
        let members: HashSet<&str> = switches.iter().map(|s| s.name.as_str()).collect();
        let mut adjacency = Adjacency::default();

        for switch in switches {
            match self.neighbors(&switch.name).await {
                Ok(edges) => {
                    let before = adjacency.edges.len();
                    adjacency
                        .edges
                        .extend(edges.into_iter().filter(|e| members.contains(e.remote.as_str())));
                    tracing::debug!(
                        "Discovered {} fabric links on {}",
                        adjacency.edges.len() - before,
                        switch.name
                    );
                }
                Err(e @ ZtpError::ControlPlaneUnreachable { .. }) if !switch.is_spine() => {
                    tracing::warn!("Skipping leaf {}: {}", switch.name, e);
                    adjacency.unreachable.push(switch.name.clone());
                }
                Err(e) => {
                    tracing::error!("Topology discovery failed on {}: {}", switch.name, e);
                    return Err(e);
                }
            }
        }
        Ok(adjacency)
    }

    pub async fn existing_clusters(&self) -> Result<Vec<Cluster>> {
        let rows = self.show(&Scope::Fabric, ObjectKind::Cluster, &Attributes::new()).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(Cluster {
                    name: r.get("name")?.to_string(),
                    node1: r.get("cluster-node-1")?.to_string(),
                    node2: r.get("cluster-node-2")?.to_string(),
                })
            })
            .collect())
    }

    pub async fn existing_trunks(&self, switch: &str) -> Result<Vec<Trunk>> {
        let rows = self
            .show(&Scope::switch(switch), ObjectKind::Trunk, &Attributes::new())
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(Trunk {
                    name: r.get("name")?.to_string(),
                    switch: switch.to_string(),
                    ports: expand_ports(r.field("ports")),
                })
            })
            .collect())
    }

    pub async fn existing_vlags(&self, switch: &str) -> Result<Vec<RedundantLinkGroup>> {
        let rows = self
            .show(&Scope::switch(switch), ObjectKind::Vlag, &Attributes::new())
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(RedundantLinkGroup {
                    name: r.get("name")?.to_string(),
                    switch: switch.to_string(),
                    peer_switch: r.field("peer-switch").to_string(),
                    trunk: r.field("port").to_string(),
                    peer_trunk: r.field("peer-port").to_string(),
                })
            })
            .collect())
    }

    pub async fn vrouters(&self) -> Result<Vec<Vrouter>> {
        let rows = self.show(&Scope::Fabric, ObjectKind::Vrouter, &Attributes::new()).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(Vrouter {
                    name: r.get("name")?.to_string(),
                    switch: r.field("location").to_string(),
                    bgp_as: r.get("bgp-as").and_then(|v| v.parse().ok()),
                    router_id: r.get("router-id").and_then(|v| v.parse().ok()),
                    bgp_redistribute: r.get("bgp-redistribute").map(str::to_string),
                    bgp_max_paths: r.get("bgp-max-paths").and_then(|v| v.parse().ok()),
                })
            })
            .collect())
    }

    /// Vrouter running on `switch`, if one exists
    pub async fn vrouter_on(&self, switch: &str) -> Result<Option<Vrouter>> {
        Ok(self
            .vrouters()
            .await?
            .into_iter()
            .find(|v| v.switch == switch || v.name == Vrouter::name_for(switch)))
    }

    /// Layer-3 interfaces bound to physical ports, fabric-wide
    pub async fn vrouter_interfaces(&self) -> Result<Vec<VrouterInterface>> {
        let rows = self
            .show(&Scope::Fabric, ObjectKind::VrouterInterface, &Attributes::new())
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                let address = match r.field("ip").parse::<LinkAddress>() {
                    Ok(address) => address,
                    Err(_) => {
                        tracing::debug!("Ignoring vrouter interface without a usable address: {:?}", r);
                        return None;
                    }
                };
                Some(VrouterInterface {
                    vrouter: r.get("vrouter-name")?.to_string(),
                    port: r.get("l3-port")?.to_string(),
                    address,
                })
            })
            .collect())
    }

    pub async fn loopbacks(&self) -> Result<Vec<LoopbackInterface>> {
        let rows = self
            .show(&Scope::Fabric, ObjectKind::VrouterLoopbackInterface, &Attributes::new())
            .await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                let address = r.field("ip").split('/').next()?.parse().ok()?;
                Some(LoopbackInterface {
                    vrouter: r.get("vrouter-name")?.to_string(),
                    address,
                })
            })
            .collect())
    }

    pub async fn bgp_neighbors(&self, vrouter: &str) -> Result<Vec<BgpNeighbor>> {
        let filters = Attributes::new().with("vrouter-name", vrouter);
        let rows = self.show(&Scope::Fabric, ObjectKind::VrouterBgp, &filters).await?;
        Ok(rows
            .iter()
            .filter_map(|r| {
                Some(BgpNeighbor {
                    vrouter: vrouter.to_string(),
                    neighbor: r.get("neighbor")?.parse().ok()?,
                    remote_as: r.get("remote-as")?.parse().ok()?,
                })
            })
            .collect())
    }

    /// Every address already bound to a link or loopback interface
    pub async fn bound_addresses(&self) -> Result<Vec<Ipv4Addr>> {
        let mut bound: Vec<Ipv4Addr> = self
            .vrouter_interfaces()
            .await?
            .into_iter()
            .map(|i| i.address.addr)
            .collect();
        bound.extend(self.loopbacks().await?.into_iter().map(|l| l.address));
        Ok(bound)
    }

    pub async fn auto_trunk_enabled(&self, switch: &str) -> Result<bool> {
        let rows = self
            .show(&Scope::switch(switch), ObjectKind::SystemSettings, &Attributes::new())
            .await?;
        Ok(rows
            .first()
            .map(|r| !matches!(r.field("auto-trunk"), "off" | "false"))
            .unwrap_or(true))
    }

    pub async fn inband_ip(&self, switch: &str) -> Result<Option<String>> {
        let rows = self
            .show(&Scope::switch(switch), ObjectKind::SwitchSetup, &Attributes::new())
            .await?;
        Ok(rows
            .first()
            .and_then(|r| r.get("in-band-ip"))
            .filter(|ip| !ip.starts_with("0.0.0.0"))
            .map(str::to_string))
    }
}

/// Expand a port list such as `1-3,9` into individual ports
fn expand_ports(raw: &str) -> Vec<String> {
    let mut ports = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let range = part
            .split_once('-')
            .and_then(|(a, b)| Some((a.parse::<u32>().ok()?, b.parse::<u32>().ok()?)));
        match range {
            Some((start, end)) if start <= end => ports.extend((start..=end).map(|p| p.to_string())),
            _ => ports.push(part.to_string()),
        }
    }
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::memory::MemoryFabric;

    fn fabric() -> MemoryFabric {
        let fabric = MemoryFabric::new(&["spine1", "spine2", "leaf1", "leaf2"]);
        fabric.link("leaf1", "1", "spine1", "11");
        fabric.link("leaf1", "2", "spine2", "11");
        fabric.link("leaf2", "1", "spine1", "12");
        fabric.link("leaf1", "5", "leaf2", "5");
        fabric.seed(
            &Scope::switch("leaf1"),
            ObjectKind::Lldp,
            Record::new().with("local-port", "48").with("sys-name", "mgmt-switch"),
        );
        fabric
    }

    fn switches() -> Vec<Switch> {
        vec![
            Switch::spine("spine1"),
            Switch::spine("spine2"),
            Switch::leaf("leaf1"),
            Switch::leaf("leaf2"),
        ]
    }

    #[tokio::test]
    async fn test_discover_adjacency_keeps_fabric_members_only() {
        let fabric = fabric();
        let reader = TopologyReader::new(&fabric);
        let adjacency = reader.discover_adjacency(&switches()).await.unwrap();

        assert_eq!(adjacency.neighbors("leaf1"), vec!["spine1", "spine2", "leaf2"]);
        assert_eq!(adjacency.neighbors("spine1"), vec!["leaf1", "leaf2"]);
        assert!(adjacency.unreachable.is_empty());
        let edge = adjacency.edge_on_port("spine1", "12").unwrap();
        assert_eq!(edge.remote, "leaf2");
        assert_eq!(edge.remote_port.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unreachable_leaf_is_skipped() {
        let fabric = fabric();
        fabric.set_unreachable("leaf2");
        let reader = TopologyReader::new(&fabric);
        let adjacency = reader.discover_adjacency(&switches()).await.unwrap();

        assert_eq!(adjacency.unreachable, vec!["leaf2"]);
        assert!(adjacency.links_between("leaf2", "spine1").next().is_none());
        // the spine's own view still shows the link
        assert_eq!(adjacency.links_between("spine1", "leaf2").count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_spine_aborts() {
        let fabric = fabric();
        fabric.set_unreachable("spine2");
        let reader = TopologyReader::new(&fabric);
        let err = reader.discover_adjacency(&switches()).await.unwrap_err();
        assert_eq!(err.kind(), "control_plane_unreachable");
    }

    #[tokio::test]
    async fn test_existing_objects_are_typed() {
        let fabric = fabric();
        fabric.seed(
            &Scope::Fabric,
            ObjectKind::Cluster,
            Record::new()
                .with("name", "leaf1-to-leaf2-cluster")
                .with("cluster-node-1", "leaf1")
                .with("cluster-node-2", "leaf2"),
        );
        fabric.seed(
            &Scope::switch("leaf1"),
            ObjectKind::Trunk,
            Record::new().with("name", "leaf1-to-spine1spine2").with("ports", "1-2,7"),
        );
        fabric
            .modify(
                &Scope::switch("leaf1"),
                ObjectKind::SystemSettings,
                &Attributes::new().flag("no-auto-trunk"),
            )
            .await
            .unwrap();
        let reader = TopologyReader::new(&fabric);

        let clusters = reader.existing_clusters().await.unwrap();
        assert_eq!(clusters, vec![Cluster::for_pair("leaf1", "leaf2")]);

        let trunks = reader.existing_trunks("leaf1").await.unwrap();
        assert_eq!(trunks[0].ports, vec!["1", "2", "7"]);
        assert!(reader.existing_trunks("leaf2").await.unwrap().is_empty());

        assert!(!reader.auto_trunk_enabled("leaf1").await.unwrap());
        assert!(reader.auto_trunk_enabled("leaf2").await.unwrap());
    }

    #[tokio::test]
    async fn test_bound_addresses_include_links_and_loopbacks() {
        let fabric = fabric();
        fabric.seed(
            &Scope::Fabric,
            ObjectKind::VrouterInterface,
            Record::new()
                .with("vrouter-name", "leaf1-vrouter")
                .with("l3-port", "1")
                .with("ip", "10.1.1.1/30"),
        );
        fabric.seed(
            &Scope::Fabric,
            ObjectKind::VrouterLoopbackInterface,
            Record::new().with("vrouter-name", "leaf1-vrouter").with("ip", "101.101.101.3"),
        );
        let reader = TopologyReader::new(&fabric);
        let bound = reader.bound_addresses().await.unwrap();
        assert_eq!(
            bound,
            vec![Ipv4Addr::new(10, 1, 1, 1), Ipv4Addr::new(101, 101, 101, 3)]
        );
    }

    #[test]
    fn test_fabric_nodes_are_distinct() {
        let fabric = MemoryFabric::new(&["spine1", "leaf1"]);
        fabric.seed(&Scope::Fabric, ObjectKind::FabricNode, Record::new().with("name", "leaf1"));
        let nodes = tokio_test::block_on(TopologyReader::new(&fabric).fabric_nodes()).unwrap();
        assert_eq!(nodes, vec!["spine1", "leaf1"]);
    }

    #[test]
    fn test_expand_ports() {
        assert_eq!(expand_ports("1-3,9"), vec!["1", "2", "3", "9"]);
        assert_eq!(expand_ports(""), Vec::<String>::new());
        assert_eq!(expand_ports("eth1, eth2"), vec!["eth1", "eth2"]);
    }
}
