//! eBGP underlay on top of the layer-3 link addressing.
//!
//! Spines share the base AS, each leaf gets its own (base + 1, base + 2, ...
//! in leaf order). Every link interface peers with the interface on the other
//! end of the cable.

use serde::Serialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::control::FabricControlPlane;
use crate::error::{Result, ZtpError};
use crate::models::{ActionLog, Adjacency, Attributes, ObjectKind, Outcome, Scope, Vrouter};
use crate::topology::TopologyReader;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpSettings {
    pub base_as: u32,
    pub redistribute: String,
    pub max_paths: u32,
}

/// AS number per switch: spines get `base_as`, leaves count up from it
pub fn assign_as_numbers(base_as: u32, spines: &[String], leaves: &[String]) -> Result<HashMap<String, u32>> {
    let mut numbers: HashMap<String, u32> = spines.iter().map(|s| (s.clone(), base_as)).collect();
    let mut next = base_as;
    for leaf in leaves {
        next = next.checked_add(1).ok_or_else(|| {
            ZtpError::Config(format!("AS numbers above {} run out before leaf {}", base_as, leaf))
        })?;
        numbers.insert(leaf.clone(), next);
    }
    Ok(numbers)
}

/// Configure AS, redistribution, max paths, router-id and neighbors on
/// every vrouter of the fabric. Settings already in place are left alone.
pub async fn configure_underlay(
    control: &dyn FabricControlPlane,
    adjacency: &Adjacency,
    log: &mut ActionLog,
    spines: &[String],
    leaves: &[String],
    settings: &BgpSettings,
) -> Result<()> {
    let reader = TopologyReader::new(control);
    let as_numbers = assign_as_numbers(settings.base_as, spines, leaves)?;
    let vrouters = reader.vrouters().await?;
    let loopbacks = reader.loopbacks().await?;

    let mut by_switch: HashMap<&str, &Vrouter> = HashMap::new();
    for switch in spines.iter().chain(leaves) {
        if adjacency.unreachable.contains(switch) {
            continue;
        }
        match vrouters
            .iter()
            .find(|v| v.switch == *switch || v.name == Vrouter::name_for(switch))
        {
            Some(vrouter) => {
                by_switch.insert(switch.as_str(), vrouter);
            }
            None => {
                log.record(
                    switch,
                    ObjectKind::Vrouter,
                    &Vrouter::name_for(switch),
                    Outcome::Skipped("no vrouter for BGP".to_string()),
                );
            }
        }
    }

    for switch in spines.iter().chain(leaves) {
        let (Some(vrouter), Some(bgp_as)) = (by_switch.get(switch.as_str()), as_numbers.get(switch)) else {
            continue;
        };
        let router_id = loopbacks
            .iter()
            .find(|l| l.vrouter == vrouter.name)
            .map(|l| l.address);
        configure_vrouter(control, log, switch, vrouter, *bgp_as, router_id, settings).await?;
    }

    let interfaces = reader.vrouter_interfaces().await?;
    for switch in spines.iter().chain(leaves) {
        let Some(vrouter) = by_switch.get(switch.as_str()) else {
            continue;
        };
        let existing = reader.bgp_neighbors(&vrouter.name).await?;

        for interface in interfaces.iter().filter(|i| i.vrouter == vrouter.name) {
            let Some(edge) = adjacency.edge_on_port(switch, &interface.port) else {
                tracing::debug!("No neighbor seen on {} port {}", switch, interface.port);
                continue;
            };
            let (Some(peer_vrouter), Some(remote_as)) =
                (by_switch.get(edge.remote.as_str()), as_numbers.get(&edge.remote))
            else {
                continue;
            };
            let Some(remote_port) = adjacency.remote_port(edge) else {
                log.record(
                    switch,
                    ObjectKind::VrouterBgp,
                    &interface.port,
                    Outcome::Skipped(format!("cannot tell which {} port faces it", edge.remote)),
                );
                continue;
            };
            let Some(peer) = interfaces
                .iter()
                .find(|i| i.vrouter == peer_vrouter.name && i.port == remote_port)
            else {
                tracing::warn!(
                    "{} port {} has no address yet, not peering with {}",
                    edge.remote,
                    remote_port,
                    switch
                );
                continue;
            };

            let neighbor = peer.address.addr;
            let label = format!("{} as {}", neighbor, remote_as);
            if existing.iter().any(|n| n.neighbor == neighbor) {
                log.record(switch, ObjectKind::VrouterBgp, &label, Outcome::AlreadyExists);
                continue;
            }
            let attrs = Attributes::new()
                .with("vrouter-name", vrouter.name.as_str())
                .with("neighbor", neighbor.to_string())
                .with("remote-as", remote_as.to_string());
            control
                .create(&Scope::switch(switch), ObjectKind::VrouterBgp, &attrs)
                .await?;
            log.record(switch, ObjectKind::VrouterBgp, &label, Outcome::Created);
        }
    }
    Ok(())
}

async fn configure_vrouter(
    control: &dyn FabricControlPlane,
    log: &mut ActionLog,
    switch: &str,
    vrouter: &Vrouter,
    bgp_as: u32,
    router_id: Option<Ipv4Addr>,
    settings: &BgpSettings,
) -> Result<()> {
    let mut attrs = Attributes::new().with("name", vrouter.name.as_str());
    let mut changed = false;

    if vrouter.bgp_as != Some(bgp_as) {
        attrs = attrs.with("bgp-as", bgp_as.to_string());
        changed = true;
    }
    if vrouter.bgp_redistribute.as_deref() != Some(settings.redistribute.as_str()) {
        attrs = attrs.with("bgp-redistribute", settings.redistribute.as_str());
        changed = true;
    }
    if vrouter.bgp_max_paths != Some(settings.max_paths) {
        attrs = attrs.with("bgp-max-paths", settings.max_paths.to_string());
        changed = true;
    }
    if let Some(id) = router_id.filter(|id| vrouter.router_id != Some(*id)) {
        attrs = attrs.with("router-id", id.to_string());
        changed = true;
    }

    if !changed {
        log.record(switch, ObjectKind::Vrouter, &vrouter.name, Outcome::AlreadyExists);
        return Ok(());
    }
    control.modify(&Scope::switch(switch), ObjectKind::Vrouter, &attrs).await?;
    log.record(switch, ObjectKind::Vrouter, &vrouter.name, Outcome::Modified);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::memory::MemoryFabric;
    use crate::models::{Record, Switch};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn settings() -> BgpSettings {
        BgpSettings {
            base_as: 65000,
            redistribute: "connected".to_string(),
            max_paths: 16,
        }
    }

    async fn routed_fabric() -> (MemoryFabric, Adjacency) {
        let fabric = MemoryFabric::new(&["spine1", "leaf1", "leaf2"]);
        fabric.link("leaf1", "1", "spine1", "11");
        fabric.link("leaf2", "1", "spine1", "12");
        for switch in ["spine1", "leaf1", "leaf2"] {
            fabric.seed(
                &Scope::Fabric,
                ObjectKind::Vrouter,
                Record::new()
                    .with("name", Vrouter::name_for(switch))
                    .with("location", switch),
            );
        }
        for (vrouter, port, ip) in [
            ("leaf1-vrouter", "1", "10.0.0.1/30"),
            ("spine1-vrouter", "11", "10.0.0.2/30"),
            ("leaf2-vrouter", "1", "10.0.0.5/30"),
            ("spine1-vrouter", "12", "10.0.0.6/30"),
        ] {
            fabric.seed(
                &Scope::Fabric,
                ObjectKind::VrouterInterface,
                Record::new()
                    .with("vrouter-name", vrouter)
                    .with("l3-port", port)
                    .with("ip", ip),
            );
        }
        fabric.seed(
            &Scope::Fabric,
            ObjectKind::VrouterLoopbackInterface,
            Record::new().with("vrouter-name", "spine1-vrouter").with("ip", "101.101.101.1"),
        );
        let switches = vec![Switch::spine("spine1"), Switch::leaf("leaf1"), Switch::leaf("leaf2")];
        let adjacency = TopologyReader::new(&fabric)
            .discover_adjacency(&switches)
            .await
            .unwrap();
        (fabric, adjacency)
    }

    #[tokio::test]
    async fn test_peers_when_only_one_end_reports_port_id() {
        let fabric = MemoryFabric::new(&["spine1", "leaf1"]);
        fabric.seed(
            &Scope::switch("leaf1"),
            ObjectKind::Lldp,
            Record::new().with("local-port", "1").with("sys-name", "spine1"),
        );
        fabric.seed(
            &Scope::switch("spine1"),
            ObjectKind::Lldp,
            Record::new()
                .with("local-port", "11")
                .with("sys-name", "leaf1")
                .with("port-id", "1"),
        );
        for (switch, port, ip) in [("leaf1", "1", "10.0.0.1/30"), ("spine1", "11", "10.0.0.2/30")] {
            fabric.seed(
                &Scope::Fabric,
                ObjectKind::Vrouter,
                Record::new()
                    .with("name", Vrouter::name_for(switch))
                    .with("location", switch),
            );
            fabric.seed(
                &Scope::Fabric,
                ObjectKind::VrouterInterface,
                Record::new()
                    .with("vrouter-name", Vrouter::name_for(switch))
                    .with("l3-port", port)
                    .with("ip", ip),
            );
        }
        let switches = vec![Switch::spine("spine1"), Switch::leaf("leaf1")];
        let adjacency = TopologyReader::new(&fabric)
            .discover_adjacency(&switches)
            .await
            .unwrap();

        let mut log = ActionLog::new();
        configure_underlay(&fabric, &adjacency, &mut log, &names(&["spine1"]), &names(&["leaf1"]), &settings())
            .await
            .unwrap();

        let reader = TopologyReader::new(&fabric);
        let leaf_peers = reader.bgp_neighbors("leaf1-vrouter").await.unwrap();
        assert_eq!(leaf_peers.len(), 1);
        assert_eq!(leaf_peers[0].neighbor, Ipv4Addr::new(10, 0, 0, 2));
        let spine_peers = reader.bgp_neighbors("spine1-vrouter").await.unwrap();
        assert_eq!(spine_peers[0].neighbor, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_as_numbers() {
        let numbers =
            assign_as_numbers(65000, &names(&["spine1", "spine2"]), &names(&["leaf1", "leaf2"])).unwrap();
        assert_eq!(numbers["spine1"], 65000);
        assert_eq!(numbers["spine2"], 65000);
        assert_eq!(numbers["leaf1"], 65001);
        assert_eq!(numbers["leaf2"], 65002);
    }

    #[test]
    fn test_as_numbers_out_of_range() {
        let err = assign_as_numbers(u32::MAX, &names(&["spine1"]), &names(&["leaf1"])).unwrap_err();
        assert_eq!(err.kind(), "config");

        let numbers = assign_as_numbers(u32::MAX - 1, &names(&["spine1"]), &names(&["leaf1"])).unwrap();
        assert_eq!(numbers["leaf1"], u32::MAX);
    }

    #[tokio::test]
    async fn test_underlay_peers_across_each_link() {
        let (fabric, adjacency) = routed_fabric().await;
        let mut log = ActionLog::new();
        configure_underlay(
            &fabric,
            &adjacency,
            &mut log,
            &names(&["spine1"]),
            &names(&["leaf1", "leaf2"]),
            &settings(),
        )
        .await
        .unwrap();

        let reader = TopologyReader::new(&fabric);
        let vrouters = reader.vrouters().await.unwrap();
        let spine = vrouters.iter().find(|v| v.name == "spine1-vrouter").unwrap();
        assert_eq!(spine.bgp_as, Some(65000));
        assert_eq!(spine.bgp_max_paths, Some(16));
        assert_eq!(spine.router_id, Some(Ipv4Addr::new(101, 101, 101, 1)));
        let leaf2 = vrouters.iter().find(|v| v.name == "leaf2-vrouter").unwrap();
        assert_eq!(leaf2.bgp_as, Some(65002));
        assert_eq!(leaf2.router_id, None);

        let spine_peers = reader.bgp_neighbors("spine1-vrouter").await.unwrap();
        assert_eq!(spine_peers.len(), 2);
        assert_eq!(spine_peers[0].neighbor, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(spine_peers[0].remote_as, 65001);
        let leaf_peers = reader.bgp_neighbors("leaf2-vrouter").await.unwrap();
        assert_eq!(leaf_peers[0].neighbor, Ipv4Addr::new(10, 0, 0, 6));
        assert_eq!(leaf_peers[0].remote_as, 65000);
    }

    #[tokio::test]
    async fn test_underlay_rerun_changes_nothing() {
        let (fabric, adjacency) = routed_fabric().await;
        let spines = names(&["spine1"]);
        let leaves = names(&["leaf1", "leaf2"]);
        let mut log = ActionLog::new();
        configure_underlay(&fabric, &adjacency, &mut log, &spines, &leaves, &settings())
            .await
            .unwrap();
        let mutations = fabric.mutations().len();

        let mut rerun = ActionLog::new();
        configure_underlay(&fabric, &adjacency, &mut rerun, &spines, &leaves, &settings())
            .await
            .unwrap();
        assert_eq!(fabric.mutations().len(), mutations);
        assert_eq!(rerun.count(ObjectKind::VrouterBgp, &Outcome::Created), 0);
        assert_eq!(rerun.count(ObjectKind::VrouterBgp, &Outcome::AlreadyExists), 4);
    }
}
